use std::sync::Arc;

use axum::extract::{Path, Query};
use axum::response::Json;
use axum::Extension;
use katana_core::{ComposeAdapter, KatanaError};
use katana_models::{
    ApiResponse, ModuleCategory, ModuleDef, ModuleStatusResponse, OperationAccepted, OperationKind,
};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::DaemonState;

#[derive(Debug, Deserialize)]
pub struct ListModulesQuery {
    pub category: Option<ModuleCategory>,
}

/// `GET /api/modules?category=targets|tools` — the catalog augmented with
/// live installed/running status.
pub async fn list_modules(
    Extension(state): Extension<Arc<DaemonState>>,
    Query(query): Query<ListModulesQuery>,
) -> ApiResult<Json<ApiResponse<Vec<ModuleStatusResponse>>>> {
    let (modules, _warnings) = match query.category {
        Some(category) => state.module_loader.load_by_category(category)?,
        None => state.module_loader.load_all()?,
    };

    let current_state = state.state_store.get().await?;
    let compose = ComposeAdapter::new(&state.config);

    let mut out = Vec::with_capacity(modules.len());
    for module in modules {
        let installed = current_state.is_installed(module.name());
        let status = match &module.def {
            ModuleDef::Targets(t) => {
                if !installed {
                    "not_installed".to_string()
                } else {
                    match compose.status(module.name(), &module.path, &t.compose).await {
                        Ok(status) if status.all_running => "running".to_string(),
                        Ok(status) if status.any_running => "partial".to_string(),
                        Ok(_) => "stopped".to_string(),
                        Err(_) => "unknown".to_string(),
                    }
                }
            }
            ModuleDef::Tools(_) => {
                if installed {
                    "installed".to_string()
                } else {
                    "not_installed".to_string()
                }
            }
        };

        out.push(ModuleStatusResponse {
            name: module.name().to_string(),
            category: module.category(),
            description: module.def.description().to_string(),
            installed,
            status,
        });
    }

    Ok(Json(ApiResponse::ok(out)))
}

#[derive(Debug, Deserialize, Default)]
pub struct InstallQuery {
    #[serde(default)]
    pub skip_dns: bool,
}

async fn submit_operation(
    state: &DaemonState,
    name: &str,
    kind: OperationKind,
    skip_dns: bool,
) -> ApiResult<Json<ApiResponse<OperationAccepted>>> {
    let id = state.operations.submit(name, kind, skip_dns).await?;
    Ok(Json(ApiResponse::ok(OperationAccepted {
        operation_id: id.to_string(),
    })))
}

pub async fn install_module(
    Extension(state): Extension<Arc<DaemonState>>,
    Path(name): Path<String>,
    Query(query): Query<InstallQuery>,
) -> ApiResult<Json<ApiResponse<OperationAccepted>>> {
    ensure_unlocked(&state).await?;
    submit_operation(&state, &name, OperationKind::Install, query.skip_dns).await
}

pub async fn remove_module(
    Extension(state): Extension<Arc<DaemonState>>,
    Path(name): Path<String>,
    Query(query): Query<InstallQuery>,
) -> ApiResult<Json<ApiResponse<OperationAccepted>>> {
    ensure_unlocked(&state).await?;
    submit_operation(&state, &name, OperationKind::Remove, query.skip_dns).await
}

pub async fn start_module(
    Extension(state): Extension<Arc<DaemonState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<ApiResponse<OperationAccepted>>> {
    submit_operation(&state, &name, OperationKind::Start, false).await
}

pub async fn stop_module(
    Extension(state): Extension<Arc<DaemonState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<ApiResponse<OperationAccepted>>> {
    submit_operation(&state, &name, OperationKind::Stop, false).await
}

/// install/remove are rejected up front with `SYSTEM_LOCKED` rather than
/// discovering the lock only once the operation starts running, so the
/// caller sees 423 immediately instead of a later `failed` event.
async fn ensure_unlocked(state: &DaemonState) -> ApiResult<()> {
    let current = state.state_store.get().await?;
    if current.locked {
        return Err(KatanaError::SystemLocked.into());
    }
    Ok(())
}
