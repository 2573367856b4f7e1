use std::sync::Arc;

use axum::response::Json;
use axum::Extension;
use katana_models::{
    ApiResponse, CertStatusResponse, DnsStatusResponse, DockerStatus, LockResponse,
    ProxyStatusResponse, SystemStatusResponse,
};
use tokio::process::Command;

use crate::error::ApiResult;
use crate::state::DaemonState;

/// `GET /api/system` — Docker, cert, DNS, and proxy status in one call, the
/// way the dashboard's landing page wants it.
pub async fn get_system_status(
    Extension(state): Extension<Arc<DaemonState>>,
) -> ApiResult<Json<ApiResponse<SystemStatusResponse>>> {
    let current_state = state.state_store.get().await?;

    let docker = match Command::new("docker").arg("info").output().await {
        Ok(output) if output.status.success() => DockerStatus {
            reachable: true,
            error: None,
        },
        Ok(output) => DockerStatus {
            reachable: false,
            error: Some(String::from_utf8_lossy(&output.stderr).trim().to_string()),
        },
        Err(e) => DockerStatus {
            reachable: false,
            error: Some(e.to_string()),
        },
    };

    let cert = if state.cert_manager.is_initialized() {
        CertStatusResponse {
            initialized: true,
            days_until_expiration: state.cert_manager.days_until_expiration().ok(),
            domain: Some(state.config.domain().to_string()),
        }
    } else {
        CertStatusResponse {
            initialized: false,
            days_until_expiration: None,
            domain: None,
        }
    };

    let dns = DnsStatusResponse {
        remote_mode: matches!(state.config.install_type, katana_models::InstallType::Remote),
        managed_entry_count: state.dns.list_managed().map(|v| v.len()).unwrap_or(0),
    };

    let route_count: usize = current_state
        .targets
        .iter()
        .map(|t| t.routes.len())
        .sum();

    let proxy = ProxyStatusResponse {
        http_port: state.config.proxy.http_port,
        https_port: state.config.proxy.https_port,
        bind_address: state.config.bind_address(),
        route_count,
    };

    Ok(Json(ApiResponse::ok(SystemStatusResponse {
        locked: current_state.locked,
        docker,
        cert,
        dns,
        proxy,
    })))
}

pub async fn lock_system(
    Extension(state): Extension<Arc<DaemonState>>,
) -> ApiResult<Json<ApiResponse<LockResponse>>> {
    state.state_store.set_locked(true).await?;
    Ok(Json(ApiResponse::ok(LockResponse { locked: true })))
}

pub async fn unlock_system(
    Extension(state): Extension<Arc<DaemonState>>,
) -> ApiResult<Json<ApiResponse<LockResponse>>> {
    state.state_store.set_locked(false).await?;
    Ok(Json(ApiResponse::ok(LockResponse { locked: false })))
}

/// `GET /health` — liveness only, no auth, no dependency checks.
pub async fn health() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::ok("ok"))
}
