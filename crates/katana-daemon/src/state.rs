use std::sync::Arc;

use katana_core::{ActionExecutor, CertManager, DnsSynchronizer, ModuleLoader, RouteTable, StateStore};
use katana_models::Config;

use crate::operations::OperationManager;

/// Shared handle to every daemon subsystem, injected into API handlers via
/// `axum::Extension`, the same pattern this lineage's daemon crate already
/// uses.
pub struct DaemonState {
    pub config: Config,
    pub state_store: Arc<StateStore>,
    pub module_loader: Arc<ModuleLoader>,
    pub executor: Arc<ActionExecutor>,
    pub operations: Arc<OperationManager>,
    pub route_table: Arc<RouteTable>,
    pub cert_manager: Arc<CertManager>,
    pub dns: Arc<DnsSynchronizer>,
}

pub type SharedState = Arc<DaemonState>;
