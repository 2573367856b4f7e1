pub mod certs;
pub mod modules;
pub mod operations;
pub mod system;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::DaemonState;

/// Build the full API router. Shared verbatim between the daemon's own
/// listener and the reverse proxy's in-process dashboard-host dispatch.
pub fn router(state: Arc<DaemonState>) -> Router {
    let mut api = Router::new()
        .route("/api/modules", get(modules::list_modules))
        .route("/api/modules/:name/install", post(modules::install_module))
        .route("/api/modules/:name/remove", post(modules::remove_module))
        .route("/api/modules/:name/start", post(modules::start_module))
        .route("/api/modules/:name/stop", post(modules::stop_module))
        .route("/api/operations/:id", get(operations::get_operation))
        .route(
            "/api/operations/:id/stream",
            get(operations::stream_operation),
        )
        .route("/api/system", get(system::get_system_status))
        .route("/api/system/lock", post(system::lock_system))
        .route("/api/system/unlock", post(system::unlock_system))
        .route("/api/certs/ca", get(certs::download_ca))
        .route("/health", get(system::health));

    if state.config.proxy.cors_enabled {
        api = api.layer(
            CorsLayer::new().allow_origin(Any).allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ]),
        );
    }

    api.layer(TraceLayer::new_for_http())
        .layer(axum::Extension(state))
}
