use std::sync::Arc;

use axum::body::Body;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Extension;
use katana_core::KatanaError;

use crate::error::ApiResult;
use crate::state::DaemonState;

/// `GET /api/certs/ca` — the root CA certificate, for browser import.
pub async fn download_ca(Extension(state): Extension<Arc<DaemonState>>) -> ApiResult<Response> {
    if !state.cert_manager.is_initialized() {
        return Err(KatanaError::CertNotInitialized.into());
    }

    let pem = tokio::fs::read(state.cert_manager.ca_cert_path())
        .await
        .map_err(|e| KatanaError::Cert(format!("reading root CA: {e}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/x-x509-ca-cert"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"katana-root-ca.crt\"",
            ),
        ],
        Body::from(pem),
    )
        .into_response())
}
