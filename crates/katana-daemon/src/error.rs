use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use katana_core::KatanaError;
use katana_models::{ApiResponse, ErrorBody};

/// Wraps `KatanaError` with the HTTP status mapping from the API surface
/// design, rendering the shared `{success, data?, error?}` envelope.
#[derive(Debug)]
pub struct ApiError(pub KatanaError);

impl From<KatanaError> for ApiError {
    fn from(err: KatanaError) -> Self {
        ApiError(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError(KatanaError::Internal(err.to_string()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body: ApiResponse<()> = ApiResponse::err(ErrorBody {
            code: self.0.code().to_string(),
            message: self.0.to_string(),
            help: self.0.help(),
        });
        (status, Json(body)).into_response()
    }
}

fn status_for(err: &KatanaError) -> StatusCode {
    match err {
        KatanaError::NotFound { .. } => StatusCode::NOT_FOUND,
        KatanaError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
        KatanaError::SystemLocked => StatusCode::LOCKED,
        KatanaError::OperationInProgress => StatusCode::CONFLICT,
        KatanaError::AlreadyExists { .. } => StatusCode::CONFLICT,
        KatanaError::Validation(_) => StatusCode::BAD_REQUEST,
        KatanaError::NotSupported(_) => StatusCode::BAD_REQUEST,
        KatanaError::TimedOut => StatusCode::GATEWAY_TIMEOUT,
        KatanaError::ContainerNotReachable { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
