//! Wire types shared between `katana-daemon` and `katana-client`/`katana-cli`.
//!
//! Everything here is plain serde data: no business logic, no filesystem
//! access. `katana-core` owns the richer in-process types and converts to/
//! from these at the API boundary.

pub mod config;
pub mod event;
pub mod module;
pub mod state;
pub mod system;

pub use config::*;
pub use event::*;
pub use module::*;
pub use state::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Envelope wrapping every JSON API response except SSE streams and file
/// downloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: ErrorBody) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

/// Machine-readable error body, mirroring the taxonomy in the spec's error
/// handling design.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

/// Response body for `POST /api/modules/:name/{install,remove,start,stop}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationAccepted {
    pub operation_id: String,
}
