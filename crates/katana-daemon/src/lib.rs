pub mod api;
pub mod error;
pub mod operations;
pub mod proxy;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use operations::OperationManager;
pub use state::{DaemonState, SharedState};
