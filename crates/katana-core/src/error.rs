use thiserror::Error;

pub type Result<T> = std::result::Result<T, KatanaError>;

/// The full error taxonomy from the spec's error handling design. Each
/// variant carries a stable machine `code()` and an optional `help()`
/// remediation hint.
#[derive(Debug, Error)]
pub enum KatanaError {
    #[error("config error: {0}")]
    Config(String),

    #[error("state error: {0}")]
    State(String),

    #[error("module error{}: {message}", module.as_ref().map(|m| format!(" ({m})")).unwrap_or_default())]
    Module {
        module: Option<String>,
        message: String,
    },

    #[error("docker error: {0}")]
    Docker(String),

    #[error("docker is not running")]
    DockerNotRunning,

    #[error("permission denied running docker")]
    DockerPermission,

    #[error("certificate authority is not initialized")]
    CertNotInitialized,

    #[error("server certificate expired {days_ago} day(s) ago")]
    CertExpired { days_ago: i64 },

    #[error("openssl executable not found on PATH")]
    OpensslNotFound,

    #[error("certificate error: {0}")]
    Cert(String),

    #[error("permission denied writing hosts file")]
    DnsPermission,

    #[error("dns error: {0}")]
    Dns(String),

    #[error("failed to bind port {port}")]
    PortBind { port: u16 },

    #[error("backend for '{name}' is not reachable")]
    ContainerNotReachable { name: String },

    #[error("no route for host '{host}'")]
    RouteNotFound { host: String },

    #[error("system is locked")]
    SystemLocked,

    #[error("{kind} '{name}' not found")]
    NotFound { kind: String, name: String },

    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: String, name: String },

    #[error("an operation is already in progress for this module")]
    OperationInProgress,

    #[error("operation timed out")]
    TimedOut,

    #[error("{0} is not supported")]
    NotSupported(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl KatanaError {
    /// Stable machine code, matching the taxonomy in the spec.
    pub fn code(&self) -> &'static str {
        match self {
            KatanaError::Config(_) => "CONFIG_ERROR",
            KatanaError::State(_) => "STATE_ERROR",
            KatanaError::Module { .. } => "MODULE_ERROR",
            KatanaError::Docker(_) => "DOCKER_ERROR",
            KatanaError::DockerNotRunning => "DOCKER_NOT_RUNNING",
            KatanaError::DockerPermission => "DOCKER_PERMISSION",
            KatanaError::CertNotInitialized => "CERT_NOT_INITIALIZED",
            KatanaError::CertExpired { .. } => "CERT_EXPIRED",
            KatanaError::OpensslNotFound => "OPENSSL_NOT_FOUND",
            KatanaError::Cert(_) => "CERT_ERROR",
            KatanaError::DnsPermission => "DNS_PERMISSION",
            KatanaError::Dns(_) => "DNS_ERROR",
            KatanaError::PortBind { .. } => "PORT_BIND",
            KatanaError::ContainerNotReachable { .. } => "CONTAINER_NOT_REACHABLE",
            KatanaError::RouteNotFound { .. } => "ROUTE_NOT_FOUND",
            KatanaError::SystemLocked => "SYSTEM_LOCKED",
            KatanaError::NotFound { .. } => "NOT_FOUND",
            KatanaError::AlreadyExists { .. } => "ALREADY_EXISTS",
            KatanaError::OperationInProgress => "OPERATION_IN_PROGRESS",
            KatanaError::TimedOut => "TIMED_OUT",
            KatanaError::NotSupported(_) => "NOT_SUPPORTED",
            KatanaError::Validation(_) => "VALIDATION_ERROR",
            KatanaError::Internal(_) => "INTERNAL_ERROR",
            KatanaError::Io(_) => "INTERNAL_ERROR",
            KatanaError::Yaml(_) => "STATE_ERROR",
        }
    }

    /// Operator-facing remediation hint, when one exists.
    pub fn help(&self) -> Option<String> {
        match self {
            KatanaError::DockerNotRunning => {
                Some("start the container runtime and retry".to_string())
            }
            KatanaError::DockerPermission => {
                Some("add the invoking user to the docker group or run elevated".to_string())
            }
            KatanaError::CertNotInitialized => {
                Some("run `katana cert init` to create the local CA".to_string())
            }
            KatanaError::OpensslNotFound => {
                Some("install openssl and ensure it is on PATH".to_string())
            }
            KatanaError::DnsPermission => {
                Some("rerun the command elevated (sudo) to edit the hosts file".to_string())
            }
            KatanaError::PortBind { port } => Some(format!(
                "grant this binary cap_net_bind_service, or run elevated, to bind port {port}"
            )),
            KatanaError::SystemLocked => {
                Some("run `katana unlock` to allow install/remove".to_string())
            }
            _ => None,
        }
    }

    /// Process exit code for CLI use: each kind gets a distinct nonzero
    /// code, 0 is reserved for success, 1 is the generic fallback.
    pub fn exit_code(&self) -> i32 {
        match self {
            KatanaError::Config(_) => 10,
            KatanaError::State(_) | KatanaError::Yaml(_) => 11,
            KatanaError::Module { .. } => 12,
            KatanaError::Docker(_) | KatanaError::DockerNotRunning | KatanaError::DockerPermission => 13,
            KatanaError::Cert(_)
            | KatanaError::CertNotInitialized
            | KatanaError::CertExpired { .. }
            | KatanaError::OpensslNotFound => 14,
            KatanaError::Dns(_) | KatanaError::DnsPermission => 15,
            KatanaError::PortBind { .. }
            | KatanaError::ContainerNotReachable { .. }
            | KatanaError::RouteNotFound { .. } => 16,
            KatanaError::SystemLocked => 17,
            KatanaError::NotFound { .. } => 18,
            KatanaError::AlreadyExists { .. } => 19,
            KatanaError::OperationInProgress => 20,
            KatanaError::TimedOut => 21,
            KatanaError::NotSupported(_) => 22,
            KatanaError::Validation(_) => 23,
            KatanaError::Internal(_) | KatanaError::Io(_) => 1,
        }
    }
}
