use serde::{Deserialize, Serialize};

/// Response body for `GET /api/system`: a snapshot of the control plane's
/// own health, independent of any single module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatusResponse {
    pub locked: bool,
    pub docker: DockerStatus,
    pub cert: CertStatusResponse,
    pub dns: DnsStatusResponse,
    pub proxy: ProxyStatusResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerStatus {
    pub reachable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertStatusResponse {
    pub initialized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_until_expiration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsStatusResponse {
    pub remote_mode: bool,
    pub managed_entry_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyStatusResponse {
    pub http_port: u16,
    pub https_port: u16,
    pub bind_address: String,
    pub route_count: usize,
}

/// Response body for `POST /api/system/lock` and `/unlock`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockResponse {
    pub locked: bool,
}
