//! Thin HTTP client the CLI uses to talk to `katana-daemon` over the same
//! TLS-terminating proxy the browser dashboard uses, trusting the locally
//! issued root CA instead of the system trust store.

use std::path::Path;
use std::time::Duration;

use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use katana_models::{
    ApiResponse, ErrorBody, LockResponse, ModuleCategory, ModuleStatusResponse, OperationAccepted,
    OperationEvent, OperationSnapshot, SystemStatusResponse,
};
use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("{code}: {message}")]
    Api {
        code: String,
        message: String,
        help: Option<String>,
    },
    #[error("invalid root CA certificate: {0}")]
    InvalidCa(String),
}

impl ClientError {
    pub fn help(&self) -> Option<&str> {
        match self {
            ClientError::Api { help, .. } => help.as_deref(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Talks to `https://<dashboard_hostname>`, trusting the supplied root CA
/// PEM instead of (or in addition to) the platform trust store.
pub struct Client {
    base_url: String,
    http: reqwest::Client,
}

impl Client {
    pub fn new(base_url: impl Into<String>, ca_pem: Option<&[u8]>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(30));

        if let Some(pem) = ca_pem {
            let cert = reqwest::Certificate::from_pem(pem)
                .map_err(|e| ClientError::InvalidCa(e.to_string()))?;
            builder = builder.add_root_certificate(cert);
        }

        Ok(Self {
            base_url: base_url.into(),
            http: builder.build()?,
        })
    }

    /// Load the root CA from a file on disk, for the common case of
    /// pointing at `paths.certs/rootCA.crt`.
    pub fn with_ca_file(base_url: impl Into<String>, ca_path: &Path) -> Result<Self> {
        let pem = std::fs::read(ca_path).map_err(|e| ClientError::InvalidCa(e.to_string()))?;
        Self::new(base_url, Some(&pem))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.http.get(format!("{}{path}", self.base_url)).send().await?;
        Self::unwrap_envelope(resp).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.http.post(format!("{}{path}", self.base_url)).send().await?;
        Self::unwrap_envelope(resp).await
    }

    async fn unwrap_envelope<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        let envelope: ApiResponse<T> = resp.json().await?;
        if envelope.success {
            envelope.data.ok_or_else(|| ClientError::Api {
                code: "INTERNAL_ERROR".to_string(),
                message: "server reported success with no data".to_string(),
                help: None,
            })
        } else {
            let ErrorBody { code, message, help } = envelope.error.unwrap_or(ErrorBody {
                code: "INTERNAL_ERROR".to_string(),
                message: "unknown error".to_string(),
                help: None,
            });
            Err(ClientError::Api { code, message, help })
        }
    }

    pub async fn list_modules(&self, category: Option<ModuleCategory>) -> Result<Vec<ModuleStatusResponse>> {
        match category {
            Some(ModuleCategory::Targets) => self.get("/api/modules?category=targets").await,
            Some(ModuleCategory::Tools) => self.get("/api/modules?category=tools").await,
            None => self.get("/api/modules").await,
        }
    }

    pub async fn install(&self, name: &str, skip_dns: bool) -> Result<OperationAccepted> {
        let suffix = if skip_dns { "?skip_dns=true" } else { "" };
        self.post(&format!("/api/modules/{name}/install{suffix}")).await
    }

    pub async fn remove(&self, name: &str, skip_dns: bool) -> Result<OperationAccepted> {
        let suffix = if skip_dns { "?skip_dns=true" } else { "" };
        self.post(&format!("/api/modules/{name}/remove{suffix}")).await
    }

    pub async fn start(&self, name: &str) -> Result<OperationAccepted> {
        self.post(&format!("/api/modules/{name}/start")).await
    }

    pub async fn stop(&self, name: &str) -> Result<OperationAccepted> {
        self.post(&format!("/api/modules/{name}/stop")).await
    }

    pub async fn operation(&self, id: &str) -> Result<OperationSnapshot> {
        self.get(&format!("/api/operations/{id}")).await
    }

    /// Stream the SSE log for an operation. The backlog replay is delivered
    /// as ordinary items at the start of the stream.
    pub async fn stream_operation(
        &self,
        id: &str,
    ) -> Result<impl Stream<Item = Result<OperationEvent>>> {
        let resp = self
            .http
            .get(format!("{}/api/operations/{id}/stream", self.base_url))
            .send()
            .await?;

        let stream = resp.bytes_stream().eventsource().filter_map(|event| async move {
            match event {
                Ok(event) if event.event == "message" && event.data.is_empty() => None,
                Ok(event) => match serde_json::from_str::<OperationEvent>(&event.data) {
                    Ok(parsed) => Some(Ok(parsed)),
                    Err(_) => None,
                },
                Err(e) => Some(Err(ClientError::Api {
                    code: "STREAM_ERROR".to_string(),
                    message: e.to_string(),
                    help: None,
                })),
            }
        });

        Ok(stream)
    }

    pub async fn system_status(&self) -> Result<SystemStatusResponse> {
        self.get("/api/system").await
    }

    pub async fn lock(&self) -> Result<LockResponse> {
        self.post("/api/system/lock").await
    }

    pub async fn unlock(&self) -> Result<LockResponse> {
        self.post("/api/system/unlock").await
    }

    pub async fn download_ca(&self) -> Result<Vec<u8>> {
        let resp = self
            .http
            .get(format!("{}/api/certs/ca", self.base_url))
            .send()
            .await?;
        Ok(resp.bytes().await?.to_vec())
    }
}
