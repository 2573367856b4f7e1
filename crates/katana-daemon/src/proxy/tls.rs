use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use katana_core::CertManager;
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use tokio::sync::RwLock;
use tracing::{error, warn};

/// Resolves the server cert for every handshake, re-reading `server.crt`/
/// `server.key` from disk whenever their mtime has moved since the last
/// check. `renew()` can run in a separate CLI process, so the proxy has no
/// in-memory signal that the files changed; polling mtime on the handshake
/// path is the only hook both processes agree on.
pub struct ReloadingCertResolver {
    cert_path: PathBuf,
    key_path: PathBuf,
    cached: RwLock<Option<(SystemTime, Arc<CertifiedKey>)>>,
}

impl ReloadingCertResolver {
    pub fn new(cert_manager: &CertManager) -> Self {
        Self {
            cert_path: cert_manager.server_cert_path(),
            key_path: cert_manager.server_key_path(),
            cached: RwLock::new(None),
        }
    }

    fn current_mtime(&self) -> Option<SystemTime> {
        let cert_mtime = std::fs::metadata(&self.cert_path).ok()?.modified().ok()?;
        let key_mtime = std::fs::metadata(&self.key_path).ok()?.modified().ok()?;
        Some(cert_mtime.max(key_mtime))
    }

    async fn resolve_cached(&self) -> Option<Arc<CertifiedKey>> {
        let mtime = self.current_mtime()?;

        if let Some((cached_mtime, key)) = self.cached.read().await.as_ref() {
            if *cached_mtime == mtime {
                return Some(key.clone());
            }
        }

        let loaded = match CertManager::load_server_cert(&self.cert_path, &self.key_path) {
            Ok(loaded) => loaded,
            Err(e) => {
                error!(error = %e, "failed to load server certificate for TLS handshake");
                return None;
            }
        };

        let signing_key = match rustls::crypto::ring::sign::any_supported_type(&loaded.key) {
            Ok(key) => key,
            Err(e) => {
                error!(error = %e, "server private key is not a supported signature type");
                return None;
            }
        };

        let certified = Arc::new(CertifiedKey::new(loaded.cert_chain, signing_key));
        *self.cached.write().await = Some((mtime, certified.clone()));
        Some(certified)
    }
}

impl std::fmt::Debug for ReloadingCertResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadingCertResolver").finish()
    }
}

impl ResolvesServerCert for ReloadingCertResolver {
    fn resolve(&self, _client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        // rustls's sync trait can't await; block_in_place keeps us off a
        // blocking executor thread while still letting the async cache
        // path (the common case, no file I/O) run uncontended.
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(self.resolve_cached())
        })
        .or_else(|| {
            warn!("TLS handshake with no server certificate available");
            None
        })
    }
}
