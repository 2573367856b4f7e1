use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use katana_models::CertState;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair, SanType,
};
use tokio::sync::RwLock;
use tracing::info;

use crate::error::{KatanaError, Result};

const CA_CERT_FILE: &str = "rootCA.crt";
const CA_KEY_FILE: &str = "rootCA.key";
const SERVER_CERT_FILE: &str = "server.crt";
const SERVER_KEY_FILE: &str = "server.key";
const CERT_STATE_FILE: &str = "cert-state.yml";

const CA_LIFETIME_DAYS: i64 = 365 * 10;
const SERVER_LIFETIME_DAYS: i64 = 365;

/// In-memory view of the currently loaded server certificate, consumed by
/// the reverse proxy's `rustls::server::ResolvesServerCert` implementation.
/// Swapped atomically on `renew()` so existing TLS sessions are unaffected
/// and new handshakes pick up the fresh cert.
pub struct LoadedServerCert {
    pub cert_chain: Vec<rustls::pki_types::CertificateDer<'static>>,
    pub key: rustls::pki_types::PrivateKeyDer<'static>,
}

/// Owns `paths.certs`: the root CA, the server certificate it issues, and
/// the lifecycle metadata recorded alongside them.
pub struct CertManager {
    dir: PathBuf,
    domain: String,
    current: RwLock<Option<Arc<LoadedServerCert>>>,
}

impl CertManager {
    pub fn new(dir: impl Into<PathBuf>, domain: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            domain: domain.into(),
            current: RwLock::new(None),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.dir.join(CA_CERT_FILE).is_file() && self.dir.join(SERVER_CERT_FILE).is_file()
    }

    pub fn server_cert_path(&self) -> PathBuf {
        self.dir.join(SERVER_CERT_FILE)
    }

    pub fn server_key_path(&self) -> PathBuf {
        self.dir.join(SERVER_KEY_FILE)
    }

    pub fn ca_cert_path(&self) -> PathBuf {
        self.dir.join(CA_CERT_FILE)
    }

    /// Parse a server cert/key pair off disk into the shape `rustls` wants.
    /// Shared between the in-process `reload()` and the reverse proxy's
    /// cert resolver, which re-reads these files whenever their mtime moves
    /// so a renewal issued by a different process (e.g. the CLI) is picked
    /// up without restarting the proxy.
    pub fn load_server_cert(cert_path: &Path, key_path: &Path) -> Result<LoadedServerCert> {
        let cert_pem = std::fs::read(cert_path)?;
        let key_pem = std::fs::read(key_path)?;

        let cert_chain: Vec<_> = rustls_pemfile::certs(&mut cert_pem.as_slice())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| KatanaError::Cert(format!("parsing server cert PEM: {e}")))?;
        let key = rustls_pemfile::private_key(&mut key_pem.as_slice())
            .map_err(|e| KatanaError::Cert(format!("parsing server key PEM: {e}")))?
            .ok_or_else(|| KatanaError::Cert("no private key found in server.key".to_string()))?;

        Ok(LoadedServerCert { cert_chain, key })
    }

    /// Idempotent on the root CA: creates it (plus an initial server cert)
    /// if absent. If the CA already exists, the server cert is still
    /// reissued against it — same as `renew()` — so a repeated `cert init`
    /// keeps the server cert fresh without touching the CA.
    pub async fn init(&self) -> Result<CertState> {
        std::fs::create_dir_all(&self.dir)?;

        if self.is_initialized() {
            info!(domain = %self.domain, "certificates already initialized, reissuing server cert");
            self.reissue_server_cert()?;
        } else {
            let (ca_cert, ca_key) = self.generate_ca()?;
            self.write_pair(CA_CERT_FILE, CA_KEY_FILE, &ca_cert, &ca_key)?;

            let (server_cert, server_key) = self.generate_server_cert(&ca_cert, &ca_key)?;
            self.write_pair(SERVER_CERT_FILE, SERVER_KEY_FILE, &server_cert, &server_key)?;

            let state = CertState {
                initialized: true,
                domain_base: self.domain.clone(),
                created_at: Utc::now(),
            };
            self.write_state(&state)?;
        }

        self.reload().await?;
        self.read_state()
    }

    /// Reissue the server cert only, preserving the root CA, then
    /// hot-reload it into memory.
    pub async fn renew(&self) -> Result<()> {
        if !self.is_initialized() {
            return Err(KatanaError::CertNotInitialized);
        }
        self.reissue_server_cert()?;
        self.reload().await?;
        info!(domain = %self.domain, "server certificate renewed");
        Ok(())
    }

    /// Load the CA already on disk and reissue the server cert against it.
    /// Shared by `init()`'s re-init path and `renew()`.
    fn reissue_server_cert(&self) -> Result<()> {
        let ca_cert_pem = std::fs::read_to_string(self.dir.join(CA_CERT_FILE))?;
        let ca_key_pem = std::fs::read_to_string(self.dir.join(CA_KEY_FILE))?;

        let ca_key = KeyPair::from_pem(&ca_key_pem)
            .map_err(|e| KatanaError::Cert(format!("loading CA key: {e}")))?;
        let ca_params = CertificateParams::from_ca_cert_pem(&ca_cert_pem)
            .map_err(|e| KatanaError::Cert(format!("loading CA cert: {e}")))?;
        let ca_cert = ca_params
            .self_signed(&ca_key)
            .map_err(|e| KatanaError::Cert(format!("re-parsing CA cert: {e}")))?;

        let (server_cert, server_key) = self.generate_server_cert(&ca_cert, &ca_key)?;
        self.write_pair(SERVER_CERT_FILE, SERVER_KEY_FILE, &server_cert, &server_key)?;
        Ok(())
    }

    /// Copy the public root certificate to `dest`, for browser import.
    pub fn export_ca(&self, dest: &Path) -> Result<()> {
        if !self.is_initialized() {
            return Err(KatanaError::CertNotInitialized);
        }
        std::fs::copy(self.dir.join(CA_CERT_FILE), dest)?;
        Ok(())
    }

    pub fn validate_certs(&self) -> Result<()> {
        if !self.is_initialized() {
            return Err(KatanaError::CertNotInitialized);
        }
        let days = self.days_until_expiration()?;
        if days < 0 {
            return Err(KatanaError::CertExpired { days_ago: -days });
        }
        Ok(())
    }

    pub fn days_until_expiration(&self) -> Result<i64> {
        let state = self.read_state()?;
        let expiry = state.created_at + ChronoDuration::days(SERVER_LIFETIME_DAYS);
        Ok((expiry - Utc::now()).num_days())
    }

    /// Currently loaded server cert, for the proxy's SNI resolver.
    pub async fn current(&self) -> Option<Arc<LoadedServerCert>> {
        self.current.read().await.clone()
    }

    async fn reload(&self) -> Result<()> {
        let loaded = Self::load_server_cert(&self.server_cert_path(), &self.server_key_path())?;
        *self.current.write().await = Some(Arc::new(loaded));
        Ok(())
    }

    fn generate_ca(&self) -> Result<(rcgen::Certificate, KeyPair)> {
        let mut params = CertificateParams::new(Vec::new())
            .map_err(|e| KatanaError::Cert(e.to_string()))?;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.not_after = time::OffsetDateTime::now_utc() + time::Duration::days(CA_LIFETIME_DAYS);
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, format!("katana-ca.{}", self.domain));
        params.distinguished_name = dn;

        let key = KeyPair::generate().map_err(|e| KatanaError::Cert(e.to_string()))?;
        let cert = params
            .self_signed(&key)
            .map_err(|e| KatanaError::Cert(e.to_string()))?;
        Ok((cert, key))
    }

    fn generate_server_cert(
        &self,
        ca_cert: &rcgen::Certificate,
        ca_key: &KeyPair,
    ) -> Result<(rcgen::Certificate, KeyPair)> {
        let mut params = CertificateParams::new(vec![self.domain.clone()])
            .map_err(|e| KatanaError::Cert(e.to_string()))?;
        params.not_after =
            time::OffsetDateTime::now_utc() + time::Duration::days(SERVER_LIFETIME_DAYS);
        params.subject_alt_names = vec![
            SanType::DnsName(self.domain.clone().try_into().map_err(|_| {
                KatanaError::Cert("invalid domain for SAN".to_string())
            })?),
            SanType::DnsName(
                format!("*.{}", self.domain)
                    .try_into()
                    .map_err(|_| KatanaError::Cert("invalid wildcard SAN".to_string()))?,
            ),
        ];
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, self.domain.clone());
        params.distinguished_name = dn;

        let key = KeyPair::generate().map_err(|e| KatanaError::Cert(e.to_string()))?;
        let cert = params
            .signed_by(&key, ca_cert, ca_key)
            .map_err(|e| KatanaError::Cert(e.to_string()))?;
        Ok((cert, key))
    }

    fn write_pair(
        &self,
        cert_file: &str,
        key_file: &str,
        cert: &rcgen::Certificate,
        key: &KeyPair,
    ) -> Result<()> {
        std::fs::write(self.dir.join(cert_file), cert.pem())?;
        std::fs::write(self.dir.join(key_file), key.serialize_pem())?;
        Ok(())
    }

    fn write_state(&self, state: &CertState) -> Result<()> {
        let yaml = serde_yaml::to_string(state)?;
        std::fs::write(self.dir.join(CERT_STATE_FILE), yaml)?;
        Ok(())
    }

    fn read_state(&self) -> Result<CertState> {
        let raw = std::fs::read_to_string(self.dir.join(CERT_STATE_FILE))?;
        Ok(serde_yaml::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn init_is_idempotent_and_loads_server_cert() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CertManager::new(dir.path(), "samurai.wtf");
        assert!(!manager.is_initialized());

        manager.init().await.unwrap();
        assert!(manager.is_initialized());
        assert!(manager.current().await.is_some());

        let ca_pem_before = std::fs::read_to_string(dir.path().join(CA_CERT_FILE)).unwrap();
        let server_pem_before = std::fs::read_to_string(dir.path().join(SERVER_CERT_FILE)).unwrap();

        manager.init().await.unwrap();

        let ca_pem_after = std::fs::read_to_string(dir.path().join(CA_CERT_FILE)).unwrap();
        let server_pem_after = std::fs::read_to_string(dir.path().join(SERVER_CERT_FILE)).unwrap();
        assert_eq!(ca_pem_before, ca_pem_after, "CA must not be regenerated on re-init");
        assert_ne!(
            server_pem_before, server_pem_after,
            "re-init must reissue the server cert"
        );
    }

    #[tokio::test]
    async fn renew_preserves_ca_but_reissues_server_cert() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CertManager::new(dir.path(), "samurai.wtf");
        manager.init().await.unwrap();

        let ca_before = std::fs::read_to_string(dir.path().join(CA_CERT_FILE)).unwrap();
        let server_before = std::fs::read_to_string(dir.path().join(SERVER_CERT_FILE)).unwrap();

        manager.renew().await.unwrap();

        let ca_after = std::fs::read_to_string(dir.path().join(CA_CERT_FILE)).unwrap();
        let server_after = std::fs::read_to_string(dir.path().join(SERVER_CERT_FILE)).unwrap();

        assert_eq!(ca_before, ca_after);
        assert_ne!(server_before, server_after);
    }

    #[tokio::test]
    async fn renew_without_init_fails() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CertManager::new(dir.path(), "samurai.wtf");
        let err = manager.renew().await.unwrap_err();
        assert_eq!(err.code(), "CERT_NOT_INITIALIZED");
    }

    #[tokio::test]
    async fn export_ca_copies_public_cert() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CertManager::new(dir.path(), "samurai.wtf");
        manager.init().await.unwrap();

        let dest = dir.path().join("exported-ca.crt");
        manager.export_ca(&dest).unwrap();
        assert!(dest.is_file());
    }
}
