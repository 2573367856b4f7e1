use anyhow::{Context, Result};
use katana_core::CertManager;
use katana_models::Config;

/// Build the HTTP client used by every daemon-backed subcommand, trusting
/// the locally issued root CA instead of (or in addition to) the system
/// store so `https://<dashboard_hostname>` validates without `-k`.
pub fn build(config: &Config) -> Result<katana_client::Client> {
    let base_url = format!(
        "https://{}:{}",
        config.dashboard_hostname(),
        config.proxy.https_port
    );

    let ca_path = CertManager::new(&config.paths.certs, config.domain()).ca_cert_path();
    if ca_path.is_file() {
        katana_client::Client::with_ca_file(base_url, &ca_path)
            .context("failed to build daemon client with local root CA")
    } else {
        katana_client::Client::new(base_url, None)
            .context("failed to build daemon client")
    }
}
