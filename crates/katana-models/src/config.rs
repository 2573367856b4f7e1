use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level process configuration, loaded once at startup and refreshed on
/// SIGHUP.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub install_type: InstallType,
    #[serde(default)]
    pub base_domain: Option<String>,
    #[serde(default = "default_local_domain")]
    pub local_domain: String,
    #[serde(default = "default_dashboard_hostname")]
    pub dashboard_hostname: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default = "default_docker_network")]
    pub docker_network: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            install_type: InstallType::Local,
            base_domain: None,
            local_domain: default_local_domain(),
            dashboard_hostname: default_dashboard_hostname(),
            paths: PathsConfig::default(),
            proxy: ProxyConfig::default(),
            docker_network: default_docker_network(),
        }
    }
}

fn default_local_domain() -> String {
    "samurai.wtf".to_string()
}

fn default_dashboard_hostname() -> String {
    "katana".to_string()
}

fn default_docker_network() -> String {
    "katana-net".to_string()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InstallType {
    Local,
    Remote,
}

impl Default for InstallType {
    fn default() -> Self {
        InstallType::Local
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    #[serde(default = "default_modules_dir")]
    pub modules: PathBuf,
    #[serde(default = "default_data_dir")]
    pub data: PathBuf,
    #[serde(default = "default_certs_dir")]
    pub certs: PathBuf,
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            modules: default_modules_dir(),
            data: default_data_dir(),
            certs: default_certs_dir(),
            state_file: default_state_file(),
        }
    }
}

fn default_modules_dir() -> PathBuf {
    PathBuf::from("/etc/katana/modules")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/katana")
}

fn default_certs_dir() -> PathBuf {
    default_data_dir().join("certs")
}

fn default_state_file() -> PathBuf {
    default_data_dir().join("state.yml")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_https_port")]
    pub https_port: u16,
    #[serde(default)]
    pub bind_address: Option<String>,
    #[serde(default)]
    pub cors_enabled: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            https_port: default_https_port(),
            bind_address: None,
            cors_enabled: false,
        }
    }
}

fn default_http_port() -> u16 {
    80
}

fn default_https_port() -> u16 {
    443
}

impl Config {
    /// The domain in effect for this install type: `base_domain` for
    /// remote installs, `local_domain` otherwise.
    pub fn domain(&self) -> &str {
        match self.install_type {
            InstallType::Remote => self
                .base_domain
                .as_deref()
                .unwrap_or(self.local_domain.as_str()),
            InstallType::Local => self.local_domain.as_str(),
        }
    }

    /// Expand a logical name into its fully qualified hostname.
    pub fn full_hostname(&self, name: &str) -> String {
        format!("{name}.{}", self.domain())
    }

    pub fn dashboard_hostname(&self) -> String {
        self.full_hostname(&self.dashboard_hostname)
    }

    /// The address the proxy listeners should bind: explicit override, else
    /// `127.0.0.1` for local installs and `0.0.0.0` for remote ones.
    pub fn bind_address(&self) -> String {
        if let Some(addr) = &self.proxy.bind_address {
            return addr.clone();
        }
        match self.install_type {
            InstallType::Local => "127.0.0.1".to_string(),
            InstallType::Remote => "0.0.0.0".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_hostname_uses_local_domain_for_local_install() {
        let cfg = Config::default();
        assert_eq!(cfg.full_hostname("dvwa"), "dvwa.samurai.wtf");
    }

    #[test]
    fn full_hostname_uses_base_domain_for_remote_install() {
        let mut cfg = Config::default();
        cfg.install_type = InstallType::Remote;
        cfg.base_domain = Some("lab.example.com".to_string());
        assert_eq!(cfg.full_hostname("dvwa"), "dvwa.lab.example.com");
    }

    #[test]
    fn bind_address_defaults_by_install_type() {
        let mut cfg = Config::default();
        assert_eq!(cfg.bind_address(), "127.0.0.1");
        cfg.install_type = InstallType::Remote;
        assert_eq!(cfg.bind_address(), "0.0.0.0");
    }

    #[test]
    fn bind_address_honors_explicit_override() {
        let mut cfg = Config::default();
        cfg.proxy.bind_address = Some("10.0.0.5".to_string());
        assert_eq!(cfg.bind_address(), "10.0.0.5");
    }
}
