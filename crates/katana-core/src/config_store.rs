use std::env;
use std::path::{Path, PathBuf};

use katana_models::Config;
use tracing::debug;

use crate::error::{KatanaError, Result};

/// Loads and merges configuration from the precedence chain: explicit path
/// flag > user file > `/etc/katana/config.yml` > in-code defaults.
///
/// Unknown keys are rejected (via `#[serde(deny_unknown_fields)]` on
/// `Config`) with a path-qualified error from `serde_yaml`.
pub struct ConfigStore;

impl ConfigStore {
    /// Resolve and load configuration. `explicit_path` is `-c/--config`.
    pub fn load(explicit_path: Option<&Path>) -> Result<Config> {
        if let Some(path) = explicit_path {
            debug!(?path, "loading config from explicit path");
            return Self::load_file(path);
        }

        if let Some(user_path) = Self::user_config_path() {
            if user_path.exists() {
                debug!(path = %user_path.display(), "loading config from user file");
                return Self::load_file(&user_path);
            }
        }

        let system_path = PathBuf::from("/etc/katana/config.yml");
        if system_path.exists() {
            debug!(path = %system_path.display(), "loading config from system file");
            return Self::load_file(&system_path);
        }

        debug!("no config file found, using in-code defaults");
        Ok(Config::default())
    }

    fn load_file(path: &Path) -> Result<Config> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            KatanaError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        serde_yaml::from_str(&raw).map_err(|e| {
            KatanaError::Config(format!("{}: {e}", path.display()))
        })
    }

    /// `~/.config/katana/config.yml`, honoring `SUDO_USER` so elevation
    /// never changes the effective config location.
    pub fn user_config_path() -> Option<PathBuf> {
        Self::invoking_user_home().map(|home| home.join(".config/katana/config.yml"))
    }

    /// Resolve the invoking user's home directory, preferring the
    /// `SUDO_USER` identity over the elevated (root) one so paths stay
    /// stable whether or not the process is running elevated.
    pub fn invoking_user_home() -> Option<PathBuf> {
        if let Ok(sudo_user) = env::var("SUDO_USER") {
            if !sudo_user.is_empty() {
                if let Some(home) = Self::home_of_user(&sudo_user) {
                    return Some(home);
                }
            }
        }
        dirs::home_dir()
    }

    #[cfg(unix)]
    fn home_of_user(user: &str) -> Option<PathBuf> {
        // Avoid a passwd-parsing dependency: the conventional layout is
        // good enough for the common `/home/<user>` case, falling back to
        // the current process's home dir otherwise.
        let candidate = PathBuf::from("/home").join(user);
        if candidate.is_dir() {
            Some(candidate)
        } else {
            dirs::home_dir()
        }
    }

    #[cfg(not(unix))]
    fn home_of_user(_user: &str) -> Option<PathBuf> {
        dirs::home_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn unknown_key_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bogus_field: 1").unwrap();
        let err = ConfigStore::load_file(file.path()).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn defaults_used_when_no_config_file_present() {
        let cfg = Config::default();
        assert_eq!(cfg.local_domain, "samurai.wtf");
    }

    #[test]
    fn valid_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "local_domain: lab.test").unwrap();
        let cfg = ConfigStore::load_file(file.path()).unwrap();
        assert_eq!(cfg.local_domain, "lab.test");
        assert_eq!(cfg.dashboard_hostname, "katana");
    }
}
