use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Local CLI preferences, separate from the daemon's `Config`: where to
/// reach it and how to render output. Round-trips to `~/.katana/cli.toml`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CliConfig {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_format")]
    pub format: OutputFormat,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Table,
    Json,
}

fn default_timeout() -> u64 {
    30
}

fn default_format() -> OutputFormat {
    OutputFormat::Table
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            format: default_format(),
        }
    }
}

impl CliConfig {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let contents = fs::read_to_string(&config_path)
                .context(format!("failed to read config file: {}", config_path.display()))?;
            toml::from_str(&contents)
                .context(format!("failed to parse config file: {}", config_path.display()))
        } else {
            let config = Self::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .context(format!("failed to create config directory: {}", parent.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(&config_path, contents)
            .context(format!("failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("failed to determine home directory")?;
        Ok(home.join(".katana").join("cli.toml"))
    }
}
