use std::process::Stdio;

use anyhow::{Context, Result};
use katana_models::Config;
use tokio::process::Command;

use crate::{daemon_client, ProxyAction};

pub async fn execute(config: &Config, action: ProxyAction) -> Result<()> {
    match action {
        ProxyAction::Start => start().await,
        ProxyAction::Status => status(config).await,
    }
}

/// Run `katana-daemon` in the foreground, inheriting stdio. The daemon owns
/// the HTTP/HTTPS listeners and the operation manager; this command is a
/// convenience wrapper, not a separate implementation of the proxy.
async fn start() -> Result<()> {
    let exe = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|dir| dir.join("katana-daemon")))
        .unwrap_or_else(|| "katana-daemon".into());

    let status = Command::new(exe)
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .context("spawning katana-daemon")?;

    if !status.success() {
        anyhow::bail!("katana-daemon exited with {status}");
    }
    Ok(())
}

async fn status(config: &Config) -> Result<()> {
    let client = daemon_client::build(config)?;
    let status = client.system_status().await?;
    println!(
        "proxy listening on {} (http {}, https {})",
        status.proxy.bind_address, status.proxy.http_port, status.proxy.https_port
    );
    Ok(())
}
