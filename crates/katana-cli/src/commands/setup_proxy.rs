use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tokio::process::Command;

/// Grant the `katana-daemon` binary `cap_net_bind_service` so it can bind
/// ports 80/443 without running as root. Requires `setcap` (package
/// `libcap2-bin` on Debian/Ubuntu) and enough privilege to run it.
pub async fn execute() -> Result<()> {
    let daemon_path = daemon_binary_path()?;

    let status = Command::new("setcap")
        .arg("cap_net_bind_service=+ep")
        .arg(&daemon_path)
        .status()
        .await
        .context("spawning setcap (is libcap2-bin/setcap installed?)")?;

    if !status.success() {
        bail!(
            "setcap failed on {}; rerun as root or via sudo",
            daemon_path.display()
        );
    }

    println!(
        "granted cap_net_bind_service to {}",
        daemon_path.display()
    );
    Ok(())
}

fn daemon_binary_path() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("locating the running executable")?;
    let dir = exe
        .parent()
        .context("executable has no parent directory")?;
    let candidate = dir.join("katana-daemon");
    if !candidate.is_file() {
        bail!(
            "could not find katana-daemon next to {}; build it first",
            exe.display()
        );
    }
    Ok(candidate)
}
