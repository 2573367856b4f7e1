use std::process::Stdio;

use anyhow::Result;
use katana_core::{CertManager, DnsSynchronizer, StateStore};
use katana_models::{Config, InstallType};
use serde::Serialize;
use tokio::process::Command;

#[derive(Serialize)]
struct DoctorReport {
    docker_reachable: bool,
    cert_initialized: bool,
    cert_days_until_expiration: Option<i64>,
    dns_remote_mode: bool,
    dns_managed_entries: usize,
    state_readable: bool,
    locked: bool,
}

/// Diagnoses the local environment directly rather than through the
/// daemon's `/api/system`, so it still works when the daemon is down —
/// that's the whole point of a doctor command.
pub async fn execute(config: &Config, json: bool) -> Result<()> {
    let docker_reachable = docker_reachable().await;

    let cert_manager = CertManager::new(&config.paths.certs, config.domain());
    let cert_initialized = cert_manager.is_initialized();
    let cert_days_until_expiration = if cert_initialized {
        cert_manager.days_until_expiration().ok()
    } else {
        None
    };

    let remote_mode = matches!(config.install_type, InstallType::Remote);
    let dns = DnsSynchronizer::new("/etc/hosts", remote_mode);
    let dns_managed_entries = dns.list_managed().map(|entries| entries.len()).unwrap_or(0);

    let (state_readable, locked) = match StateStore::open(&config.paths.state_file) {
        Ok(store) => match store.get().await {
            Ok(state) => (true, state.locked),
            Err(_) => (false, false),
        },
        Err(_) => (false, false),
    };

    let report = DoctorReport {
        docker_reachable,
        cert_initialized,
        cert_days_until_expiration,
        dns_remote_mode: remote_mode,
        dns_managed_entries,
        state_readable,
        locked,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("docker:      {}", status_line(report.docker_reachable));
    println!(
        "certificate: {}",
        match (report.cert_initialized, report.cert_days_until_expiration) {
            (false, _) => "not initialized (run `katana cert init`)".to_string(),
            (true, Some(days)) if days < 0 => format!("expired {} day(s) ago", -days),
            (true, Some(days)) => format!("valid ({days} day(s) remaining)"),
            (true, None) => "initialized".to_string(),
        }
    );
    println!(
        "dns:         {}",
        if report.dns_remote_mode {
            "remote mode, hosts file not managed".to_string()
        } else {
            format!("{} managed entries", report.dns_managed_entries)
        }
    );
    println!(
        "state:       {}",
        if report.state_readable {
            if report.locked { "readable, locked" } else { "readable" }
        } else {
            "unreadable or missing"
        }
    );

    Ok(())
}

fn status_line(ok: bool) -> &'static str {
    if ok { "reachable" } else { "unreachable" }
}

async fn docker_reachable() -> bool {
    Command::new("docker")
        .arg("info")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}
