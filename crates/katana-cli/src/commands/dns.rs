use anyhow::Result;
use katana_core::{DnsSynchronizer, StateStore};
use katana_models::{Config, InstallType};

use crate::DnsAction;

pub async fn execute(config: &Config, action: DnsAction) -> Result<()> {
    let remote_mode = matches!(config.install_type, InstallType::Remote);
    let dns = DnsSynchronizer::new("/etc/hosts", remote_mode);

    match action {
        DnsAction::Sync { all: _ } => {
            let store = StateStore::open(&config.paths.state_file)?;
            let state = store.get().await?;
            let hostnames: Vec<String> = state
                .targets
                .iter()
                .map(|t| config.full_hostname(&t.name))
                .collect();

            let report = dns.sync(&hostnames, "127.0.0.1")?;
            for hostname in &report.added {
                println!("+ {hostname}");
            }
            for hostname in &report.removed {
                println!("- {hostname}");
            }
            if report.added.is_empty() && report.removed.is_empty() {
                println!("hosts file already up to date ({} entries)", report.unchanged.len());
            }
        }
        DnsAction::List { all } => {
            if all {
                print!("{}", dns.read()?);
            } else {
                for entry in dns.list_managed()? {
                    println!("{} {}", entry.ip, entry.hostname);
                }
            }
        }
    }

    Ok(())
}
