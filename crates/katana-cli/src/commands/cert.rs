use std::path::PathBuf;

use anyhow::Result;
use katana_core::CertManager;
use katana_models::Config;

use crate::CertAction;

pub async fn execute(config: &Config, action: CertAction) -> Result<()> {
    let manager = CertManager::new(&config.paths.certs, config.domain());

    match action {
        CertAction::Init => {
            let state = manager.init().await?;
            println!(
                "certificate authority ready for {} (created {})",
                state.domain_base, state.created_at
            );
        }
        CertAction::Renew => {
            manager.renew().await?;
            println!("server certificate renewed for {}", config.domain());
        }
        CertAction::Export { path } => {
            export(&manager, &path)?;
        }
        CertAction::Status => {
            if !manager.is_initialized() {
                println!("not initialized — run `katana cert init`");
                return Ok(());
            }
            let days = manager.days_until_expiration()?;
            if days < 0 {
                println!("server certificate expired {} day(s) ago", -days);
            } else {
                println!("server certificate valid for {days} more day(s)");
            }
        }
    }

    Ok(())
}

fn export(manager: &CertManager, path: &PathBuf) -> Result<()> {
    manager.export_ca(path)?;
    println!("root CA exported to {}", path.display());
    Ok(())
}
