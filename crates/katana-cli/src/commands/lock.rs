use anyhow::Result;
use katana_models::Config;

use crate::daemon_client;

pub async fn execute(config: &Config, locked: bool) -> Result<()> {
    let client = daemon_client::build(config)?;
    let response = if locked { client.lock().await? } else { client.unlock().await? };

    if response.locked {
        println!("install/remove locked; start/stop remain allowed");
    } else {
        println!("install/remove unlocked");
    }

    Ok(())
}
