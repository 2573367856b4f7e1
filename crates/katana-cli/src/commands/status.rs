use anyhow::Result;
use katana_models::Config;

use crate::{config::OutputFormat, daemon_client, format};

pub async fn execute(config: &Config, output_format: &OutputFormat) -> Result<()> {
    let client = daemon_client::build(config)?;
    let status = client.system_status().await?;

    match output_format {
        OutputFormat::Json => format::print_json(&status),
        OutputFormat::Table => format::print_system_status(&status),
    }

    Ok(())
}
