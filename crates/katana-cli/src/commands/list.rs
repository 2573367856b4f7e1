use anyhow::Result;
use katana_models::{Config, ModuleCategory};

use crate::{config::OutputFormat, daemon_client, format};

pub async fn execute(
    config: &Config,
    category: Option<ModuleCategory>,
    installed_only: bool,
    output_format: &OutputFormat,
) -> Result<()> {
    let client = daemon_client::build(config)?;
    let mut modules = client.list_modules(category).await?;

    if installed_only {
        modules.retain(|m| m.installed);
    }

    match output_format {
        OutputFormat::Json => format::print_json(&modules),
        OutputFormat::Table => format::print_module_list(&modules),
    }

    Ok(())
}
