use anyhow::{Context, Result};
use katana_core::{ComposeAdapter, KatanaError, ModuleLoader};
use katana_models::{Config, ModuleDef};

pub async fn execute(config: &Config, name: &str, follow: bool, tail: u32) -> Result<()> {
    let loader = ModuleLoader::new(&config.paths.modules);
    let module = loader
        .find_module(name)
        .context("loading module catalog")?
        .ok_or_else(|| KatanaError::NotFound {
            kind: "module".to_string(),
            name: name.to_string(),
        })?;

    let target = match &module.def {
        ModuleDef::Targets(t) => t,
        ModuleDef::Tools(_) => {
            return Err(KatanaError::NotSupported(
                "logs is only supported for targets, not tools".to_string(),
            )
            .into());
        }
    };

    let compose = ComposeAdapter::new(config);
    let compose_file = module.path.join(&target.compose);

    if follow {
        compose
            .logs_follow(&target.name, &module.path, &compose_file, Some(tail))
            .await?;
    } else {
        let output = compose
            .logs(&target.name, &module.path, &compose_file, Some(tail))
            .await?;
        if output.is_empty() {
            println!("No logs available for '{name}'.");
        } else {
            print!("{output}");
        }
    }

    Ok(())
}
