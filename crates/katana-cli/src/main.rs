use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use katana_core::ConfigStore;

mod commands;
mod config;
mod daemon_client;
mod format;

use config::{CliConfig, OutputFormat};

#[derive(Parser)]
#[command(name = "katana", about = "Katana lab control plane CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config.yml, overriding the normal discovery chain.
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Render output as JSON instead of a table where applicable.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum CategoryArg {
    Targets,
    Tools,
}

impl From<CategoryArg> for katana_models::ModuleCategory {
    fn from(value: CategoryArg) -> Self {
        match value {
            CategoryArg::Targets => katana_models::ModuleCategory::Targets,
            CategoryArg::Tools => katana_models::ModuleCategory::Tools,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Control-plane status: docker, certificates, dns, proxy
    Status,
    /// List targets and tools
    List {
        /// Restrict to one category
        category: Option<CategoryArg>,
        /// Only show installed modules
        #[arg(long)]
        installed: bool,
    },
    /// Install a target or tool
    Install {
        name: String,
        /// Leave the hosts file untouched even though the route table updates
        #[arg(long)]
        skip_dns: bool,
    },
    /// Remove a target or tool
    Remove {
        name: String,
        #[arg(long)]
        skip_dns: bool,
    },
    /// Start a target's containers
    Start { name: String },
    /// Stop a target's containers
    Stop { name: String },
    /// View a target's container logs
    Logs {
        name: String,
        /// Stream new log lines as they arrive
        #[arg(short, long)]
        follow: bool,
        /// Number of lines to show from the end
        #[arg(short = 't', long, default_value_t = 200)]
        tail: u32,
    },
    /// Forbid install/remove (start/stop remain allowed)
    Lock,
    /// Allow install/remove again
    Unlock,
    /// Local certificate authority lifecycle
    Cert {
        #[command(subcommand)]
        action: CertAction,
    },
    /// Hosts-file synchronization
    Dns {
        #[command(subcommand)]
        action: DnsAction,
    },
    /// Reverse proxy lifecycle
    Proxy {
        #[command(subcommand)]
        action: ProxyAction,
    },
    /// Grant the daemon binary permission to bind ports 80/443 unprivileged
    SetupProxy,
    /// Diagnose the local environment (docker, certs, dns, config)
    Doctor {
        #[arg(long)]
        json: bool,
    },
    /// Reconcile containers left behind by a failed or interrupted install
    Cleanup {
        /// Remove orphaned containers instead of only reporting them
        #[arg(long)]
        prune: bool,
        /// Report what would be removed without touching anything
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum CertAction {
    /// Create the root CA and server cert if absent (idempotent)
    Init,
    /// Reissue the server cert only, preserving the root CA
    Renew,
    /// Copy the root CA to a path for browser import
    Export {
        #[arg(default_value = "katana-root-ca.crt")]
        path: PathBuf,
    },
    /// Show initialization state and days until expiration
    Status,
}

#[derive(Subcommand)]
enum DnsAction {
    /// Reconcile managed hosts-file entries against installed targets
    Sync {
        /// Recompute from every installed target, not just changed ones
        #[arg(long)]
        all: bool,
    },
    /// List hosts-file entries
    List {
        /// Include non-managed lines too
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand)]
enum ProxyAction {
    /// Run the reverse proxy in the foreground (delegates to katana-daemon)
    Start,
    /// Check whether the proxy is reachable and report its route count
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            if let Some(katana_err) = err.downcast_ref::<katana_core::KatanaError>() {
                if let Some(help) = katana_err.help() {
                    eprintln!("help: {help}");
                }
                return ExitCode::from(katana_err.exit_code().clamp(1, 255) as u8);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = ConfigStore::load(cli.config.as_deref())?;
    let cli_config = CliConfig::load().unwrap_or_default();
    let output_format = if cli.json { OutputFormat::Json } else { cli_config.format };

    match cli.command {
        Commands::Status => commands::status::execute(&config, &output_format).await,
        Commands::List { category, installed } => {
            commands::list::execute(&config, category.map(Into::into), installed, &output_format).await
        }
        Commands::Install { name, skip_dns } => {
            commands::module_ops::install(&config, &name, skip_dns).await
        }
        Commands::Remove { name, skip_dns } => {
            commands::module_ops::remove(&config, &name, skip_dns).await
        }
        Commands::Start { name } => commands::module_ops::start(&config, &name).await,
        Commands::Stop { name } => commands::module_ops::stop(&config, &name).await,
        Commands::Logs { name, follow, tail } => commands::logs::execute(&config, &name, follow, tail).await,
        Commands::Lock => commands::lock::execute(&config, true).await,
        Commands::Unlock => commands::lock::execute(&config, false).await,
        Commands::Cert { action } => commands::cert::execute(&config, action).await,
        Commands::Dns { action } => commands::dns::execute(&config, action).await,
        Commands::Proxy { action } => commands::proxy::execute(&config, action).await,
        Commands::SetupProxy => commands::setup_proxy::execute().await,
        Commands::Doctor { json } => commands::doctor::execute(&config, json || cli.json).await,
        Commands::Cleanup { prune, dry_run } => commands::cleanup::execute(&config, prune, dry_run).await,
    }
}
