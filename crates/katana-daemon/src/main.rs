use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use katana_core::{ActionExecutor, CertManager, ConfigStore, DnsSynchronizer, ModuleLoader, RouteTable, StateStore};
use katana_daemon::{proxy, state::DaemonState, OperationManager};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "katana-daemon", about = "Katana lab control plane daemon")]
struct Args {
    /// Path to config.yml, overriding the normal discovery chain.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let state = build_state(args.config.as_deref())
        .await
        .context("failed to initialize daemon state")?;

    info!(
        domain = %state.config.domain(),
        bind = %state.config.bind_address(),
        "katana-daemon starting"
    );

    let mut sighup = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())
        .context("failed to install SIGHUP handler")?;
    tokio::spawn(async move {
        loop {
            sighup.recv().await;
            warn!("SIGHUP received; config reload requires a daemon restart in this version");
        }
    });

    proxy::run(state).await
}

async fn build_state(config_path: Option<&std::path::Path>) -> anyhow::Result<Arc<DaemonState>> {
    let config = ConfigStore::load(config_path).context("loading config")?;

    let state_store = StateStore::open(&config.paths.state_file).context("opening state store")?;
    let module_loader = Arc::new(ModuleLoader::new(&config.paths.modules));
    let executor = Arc::new(ActionExecutor::new(state_store.clone(), &config));

    let remote_mode = matches!(config.install_type, katana_models::InstallType::Remote);
    let dns = Arc::new(DnsSynchronizer::new("/etc/hosts", remote_mode));

    let operations = OperationManager::new(
        executor.clone(),
        module_loader.clone(),
        state_store.clone(),
        dns.clone(),
        config.clone(),
    );

    let route_table = RouteTable::spawn(state_store.clone(), &config).await;

    let cert_manager = Arc::new(CertManager::new(&config.paths.certs, config.domain()));
    if cert_manager.is_initialized() {
        cert_manager.init().await.context("loading existing certificates")?;
    } else {
        warn!("certificate authority not initialized; run `katana cert init` before starting the proxy");
    }

    Ok(Arc::new(DaemonState {
        config,
        state_store,
        module_loader,
        executor,
        operations,
        route_table,
        cert_manager,
        dns,
    }))
}
