use anyhow::{bail, Result};
use futures::StreamExt;
use katana_models::{Config, LogLevel, OperationEvent, TaskStatus};

use crate::daemon_client;

pub async fn install(config: &Config, name: &str, skip_dns: bool) -> Result<()> {
    let client = daemon_client::build(config)?;
    let accepted = client.install(name, skip_dns).await?;
    println!("Installing '{name}' (operation {})...", accepted.operation_id);
    follow(&client, &accepted.operation_id).await
}

pub async fn remove(config: &Config, name: &str, skip_dns: bool) -> Result<()> {
    let client = daemon_client::build(config)?;
    let accepted = client.remove(name, skip_dns).await?;
    println!("Removing '{name}' (operation {})...", accepted.operation_id);
    follow(&client, &accepted.operation_id).await
}

pub async fn start(config: &Config, name: &str) -> Result<()> {
    let client = daemon_client::build(config)?;
    let accepted = client.start(name).await?;
    println!("Starting '{name}' (operation {})...", accepted.operation_id);
    follow(&client, &accepted.operation_id).await
}

pub async fn stop(config: &Config, name: &str) -> Result<()> {
    let client = daemon_client::build(config)?;
    let accepted = client.stop(name).await?;
    println!("Stopping '{name}' (operation {})...", accepted.operation_id);
    follow(&client, &accepted.operation_id).await
}

/// Stream an operation's SSE events to the terminal until its terminal
/// `complete` event arrives, then exit with an error if it failed.
async fn follow(client: &katana_client::Client, operation_id: &str) -> Result<()> {
    let mut stream = Box::pin(client.stream_operation(operation_id).await?);

    while let Some(event) = stream.next().await {
        match event? {
            OperationEvent::Progress { percent, message } => {
                println!("[{percent:>3}%] {message}");
            }
            OperationEvent::Task { name, status } => match status {
                TaskStatus::Running => println!("-> {name}"),
                TaskStatus::Completed => println!("   {name} done"),
                TaskStatus::Failed => println!("   {name} failed"),
                TaskStatus::Pending => {}
            },
            OperationEvent::Log { level, line } => match level {
                LogLevel::Info => println!("{line}"),
                LogLevel::Error => eprintln!("{line}"),
            },
            OperationEvent::Complete {
                success,
                error,
                duration_ms,
            } => {
                if success {
                    println!("done in {duration_ms}ms");
                } else {
                    bail!(error.unwrap_or_else(|| "operation failed".to_string()));
                }
                return Ok(());
            }
        }
    }

    Ok(())
}
