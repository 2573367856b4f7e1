use std::collections::{HashMap, HashSet};
use std::process::Stdio;

use anyhow::{Context, Result};
use katana_core::{ComposeAdapter, KatanaError, StateStore};
use katana_models::Config;
use tokio::process::Command;

/// Reconciles orphaned containers left behind by an install that failed (or
/// was interrupted) before state was updated: a failed install leaves
/// partial artifacts behind by design (see the timeout/no-rollback note),
/// so this diffs `docker ps` against `state.targets` rather than trusting
/// either source alone.
pub async fn execute(config: &Config, prune: bool, dry_run: bool) -> Result<()> {
    let store = StateStore::open(&config.paths.state_file)?;
    let state = store.get().await?;

    let known_projects: HashSet<String> = state
        .targets
        .iter()
        .map(|t| t.compose_project.clone())
        .collect();

    let containers = list_katana_containers().await?;
    let mut orphans: HashMap<String, Vec<String>> = HashMap::new();
    for (project, container_id) in containers {
        if !known_projects.contains(&project) {
            orphans.entry(project).or_default().push(container_id);
        }
    }

    if orphans.is_empty() {
        println!("no orphaned containers found");
        return Ok(());
    }

    for (project, ids) in &orphans {
        println!("{project}: {} orphaned container(s)", ids.len());
    }

    if dry_run {
        println!("dry run: nothing removed");
        return Ok(());
    }

    if !prune {
        println!("rerun with --prune to remove them");
        return Ok(());
    }

    let all_ids: Vec<String> = orphans.into_values().flatten().collect();
    remove_containers(&all_ids).await?;
    println!("removed {} container(s)", all_ids.len());
    Ok(())
}

/// `(compose project, container id)` pairs for every container docker
/// compose labeled with a `katana-` project prefix.
async fn list_katana_containers() -> Result<Vec<(String, String)>> {
    let output = Command::new("docker")
        .args([
            "ps",
            "-a",
            "--filter",
            "label=com.docker.compose.project",
            "--format",
            "{{.Label \"com.docker.compose.project\"}}\t{{.ID}}",
        ])
        .stderr(Stdio::null())
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                KatanaError::DockerNotRunning
            } else {
                KatanaError::Docker(e.to_string())
            }
        })?;

    if !output.status.success() {
        anyhow::bail!("`docker ps` exited with {}", output.status);
    }

    Ok(parse_ps_output(&String::from_utf8_lossy(&output.stdout)))
}

fn parse_ps_output(stdout: &str) -> Vec<(String, String)> {
    let prefix = ComposeAdapter::project_name("");
    stdout
        .lines()
        .filter_map(|line| {
            let (project, id) = line.split_once('\t')?;
            project
                .starts_with(&prefix)
                .then(|| (project.to_string(), id.to_string()))
        })
        .collect()
}

async fn remove_containers(ids: &[String]) -> Result<()> {
    let status = Command::new("docker")
        .arg("rm")
        .arg("-f")
        .args(ids)
        .stdout(Stdio::null())
        .status()
        .await
        .context("running `docker rm -f`")?;

    if !status.success() {
        anyhow::bail!("`docker rm -f` exited with {status}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ps_output_keeps_only_katana_projects() {
        let stdout = "katana-dvwa\tabc123\nsome-other-project\tdef456\nkatana-juiceshop\tghi789\n";
        let pairs = parse_ps_output(stdout);
        assert_eq!(
            pairs,
            vec![
                ("katana-dvwa".to_string(), "abc123".to_string()),
                ("katana-juiceshop".to_string(), "ghi789".to_string()),
            ]
        );
    }

    #[test]
    fn parse_ps_output_ignores_malformed_lines() {
        assert!(parse_ps_output("no-tab-here\n").is_empty());
        assert!(parse_ps_output("").is_empty());
    }
}
