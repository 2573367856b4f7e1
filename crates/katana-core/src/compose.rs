use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{KatanaError, Result};
use katana_models::Config;

/// Status of a single container, as reported by `docker compose ps`.
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerStatus {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "Image")]
    pub image: String,
    #[serde(rename = "RunningFor", default)]
    pub uptime: String,
}

#[derive(Debug, Clone)]
pub struct ModuleStatus {
    pub containers: Vec<ContainerStatus>,
    pub all_running: bool,
    pub any_running: bool,
}

/// Uniform interface over `docker compose`, invoked as a subprocess rather
/// than through the Docker daemon's API.
pub struct ComposeAdapter {
    docker_network: String,
}

impl ComposeAdapter {
    pub fn new(config: &Config) -> Self {
        Self {
            docker_network: config.docker_network.clone(),
        }
    }

    pub fn project_name(module_name: &str) -> String {
        format!("katana-{}", module_name.to_lowercase())
    }

    /// Bring a target's stack up, rewriting any `_HOST`-suffixed env entry
    /// through `full_hostname`. Creates `docker_network` on first use.
    pub async fn up(
        &self,
        module_name: &str,
        module_path: &Path,
        compose_file: &Path,
        env: &HashMap<String, String>,
        config: &Config,
    ) -> Result<()> {
        self.ensure_network().await?;
        let rewritten = Self::rewrite_host_env(env, config);
        self.run_compose(
            module_name,
            module_path,
            compose_file,
            &["up", "-d"],
            &rewritten,
        )
        .await
        .map(|_| ())
    }

    pub async fn down(&self, module_name: &str, module_path: &Path, compose_file: &Path) -> Result<()> {
        self.run_compose(module_name, module_path, compose_file, &["down"], &HashMap::new())
            .await
            .map(|_| ())
    }

    pub async fn start(&self, module_name: &str, module_path: &Path, compose_file: &Path) -> Result<()> {
        self.run_compose(module_name, module_path, compose_file, &["start"], &HashMap::new())
            .await
            .map(|_| ())
    }

    pub async fn stop(&self, module_name: &str, module_path: &Path, compose_file: &Path) -> Result<()> {
        self.run_compose(module_name, module_path, compose_file, &["stop"], &HashMap::new())
            .await
            .map(|_| ())
    }

    pub async fn status(
        &self,
        module_name: &str,
        module_path: &Path,
        compose_file: &Path,
    ) -> Result<ModuleStatus> {
        let output = self
            .run_compose(
                module_name,
                module_path,
                compose_file,
                &["ps", "--format", "json"],
                &HashMap::new(),
            )
            .await?;

        let containers: Vec<ContainerStatus> = output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str)
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| KatanaError::Docker(format!("parsing `compose ps` output: {e}")))?;

        let all_running = !containers.is_empty()
            && containers.iter().all(|c| c.state.eq_ignore_ascii_case("running"));
        let any_running = containers.iter().any(|c| c.state.eq_ignore_ascii_case("running"));

        Ok(ModuleStatus {
            containers,
            all_running,
            any_running,
        })
    }

    /// Fetch compose logs for a module. `follow` streams via `-f`; this
    /// returns the combined output once the process exits (non-following)
    /// or is killed by the caller (following, not used here — the Tool
    /// Script Runner's streaming pattern is used instead where live
    /// tailing is required).
    pub async fn logs(
        &self,
        module_name: &str,
        module_path: &Path,
        compose_file: &Path,
        tail: Option<u32>,
    ) -> Result<String> {
        let tail_arg = tail.map(|n| n.to_string()).unwrap_or_else(|| "all".to_string());
        self.run_compose(
            module_name,
            module_path,
            compose_file,
            &["logs", "--no-color", "--tail", &tail_arg],
            &HashMap::new(),
        )
        .await
    }

    /// Stream compose logs for a module until the caller's future is
    /// dropped (e.g. the CLI process receives Ctrl+C). Unlike `logs`, this
    /// inherits the caller's stdio rather than buffering, since a follow
    /// session has no natural end to wait for.
    pub async fn logs_follow(
        &self,
        module_name: &str,
        module_path: &Path,
        compose_file: &Path,
        tail: Option<u32>,
    ) -> Result<()> {
        let project = Self::project_name(module_name);
        let tail_arg = tail.map(|n| n.to_string()).unwrap_or_else(|| "all".to_string());

        let mut cmd = Command::new("docker");
        cmd.current_dir(module_path)
            .arg("compose")
            .args(["-p", &project])
            .args(["-f", &compose_file.to_string_lossy()])
            .args(["logs", "--no-color", "--tail", &tail_arg, "-f"])
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let status = cmd.status().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                KatanaError::DockerNotRunning
            } else {
                KatanaError::Docker(e.to_string())
            }
        })?;

        if !status.success() && status.code() != Some(130) {
            return Err(KatanaError::Docker(format!(
                "`docker compose logs -f` exited with {status}"
            )));
        }
        Ok(())
    }

    async fn ensure_network(&self) -> Result<()> {
        let inspect = Command::new("docker")
            .args(["network", "inspect", &self.docker_network])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;
        if inspect.success() {
            return Ok(());
        }

        debug!(network = %self.docker_network, "creating docker network");
        let create = Command::new("docker")
            .args(["network", "create", &self.docker_network])
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;
        if !create.status.success() {
            return Err(KatanaError::Docker(format!(
                "failed to create network '{}': {}",
                self.docker_network,
                String::from_utf8_lossy(&create.stderr)
            )));
        }
        Ok(())
    }

    fn rewrite_host_env(env: &HashMap<String, String>, config: &Config) -> HashMap<String, String> {
        env.iter()
            .map(|(k, v)| {
                if k.ends_with("_HOST") {
                    (k.clone(), config.full_hostname(v))
                } else {
                    (k.clone(), v.clone())
                }
            })
            .collect()
    }

    async fn run_compose(
        &self,
        module_name: &str,
        module_path: &Path,
        compose_file: &Path,
        args: &[&str],
        env: &HashMap<String, String>,
    ) -> Result<String> {
        let project = Self::project_name(module_name);
        info!(module = module_name, project = %project, args = ?args, "running docker compose");

        let mut cmd = Command::new("docker");
        cmd.current_dir(module_path)
            .arg("compose")
            .args(["-p", &project])
            .args(["-f", &compose_file.to_string_lossy()])
            .args(args)
            .envs(env)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // lets the Operation Manager's per-op timeout actually terminate
            // a hung `docker compose` invocation when its future is dropped
            .kill_on_drop(true);

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                KatanaError::DockerNotRunning
            } else {
                KatanaError::Docker(e.to_string())
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            if stderr.to_lowercase().contains("permission denied") {
                return Err(KatanaError::DockerPermission);
            }
            return Err(KatanaError::Docker(format!(
                "`docker compose {}` exited with {}: {}",
                args.join(" "),
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_name_is_namespaced_and_lowercased() {
        assert_eq!(ComposeAdapter::project_name("DVWA"), "katana-dvwa");
    }

    #[test]
    fn rewrite_host_env_expands_only_host_suffixed_keys() {
        let config = Config::default();
        let mut env = HashMap::new();
        env.insert("TARGET_HOST".to_string(), "dvwa".to_string());
        env.insert("MYSQL_PASSWORD".to_string(), "secret".to_string());

        let rewritten = ComposeAdapter::rewrite_host_env(&env, &config);
        assert_eq!(rewritten["TARGET_HOST"], "dvwa.samurai.wtf");
        assert_eq!(rewritten["MYSQL_PASSWORD"], "secret");
    }
}
