use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::info;

use crate::error::{KatanaError, Result};
use crate::event_sink::EventSink;

const VERSION_PREFIX: &str = "TOOL_VERSION=";

/// Runs a tool module's `install`/`remove` shell script, streaming its
/// output to the operation's event sink as it arrives.
pub struct ToolRunner;

impl ToolRunner {
    /// Run `script` (relative to `module_path`), optionally elevated.
    /// Returns the `TOOL_VERSION=` value if the script printed one.
    pub async fn run(
        module_path: &Path,
        script: &Path,
        requires_root: bool,
        sink: &dyn EventSink,
    ) -> Result<Option<String>> {
        let program = if requires_root { "sudo" } else { "sh" };
        let mut cmd = Command::new(program);
        if requires_root {
            cmd.arg("sh");
        }
        cmd.arg(script)
            .current_dir(module_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(script = %script.display(), requires_root, "running tool script");
        let mut child = cmd.spawn()?;

        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");

        let mut version = None;
        let mut stderr_tail: Vec<String> = Vec::new();

        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = BufReader::new(stderr).lines();

        loop {
            tokio::select! {
                line = out_lines.next_line() => {
                    match line? {
                        Some(line) => {
                            if let Some(value) = line.strip_prefix(VERSION_PREFIX) {
                                version = Some(value.trim().to_string());
                            }
                            sink.info(line);
                        }
                        None => break,
                    }
                }
                line = err_lines.next_line() => {
                    if let Some(line) = line? {
                        stderr_tail.push(line.clone());
                        if stderr_tail.len() > 20 {
                            stderr_tail.remove(0);
                        }
                        sink.error(line);
                    }
                }
            }
        }

        // Drain any remaining stderr once stdout has closed.
        while let Some(line) = err_lines.next_line().await? {
            stderr_tail.push(line.clone());
            if stderr_tail.len() > 20 {
                stderr_tail.remove(0);
            }
            sink.error(line);
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(KatanaError::Module {
                module: None,
                message: format!(
                    "script {} exited with {}: {}",
                    script.display(),
                    status,
                    stderr_tail.join("\n")
                ),
            });
        }

        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sink::NullSink;

    #[tokio::test]
    async fn captures_tool_version_line() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("install.sh");
        std::fs::write(&script, "#!/bin/sh\necho hello\necho TOOL_VERSION=1.2.3\n").unwrap();

        let version = ToolRunner::run(dir.path(), Path::new("install.sh"), false, &NullSink)
            .await
            .unwrap();
        assert_eq!(version, Some("1.2.3".to_string()));
    }

    #[tokio::test]
    async fn nonzero_exit_is_a_module_error() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("install.sh");
        std::fs::write(&script, "#!/bin/sh\necho boom 1>&2\nexit 7\n").unwrap();

        let err = ToolRunner::run(dir.path(), Path::new("install.sh"), false, &NullSink)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "MODULE_ERROR");
    }
}
