use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use katana_models::HostsEntry;
use tracing::{info, warn};

use crate::error::{KatanaError, Result};

const MARKER: &str = "# katana-managed";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub unchanged: Vec<String>,
}

/// Reconciles `katana-managed` lines in the system hosts file. No-op in
/// remote-install mode, where wildcard DNS is expected instead.
pub struct DnsSynchronizer {
    hosts_path: PathBuf,
    remote_mode: bool,
}

impl DnsSynchronizer {
    pub fn new(hosts_path: impl Into<PathBuf>, remote_mode: bool) -> Self {
        Self {
            hosts_path: hosts_path.into(),
            remote_mode,
        }
    }

    pub fn read(&self) -> Result<String> {
        if !self.hosts_path.exists() {
            return Ok(String::new());
        }
        Ok(std::fs::read_to_string(&self.hosts_path)?)
    }

    pub fn list_managed(&self) -> Result<Vec<HostsEntry>> {
        let contents = self.read()?;
        Ok(Self::parse(&contents)
            .into_iter()
            .filter(|(managed, _, _)| *managed)
            .map(|(managed, ip, hostname)| HostsEntry {
                ip,
                hostname,
                managed,
            })
            .collect())
    }

    pub fn add_entry(&self, hostname: &str, ip: &str) -> Result<()> {
        if self.remote_mode {
            return Ok(());
        }
        let contents = self.read()?;
        let mut lines: Vec<String> = Self::split_lines(&contents);

        let already_present = Self::parse(&contents)
            .iter()
            .any(|(managed, _, h)| *managed && h.eq_ignore_ascii_case(hostname));
        if already_present {
            return Ok(());
        }

        lines.push(format!("{ip} {hostname} {MARKER}"));
        self.write_atomic(&lines)
    }

    pub fn remove_entry(&self, hostname: &str) -> Result<()> {
        if self.remote_mode {
            return Ok(());
        }
        let contents = self.read()?;
        let lines: Vec<String> = Self::split_lines(&contents)
            .into_iter()
            .filter(|line| {
                let (managed, _, h) = Self::parse_line(line);
                !(managed && h.eq_ignore_ascii_case(hostname))
            })
            .collect();
        self.write_atomic(&lines)
    }

    /// Reconcile so exactly `expected_hostnames` have managed entries,
    /// preserving every non-managed line verbatim and in order.
    pub fn sync(&self, expected_hostnames: &[String], ip: &str) -> Result<SyncReport> {
        if self.remote_mode {
            info!("remote install: dns sync is a no-op, wildcard DNS is expected");
            return Ok(SyncReport::default());
        }

        let contents = self.read()?;
        let parsed = Self::parse(&contents);
        let expected: HashSet<String> = expected_hostnames
            .iter()
            .map(|h| h.to_lowercase())
            .collect();

        let mut kept_managed: HashSet<String> = HashSet::new();
        let mut lines = Vec::new();
        let mut removed = Vec::new();

        for (managed, line_ip, hostname) in &parsed {
            if !managed {
                lines.push(Self::format_unmanaged(line_ip, hostname));
                continue;
            }
            if expected.contains(&hostname.to_lowercase()) {
                lines.push(format!("{line_ip} {hostname} {MARKER}"));
                kept_managed.insert(hostname.to_lowercase());
            } else {
                removed.push(hostname.clone());
            }
        }

        let mut added = Vec::new();
        for hostname in expected_hostnames {
            if !kept_managed.contains(&hostname.to_lowercase()) {
                lines.push(format!("{ip} {hostname} {MARKER}"));
                added.push(hostname.clone());
            }
        }

        let unchanged: Vec<String> = expected_hostnames
            .iter()
            .filter(|h| kept_managed.contains(&h.to_lowercase()))
            .cloned()
            .collect();

        self.write_atomic(&lines)?;
        Ok(SyncReport {
            added,
            removed,
            unchanged,
        })
    }

    fn format_unmanaged(ip: &str, hostname: &str) -> String {
        if ip.is_empty() {
            hostname.to_string()
        } else {
            format!("{ip} {hostname}")
        }
    }

    fn split_lines(contents: &str) -> Vec<String> {
        contents.lines().map(|l| l.to_string()).collect()
    }

    /// Parse every line into `(managed, ip, hostname_or_raw)`. Non-managed,
    /// non-hosts-shaped lines (comments, blanks) are preserved verbatim via
    /// an empty ip and the raw line as "hostname".
    fn parse(contents: &str) -> Vec<(bool, String, String)> {
        contents.lines().map(Self::parse_line).collect()
    }

    fn parse_line(line: &str) -> (bool, String, String) {
        let managed = line.trim_end().ends_with(MARKER);
        if managed {
            let without_marker = line.trim_end().trim_end_matches(MARKER).trim();
            let mut parts = without_marker.split_whitespace();
            let ip = parts.next().unwrap_or_default().to_string();
            let hostname = parts.next().unwrap_or_default().to_string();
            (true, ip, hostname)
        } else {
            (false, String::new(), line.to_string())
        }
    }

    fn write_atomic(&self, lines: &[String]) -> Result<()> {
        let dir = self.hosts_path.parent().ok_or_else(|| {
            KatanaError::Dns("hosts file path has no parent directory".to_string())
        })?;

        let mut body = lines.join("\n");
        if !body.is_empty() {
            body.push('\n');
        }

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                KatanaError::DnsPermission
            } else {
                KatanaError::Dns(e.to_string())
            }
        })?;
        tmp.write_all(body.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.hosts_path).map_err(|e| {
            if e.error.kind() == std::io::ErrorKind::PermissionDenied {
                warn!("permission denied writing hosts file");
                KatanaError::DnsPermission
            } else {
                KatanaError::Dns(e.to_string())
            }
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_file(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn sync_adds_removes_and_preserves_unmanaged_lines() {
        let dir = tempfile::tempdir().unwrap();
        let hosts_path = dir.path().join("hosts");
        std::fs::write(
            &hosts_path,
            "127.0.0.1 localhost\n127.0.0.1 dvwa.samurai.wtf # katana-managed\n127.0.0.1 stale.samurai.wtf # katana-managed\n",
        )
        .unwrap();

        let sync = DnsSynchronizer::new(&hosts_path, false);
        let report = sync
            .sync(
                &["dvwa.samurai.wtf".to_string(), "juiceshop.samurai.wtf".to_string()],
                "127.0.0.1",
            )
            .unwrap();

        assert_eq!(report.added, vec!["juiceshop.samurai.wtf".to_string()]);
        assert_eq!(report.removed, vec!["stale.samurai.wtf".to_string()]);
        assert_eq!(report.unchanged, vec!["dvwa.samurai.wtf".to_string()]);

        let contents = read_file(&hosts_path);
        assert!(contents.contains("127.0.0.1 localhost"));
        assert!(contents.contains("dvwa.samurai.wtf # katana-managed"));
        assert!(contents.contains("juiceshop.samurai.wtf # katana-managed"));
        assert!(!contents.contains("stale.samurai.wtf"));
        assert!(contents.ends_with('\n') && !contents.ends_with("\n\n"));
    }

    #[test]
    fn remote_mode_sync_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let hosts_path = dir.path().join("hosts");
        std::fs::write(&hosts_path, "127.0.0.1 localhost\n").unwrap();

        let sync = DnsSynchronizer::new(&hosts_path, true);
        let report = sync.sync(&["dvwa.samurai.wtf".to_string()], "127.0.0.1").unwrap();
        assert_eq!(report, SyncReport::default());
        assert_eq!(read_file(&hosts_path), "127.0.0.1 localhost\n");
    }

    #[test]
    fn add_entry_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let hosts_path = dir.path().join("hosts");
        std::fs::write(&hosts_path, "").unwrap();

        let sync = DnsSynchronizer::new(&hosts_path, false);
        sync.add_entry("dvwa.samurai.wtf", "127.0.0.1").unwrap();
        sync.add_entry("dvwa.samurai.wtf", "127.0.0.1").unwrap();

        let contents = read_file(&hosts_path);
        assert_eq!(contents.matches("dvwa.samurai.wtf").count(), 1);
    }
}
