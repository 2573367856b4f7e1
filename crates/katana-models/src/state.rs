use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ProxyEntry;

/// Durable, single-source-of-truth process state, persisted as YAML at
/// `paths.state_file`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct State {
    #[serde(default)]
    pub locked: bool,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub targets: Vec<TargetState>,
    #[serde(default)]
    pub tools: Vec<ToolState>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            locked: false,
            last_updated: Utc::now(),
            targets: Vec::new(),
            tools: Vec::new(),
        }
    }
}

impl State {
    pub fn find_target(&self, name: &str) -> Option<&TargetState> {
        self.targets.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn find_tool(&self, name: &str) -> Option<&ToolState> {
        self.tools.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// `true` if `name` is installed as either a target or a tool.
    pub fn is_installed(&self, name: &str) -> bool {
        self.find_target(name).is_some() || self.find_tool(name).is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetState {
    pub name: String,
    pub installed_at: DateTime<Utc>,
    pub compose_project: String,
    pub routes: Vec<ProxyEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolState {
    pub name: String,
    pub installed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Persisted cert lifecycle metadata, `certs/cert-state.yml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CertState {
    pub initialized: bool,
    pub domain_base: String,
    pub created_at: DateTime<Utc>,
}

/// Logical view of a line in the system hosts file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostsEntry {
    pub ip: String,
    pub hostname: String,
    pub managed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_installed_checks_both_collections() {
        let mut state = State::default();
        state.targets.push(TargetState {
            name: "dvwa".into(),
            installed_at: Utc::now(),
            compose_project: "katana-dvwa".into(),
            routes: vec![],
        });
        assert!(state.is_installed("DVWA"));
        assert!(!state.is_installed("nmap"));
    }
}
