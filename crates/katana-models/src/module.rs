use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ModuleCategory {
    Targets,
    Tools,
}

impl ModuleCategory {
    pub fn as_dir(&self) -> &'static str {
        match self {
            ModuleCategory::Targets => "targets",
            ModuleCategory::Tools => "tools",
        }
    }
}

impl std::fmt::Display for ModuleCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_dir())
    }
}

/// One `proxy:` entry of a target module definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProxyEntry {
    pub hostname: String,
    pub service: String,
    pub port: u16,
}

/// On-disk shape of `modules/targets/<name>/module.yml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TargetModuleDef {
    pub name: String,
    pub description: String,
    pub compose: PathBuf,
    pub proxy: Vec<ProxyEntry>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// On-disk shape of `modules/tools/<name>/module.yml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ToolModuleDef {
    pub name: String,
    pub description: String,
    pub install: PathBuf,
    pub remove: PathBuf,
    #[serde(default)]
    pub start: Option<PathBuf>,
    #[serde(default)]
    pub stop: Option<PathBuf>,
    #[serde(default)]
    pub install_requires_root: bool,
}

/// Tagged union matching the on-disk `category` field of a `module.yml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "category", rename_all = "lowercase")]
pub enum ModuleDef {
    Targets(TargetModuleDef),
    Tools(ToolModuleDef),
}

impl ModuleDef {
    pub fn name(&self) -> &str {
        match self {
            ModuleDef::Targets(t) => &t.name,
            ModuleDef::Tools(t) => &t.name,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            ModuleDef::Targets(t) => &t.description,
            ModuleDef::Tools(t) => &t.description,
        }
    }

    pub fn category(&self) -> ModuleCategory {
        match self {
            ModuleDef::Targets(_) => ModuleCategory::Targets,
            ModuleDef::Tools(_) => ModuleCategory::Tools,
        }
    }
}

/// A loaded module, immutable once read from disk: the parsed definition
/// plus the directory it was discovered in.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Module {
    pub path: PathBuf,
    pub def: ModuleDef,
}

impl Module {
    pub fn name(&self) -> &str {
        self.def.name()
    }

    pub fn category(&self) -> ModuleCategory {
        self.def.category()
    }
}

/// API view of a module augmented with live installed/running status, for
/// `GET /api/modules`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleStatusResponse {
    pub name: String,
    pub category: ModuleCategory,
    pub description: String,
    pub installed: bool,
    pub status: String,
}
