use std::path::{Path, PathBuf};

use katana_models::{Module, ModuleCategory, ModuleDef};
use tracing::{debug, warn};

use crate::error::Result;

/// A parse failure for a single `module.yml`, collected rather than
/// propagated so one bad module doesn't take down the whole catalog.
#[derive(Debug, Clone)]
pub struct ModuleWarning {
    pub path: PathBuf,
    pub message: String,
}

impl std::fmt::Display for ModuleWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

/// Discovers, parses, and validates module definitions under
/// `paths.modules/{targets,tools}/*/module.yml`. Read-only: never touches
/// disk beyond scanning and reading files.
pub struct ModuleLoader {
    modules_dir: PathBuf,
}

impl ModuleLoader {
    pub fn new(modules_dir: impl Into<PathBuf>) -> Self {
        Self {
            modules_dir: modules_dir.into(),
        }
    }

    /// Load every module under both category subdirectories. Malformed
    /// modules are excluded from the returned catalog and reported as
    /// warnings instead of failing the whole scan.
    pub fn load_all(&self) -> Result<(Vec<Module>, Vec<ModuleWarning>)> {
        let mut modules = Vec::new();
        let mut warnings = Vec::new();

        for category in [ModuleCategory::Targets, ModuleCategory::Tools] {
            let (found, warned) = self.scan_category(category)?;
            modules.extend(found);
            warnings.extend(warned);
        }

        Ok((modules, warnings))
    }

    pub fn load_by_category(&self, category: ModuleCategory) -> Result<(Vec<Module>, Vec<ModuleWarning>)> {
        self.scan_category(category)
    }

    /// Case-insensitive lookup by module name across both categories.
    pub fn find_module(&self, name: &str) -> Result<Option<Module>> {
        let (modules, _warnings) = self.load_all()?;
        Ok(modules
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(name)))
    }

    fn scan_category(&self, category: ModuleCategory) -> Result<(Vec<Module>, Vec<ModuleWarning>)> {
        let dir = self.modules_dir.join(category.as_dir());
        let mut modules = Vec::new();
        let mut warnings = Vec::new();

        if !dir.is_dir() {
            debug!(dir = %dir.display(), "module category directory does not exist, skipping");
            return Ok((modules, warnings));
        }

        let entries = std::fs::read_dir(&dir)?;
        for entry in entries {
            let entry = entry?;
            let module_dir = entry.path();
            if !module_dir.is_dir() {
                continue;
            }

            let manifest = module_dir.join("module.yml");
            if !manifest.is_file() {
                continue;
            }

            match Self::load_one(&manifest, category) {
                Ok(def) => modules.push(Module {
                    path: module_dir,
                    def,
                }),
                Err(message) => {
                    warn!(path = %manifest.display(), %message, "skipping malformed module");
                    warnings.push(ModuleWarning {
                        path: manifest,
                        message,
                    });
                }
            }
        }

        modules.sort_by(|a, b| a.name().to_lowercase().cmp(&b.name().to_lowercase()));
        Ok((modules, warnings))
    }

    fn load_one(manifest: &Path, expected: ModuleCategory) -> std::result::Result<ModuleDef, String> {
        let raw = std::fs::read_to_string(manifest).map_err(|e| e.to_string())?;
        let def: ModuleDef = serde_yaml::from_str(&raw).map_err(|e| e.to_string())?;
        if def.category() != expected {
            return Err(format!(
                "declared category '{}' does not match directory '{}'",
                def.category(),
                expected
            ));
        }
        Ok(def)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_target(dir: &Path, name: &str) {
        let module_dir = dir.join("targets").join(name);
        fs::create_dir_all(&module_dir).unwrap();
        fs::write(
            module_dir.join("module.yml"),
            format!(
                "category: targets\nname: {name}\ndescription: a target\ncompose: docker-compose.yml\nproxy:\n  - hostname: {name}.samurai.wtf\n    service: web\n    port: 80\n"
            ),
        )
        .unwrap();
    }

    #[test]
    fn loads_valid_targets() {
        let dir = tempfile::tempdir().unwrap();
        write_target(dir.path(), "dvwa");
        let loader = ModuleLoader::new(dir.path());
        let (modules, warnings) = loader.load_by_category(ModuleCategory::Targets).unwrap();
        assert_eq!(modules.len(), 1);
        assert!(warnings.is_empty());
        assert_eq!(modules[0].name(), "dvwa");
    }

    #[test]
    fn malformed_module_becomes_a_warning_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let module_dir = dir.path().join("targets").join("broken");
        fs::create_dir_all(&module_dir).unwrap();
        fs::write(module_dir.join("module.yml"), "category: targets\nname: broken\n").unwrap();

        let loader = ModuleLoader::new(dir.path());
        let (modules, warnings) = loader.load_all().unwrap();
        assert!(modules.is_empty());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn find_module_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        write_target(dir.path(), "dvwa");
        let loader = ModuleLoader::new(dir.path());
        assert!(loader.find_module("DVWA").unwrap().is_some());
        assert!(loader.find_module("nope").unwrap().is_none());
    }

    #[test]
    fn missing_modules_directory_yields_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ModuleLoader::new(dir.path().join("does-not-exist"));
        let (modules, warnings) = loader.load_all().unwrap();
        assert!(modules.is_empty());
        assert!(warnings.is_empty());
    }
}
