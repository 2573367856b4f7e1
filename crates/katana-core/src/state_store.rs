use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use katana_models::{ProxyEntry, State, TargetState, ToolState};
use tokio::sync::{watch, Mutex};
use tracing::{error, info};

use crate::error::{KatanaError, Result};

/// Durable, single-writer State Store: YAML at `paths.state_file`, all
/// writes serialized through an in-process lock and made atomic at the
/// filesystem level (write temp file in the same directory, fsync, rename).
///
/// Every successful mutation fires a `watch` notification so the Route
/// Table can recompute without polling.
pub struct StateStore {
    path: PathBuf,
    lock: Mutex<()>,
    changed_tx: watch::Sender<()>,
}

impl StateStore {
    /// Load the current state file, or create a fresh one if absent. A
    /// present-but-corrupt file fails loudly rather than being silently
    /// reset.
    pub fn open(path: impl Into<PathBuf>) -> Result<Arc<Self>> {
        let path = path.into();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let fresh = State::default();
            Self::write_atomic(&path, &fresh)?;
            info!(path = %path.display(), "initialized fresh state file");
        } else {
            // Validate eagerly so a corrupt file is reported at startup,
            // not on the first mutation.
            Self::read_from_disk(&path)?;
        }

        let (changed_tx, _rx) = watch::channel(());
        Ok(Arc::new(Self {
            path,
            lock: Mutex::new(()),
            changed_tx,
        }))
    }

    /// Subscribe to state-changed notifications (used by the Route Table).
    pub fn subscribe(&self) -> watch::Receiver<()> {
        self.changed_tx.subscribe()
    }

    fn read_from_disk(path: &Path) -> Result<State> {
        let raw = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&raw).map_err(|e| {
            error!(path = %path.display(), error = %e, "state file is corrupt");
            KatanaError::State(format!("corrupt state file at {}: {e}", path.display()))
        })
    }

    fn write_atomic(path: &Path, state: &State) -> Result<()> {
        let dir = path.parent().ok_or_else(|| {
            KatanaError::State("state path has no parent directory".to_string())
        })?;
        let yaml = serde_yaml::to_string(state)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        use std::io::Write;
        tmp.write_all(yaml.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path)
            .map_err(|e| KatanaError::State(format!("atomic rename failed: {e}")))?;
        Ok(())
    }

    /// Return a defensive copy of the current state.
    pub async fn get(&self) -> Result<State> {
        let _guard = self.lock.lock().await;
        Self::read_from_disk(&self.path)
    }

    /// Read-modify-write under the lock. `f` mutates the in-memory copy;
    /// the result is validated before being persisted.
    pub async fn update<F>(&self, f: F) -> Result<State>
    where
        F: FnOnce(&mut State) -> Result<()>,
    {
        let _guard = self.lock.lock().await;
        let mut state = Self::read_from_disk(&self.path)?;
        f(&mut state)?;
        state.last_updated = Utc::now();
        Self::validate(&state)?;
        Self::write_atomic(&self.path, &state)?;
        let _ = self.changed_tx.send(());
        Ok(state)
    }

    /// Invariant 1: `name` unique across `targets ∪ tools`.
    fn validate(state: &State) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for name in state
            .targets
            .iter()
            .map(|t| t.name.to_lowercase())
            .chain(state.tools.iter().map(|t| t.name.to_lowercase()))
        {
            if !seen.insert(name.clone()) {
                return Err(KatanaError::State(format!(
                    "module name '{name}' installed as both a target and a tool"
                )));
            }
        }
        Ok(())
    }

    pub async fn set_locked(&self, locked: bool) -> Result<State> {
        self.update(|s| {
            s.locked = locked;
            Ok(())
        })
        .await
    }

    pub async fn add_target(
        &self,
        name: &str,
        compose_project: String,
        routes: Vec<ProxyEntry>,
    ) -> Result<State> {
        let name = name.to_string();
        self.update(move |s| {
            s.targets.push(TargetState {
                name,
                installed_at: Utc::now(),
                compose_project,
                routes,
            });
            Ok(())
        })
        .await
    }

    pub async fn remove_target(&self, name: &str) -> Result<State> {
        let name = name.to_string();
        self.update(move |s| {
            s.targets.retain(|t| !t.name.eq_ignore_ascii_case(&name));
            Ok(())
        })
        .await
    }

    pub async fn add_tool(&self, name: &str, version: Option<String>) -> Result<State> {
        let name = name.to_string();
        self.update(move |s| {
            s.tools.push(ToolState {
                name,
                installed_at: Utc::now(),
                version,
            });
            Ok(())
        })
        .await
    }

    pub async fn remove_tool(&self, name: &str) -> Result<State> {
        let name = name.to_string();
        self.update(move |s| {
            s.tools.retain(|t| !t.name.eq_ignore_ascii_case(&name));
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> (tempfile::TempDir, Arc<StateStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path().join("state.yml")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn fresh_store_starts_unlocked_and_empty() {
        let (_dir, store) = temp_store().await;
        let state = store.get().await.unwrap();
        assert!(!state.locked);
        assert!(state.targets.is_empty());
        assert!(state.tools.is_empty());
    }

    #[tokio::test]
    async fn add_and_remove_target_round_trips() {
        let (_dir, store) = temp_store().await;
        store
            .add_target(
                "dvwa",
                "katana-dvwa".to_string(),
                vec![ProxyEntry {
                    hostname: "dvwa.samurai.wtf".into(),
                    service: "web".into(),
                    port: 80,
                }],
            )
            .await
            .unwrap();

        let state = store.get().await.unwrap();
        assert!(state.is_installed("dvwa"));
        assert_eq!(state.targets[0].routes[0].hostname, "dvwa.samurai.wtf");

        store.remove_target("dvwa").await.unwrap();
        let state = store.get().await.unwrap();
        assert!(!state.is_installed("dvwa"));
    }

    #[tokio::test]
    async fn duplicate_name_across_targets_and_tools_is_rejected() {
        let (_dir, store) = temp_store().await;
        store
            .add_target("nmap", "katana-nmap".to_string(), vec![])
            .await
            .unwrap();
        let err = store.add_tool("nmap", None).await.unwrap_err();
        assert_eq!(err.code(), "STATE_ERROR");
    }

    #[tokio::test]
    async fn corrupt_state_file_fails_loudly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.yml");
        std::fs::write(&path, "not: [valid, state").unwrap();
        let err = StateStore::open(path).unwrap_err();
        assert_eq!(err.code(), "STATE_ERROR");
    }

    #[tokio::test]
    async fn update_notifies_subscribers() {
        let (_dir, store) = temp_store().await;
        let mut rx = store.subscribe();
        rx.mark_changed();
        let _ = rx.borrow_and_update();
        store.set_locked(true).await.unwrap();
        rx.changed().await.unwrap();
    }
}
