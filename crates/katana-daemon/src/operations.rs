use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use katana_core::{ActionExecutor, ChannelSink, DnsSynchronizer, KatanaError, ModuleLoader, StateStore};
use katana_models::{
    Config, ModuleDef, OperationEvent, OperationKind, OperationSnapshot, OperationStatus,
};
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Per-op timeout: fires `TIMED_OUT` and releases the concurrency slot.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// How long a terminal operation's record is kept around for late pollers.
pub const DEFAULT_REAP_AFTER: Duration = Duration::from_secs(60 * 60);
/// Global concurrency cap across all modules.
pub const DEFAULT_CONCURRENCY: usize = 3;
/// Grace window between the terminal `complete` event and closing subscriber
/// sinks, so SSE clients observe it before the stream ends.
const COMPLETE_GRACE: Duration = Duration::from_millis(250);

struct Operation {
    id: Uuid,
    module: String,
    kind: OperationKind,
    status: Mutex<OperationStatus>,
    started_at: DateTime<Utc>,
    completed_at: Mutex<Option<DateTime<Utc>>>,
    error: Mutex<Option<String>>,
    backlog: Mutex<Vec<OperationEvent>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<OperationEvent>>>,
}

impl Operation {
    async fn snapshot(&self) -> OperationSnapshot {
        OperationSnapshot {
            id: self.id.to_string(),
            module: self.module.clone(),
            kind: self.kind,
            status: *self.status.lock().await,
            started_at: self.started_at,
            completed_at: *self.completed_at.lock().await,
            error: self.error.lock().await.clone(),
        }
    }

    /// Append to the replay backlog and fan out to every live subscriber,
    /// dropping any whose receiver has gone away. Subscribers own their
    /// sink and are reaped here on send failure rather than through any
    /// shared mutable closure.
    async fn publish(&self, event: OperationEvent) {
        self.backlog.lock().await.push(event.clone());
        let mut subs = self.subscribers.lock().await;
        subs.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Accepts install/remove/start/stop submissions from the CLI or API,
/// enforces at-most-one in-flight operation per module, caps global
/// concurrency with a semaphore, and fans out progress to SSE subscribers.
pub struct OperationManager {
    executor: Arc<ActionExecutor>,
    module_loader: Arc<ModuleLoader>,
    state_store: Arc<StateStore>,
    dns: Arc<DnsSynchronizer>,
    config: Config,
    semaphore: Arc<Semaphore>,
    timeout: Duration,
    reap_after: Duration,
    operations: Mutex<HashMap<Uuid, Arc<Operation>>>,
    active_by_module: Mutex<HashMap<String, Uuid>>,
}

impl OperationManager {
    pub fn new(
        executor: Arc<ActionExecutor>,
        module_loader: Arc<ModuleLoader>,
        state_store: Arc<StateStore>,
        dns: Arc<DnsSynchronizer>,
        config: Config,
    ) -> Arc<Self> {
        Self::with_limits(
            executor,
            module_loader,
            state_store,
            dns,
            config,
            DEFAULT_CONCURRENCY,
            DEFAULT_OPERATION_TIMEOUT,
            DEFAULT_REAP_AFTER,
        )
    }

    pub fn with_limits(
        executor: Arc<ActionExecutor>,
        module_loader: Arc<ModuleLoader>,
        state_store: Arc<StateStore>,
        dns: Arc<DnsSynchronizer>,
        config: Config,
        concurrency: usize,
        timeout: Duration,
        reap_after: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            executor,
            module_loader,
            state_store,
            dns,
            config,
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            timeout,
            reap_after,
            operations: Mutex::new(HashMap::new()),
            active_by_module: Mutex::new(HashMap::new()),
        })
    }

    /// Admit a new operation. Rejects synchronously if another op is
    /// already active for this module; otherwise returns the handle
    /// immediately and runs the work on a background task.
    ///
    /// `skip_dns` only matters for a target install/remove: when set, the
    /// hosts file is left untouched even though the route table still
    /// picks up the new/removed route, for operators managing DNS by hand.
    pub async fn submit(
        self: &Arc<Self>,
        module_name: &str,
        kind: OperationKind,
        skip_dns: bool,
    ) -> katana_core::Result<Uuid> {
        let key = module_name.to_lowercase();
        {
            let active = self.active_by_module.lock().await;
            if active.contains_key(&key) {
                return Err(KatanaError::OperationInProgress);
            }
        }

        let module = self
            .module_loader
            .find_module(module_name)?
            .ok_or_else(|| KatanaError::NotFound {
                kind: "module".to_string(),
                name: module_name.to_string(),
            })?;

        let id = Uuid::new_v4();
        let op = Arc::new(Operation {
            id,
            module: module.name().to_string(),
            kind,
            status: Mutex::new(OperationStatus::Queued),
            started_at: Utc::now(),
            completed_at: Mutex::new(None),
            error: Mutex::new(None),
            backlog: Mutex::new(Vec::new()),
            subscribers: Mutex::new(Vec::new()),
        });

        self.operations.lock().await.insert(id, op);
        self.active_by_module.lock().await.insert(key.clone(), id);

        let manager = self.clone();
        let module_def = module.def.clone();
        tokio::spawn(async move {
            manager.run(id, key, module_def, kind, skip_dns).await;
        });

        Ok(id)
    }

    async fn run(
        self: Arc<Self>,
        id: Uuid,
        module_key: String,
        module: ModuleDef,
        kind: OperationKind,
        skip_dns: bool,
    ) {
        let Some(op) = self.operations.lock().await.get(&id).cloned() else {
            return;
        };

        let span = info_span!("operation", %id, module = %op.module, operation = %kind);
        async {
            let permit = match self.semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            *op.status.lock().await = OperationStatus::Running;
            info!("operation running");

            let start = Instant::now();
            let (tx, mut rx) = mpsc::unbounded_channel();
            let sink = ChannelSink::new(tx);

            let op_forward = op.clone();
            let forward = tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    op_forward.publish(event).await;
                }
            });

            let dispatch = self.executor.dispatch(&module, kind, &self.config, &sink);
            let outcome = tokio::time::timeout(self.timeout, dispatch).await;

            let (success, error) = match outcome {
                Ok(Ok(())) => (true, None),
                Ok(Err(e)) => (false, Some(e.to_string())),
                Err(_) => {
                    warn!("operation timed out");
                    (false, Some(KatanaError::TimedOut.to_string()))
                }
            };

            drop(sink);
            let _ = forward.await;

            if success && !skip_dns && matches!(kind, OperationKind::Install | OperationKind::Remove) {
                self.sync_dns_from_state().await;
            }

            let duration_ms = start.elapsed().as_millis() as u64;
            op.publish(OperationEvent::Complete {
                success,
                error: error.clone(),
                duration_ms,
            })
            .await;

            *op.status.lock().await = if success {
                OperationStatus::Completed
            } else {
                OperationStatus::Failed
            };
            *op.completed_at.lock().await = Some(Utc::now());
            *op.error.lock().await = error;

            drop(permit);
            self.active_by_module.lock().await.remove(&module_key);

            tokio::time::sleep(COMPLETE_GRACE).await;
            op.subscribers.lock().await.clear();

            let manager = self.clone();
            let reap_after = self.reap_after;
            tokio::spawn(async move {
                tokio::time::sleep(reap_after).await;
                manager.operations.lock().await.remove(&id);
            });
        }
        .instrument(span)
        .await;
    }

    /// Reconcile the hosts file against the dashboard hostname plus every
    /// currently installed target's routes. Best-effort: a permission or
    /// I/O failure is logged, not propagated, since the install/remove
    /// itself already succeeded against the backend and state.
    async fn sync_dns_from_state(&self) {
        let state = match self.state_store.get().await {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "could not read state for dns sync");
                return;
            }
        };

        let mut expected: Vec<String> = vec![self.config.dashboard_hostname()];
        for target in &state.targets {
            expected.extend(target.routes.iter().map(|r| r.hostname.clone()));
        }

        match self.dns.sync(&expected, "127.0.0.1") {
            Ok(report) => {
                if !report.added.is_empty() || !report.removed.is_empty() {
                    info!(added = ?report.added, removed = ?report.removed, "dns synced");
                }
            }
            Err(e) => warn!(error = %e, "dns sync failed"),
        }
    }

    pub async fn snapshot(&self, id: Uuid) -> Option<OperationSnapshot> {
        let op = self.operations.lock().await.get(&id).cloned()?;
        Some(op.snapshot().await)
    }

    /// Attach a new SSE subscriber: returns the replay backlog plus a
    /// receiver for events going forward. `None` if the operation is
    /// unknown or already reaped.
    pub async fn subscribe(
        &self,
        id: Uuid,
    ) -> Option<(Vec<OperationEvent>, mpsc::UnboundedReceiver<OperationEvent>)> {
        let op = self.operations.lock().await.get(&id).cloned()?;
        let backlog = op.backlog.lock().await.clone();
        let (tx, rx) = mpsc::unbounded_channel();
        op.subscribers.lock().await.push(tx);
        Some((backlog, rx))
    }

    /// `true` if another operation is currently queued or running for this
    /// module name (case-insensitive).
    pub async fn has_active(&self, module_name: &str) -> bool {
        self.active_by_module
            .lock()
            .await
            .contains_key(&module_name.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn manager_with_module(
        dir: &std::path::Path,
        name: &str,
    ) -> (Arc<OperationManager>, Config) {
        let modules_dir = dir.join("modules");
        let target_dir = modules_dir.join("targets").join(name);
        std::fs::create_dir_all(&target_dir).unwrap();
        std::fs::write(
            target_dir.join("module.yml"),
            format!(
                "category: targets\nname: {name}\ndescription: test\ncompose: docker-compose.yml\nproxy:\n  - hostname: {name}\n    service: web\n    port: 80\n"
            ),
        )
        .unwrap();
        std::fs::write(target_dir.join("docker-compose.yml"), "services: {}\n").unwrap();

        let mut config = Config::default();
        config.paths.modules = modules_dir.clone();
        config.paths.state_file = dir.join("state.yml");

        let state_store = StateStore::open(&config.paths.state_file).unwrap();
        let executor = Arc::new(ActionExecutor::new(state_store.clone(), &config));
        let loader = Arc::new(ModuleLoader::new(&modules_dir));
        let dns = Arc::new(DnsSynchronizer::new(dir.join("hosts"), false));

        let manager = OperationManager::with_limits(
            executor,
            loader,
            state_store,
            dns,
            config.clone(),
            3,
            Duration::from_millis(50),
            Duration::from_secs(1),
        );
        (manager, config)
    }

    #[tokio::test]
    async fn duplicate_submission_for_same_module_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _config) = manager_with_module(dir.path(), "dvwa").await;

        let first = manager.submit("dvwa", OperationKind::Install, false).await;
        assert!(first.is_ok());

        let second = manager.submit("dvwa", OperationKind::Install, false).await;
        assert!(matches!(second, Err(KatanaError::OperationInProgress)));
    }

    #[tokio::test]
    async fn unknown_module_submission_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _config) = manager_with_module(dir.path(), "dvwa").await;
        let err = manager
            .submit("nope", OperationKind::Install, false)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn operation_times_out_when_backend_hangs() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _config) = manager_with_module(dir.path(), "slow").await;

        let id = manager
            .submit("slow", OperationKind::Install, false)
            .await
            .unwrap();
        let (_backlog, mut rx) = manager.subscribe(id).await.unwrap();

        let mut saw_failed_complete = false;
        while let Some(event) = rx.recv().await {
            if let OperationEvent::Complete { success, .. } = event {
                saw_failed_complete = !success;
                break;
            }
        }
        assert!(saw_failed_complete, "expected a failed complete event (docker missing or timeout)");

        let snapshot = manager.snapshot(id).await.unwrap();
        assert_eq!(snapshot.status, OperationStatus::Failed);
    }
}
