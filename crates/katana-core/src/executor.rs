use katana_models::{Config, ModuleDef, OperationKind, State, TaskStatus};
use tracing::info_span;
use tracing::Instrument;

use crate::compose::ComposeAdapter;
use crate::error::{KatanaError, Result};
use crate::event_sink::EventSink;
use crate::state_store::StateStore;
use crate::tool_runner::ToolRunner;
use std::sync::Arc;

/// Dispatches a `(module, operation)` pair to the right backend, checking
/// preconditions first and mutating state only once the backend succeeds.
pub struct ActionExecutor {
    state: Arc<StateStore>,
    compose: ComposeAdapter,
}

impl ActionExecutor {
    pub fn new(state: Arc<StateStore>, config: &Config) -> Self {
        Self {
            state,
            compose: ComposeAdapter::new(config),
        }
    }

    /// Run `kind` against `module`, emitting `progress`/`task`/`log` events
    /// to `sink` as work happens. Fails precondition checks before doing
    /// any work.
    pub async fn dispatch(
        &self,
        module: &ModuleDef,
        kind: OperationKind,
        config: &Config,
        sink: &dyn EventSink,
    ) -> Result<()> {
        let span = info_span!("dispatch", module = module.name(), operation = %kind);
        self.dispatch_inner(module, kind, config, sink)
            .instrument(span)
            .await
    }

    async fn dispatch_inner(
        &self,
        module: &ModuleDef,
        kind: OperationKind,
        config: &Config,
        sink: &dyn EventSink,
    ) -> Result<()> {
        let current = self.state.get().await?;
        self.check_preconditions(module, kind, &current)?;

        match (module, kind) {
            (ModuleDef::Targets(t), OperationKind::Install) => {
                sink.task("compose up", TaskStatus::Running);
                let module_path = t.compose.parent().unwrap_or(&t.compose).to_path_buf();
                self.compose
                    .up(&t.name, &module_path, &t.compose, &t.env, config)
                    .await?;
                sink.task("compose up", TaskStatus::Completed);

                let project = ComposeAdapter::project_name(&t.name);
                let routes = t
                    .proxy
                    .iter()
                    .map(|p| katana_models::ProxyEntry {
                        hostname: config.full_hostname(&p.hostname),
                        service: p.service.clone(),
                        port: p.port,
                    })
                    .collect();
                self.state.add_target(&t.name, project, routes).await?;
                sink.progress(100, "target installed");
            }
            (ModuleDef::Targets(t), OperationKind::Remove) => {
                sink.task("compose down", TaskStatus::Running);
                let module_path = t.compose.parent().unwrap_or(&t.compose).to_path_buf();
                self.compose.down(&t.name, &module_path, &t.compose).await?;
                sink.task("compose down", TaskStatus::Completed);
                self.state.remove_target(&t.name).await?;
                sink.progress(100, "target removed");
            }
            (ModuleDef::Targets(t), OperationKind::Start) => {
                let module_path = t.compose.parent().unwrap_or(&t.compose).to_path_buf();
                self.compose.start(&t.name, &module_path, &t.compose).await?;
                sink.progress(100, "target started");
            }
            (ModuleDef::Targets(t), OperationKind::Stop) => {
                let module_path = t.compose.parent().unwrap_or(&t.compose).to_path_buf();
                self.compose.stop(&t.name, &module_path, &t.compose).await?;
                sink.progress(100, "target stopped");
            }
            (ModuleDef::Tools(t), OperationKind::Install) => {
                sink.task("install script", TaskStatus::Running);
                let module_path = t.install.parent().unwrap_or(&t.install).to_path_buf();
                let version = ToolRunner::run(
                    &module_path,
                    &t.install,
                    t.install_requires_root,
                    sink,
                )
                .await?;
                sink.task("install script", TaskStatus::Completed);
                self.state.add_tool(&t.name, version).await?;
                sink.progress(100, "tool installed");
            }
            (ModuleDef::Tools(t), OperationKind::Remove) => {
                sink.task("remove script", TaskStatus::Running);
                let module_path = t.remove.parent().unwrap_or(&t.remove).to_path_buf();
                ToolRunner::run(&module_path, &t.remove, t.install_requires_root, sink).await?;
                sink.task("remove script", TaskStatus::Completed);
                self.state.remove_tool(&t.name).await?;
                sink.progress(100, "tool removed");
            }
            (ModuleDef::Tools(_), OperationKind::Start | OperationKind::Stop) => {
                return Err(KatanaError::NotSupported(
                    "start/stop is not supported for tool modules".to_string(),
                ));
            }
        }

        Ok(())
    }

    fn check_preconditions(&self, module: &ModuleDef, kind: OperationKind, state: &State) -> Result<()> {
        let name = module.name();
        let installed = state.is_installed(name);

        if matches!(module, ModuleDef::Tools(_)) && matches!(kind, OperationKind::Start | OperationKind::Stop) {
            return Err(KatanaError::NotSupported(
                "start/stop is not supported for tool modules".to_string(),
            ));
        }

        match kind {
            OperationKind::Install => {
                if state.locked {
                    return Err(KatanaError::SystemLocked);
                }
                if installed {
                    return Err(KatanaError::AlreadyExists {
                        kind: module.category().to_string(),
                        name: name.to_string(),
                    });
                }
            }
            OperationKind::Remove => {
                if state.locked {
                    return Err(KatanaError::SystemLocked);
                }
                if !installed {
                    return Err(KatanaError::NotFound {
                        kind: module.category().to_string(),
                        name: name.to_string(),
                    });
                }
            }
            OperationKind::Start | OperationKind::Stop => {
                if state.find_target(name).is_none() {
                    return Err(KatanaError::NotFound {
                        kind: "target".to_string(),
                        name: name.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}
