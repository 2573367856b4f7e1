use std::collections::HashMap;
use std::sync::Arc;

use katana_models::Config;
use tokio::sync::RwLock;
use tracing::debug;

use crate::state_store::StateStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    pub host: String,
    pub port: u16,
}

/// `hostname → backend` map for the reverse proxy, derived from
/// `State × Config` and rebuilt whenever the State Store changes.
pub struct RouteTable {
    routes: RwLock<HashMap<String, Backend>>,
    dashboard_host: String,
}

impl RouteTable {
    /// Build the initial table and spawn a task that rebuilds it on every
    /// state-changed notification for as long as `store` is alive.
    pub async fn spawn(store: Arc<StateStore>, config: &Config) -> Arc<Self> {
        let dashboard_host = config.dashboard_hostname();
        let table = Arc::new(Self {
            routes: RwLock::new(HashMap::new()),
            dashboard_host,
        });

        table.rebuild(&store).await;

        let mut changed = store.subscribe();
        let weak = Arc::downgrade(&table);
        tokio::spawn(async move {
            loop {
                if changed.changed().await.is_err() {
                    break;
                }
                let Some(table) = weak.upgrade() else { break };
                table.rebuild(&store).await;
            }
        });

        table
    }

    async fn rebuild(&self, store: &StateStore) {
        let state = match store.get().await {
            Ok(state) => state,
            Err(e) => {
                tracing::error!(error = %e, "route table rebuild failed to read state");
                return;
            }
        };

        let mut routes = HashMap::new();
        for target in &state.targets {
            for route in &target.routes {
                // Compose's default network alias for a service is scoped to
                // its project, so the reachable DNS name on `docker_network`
                // is the project-qualified one, not the bare service name.
                let backend = Backend {
                    host: format!("{}_{}", target.compose_project, route.service),
                    port: route.port,
                };
                routes.insert(route.hostname.to_lowercase(), backend);
            }
        }

        debug!(count = routes.len(), "route table rebuilt");
        *self.routes.write().await = routes;
    }

    /// Look up the backend for a `Host` header value, after lowercasing
    /// and stripping any port suffix. The dashboard hostname always
    /// resolves even though it has no corresponding entry in `routes`.
    pub async fn lookup(&self, host_header: &str) -> Option<RouteTarget> {
        let host = host_header
            .split(':')
            .next()
            .unwrap_or(host_header)
            .to_lowercase();

        if host == self.dashboard_host {
            return Some(RouteTarget::Dashboard);
        }

        self.routes
            .read()
            .await
            .get(&host)
            .cloned()
            .map(RouteTarget::Backend)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    /// Routes to the embedded API router in-process, no network hop.
    Dashboard,
    Backend(Backend),
}

#[cfg(test)]
mod tests {
    use super::*;
    use katana_models::ProxyEntry;

    #[tokio::test]
    async fn dashboard_host_always_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path().join("state.yml")).unwrap();
        let config = Config::default();
        let table = RouteTable::spawn(store, &config).await;

        let target = table.lookup(&config.dashboard_hostname()).await;
        assert_eq!(target, Some(RouteTarget::Dashboard));
    }

    #[tokio::test]
    async fn rebuilds_when_state_changes() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path().join("state.yml")).unwrap();
        let config = Config::default();
        let table = RouteTable::spawn(store.clone(), &config).await;

        assert!(table.lookup("dvwa.samurai.wtf").await.is_none());

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

        // allow the background rebuild task to run
        for _ in 0..20 {
            if table.lookup("dvwa.samurai.wtf").await.is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let target = table.lookup("dvwa.samurai.wtf").await;
        assert!(matches!(target, Some(RouteTarget::Backend(_))));
    }
}
