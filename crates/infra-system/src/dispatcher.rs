// Routes each target to its strategy by kind
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use procwatch_core::domain::{TargetConfig, TargetKind};
use procwatch_core::port::{AdapterError, Launch, LiveState, OsAdapter, StopSignal};

use crate::{ServiceAdapter, SpawnedProcessAdapter};

pub struct KindDispatcher {
    spawned: Arc<dyn OsAdapter>,
    service: Arc<dyn OsAdapter>,
}

impl KindDispatcher {
    pub fn new(spawned: Arc<dyn OsAdapter>, service: Arc<dyn OsAdapter>) -> Self {
        Self { spawned, service }
    }

    /// Real process + host service manager strategies
    pub fn system() -> Self {
        Self::new(
            Arc::new(SpawnedProcessAdapter::new()),
            Arc::new(ServiceAdapter::new()),
        )
    }

    fn route(&self, config: &TargetConfig) -> &dyn OsAdapter {
        match config.kind {
            TargetKind::Spawned { .. } => self.spawned.as_ref(),
            TargetKind::Service { .. } => self.service.as_ref(),
        }
    }
}

#[async_trait]
impl OsAdapter for KindDispatcher {
    async fn start(&self, config: &TargetConfig, log_path: &Path) -> Result<Launch, AdapterError> {
        self.route(config).start(config, log_path).await
    }

    async fn stop(
        &self,
        config: &TargetConfig,
        pid: Option<u32>,
        signal: StopSignal,
    ) -> Result<(), AdapterError> {
        self.route(config).stop(config, pid, signal).await
    }

    async fn query_live_state(
        &self,
        config: &TargetConfig,
        pid: Option<u32>,
    ) -> Result<LiveState, AdapterError> {
        self.route(config).query_live_state(config, pid).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procwatch_core::port::os_adapter::mocks::MockOsAdapter;
    use procwatch_core::port::OsState;

    #[tokio::test]
    async fn test_routes_by_kind() {
        let spawned = Arc::new(MockOsAdapter::new());
        let service = Arc::new(MockOsAdapter::new());
        let dispatcher = KindDispatcher::new(spawned.clone(), service.clone());

        let exe = TargetConfig::spawned("api", "API", "/bin/api", vec![]);
        let svc = TargetConfig::service("db", "DB", "postgresql");

        dispatcher.start(&exe, Path::new("/tmp/api.log")).await.unwrap();
        dispatcher.start(&svc, Path::new("/tmp/db.log")).await.unwrap();
        assert_eq!(spawned.spawn_count(), 1);
        assert_eq!(service.spawn_count(), 1);

        let live = dispatcher.query_live_state(&svc, None).await.unwrap();
        assert_eq!(live.state, OsState::Running);
        dispatcher.stop(&svc, None, StopSignal::Force).await.unwrap();
        assert_eq!(service.force_count(), 1);
        assert_eq!(spawned.force_count(), 0);
    }
}
