// Sampler Loop - 1 Hz telemetry refresh and snapshot broadcast

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::application::hub::BroadcastHub;
use crate::application::registry::TargetSlot;
use crate::application::shutdown::ShutdownToken;
use crate::application::supervisor::Supervisor;
use crate::domain::{MetricSample, TargetStatus};
use crate::port::TelemetryProbe;

pub struct Sampler {
    supervisor: Arc<Supervisor>,
    probe: Arc<dyn TelemetryProbe>,
    hub: Arc<BroadcastHub>,
    interval: Duration,
}

impl Sampler {
    pub fn new(
        supervisor: Arc<Supervisor>,
        probe: Arc<dyn TelemetryProbe>,
        hub: Arc<BroadcastHub>,
        interval: Duration,
    ) -> Self {
        Self {
            supervisor,
            probe,
            hub,
            interval,
        }
    }

    /// Tick until shutdown
    pub async fn run(&self, mut shutdown: ShutdownToken) {
        info!(interval_ms = self.interval.as_millis() as u64, "Sampler started");
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.wait() => {
                    info!("Sampler shutting down");
                    break;
                }
            }
        }
    }

    /// One full pass over every target; returns the snapshot that was published
    ///
    /// Failures on one target are swallowed and the pass continues.
    pub async fn tick(&self) -> Vec<TargetStatus> {
        let slots = self.supervisor.registry().slots();
        let mut snapshot = Vec::with_capacity(slots.len());

        for slot in &slots {
            if let Err(e) = self.supervisor.reconcile_service(slot).await {
                debug!(target_id = %slot.id(), error = %e, "Service query failed this tick");
            }
            self.refresh_telemetry(slot).await;
            snapshot.push(slot.status());
        }

        if let Err(e) = self.hub.publish(&snapshot) {
            warn!(error = %e, "Failed to serialize snapshot");
        }
        snapshot
    }

    async fn refresh_telemetry(&self, slot: &Arc<TargetSlot>) {
        let pid = {
            let mut rec = slot.record.lock();
            match rec.pid {
                Some(pid) if rec.state.is_active() => pid,
                _ => {
                    rec.clear_telemetry();
                    return;
                }
            }
        };

        match self.probe.sample(pid).await {
            Ok(telemetry) => {
                let now = self.supervisor.clock().now_millis();
                let applied = {
                    let mut rec = slot.record.lock();
                    // The process may have exited while we were sampling
                    if rec.pid == Some(pid) && rec.state.is_active() {
                        rec.apply_telemetry(&telemetry);
                        true
                    } else {
                        false
                    }
                };
                if applied {
                    slot.metrics.push(MetricSample::new(now, &telemetry));
                }
            }
            Err(e) => debug!(pid, error = %e, "Telemetry sample failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::registry::Registry;
    use crate::application::supervisor::SupervisorSettings;
    use crate::domain::{LifecycleState, SupervisorConfig, TargetConfig};
    use crate::port::config_store::mocks::MockConfigStore;
    use crate::port::os_adapter::mocks::MockOsAdapter;
    use crate::port::telemetry_probe::mocks::MockTelemetryProbe;
    use crate::port::{LiveState, SystemTimeProvider};
    use tempfile::TempDir;

    struct Fixture {
        sampler: Sampler,
        sup: Arc<Supervisor>,
        os: Arc<MockOsAdapter>,
        probe: Arc<MockTelemetryProbe>,
        hub: Arc<BroadcastHub>,
        _logs: TempDir,
    }

    fn fixture(targets: Vec<TargetConfig>) -> Fixture {
        let logs = TempDir::new().unwrap();
        let config = SupervisorConfig { targets };
        let registry = Arc::new(Registry::from_config(&config, 5).unwrap());
        let os = Arc::new(MockOsAdapter::new());
        let probe = Arc::new(MockTelemetryProbe::new(12.5, 256 * 1024 * 1024, 9));
        let hub = Arc::new(BroadcastHub::new(8));
        let sup = Supervisor::new(
            registry,
            os.clone(),
            Arc::new(MockConfigStore::new(config)),
            Arc::new(SystemTimeProvider),
            SupervisorSettings::new(logs.path()),
        );
        let sampler = Sampler::new(sup.clone(), probe.clone(), hub.clone(), Duration::from_millis(10));
        Fixture {
            sampler,
            sup,
            os,
            probe,
            hub,
            _logs: logs,
        }
    }

    #[tokio::test]
    async fn test_tick_samples_active_targets_only() {
        let f = fixture(vec![
            TargetConfig::spawned("api", "API", "/opt/api", vec![]),
            TargetConfig::spawned("idle", "Idle", "/opt/idle", vec![]),
        ]);
        f.sup.start("api").await.unwrap();

        let snapshot = f.sampler.tick().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id, "api");
        assert_eq!(snapshot[0].cpu, 12.5);
        assert_eq!(snapshot[0].memory_mb, 256.0);
        assert_eq!(snapshot[0].threads, 9);
        assert_eq!(snapshot[1].state, LifecycleState::Stopped);
        assert_eq!(snapshot[1].cpu, 0.0);

        assert_eq!(f.probe.call_count(), 1);
        assert_eq!(f.sup.metrics("api", 60).unwrap().len(), 1);
        assert!(f.sup.metrics("idle", 60).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_metrics_history_is_bounded() {
        let f = fixture(vec![TargetConfig::spawned("api", "API", "/opt/api", vec![])]);
        f.sup.start("api").await.unwrap();
        for _ in 0..8 {
            f.sampler.tick().await;
        }
        assert_eq!(f.sup.metrics("api", 3600).unwrap().len(), 5);
        assert_eq!(f.sup.metrics("api", 2).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_probe_failure_is_swallowed() {
        let f = fixture(vec![
            TargetConfig::spawned("a", "A", "/opt/a", vec![]),
            TargetConfig::spawned("b", "B", "/opt/b", vec![]),
        ]);
        f.sup.start("a").await.unwrap();
        f.sup.start("b").await.unwrap();
        f.probe.fail_for(f.sup.status("a").unwrap().pid);

        let snapshot = f.sampler.tick().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].cpu, 0.0);
        assert_eq!(snapshot[1].cpu, 12.5);
    }

    #[tokio::test]
    async fn test_service_query_failure_keeps_state() {
        let f = fixture(vec![TargetConfig::service("db", "DB", "postgresql")]);
        f.os.set_service_state("postgresql", LiveState::running(Some(77)));
        f.sampler.tick().await;
        assert_eq!(f.sup.status("db").unwrap().state, LifecycleState::Running);

        f.os.set_query_failure(true);
        let snapshot = f.sampler.tick().await;
        assert_eq!(snapshot[0].state, LifecycleState::Running);
        assert_eq!(snapshot[0].pid, 77);
    }

    #[tokio::test]
    async fn test_tick_publishes_snapshot_to_subscribers() {
        let f = fixture(vec![TargetConfig::spawned("api", "API", "/opt/api", vec![])]);
        let mut sub = f.hub.subscribe();
        let (stop, token) = crate::application::shutdown::shutdown_channel();
        let hub = f.hub.clone();
        let runner = tokio::spawn(async move { hub.run(token).await });

        f.sampler.tick().await;
        let payload = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .unwrap()
            .unwrap();
        let statuses: Vec<TargetStatus> = serde_json::from_str(&payload).unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].id, "api");

        stop.shutdown();
        runner.await.unwrap().unwrap();
    }
}
