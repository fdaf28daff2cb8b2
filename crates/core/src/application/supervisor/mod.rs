//! Supervisor - per-target lifecycle state machine
//!
//! States: Stopped (initial) -> Running -> Stopping -> Stopped, or Running -> Crashed.
//!
//! Locking:
//! - `TargetSlot::op_lock` serializes start/stop on one target and may span OS calls
//! - `TargetSlot::record` is only taken to read inputs or commit an observed outcome
//! - the registry lock is never needed for per-target work

mod service;
mod spawned;


use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::application::constants::{
    AUTO_RESTART_DELAY, EVENT_LOG_CAPACITY, EXIT_CONFIRM_TIMEOUT, STOP_POLL_INTERVAL,
};
use crate::application::history::EventLog;
use crate::application::logs;
use crate::application::registry::{Registry, TargetSlot};
use crate::domain::{
    validate_config, EventKind, LifecycleEvent, LifecycleState, MetricSample, StartMode,
    SupervisorConfig, TargetConfig, TargetId, TargetStatus,
};
use crate::error::{AppError, Result};
use crate::port::{ConfigStore, OsAdapter, TimeProvider};

/// Tunables (defaults match production cadence; tests shorten them)
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    /// Directory holding `<id>.log` for spawned targets
    pub log_dir: PathBuf,
    /// Fixed delay before each auto-restart (no backoff, no ceiling)
    pub restart_delay: Duration,
    pub stop_poll_interval: Duration,
    pub exit_confirm_timeout: Duration,
    pub event_capacity: usize,
}

impl SupervisorSettings {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            restart_delay: AUTO_RESTART_DELAY,
            stop_poll_interval: STOP_POLL_INTERVAL,
            exit_confirm_timeout: EXIT_CONFIRM_TIMEOUT,
            event_capacity: EVENT_LOG_CAPACITY,
        }
    }
}

/// Outcome of start_all / stop_all
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    /// Ids in the order they were visited
    pub succeeded: Vec<TargetId>,
    pub errors: BTreeMap<TargetId, String>,
}

impl BatchReport {
    pub fn is_partial_failure(&self) -> bool {
        !self.errors.is_empty()
    }

    fn record(&mut self, id: TargetId, result: Result<()>) {
        match result {
            Ok(()) => self.succeeded.push(id),
            Err(e) => {
                self.errors.insert(id, e.to_string());
            }
        }
    }
}

pub struct Supervisor {
    registry: Arc<Registry>,
    adapter: Arc<dyn OsAdapter>,
    store: Arc<dyn ConfigStore>,
    clock: Arc<dyn TimeProvider>,
    events: EventLog,
    settings: SupervisorSettings,
    /// Serializes snapshot + save of the configuration document
    persist_lock: tokio::sync::Mutex<()>,
    /// Handle given to exit watchers and restart timers
    me: Weak<Supervisor>,
}

impl Supervisor {
    pub fn new(
        registry: Arc<Registry>,
        adapter: Arc<dyn OsAdapter>,
        store: Arc<dyn ConfigStore>,
        clock: Arc<dyn TimeProvider>,
        settings: SupervisorSettings,
    ) -> Arc<Self> {
        let events = EventLog::new(settings.event_capacity);
        Arc::new_cyclic(|me| Self {
            registry,
            adapter,
            store,
            clock,
            events,
            settings,
            persist_lock: tokio::sync::Mutex::new(()),
            me: me.clone(),
        })
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.settings
    }

    pub(crate) fn clock(&self) -> &Arc<dyn TimeProvider> {
        &self.clock
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Manual start: {Stopped, Crashed} -> Running; no-op when already Running
    ///
    /// # Errors
    /// - AppError::NotFound for an unknown id
    /// - AppError::InvalidState while the target is Stopping
    /// - AppError::Spawn / AppError::Adapter when the OS start fails (state unchanged)
    pub async fn start(&self, id: &str) -> Result<()> {
        let slot = self.registry.lookup(id)?;
        let _op = slot.op_lock.lock().await;
        self.start_locked(&slot, StartMode::Manual).await
    }

    /// Manual stop: Running -> Stopping -> Stopped
    ///
    /// Spawned targets are Stopped when this returns. Services stay Stopping until
    /// the sampler sees the OS report them stopped.
    pub async fn stop(&self, id: &str) -> Result<()> {
        let slot = self.registry.lookup(id)?;
        let _op = slot.op_lock.lock().await;
        self.stop_locked(&slot).await
    }

    /// Start every target in registration order; failures do not stop the pass
    pub async fn start_all(&self) -> BatchReport {
        let mut report = BatchReport::default();
        for slot in self.registry.slots() {
            let id = slot.id();
            let result = {
                let _op = slot.op_lock.lock().await;
                self.start_locked(&slot, StartMode::Manual).await
            };
            report.record(id, result);
        }
        if report.is_partial_failure() {
            warn!(failed = report.errors.len(), "start_all finished with failures");
        }
        report
    }

    /// Stop every target in reverse registration order, disabling auto-restart on
    /// each, then persist the configuration once
    pub async fn stop_all(&self) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        for slot in self.registry.slots().into_iter().rev() {
            let id = slot.id();
            slot.record.lock().config.auto_restart = false;
            let result = {
                let _op = slot.op_lock.lock().await;
                self.stop_locked(&slot).await
            };
            report.record(id, result);
        }
        if report.is_partial_failure() {
            warn!(failed = report.errors.len(), "stop_all finished with failures");
        }
        self.persist().await?;
        Ok(report)
    }

    /// Update the auto-restart flag and persist; lifecycle state is untouched
    pub async fn set_auto_restart(&self, id: &str, enabled: bool) -> Result<()> {
        let slot = self.registry.lookup(id)?;
        slot.record.lock().config.auto_restart = enabled;
        info!(target_id = %id, auto_restart = enabled, "Auto-restart updated");
        self.persist().await
    }

    /// Validate, apply to the registry, then persist
    ///
    /// # Errors
    /// - AppError::Validation for a rejected document (nothing applied)
    /// - AppError::InvalidState when an active target would be removed (nothing applied)
    pub async fn replace_config(&self, config: SupervisorConfig) -> Result<()> {
        validate_config(&config).map_err(|e| AppError::Validation(e.to_string()))?;
        let _persist = self.persist_lock.lock().await;
        self.registry.replace(&config)?;
        self.store.save(&config).await?;
        info!(targets = config.targets.len(), "Configuration replaced");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn list_statuses(&self) -> Vec<TargetStatus> {
        self.registry.slots().iter().map(|slot| slot.status()).collect()
    }

    pub fn status(&self, id: &str) -> Result<TargetStatus> {
        Ok(self.registry.lookup(id)?.status())
    }

    pub fn config(&self) -> SupervisorConfig {
        self.registry.config()
    }

    /// Chronological samples covering the last `window_secs` seconds
    pub fn metrics(&self, id: &str, window_secs: usize) -> Result<Vec<MetricSample>> {
        Ok(self.registry.lookup(id)?.metrics.window(window_secs))
    }

    /// Every retained lifecycle event, oldest first
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.all()
    }

    /// Last `lines` lines of a spawned target's log; services have no log
    pub async fn tail(&self, id: &str, lines: usize) -> Result<Vec<String>> {
        let config = self.registry.lookup(id)?.config();
        if config.is_service() {
            return Ok(Vec::new());
        }
        let path = self.log_path(&config.id);
        let lines = tokio::task::spawn_blocking(move || logs::tail_lines(&path, lines))
            .await
            .map_err(|e| AppError::Internal(format!("tail task failed: {}", e)))??;
        Ok(lines)
    }

    pub fn log_path(&self, id: &str) -> PathBuf {
        logs::log_path(&self.settings.log_dir, id)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Caller holds `slot.op_lock`
    async fn start_locked(&self, slot: &Arc<TargetSlot>, mode: StartMode) -> Result<()> {
        let config = {
            let rec = slot.record.lock();
            match rec.state {
                LifecycleState::Running => {
                    debug!(target_id = %rec.config.id, "Start ignored: already running");
                    return Ok(());
                }
                LifecycleState::Stopping => {
                    return Err(AppError::InvalidState(format!(
                        "target {} is stopping",
                        rec.config.id
                    )));
                }
                LifecycleState::Stopped | LifecycleState::Crashed => rec.config.clone(),
            }
        };

        if config.is_service() {
            self.start_service(slot, &config, mode).await
        } else {
            self.start_spawned(slot, &config, mode).await
        }
    }

    /// Caller holds `slot.op_lock`
    async fn stop_locked(&self, slot: &Arc<TargetSlot>) -> Result<()> {
        // Subscribe before the state check so an exit racing this stop is not missed
        let exits = slot.watch_exits();
        let now = self.clock.now_millis();

        let (config, pid) = {
            let mut rec = slot.record.lock();
            match rec.state {
                LifecycleState::Running => {}
                LifecycleState::Stopping => {
                    debug!(target_id = %rec.config.id, "Stop ignored: already stopping");
                    return Ok(());
                }
                LifecycleState::Crashed => {
                    // Acknowledged by the operator; cancels a pending auto-restart
                    rec.finalize_stopped();
                    return Ok(());
                }
                LifecycleState::Stopped => return Ok(()),
            }
            rec.begin_stopping(now)?;
            (rec.config.clone(), rec.pid)
        };
        info!(target_id = %config.id, pid = ?pid, timeout_secs = config.shutdown_timeout_secs, "Stopping target");

        if config.is_service() {
            self.stop_service(slot, &config, pid).await
        } else {
            self.stop_spawned(slot, &config, pid, exits).await
        }
    }

    fn record_event(&self, config: &TargetConfig, kind: EventKind) {
        self.events.record(LifecycleEvent {
            timestamp_ms: self.clock.now_millis(),
            target_id: config.id.clone(),
            target_name: config.name.clone(),
            kind,
        });
    }

    /// Fixed-delay restart after a crash
    ///
    /// When the delay elapses the target must still be Crashed with auto-restart on.
    fn schedule_restart(&self, slot: Arc<TargetSlot>) {
        let Some(this) = self.me.upgrade() else {
            return;
        };
        let delay = self.settings.restart_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _op = slot.op_lock.lock().await;
            let (proceed, id) = {
                let rec = slot.record.lock();
                (
                    rec.state == LifecycleState::Crashed && rec.config.auto_restart,
                    rec.config.id.clone(),
                )
            };
            if !proceed {
                debug!(target_id = %id, "Auto-restart skipped: target no longer eligible");
                return;
            }
            info!(target_id = %id, "Auto-restarting crashed target");
            if let Err(e) = this.start_locked(&slot, StartMode::AutoRestart).await {
                error!(target_id = %id, error = %e, "Auto-restart failed");
            }
        });
    }

    async fn persist(&self) -> Result<()> {
        let _persist = self.persist_lock.lock().await;
        let config = self.registry.config();
        self.store.save(&config).await?;
        debug!(targets = config.targets.len(), "Configuration persisted");
        Ok(())
    }

    pub(crate) fn adapter(&self) -> &Arc<dyn OsAdapter> {
        &self.adapter
    }

    fn log_dir(&self) -> &Path {
        &self.settings.log_dir
    }
}
