// OS-service strategy: start/stop primitives plus per-tick reconciliation

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::Supervisor;
use crate::application::registry::TargetSlot;
use crate::domain::{EventKind, LifecycleState, StartMode, TargetConfig};
use crate::error::Result;
use crate::port::{LiveState, OsState, StopSignal};

fn lifecycle_of(state: OsState) -> LifecycleState {
    match state {
        OsState::Running => LifecycleState::Running,
        OsState::StopPending => LifecycleState::Stopping,
        OsState::Stopped => LifecycleState::Stopped,
    }
}

impl Supervisor {
    pub(super) async fn start_service(
        &self,
        slot: &Arc<TargetSlot>,
        config: &TargetConfig,
        mode: StartMode,
    ) -> Result<()> {
        let log_path = self.log_path(&config.id);
        let launch = self.adapter().start(config, &log_path).await?;

        // The start primitive may return before the service reports its pid
        let pid = match self.adapter().query_live_state(config, launch.pid).await {
            Ok(live) if live.pid.is_some() => live.pid,
            _ => launch.pid,
        };

        slot.record
            .lock()
            .mark_running(pid, mode, self.clock().now_millis())?;
        self.record_event(config, EventKind::Started);
        info!(target_id = %config.id, service = config.executable(), pid = ?pid, "Service started");
        Ok(())
    }

    /// Record is already Stopping; caller holds `slot.op_lock`
    pub(super) async fn stop_service(
        &self,
        slot: &Arc<TargetSlot>,
        config: &TargetConfig,
        pid: Option<u32>,
    ) -> Result<()> {
        let signal = if config.shutdown_timeout().is_zero() {
            StopSignal::Force
        } else {
            StopSignal::Soft
        };

        match self.adapter().stop(config, pid, signal).await {
            Ok(()) => {
                // Finalize now if the manager already reports stopped; otherwise the sampler will
                if let Ok(live) = self.adapter().query_live_state(config, pid).await {
                    self.settle_stopping(slot, config, live);
                }
                Ok(())
            }
            Err(err) => {
                warn!(target_id = %config.id, error = %err, "Service stop failed, re-querying state");
                match self.adapter().query_live_state(config, pid).await {
                    Ok(live) if live.state == OsState::Running => {
                        slot.record.lock().abort_stopping();
                    }
                    Ok(live) => self.settle_stopping(slot, config, live),
                    Err(query_err) => {
                        // Unknown state: assume the stop did not take
                        debug!(target_id = %config.id, error = %query_err, "Fallback query failed");
                        slot.record.lock().abort_stopping();
                    }
                }
                Err(err.into())
            }
        }
    }

    /// Apply a live state to a Stopping service: only an OS-reported stop finalizes it
    fn settle_stopping(&self, slot: &Arc<TargetSlot>, config: &TargetConfig, live: LiveState) {
        let finalized = {
            let mut rec = slot.record.lock();
            if rec.state != LifecycleState::Stopping {
                return;
            }
            if live.state == OsState::Stopped {
                rec.finalize_stopped();
                true
            } else {
                if live.pid.is_some() {
                    rec.pid = live.pid;
                }
                false
            }
        };
        if finalized {
            self.record_event(config, EventKind::Stopped);
            info!(target_id = %config.id, "Service stopped");
        }
    }

    /// Sampler hook: reconcile a service target with the service manager
    ///
    /// Skipped while a start/stop holds the target. A Stopping service is only
    /// finalized on an OS-reported stop; past its deadline it is force-terminated once.
    pub async fn reconcile_service(&self, slot: &Arc<TargetSlot>) -> Result<()> {
        if !slot.is_service() {
            return Ok(());
        }
        let Ok(_op) = slot.op_lock.try_lock() else {
            debug!("Reconcile skipped: operation in progress");
            return Ok(());
        };

        let (config, pid) = {
            let rec = slot.record.lock();
            (rec.config.clone(), rec.pid)
        };

        let live = self.adapter().query_live_state(&config, pid).await?;
        let now = self.clock().now_millis();

        let escalate = {
            let mut rec = slot.record.lock();
            match rec.state {
                LifecycleState::Stopping => {
                    if live.state != OsState::Stopped {
                        if live.pid.is_some() {
                            rec.pid = live.pid;
                        }
                        let overdue = rec.stopping_deadline.is_some_and(|d| now >= d);
                        if overdue && !rec.force_issued {
                            rec.force_issued = true;
                            true
                        } else {
                            false
                        }
                    } else {
                        false
                    }
                }
                current => {
                    let next = lifecycle_of(live.state);
                    if current != next || (next == LifecycleState::Running && rec.pid != live.pid) {
                        info!(
                            target_id = %config.id,
                            from = %current,
                            to = %next,
                            pid = ?live.pid,
                            "Service state changed outside the supervisor"
                        );
                        rec.adopt_os_state(next, live.pid, now);
                    }
                    false
                }
            }
        };

        if live.state == OsState::Stopped {
            self.settle_stopping(slot, &config, live);
        }

        if escalate {
            warn!(target_id = %config.id, "Service stop deadline passed, force-terminating");
            if let Err(e) = self.adapter().stop(&config, pid, StopSignal::Force).await {
                warn!(target_id = %config.id, error = %e, "Service force-terminate failed");
            }
        }
        Ok(())
    }
}
