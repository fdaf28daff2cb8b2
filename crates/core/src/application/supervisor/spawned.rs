// Spawned-executable strategy: launch, exit watcher, graceful stop

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use super::Supervisor;
use crate::application::logs;
use crate::application::registry::TargetSlot;
use crate::domain::{EventKind, LifecycleState, StartMode, TargetConfig};
use crate::error::{AppError, Result};
use crate::port::{ExitInfo, OsState, StopSignal};

impl Supervisor {
    pub(super) async fn start_spawned(
        &self,
        slot: &Arc<TargetSlot>,
        config: &TargetConfig,
        mode: StartMode,
    ) -> Result<()> {
        let log_path = self.log_path(&config.id);

        // Rotation runs before the child opens the file, so no writer holds it
        {
            let log_dir = self.log_dir().to_path_buf();
            let path = log_path.clone();
            let policy = config.log_rotation.clone();
            tokio::task::spawn_blocking(move || -> std::io::Result<bool> {
                std::fs::create_dir_all(&log_dir)?;
                logs::rotate_log(&path, &policy)
            })
            .await
            .map_err(|e| AppError::Internal(format!("log preparation task failed: {}", e)))?
            .map_err(|e| AppError::Spawn(format!("log sink {}: {}", log_path.display(), e)))?;
        }

        let launch = self.adapter().start(config, &log_path).await?;
        let pid = launch.pid;

        let committed = {
            let mut rec = slot.record.lock();
            rec.mark_running(pid, mode, self.clock().now_millis())
                .map(|()| rec.restart_count)
        };
        let restart_count = match committed {
            Ok(count) => count,
            Err(e) => {
                // Never leave an untracked child behind
                let _ = self.adapter().stop(config, pid, StopSignal::Force).await;
                return Err(e.into());
            }
        };

        self.record_event(config, EventKind::Started);
        info!(target_id = %config.id, pid = ?pid, restart_count, "Target started");

        if let Some(exit) = launch.exit {
            self.spawn_exit_watcher(Arc::clone(slot), pid, exit);
        }
        Ok(())
    }

    /// One task per child; suspends until the OS reports the exit
    fn spawn_exit_watcher(
        &self,
        slot: Arc<TargetSlot>,
        pid: Option<u32>,
        exit: BoxFuture<'static, ExitInfo>,
    ) {
        let Some(this) = self.me.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            let info = exit.await;
            this.commit_exit(slot, pid, info);
        });
    }

    fn commit_exit(&self, slot: Arc<TargetSlot>, pid: Option<u32>, info: ExitInfo) {
        let outcome = {
            let mut rec = slot.record.lock();
            if rec.pid != pid || !rec.state.is_active() {
                None
            } else {
                let state = rec.mark_exited();
                Some((state, rec.config.clone()))
            }
        };

        let Some((state, config)) = outcome else {
            debug!(pid = ?pid, "Stale exit ignored");
            slot.notify_exit();
            return;
        };

        match state {
            LifecycleState::Stopped => {
                self.record_event(&config, EventKind::Stopped);
                info!(target_id = %config.id, pid = ?pid, code = ?info.code, "Target stopped");
            }
            _ => {
                self.record_event(&config, EventKind::Crashed);
                if config.auto_restart {
                    warn!(
                        target_id = %config.id,
                        pid = ?pid,
                        code = ?info.code,
                        delay_ms = self.settings.restart_delay.as_millis() as u64,
                        "Target crashed, scheduling auto-restart"
                    );
                } else {
                    warn!(target_id = %config.id, pid = ?pid, code = ?info.code, "Target crashed (auto-restart off)");
                }
            }
        }
        slot.notify_exit();

        if state == LifecycleState::Crashed && config.auto_restart {
            self.schedule_restart(slot);
        }
    }

    /// Record is already Stopping; caller holds `slot.op_lock`
    pub(super) async fn stop_spawned(
        &self,
        slot: &Arc<TargetSlot>,
        config: &TargetConfig,
        pid: Option<u32>,
        mut exits: watch::Receiver<u64>,
    ) -> Result<()> {
        let grace = config.shutdown_timeout();
        let mut observed_exit = false;

        if grace.is_zero() {
            self.force_terminate(slot, config, pid).await?;
        } else {
            if let Err(e) = self.adapter().stop(config, pid, StopSignal::Soft).await {
                warn!(target_id = %config.id, error = %e, "Soft terminate failed");
            }

            let started = Instant::now();
            let deadline = started.checked_add(grace).unwrap_or(started);
            loop {
                match self.adapter().query_live_state(config, pid).await {
                    Ok(live) if live.state == OsState::Stopped => break,
                    Ok(_) => {}
                    Err(e) => debug!(target_id = %config.id, error = %e, "Liveness query failed"),
                }

                let now = Instant::now();
                if now >= deadline {
                    warn!(
                        target_id = %config.id,
                        timeout_secs = grace.as_secs(),
                        "Graceful stop timed out, force-terminating"
                    );
                    self.force_terminate(slot, config, pid).await?;
                    break;
                }

                let step = self.settings.stop_poll_interval.min(deadline.saturating_duration_since(now));
                tokio::select! {
                    _ = sleep(step) => {}
                    changed = exits.changed() => {
                        observed_exit = changed.is_ok();
                        break;
                    }
                }
            }
        }

        if !observed_exit
            && timeout(self.settings.exit_confirm_timeout, exits.changed())
                .await
                .is_err()
        {
            // Exit watcher has not reported; settle the record ourselves
            warn!(target_id = %config.id, pid = ?pid, "Exit not confirmed after stop");
            let finalized = {
                let mut rec = slot.record.lock();
                if rec.state == LifecycleState::Stopping && rec.pid == pid {
                    rec.finalize_stopped();
                    true
                } else {
                    false
                }
            };
            if finalized {
                self.record_event(config, EventKind::Stopped);
            }
        }
        Ok(())
    }

    /// Force-terminate; if that fails and the process is still alive, roll back to Running
    async fn force_terminate(
        &self,
        slot: &Arc<TargetSlot>,
        config: &TargetConfig,
        pid: Option<u32>,
    ) -> Result<()> {
        let Err(err) = self.adapter().stop(config, pid, StopSignal::Force).await else {
            return Ok(());
        };

        let still_running = matches!(
            self.adapter().query_live_state(config, pid).await,
            Ok(live) if live.state != OsState::Stopped
        );
        if still_running {
            slot.record.lock().abort_stopping();
            return Err(err.into());
        }
        warn!(target_id = %config.id, error = %err, "Force terminate reported an error but the process is gone");
        Ok(())
    }
}
