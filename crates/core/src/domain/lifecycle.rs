// Lifecycle State Machine - per-target runtime record

use serde::{Deserialize, Serialize};

use super::error::{DomainError, Result};
use super::target::TargetConfig;
use super::telemetry::ProcessTelemetry;

/// Lifecycle state of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Stopped,
    Running,
    Stopping,
    /// Terminal until restarted (manually or by auto-restart)
    Crashed,
}

impl LifecycleState {
    /// Running or Stopping: the OS process is (still) alive
    pub fn is_active(self) -> bool {
        matches!(self, LifecycleState::Running | LifecycleState::Stopping)
    }

    pub fn can_start(self) -> bool {
        matches!(self, LifecycleState::Stopped | LifecycleState::Crashed)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Stopped => write!(f, "stopped"),
            LifecycleState::Running => write!(f, "running"),
            LifecycleState::Stopping => write!(f, "stopping"),
            LifecycleState::Crashed => write!(f, "crashed"),
        }
    }
}

/// Who asked for a start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Operator request: resets the restart counter
    Manual,
    /// Crash-restart loop: increments the restart counter
    AutoRestart,
}

/// Mutable runtime state of one target
///
/// Invariants:
/// - `stopping_deadline` is `Some` iff `state == Stopping` and a shutdown timeout is configured
/// - `pid` is `Some` only while `state` is Running or Stopping
/// - `restart_count` resets to 0 only on a manual start
#[derive(Debug, Clone)]
pub struct RuntimeRecord {
    pub config: TargetConfig,
    pub state: LifecycleState,
    pub pid: Option<u32>,
    pub cpu_percent: f64,
    pub memory_bytes: u64,
    pub threads: u32,
    pub started_at: Option<i64>,       // epoch ms
    pub stopping_deadline: Option<i64>, // epoch ms
    pub restart_count: u32,
    pub manual_stop: bool,
    /// Service stop already escalated to force-terminate
    pub force_issued: bool,
}

impl RuntimeRecord {
    pub fn new(config: TargetConfig) -> Self {
        Self {
            config,
            state: LifecycleState::Stopped,
            pid: None,
            cpu_percent: 0.0,
            memory_bytes: 0,
            threads: 0,
            started_at: None,
            stopping_deadline: None,
            restart_count: 0,
            manual_stop: false,
            force_issued: false,
        }
    }

    /// {Stopped, Crashed} -> Running
    pub fn mark_running(&mut self, pid: Option<u32>, mode: StartMode, now_millis: i64) -> Result<()> {
        if !self.state.can_start() {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: LifecycleState::Running.to_string(),
            });
        }
        match mode {
            StartMode::Manual => self.restart_count = 0,
            StartMode::AutoRestart => self.restart_count += 1,
        }
        self.state = LifecycleState::Running;
        self.pid = pid;
        self.started_at = Some(now_millis);
        self.stopping_deadline = None;
        self.manual_stop = false;
        self.force_issued = false;
        Ok(())
    }

    /// Running -> Stopping, flagging the stop as manual
    pub fn begin_stopping(&mut self, now_millis: i64) -> Result<()> {
        if self.state != LifecycleState::Running {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: LifecycleState::Stopping.to_string(),
            });
        }
        self.state = LifecycleState::Stopping;
        self.manual_stop = true;
        self.force_issued = false;
        let timeout_ms = i64::try_from(self.config.shutdown_timeout().as_millis()).unwrap_or(i64::MAX);
        self.stopping_deadline = (timeout_ms > 0).then(|| now_millis.saturating_add(timeout_ms));
        Ok(())
    }

    /// Stopping -> Running when the OS reports the target still alive after a failed stop
    pub fn abort_stopping(&mut self) {
        if self.state == LifecycleState::Stopping {
            self.state = LifecycleState::Running;
        }
        self.manual_stop = false;
        self.stopping_deadline = None;
        self.force_issued = false;
    }

    /// Process exit observed: Stopped if the stop was manual, Crashed otherwise
    pub fn mark_exited(&mut self) -> LifecycleState {
        self.state = if self.manual_stop {
            LifecycleState::Stopped
        } else {
            LifecycleState::Crashed
        };
        self.clear_process();
        self.state
    }

    /// Service stop confirmed by the OS
    pub fn finalize_stopped(&mut self) {
        self.state = LifecycleState::Stopped;
        self.clear_process();
    }

    /// Adopt an OS-reported state outside of a stop sequence (service reconciliation)
    pub fn adopt_os_state(&mut self, state: LifecycleState, pid: Option<u32>, now_millis: i64) {
        match state {
            LifecycleState::Running | LifecycleState::Stopping => {
                if !self.state.is_active() || self.started_at.is_none() {
                    self.started_at = Some(now_millis);
                }
                self.state = state;
                self.pid = pid;
            }
            LifecycleState::Stopped | LifecycleState::Crashed => {
                self.state = state;
                self.clear_process();
            }
        }
    }

    pub fn apply_telemetry(&mut self, telemetry: &ProcessTelemetry) {
        self.cpu_percent = telemetry.cpu_percent;
        self.memory_bytes = telemetry.memory_bytes;
        self.threads = telemetry.threads;
    }

    pub fn clear_telemetry(&mut self) {
        self.cpu_percent = 0.0;
        self.memory_bytes = 0;
        self.threads = 0;
    }

    fn clear_process(&mut self) {
        self.pid = None;
        self.started_at = None;
        self.stopping_deadline = None;
        self.force_issued = false;
        self.clear_telemetry();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(timeout_secs: u64) -> RuntimeRecord {
        RuntimeRecord::new(
            TargetConfig::spawned("api", "API", "/bin/api", vec![]).with_shutdown_timeout(timeout_secs),
        )
    }

    #[test]
    fn test_manual_start_resets_restart_counter() {
        let mut rec = record(0);
        rec.restart_count = 7;
        rec.mark_running(Some(42), StartMode::Manual, 1000).unwrap();
        assert_eq!(rec.state, LifecycleState::Running);
        assert_eq!(rec.restart_count, 0);
        assert_eq!(rec.pid, Some(42));
        assert_eq!(rec.started_at, Some(1000));
    }

    #[test]
    fn test_auto_restart_increments_counter() {
        let mut rec = record(0);
        rec.state = LifecycleState::Crashed;
        rec.restart_count = 2;
        rec.mark_running(Some(43), StartMode::AutoRestart, 1000).unwrap();
        assert_eq!(rec.restart_count, 3);
    }

    #[test]
    fn test_start_rejected_while_stopping() {
        let mut rec = record(5);
        rec.mark_running(Some(1), StartMode::Manual, 0).unwrap();
        rec.begin_stopping(10).unwrap();
        assert!(rec.mark_running(Some(2), StartMode::Manual, 20).is_err());
    }

    #[test]
    fn test_stopping_deadline_only_with_timeout() {
        let mut rec = record(5);
        rec.mark_running(Some(1), StartMode::Manual, 0).unwrap();
        rec.begin_stopping(1_000).unwrap();
        assert_eq!(rec.state, LifecycleState::Stopping);
        assert_eq!(rec.stopping_deadline, Some(6_000));
        assert!(rec.manual_stop);

        let mut rec = record(0);
        rec.mark_running(Some(1), StartMode::Manual, 0).unwrap();
        rec.begin_stopping(1_000).unwrap();
        assert_eq!(rec.stopping_deadline, None);
    }

    #[test]
    fn test_huge_timeout_deadline_does_not_overflow() {
        let mut rec = record(u64::MAX);
        rec.mark_running(Some(1), StartMode::Manual, 0).unwrap();
        rec.begin_stopping(i64::MAX - 10).unwrap();
        assert_eq!(rec.stopping_deadline, Some(i64::MAX));

        let mut rec = record(u64::MAX);
        rec.mark_running(Some(1), StartMode::Manual, 0).unwrap();
        rec.begin_stopping(1_000).unwrap();
        assert_eq!(
            rec.stopping_deadline,
            Some(1_000 + crate::domain::target::MAX_SHUTDOWN_TIMEOUT_SECS as i64 * 1000)
        );
    }

    #[test]
    fn test_exit_without_manual_stop_is_crash() {
        let mut rec = record(0);
        rec.mark_running(Some(1), StartMode::Manual, 0).unwrap();
        rec.cpu_percent = 12.5;
        assert_eq!(rec.mark_exited(), LifecycleState::Crashed);
        assert_eq!(rec.pid, None);
        assert_eq!(rec.started_at, None);
        assert_eq!(rec.cpu_percent, 0.0);
    }

    #[test]
    fn test_exit_after_stop_is_stopped() {
        let mut rec = record(3);
        rec.mark_running(Some(1), StartMode::Manual, 0).unwrap();
        rec.begin_stopping(0).unwrap();
        assert_eq!(rec.mark_exited(), LifecycleState::Stopped);
        assert_eq!(rec.stopping_deadline, None);
    }
}
