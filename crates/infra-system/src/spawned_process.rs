// Spawned-process adapter
// reason: tokio::process for the awaited exit, nix signals for graceful stop
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fs::OpenOptions;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

use procwatch_core::domain::{TargetConfig, TargetKind};
use procwatch_core::port::{
    AdapterError, ExitInfo, Launch, LiveState, OsAdapter, StopSignal,
};

/// Launches executables with output appended to a log file
///
/// stdin is a pipe whose write end stays open for the life of the child, so
/// programs that read stdin never see end-of-input.
#[derive(Debug, Default)]
pub struct SpawnedProcessAdapter;

impl SpawnedProcessAdapter {
    pub fn new() -> Self {
        Self
    }

    fn build_command(
        executable: &str,
        args: &[String],
        working_dir: Option<&str>,
        log_path: &Path,
    ) -> Result<Command, AdapterError> {
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .map_err(|e| {
                AdapterError::SpawnFailed(format!("open log {}: {}", log_path.display(), e))
            })?;
        let err_log = log
            .try_clone()
            .map_err(|e| AdapterError::SpawnFailed(format!("duplicate log handle: {}", e)))?;

        let mut cmd = Command::new(shellexpand::tilde(executable).as_ref());
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(err_log));
        if let Some(dir) = working_dir.filter(|d| !d.is_empty()) {
            cmd.current_dir(shellexpand::tilde(dir).as_ref());
        }
        Ok(cmd)
    }

    #[cfg(unix)]
    async fn signal(&self, pid: u32, signal: StopSignal) -> Result<(), AdapterError> {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let sig = match signal {
            StopSignal::Soft => Signal::SIGTERM,
            StopSignal::Force => Signal::SIGKILL,
        };
        debug!(pid, signal = ?sig, "Sending signal");
        match kill(Pid::from_raw(pid as i32), sig) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(AdapterError::SignalFailed(format!("{:?} to {}: {}", sig, pid, e))),
        }
    }

    #[cfg(windows)]
    async fn signal(&self, pid: u32, signal: StopSignal) -> Result<(), AdapterError> {
        let pid_str = pid.to_string();
        let args: Vec<&str> = match signal {
            StopSignal::Soft => vec!["/PID", &pid_str],
            StopSignal::Force => vec!["/F", "/PID", &pid_str],
        };
        let out = crate::command::run("taskkill", &args).await?;
        // Soft taskkill fails for console programs without a window; the caller escalates
        if !out.success && signal == StopSignal::Force && self.is_alive(pid).await {
            return Err(AdapterError::SignalFailed(format!("taskkill: {}", out.text)));
        }
        Ok(())
    }

    #[cfg(unix)]
    async fn is_alive(&self, pid: u32) -> bool {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        // Signal 0 checks existence without delivering anything
        matches!(
            kill(Pid::from_raw(pid as i32), None::<Signal>),
            Ok(()) | Err(Errno::EPERM)
        )
    }

    #[cfg(windows)]
    async fn is_alive(&self, pid: u32) -> bool {
        let filter = format!("PID eq {}", pid);
        match crate::command::run("tasklist", &["/FI", &filter, "/NH"]).await {
            Ok(out) => out.text.contains(&pid.to_string()),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl OsAdapter for SpawnedProcessAdapter {
    async fn start(&self, config: &TargetConfig, log_path: &Path) -> Result<Launch, AdapterError> {
        let TargetKind::Spawned {
            executable,
            args,
            working_dir,
        } = &config.kind
        else {
            return Err(AdapterError::SpawnFailed(format!(
                "target {} is not a spawned executable",
                config.id
            )));
        };

        let mut cmd = Self::build_command(executable, args, working_dir.as_deref(), log_path)?;
        let mut child = cmd
            .spawn()
            .map_err(|e| AdapterError::SpawnFailed(format!("{}: {}", executable, e)))?;

        let pid = child.id();
        let stdin = child.stdin.take();
        if stdin.is_none() {
            let _ = child.start_kill();
            return Err(AdapterError::SpawnFailed("stdin pipe not available".to_string()));
        }

        info!(
            target_id = %config.id,
            pid = ?pid,
            executable = %executable,
            args = ?args,
            log = %log_path.display(),
            "Process spawned"
        );

        let target_id = config.id.clone();
        let exit: BoxFuture<'static, ExitInfo> = Box::pin(async move {
            // Write end of the stdin pipe lives exactly as long as the child
            let _stdin = stdin;
            match child.wait().await {
                Ok(status) => ExitInfo {
                    code: status.code(),
                },
                Err(e) => {
                    warn!(target_id = %target_id, error = %e, "Waiting for process failed");
                    ExitInfo::default()
                }
            }
        });

        Ok(Launch {
            pid,
            exit: Some(exit),
        })
    }

    async fn stop(
        &self,
        _config: &TargetConfig,
        pid: Option<u32>,
        signal: StopSignal,
    ) -> Result<(), AdapterError> {
        match pid {
            Some(pid) => self.signal(pid, signal).await,
            None => Ok(()),
        }
    }

    async fn query_live_state(
        &self,
        _config: &TargetConfig,
        pid: Option<u32>,
    ) -> Result<LiveState, AdapterError> {
        match pid {
            Some(pid) if self.is_alive(pid).await => Ok(LiveState::running(Some(pid))),
            _ => Ok(LiveState::stopped()),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use procwatch_core::port::OsState;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::{sleep, timeout};

    fn target(executable: &str, args: &[&str]) -> TargetConfig {
        TargetConfig::spawned(
            "t",
            "Test",
            executable,
            args.iter().map(|a| a.to_string()).collect(),
        )
    }

    #[tokio::test]
    async fn test_output_goes_to_log_file() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("t.log");
        let adapter = SpawnedProcessAdapter::new();

        let launch = adapter.start(&target("echo", &["hello"]), &log).await.unwrap();
        let info = timeout(Duration::from_secs(5), launch.exit.unwrap()).await.unwrap();
        assert_eq!(info.code, Some(0));

        let contents = std::fs::read_to_string(&log).unwrap();
        assert!(contents.contains("hello"));
    }

    #[tokio::test]
    async fn test_stdin_reader_does_not_see_eof() {
        let dir = TempDir::new().unwrap();
        let adapter = SpawnedProcessAdapter::new();
        let config = target("cat", &[]);

        let launch = adapter.start(&config, &dir.path().join("t.log")).await.unwrap();
        let mut exit = launch.exit.unwrap();
        let pid = launch.pid;

        // cat exits immediately on EOF; it must still be alive
        sleep(Duration::from_millis(300)).await;
        let live = adapter.query_live_state(&config, pid).await.unwrap();
        assert_eq!(live.state, OsState::Running);
        assert!(timeout(Duration::from_millis(50), &mut exit).await.is_err());

        adapter.stop(&config, pid, StopSignal::Force).await.unwrap();
        let info = timeout(Duration::from_secs(5), exit).await.unwrap();
        assert_eq!(info.code, None);
    }

    #[tokio::test]
    async fn test_soft_terminate_ends_process() {
        let dir = TempDir::new().unwrap();
        let adapter = SpawnedProcessAdapter::new();
        let config = target("sleep", &["30"]);

        let launch = adapter.start(&config, &dir.path().join("t.log")).await.unwrap();
        adapter.stop(&config, launch.pid, StopSignal::Soft).await.unwrap();
        timeout(Duration::from_secs(5), launch.exit.unwrap()).await.unwrap();

        let live = adapter.query_live_state(&config, launch.pid).await.unwrap();
        assert_eq!(live.state, OsState::Stopped);
    }

    #[tokio::test]
    async fn test_missing_executable_fails_to_spawn() {
        let dir = TempDir::new().unwrap();
        let adapter = SpawnedProcessAdapter::new();
        let result = adapter
            .start(&target("/nonexistent/procwatch-test-bin", &[]), &dir.path().join("t.log"))
            .await;
        assert!(matches!(result, Err(AdapterError::SpawnFailed(_))));
    }

    #[tokio::test]
    async fn test_unwritable_log_fails_to_spawn() {
        let dir = TempDir::new().unwrap();
        let adapter = SpawnedProcessAdapter::new();
        let log = dir.path().join("missing-dir").join("t.log");
        let result = adapter.start(&target("sleep", &["1"]), &log).await;
        assert!(matches!(result, Err(AdapterError::SpawnFailed(_))));
    }

    #[tokio::test]
    async fn test_stop_of_exited_process_is_ok() {
        let adapter = SpawnedProcessAdapter::new();
        let config = target("sleep", &["1"]);
        // pid_max on Linux is below this
        adapter
            .stop(&config, Some(4_000_000), StopSignal::Force)
            .await
            .unwrap();
        adapter.stop(&config, None, StopSignal::Soft).await.unwrap();
    }
}
