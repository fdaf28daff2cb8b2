// Host service adapter
// Unix: systemd via systemctl. Windows: net start/stop + sc queryex.
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info, warn};

use procwatch_core::domain::{TargetConfig, TargetKind};
use procwatch_core::port::{AdapterError, Launch, LiveState, OsAdapter, OsState, StopSignal};

use crate::command;

#[derive(Debug, Default)]
pub struct ServiceAdapter;

impl ServiceAdapter {
    pub fn new() -> Self {
        Self
    }
}

fn service_name(config: &TargetConfig) -> Result<&str, AdapterError> {
    match &config.kind {
        TargetKind::Service { service_name } => Ok(service_name),
        TargetKind::Spawned { .. } => Err(AdapterError::CommandFailed(format!(
            "target {} is not a service",
            config.id
        ))),
    }
}

/// Parse `systemctl show --property=ActiveState,MainPID` output
pub fn parse_systemctl_show(output: &str) -> LiveState {
    let mut state = OsState::Stopped;
    let mut pid = None;
    for line in output.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        match key {
            "ActiveState" => {
                state = match value {
                    "active" | "activating" | "reloading" => OsState::Running,
                    "deactivating" => OsState::StopPending,
                    _ => OsState::Stopped,
                }
            }
            "MainPID" => pid = value.parse::<u32>().ok().filter(|p| *p > 0),
            _ => {}
        }
    }
    if state == OsState::Stopped {
        pid = None;
    }
    LiveState { state, pid }
}

/// Parse `sc queryex <name>` output (STOP_PENDING is checked before RUNNING)
pub fn parse_sc_queryex(output: &str) -> LiveState {
    let state = if output.contains("STOP_PENDING") {
        OsState::StopPending
    } else if output.contains("RUNNING") {
        OsState::Running
    } else {
        OsState::Stopped
    };

    let pid = output
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("PID"))
        .and_then(|line| line.split_once(':'))
        .and_then(|(_, value)| value.trim().parse::<u32>().ok())
        .filter(|p| *p > 0);

    LiveState { state, pid }
}

#[cfg(unix)]
impl ServiceAdapter {
    async fn start_service(&self, name: &str) -> Result<(), AdapterError> {
        let out = command::run("systemctl", &["start", name]).await?;
        if !out.success {
            return Err(AdapterError::CommandFailed(format!("systemctl start {}: {}", name, out.text)));
        }
        Ok(())
    }

    async fn stop_service(&self, name: &str, signal: StopSignal) -> Result<(), AdapterError> {
        if signal == StopSignal::Force {
            let out = command::run("systemctl", &["kill", "--signal=SIGKILL", name]).await?;
            if !out.success {
                debug!(service = name, output = %out.text, "systemctl kill reported failure");
            }
        }
        // --no-block: the sampler observes the transition through query()
        let out = command::run("systemctl", &["stop", "--no-block", name]).await?;
        if !out.success {
            return Err(AdapterError::CommandFailed(format!("systemctl stop {}: {}", name, out.text)));
        }
        Ok(())
    }

    async fn query(&self, name: &str) -> Result<LiveState, AdapterError> {
        let out = command::run(
            "systemctl",
            &["show", name, "--property=ActiveState,MainPID"],
        )
        .await?;
        if !out.success {
            return Err(AdapterError::QueryFailed(format!("systemctl show {}: {}", name, out.text)));
        }
        Ok(parse_systemctl_show(&out.text))
    }
}

#[cfg(windows)]
impl ServiceAdapter {
    async fn start_service(&self, name: &str) -> Result<(), AdapterError> {
        let out = command::run("net", &["start", name]).await?;
        if !out.success {
            if out.text.contains("already been started") {
                debug!(service = name, "Service already started");
                return Ok(());
            }
            return Err(AdapterError::CommandFailed(format!("net start {}: {}", name, out.text)));
        }
        Ok(())
    }

    async fn stop_service(&self, name: &str, signal: StopSignal) -> Result<(), AdapterError> {
        if signal == StopSignal::Force {
            if let Some(pid) = self.query(name).await?.pid {
                let pid = pid.to_string();
                let out = command::run("taskkill", &["/F", "/PID", &pid]).await?;
                if !out.success {
                    return Err(AdapterError::SignalFailed(format!("taskkill {}: {}", pid, out.text)));
                }
            }
            return Ok(());
        }

        let out = command::run("net", &["stop", name]).await?;
        if !out.success {
            if out.text.contains("not started") {
                debug!(service = name, "Service was not started");
                return Ok(());
            }
            return Err(AdapterError::CommandFailed(format!("net stop {}: {}", name, out.text)));
        }
        Ok(())
    }

    async fn query(&self, name: &str) -> Result<LiveState, AdapterError> {
        let out = command::run("sc", &["queryex", name]).await?;
        if !out.success {
            return Err(AdapterError::QueryFailed(format!("sc queryex {}: {}", name, out.text)));
        }
        Ok(parse_sc_queryex(&out.text))
    }
}

#[async_trait]
impl OsAdapter for ServiceAdapter {
    async fn start(&self, config: &TargetConfig, _log_path: &Path) -> Result<Launch, AdapterError> {
        let name = service_name(config)?;
        self.start_service(name).await?;

        let pid = match self.query(name).await {
            Ok(live) => live.pid,
            Err(e) => {
                warn!(service = name, error = %e, "Service started but state query failed");
                None
            }
        };
        info!(target_id = %config.id, service = name, pid = ?pid, "Service start requested");
        Ok(Launch::service(pid))
    }

    async fn stop(
        &self,
        config: &TargetConfig,
        _pid: Option<u32>,
        signal: StopSignal,
    ) -> Result<(), AdapterError> {
        let name = service_name(config)?;
        info!(target_id = %config.id, service = name, signal = ?signal, "Service stop requested");
        self.stop_service(name, signal).await
    }

    async fn query_live_state(
        &self,
        config: &TargetConfig,
        _pid: Option<u32>,
    ) -> Result<LiveState, AdapterError> {
        self.query(service_name(config)?).await
    }
}
