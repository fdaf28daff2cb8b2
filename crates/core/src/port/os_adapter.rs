// OS Adapter Port
// One interface, two strategies: spawned executables and host-managed services

use std::path::Path;

use async_trait::async_trait;
use futures::future::BoxFuture;
use thiserror::Error;

use crate::domain::TargetConfig;

/// Adapter errors
#[derive(Error, Debug)]
pub enum AdapterError {
    /// Process could not be created, or its log sink / input pipe could not be opened
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Signal failed: {0}")]
    SignalFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Service-manager command reported failure
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How hard to ask a target to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// SIGTERM / service stop request
    Soft,
    /// SIGKILL / taskkill /F
    Force,
}

/// OS-reported state, before it is mapped onto the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsState {
    Running,
    StopPending,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveState {
    pub state: OsState,
    pub pid: Option<u32>,
}

impl LiveState {
    pub fn stopped() -> Self {
        Self {
            state: OsState::Stopped,
            pid: None,
        }
    }

    pub fn running(pid: Option<u32>) -> Self {
        Self {
            state: OsState::Running,
            pid,
        }
    }
}

/// Exit status reported by the exit watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitInfo {
    /// None when the process was terminated by a signal
    pub code: Option<i32>,
}

/// Result of a successful start
pub struct Launch {
    pub pid: Option<u32>,
    /// Resolves once the OS process terminates (spawned kind only).
    /// The future owns the child handle and keeps its stdin pipe open until exit.
    pub exit: Option<BoxFuture<'static, ExitInfo>>,
}

impl Launch {
    pub fn service(pid: Option<u32>) -> Self {
        Self { pid, exit: None }
    }
}

/// OS adapter trait
///
/// Implementations:
/// - SpawnedProcessAdapter: child processes owned by the supervisor
/// - ServiceAdapter: systemd units / Windows services
/// - KindDispatcher: routes by `TargetKind`
#[async_trait]
pub trait OsAdapter: Send + Sync {
    /// Start a target, redirecting output into `log_path` (spawned kind)
    ///
    /// # Errors
    /// - AdapterError::SpawnFailed if the process, log sink or stdin pipe cannot be created
    /// - AdapterError::CommandFailed if the service manager rejects the start
    async fn start(&self, config: &TargetConfig, log_path: &Path) -> Result<Launch, AdapterError>;

    /// Deliver a stop request
    ///
    /// Stopping a process that is already gone is not an error.
    async fn stop(
        &self,
        config: &TargetConfig,
        pid: Option<u32>,
        signal: StopSignal,
    ) -> Result<(), AdapterError>;

    /// Ask the OS what is actually running right now
    async fn query_live_state(
        &self,
        config: &TargetConfig,
        pid: Option<u32>,
    ) -> Result<LiveState, AdapterError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::TargetKind;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use tokio::sync::oneshot;

    struct MockState {
        next_pid: u32,
        live: HashMap<u32, oneshot::Sender<ExitInfo>>,
        spawn_count: usize,
        soft_count: usize,
        force_count: usize,
        start_failure: Option<String>,
        exit_on_soft: bool,
        services: HashMap<String, LiveState>,
        service_after_soft: OsState,
        service_stop_failure: Option<String>,
        query_failure: bool,
    }

    /// Mock OS adapter: fake pids, exits triggered by the test
    pub struct MockOsAdapter {
        state: Mutex<MockState>,
    }

    impl Default for MockOsAdapter {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockOsAdapter {
        /// Processes exit promptly on soft terminate; services stop immediately
        pub fn new() -> Self {
            Self {
                state: Mutex::new(MockState {
                    next_pid: 1000,
                    live: HashMap::new(),
                    spawn_count: 0,
                    soft_count: 0,
                    force_count: 0,
                    start_failure: None,
                    exit_on_soft: true,
                    services: HashMap::new(),
                    service_after_soft: OsState::Stopped,
                    service_stop_failure: None,
                    query_failure: false,
                }),
            }
        }

        /// Processes ignore soft terminate and must be force-killed
        pub fn new_stubborn() -> Self {
            let mock = Self::new();
            mock.state.lock().exit_on_soft = false;
            mock
        }

        pub fn set_start_failure(&self, message: Option<&str>) {
            self.state.lock().start_failure = message.map(str::to_string);
        }

        pub fn set_exit_on_soft(&self, exit: bool) {
            self.state.lock().exit_on_soft = exit;
        }

        /// State a service lands in after a soft stop request
        pub fn set_service_after_soft(&self, state: OsState) {
            self.state.lock().service_after_soft = state;
        }

        pub fn set_service_stop_failure(&self, message: Option<&str>) {
            self.state.lock().service_stop_failure = message.map(str::to_string);
        }

        pub fn set_service_state(&self, service_name: &str, live: LiveState) {
            self.state.lock().services.insert(service_name.to_string(), live);
        }

        pub fn set_query_failure(&self, fail: bool) {
            self.state.lock().query_failure = fail;
        }

        /// Simulate an unexpected exit of a spawned process
        pub fn crash(&self, pid: u32) -> bool {
            self.exit(pid, ExitInfo { code: Some(1) })
        }

        pub fn exit(&self, pid: u32, info: ExitInfo) -> bool {
            match self.state.lock().live.remove(&pid) {
                Some(tx) => {
                    let _ = tx.send(info);
                    true
                }
                None => false,
            }
        }

        pub fn is_live(&self, pid: u32) -> bool {
            self.state.lock().live.contains_key(&pid)
        }

        pub fn spawn_count(&self) -> usize {
            self.state.lock().spawn_count
        }

        pub fn soft_count(&self) -> usize {
            self.state.lock().soft_count
        }

        pub fn force_count(&self) -> usize {
            self.state.lock().force_count
        }
    }

    #[async_trait]
    impl OsAdapter for MockOsAdapter {
        async fn start(&self, config: &TargetConfig, _log_path: &Path) -> Result<Launch, AdapterError> {
            let mut state = self.state.lock();
            if let Some(msg) = &state.start_failure {
                return Err(AdapterError::SpawnFailed(msg.clone()));
            }
            state.spawn_count += 1;
            let pid = state.next_pid;
            state.next_pid += 1;

            match &config.kind {
                TargetKind::Spawned { .. } => {
                    let (tx, rx) = oneshot::channel();
                    state.live.insert(pid, tx);
                    let exit: BoxFuture<'static, ExitInfo> =
                        Box::pin(async move { rx.await.unwrap_or_default() });
                    Ok(Launch {
                        pid: Some(pid),
                        exit: Some(exit),
                    })
                }
                TargetKind::Service { service_name } => {
                    state
                        .services
                        .insert(service_name.clone(), LiveState::running(Some(pid)));
                    Ok(Launch::service(Some(pid)))
                }
            }
        }

        async fn stop(
            &self,
            config: &TargetConfig,
            pid: Option<u32>,
            signal: StopSignal,
        ) -> Result<(), AdapterError> {
            let mut state = self.state.lock();
            match signal {
                StopSignal::Soft => state.soft_count += 1,
                StopSignal::Force => state.force_count += 1,
            }

            match &config.kind {
                TargetKind::Spawned { .. } => {
                    let Some(pid) = pid else { return Ok(()) };
                    let exits = signal == StopSignal::Force || state.exit_on_soft;
                    if exits {
                        if let Some(tx) = state.live.remove(&pid) {
                            let code = (signal == StopSignal::Soft).then_some(0);
                            let _ = tx.send(ExitInfo { code });
                        }
                    }
                    Ok(())
                }
                TargetKind::Service { service_name } => {
                    if let Some(msg) = &state.service_stop_failure {
                        return Err(AdapterError::CommandFailed(msg.clone()));
                    }
                    let next = match signal {
                        StopSignal::Soft => state.service_after_soft,
                        StopSignal::Force => OsState::Stopped,
                    };
                    let current_pid = state.services.get(service_name).and_then(|s| s.pid);
                    let live = match next {
                        OsState::Stopped => LiveState::stopped(),
                        other => LiveState {
                            state: other,
                            pid: current_pid,
                        },
                    };
                    state.services.insert(service_name.clone(), live);
                    Ok(())
                }
            }
        }

        async fn query_live_state(
            &self,
            config: &TargetConfig,
            pid: Option<u32>,
        ) -> Result<LiveState, AdapterError> {
            let state = self.state.lock();
            if state.query_failure {
                return Err(AdapterError::QueryFailed("mock query failure".to_string()));
            }
            match &config.kind {
                TargetKind::Spawned { .. } => Ok(match pid {
                    Some(pid) if state.live.contains_key(&pid) => LiveState::running(Some(pid)),
                    _ => LiveState::stopped(),
                }),
                TargetKind::Service { service_name } => Ok(state
                    .services
                    .get(service_name)
                    .copied()
                    .unwrap_or_else(LiveState::stopped)),
            }
        }
    }
}
