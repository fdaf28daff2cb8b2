// Per-process telemetry via sysinfo
// reason: sysinfo for cross-platform CPU / memory readings
use async_trait::async_trait;
use parking_lot::Mutex;
use sysinfo::{Pid, System};
use tracing::trace;

use procwatch_core::domain::ProcessTelemetry;
use procwatch_core::port::{AdapterError, TelemetryProbe};

/// Telemetry probe backed by one long-lived `System`
///
/// CPU usage is computed between consecutive refreshes, so the first sample of
/// a new pid reads 0%.
pub struct SysinfoProbe {
    system: Mutex<System>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "linux")]
fn thread_count(pid: u32) -> u32 {
    std::fs::read_dir(format!("/proc/{}/task", pid))
        .map(|entries| entries.count() as u32)
        .unwrap_or(0)
}

#[cfg(not(target_os = "linux"))]
fn thread_count(_pid: u32) -> u32 {
    0
}

#[async_trait]
impl TelemetryProbe for SysinfoProbe {
    async fn sample(&self, pid: u32) -> Result<ProcessTelemetry, AdapterError> {
        let spid = Pid::from_u32(pid);
        let (cpu_percent, memory_bytes) = {
            let mut sys = self.system.lock();
            if !sys.refresh_process(spid) {
                return Err(AdapterError::QueryFailed(format!("process {} not found", pid)));
            }
            let process = sys
                .process(spid)
                .ok_or_else(|| AdapterError::QueryFailed(format!("process {} not found", pid)))?;
            (process.cpu_usage() as f64, process.memory())
        };

        let telemetry = ProcessTelemetry {
            cpu_percent,
            memory_bytes,
            threads: thread_count(pid),
        };
        trace!(pid, cpu = telemetry.cpu_percent, mem = telemetry.memory_bytes, threads = telemetry.threads, "Process sampled");
        Ok(telemetry)
    }
}
