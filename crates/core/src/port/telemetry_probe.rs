// Per-process telemetry port
use async_trait::async_trait;

use super::os_adapter::AdapterError;
use crate::domain::ProcessTelemetry;

/// Live CPU / memory / thread sampling for a single OS process
#[async_trait]
pub trait TelemetryProbe: Send + Sync {
    /// Sample one process
    ///
    /// # Errors
    /// - AdapterError::QueryFailed if the process is gone or cannot be read
    async fn sample(&self, pid: u32) -> Result<ProcessTelemetry, AdapterError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashSet;

    /// Mock probe returning fixed telemetry, with per-pid failure injection
    pub struct MockTelemetryProbe {
        telemetry: Mutex<ProcessTelemetry>,
        failing: Mutex<HashSet<u32>>,
        calls: Mutex<usize>,
    }

    impl MockTelemetryProbe {
        pub fn new(cpu_percent: f64, memory_bytes: u64, threads: u32) -> Self {
            Self {
                telemetry: Mutex::new(ProcessTelemetry {
                    cpu_percent,
                    memory_bytes,
                    threads,
                }),
                failing: Mutex::new(HashSet::new()),
                calls: Mutex::new(0),
            }
        }

        pub fn set_telemetry(&self, telemetry: ProcessTelemetry) {
            *self.telemetry.lock() = telemetry;
        }

        pub fn fail_for(&self, pid: u32) {
            self.failing.lock().insert(pid);
        }

        pub fn call_count(&self) -> usize {
            *self.calls.lock()
        }
    }

    impl Default for MockTelemetryProbe {
        fn default() -> Self {
            Self::new(5.0, 64 * 1024 * 1024, 4)
        }
    }

    #[async_trait]
    impl TelemetryProbe for MockTelemetryProbe {
        async fn sample(&self, pid: u32) -> Result<ProcessTelemetry, AdapterError> {
            *self.calls.lock() += 1;
            if self.failing.lock().contains(&pid) {
                return Err(AdapterError::QueryFailed(format!("process {} not readable", pid)));
            }
            Ok(*self.telemetry.lock())
        }
    }
}
