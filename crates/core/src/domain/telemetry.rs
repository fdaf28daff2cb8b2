// Telemetry Domain Model

use serde::{Deserialize, Serialize};

/// One point of per-target metrics history (1 Hz)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp_ms: i64,
    pub cpu: f64,
    pub mem_mb: f64,
}

impl MetricSample {
    pub fn new(timestamp_ms: i64, telemetry: &ProcessTelemetry) -> Self {
        Self {
            timestamp_ms,
            cpu: telemetry.cpu_percent,
            mem_mb: telemetry.memory_mb(),
        }
    }
}

/// Live OS telemetry for one process
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProcessTelemetry {
    pub cpu_percent: f64,
    pub memory_bytes: u64,
    pub threads: u32,
}

impl ProcessTelemetry {
    pub fn memory_mb(&self) -> f64 {
        bytes_to_mb(self.memory_bytes)
    }
}

pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}
