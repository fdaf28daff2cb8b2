// Status Snapshot Record

use serde::{Deserialize, Serialize};

use super::lifecycle::{LifecycleState, RuntimeRecord};
use super::telemetry::bytes_to_mb;

/// Immutable per-target status, one entry of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetStatus {
    pub id: String,
    pub name: String,
    pub state: LifecycleState,
    pub pid: u32,
    pub cpu: f64,
    pub memory_mb: f64,
    pub threads: u32,
    pub started_at: i64,        // epoch ms, 0 if not running
    pub stopping_deadline: i64, // epoch ms, 0 if not stopping
    pub restart_count: u32,
    pub auto_restart: bool,
    pub executable: String,
    pub working_dir: String,
    pub is_service: bool,
    pub category: String,
}

impl From<&RuntimeRecord> for TargetStatus {
    fn from(rec: &RuntimeRecord) -> Self {
        Self {
            id: rec.config.id.clone(),
            name: rec.config.name.clone(),
            state: rec.state,
            pid: rec.pid.unwrap_or(0),
            cpu: rec.cpu_percent,
            memory_mb: bytes_to_mb(rec.memory_bytes),
            threads: rec.threads,
            started_at: rec.started_at.unwrap_or(0),
            stopping_deadline: rec.stopping_deadline.unwrap_or(0),
            restart_count: rec.restart_count,
            auto_restart: rec.config.auto_restart,
            executable: rec.config.executable().to_string(),
            working_dir: rec.config.working_dir().unwrap_or_default().to_string(),
            is_service: rec.config.is_service(),
            category: rec.config.category.clone().unwrap_or_default(),
        }
    }
}
