//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results.

use procwatch_core::domain::{LifecycleEvent, MetricSample, SupervisorConfig, TargetStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Upper bound for `targets.metrics.v1` windows (one hour of 1 Hz samples)
pub const MAX_METRICS_WINDOW_SECS: usize = 3600;
pub const MAX_TAIL_LINES: usize = 500;

/// targets.list.v1 - Snapshot of every target in registration order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListTargetsResponse {
    pub targets: Vec<TargetStatus>,
}

/// targets.start.v1 / targets.stop.v1
#[derive(Debug, Deserialize)]
pub struct TargetRequest {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetResponse {
    pub target: TargetStatus,
}

/// targets.start_all.v1 / targets.stop_all.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    pub succeeded: Vec<String>,
    pub errors: BTreeMap<String, String>,
    pub partial_failure: bool,
}

/// targets.auto_restart.v1 - Toggle auto-restart (persisted)
#[derive(Debug, Deserialize)]
pub struct AutoRestartRequest {
    pub id: String,
    pub enabled: bool,
}

/// targets.metrics.v1 - Metrics history for one target
#[derive(Debug, Deserialize)]
pub struct MetricsRequest {
    pub id: String,
    #[serde(default = "default_window")]
    pub window_secs: usize,
}

fn default_window() -> usize {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub id: String,
    pub samples: Vec<MetricSample>,
}

/// events.list.v1 - Lifecycle event log, oldest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsResponse {
    pub events: Vec<LifecycleEvent>,
}

/// logs.tail.v1 - Tail a spawned target's log file
#[derive(Debug, Deserialize)]
pub struct TailLogsRequest {
    pub id: String,
    #[serde(default = "default_lines")]
    pub lines: usize,
}

fn default_lines() -> usize {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TailLogsResponse {
    pub id: String,
    pub log_path: Option<String>,
    pub lines: Vec<String>,
}

/// config.replace.v1 - Validate, apply and persist a new document
#[derive(Debug, Deserialize)]
pub struct ReplaceConfigRequest {
    pub config: SupervisorConfig,
}

/// config.get.v1 / config.replace.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub config: SupervisorConfig,
}
