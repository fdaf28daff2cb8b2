// Lifecycle Event Model

use serde::{Deserialize, Serialize};

/// Kind of lifecycle transition recorded in the event log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Started,
    Stopped,
    Crashed,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Started => write!(f, "started"),
            EventKind::Stopped => write!(f, "stopped"),
            EventKind::Crashed => write!(f, "crashed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub timestamp_ms: i64,
    pub target_id: String,
    pub target_name: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
}
