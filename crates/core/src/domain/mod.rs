// Domain Layer - Targets, lifecycle state and telemetry records

pub mod error;
pub mod event;
pub mod lifecycle;
pub mod ring_buffer;
pub mod status;
pub mod target;
pub mod telemetry;
pub mod validation;

// Re-exports
pub use error::DomainError;
pub use event::{EventKind, LifecycleEvent};
pub use lifecycle::{LifecycleState, RuntimeRecord, StartMode};
pub use ring_buffer::RingBuffer;
pub use status::TargetStatus;
pub use target::{LogRotation, SupervisorConfig, TargetConfig, TargetId, TargetKind, MAX_SHUTDOWN_TIMEOUT_SECS};
pub use telemetry::{MetricSample, ProcessTelemetry};
pub use validation::{validate_config, validate_target};
