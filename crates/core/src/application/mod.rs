// Application Layer - Supervision engine

pub mod constants;
pub mod history;
pub mod hub;
pub mod logs;
pub mod registry;
pub mod sampler;
pub mod shutdown;
pub mod supervisor;

// Re-exports
pub use history::{EventLog, MetricsHistory};
pub use hub::{BroadcastHub, Payload, Subscription};
pub use registry::{Registry, TargetSlot};
pub use sampler::Sampler;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
pub use supervisor::{BatchReport, Supervisor, SupervisorSettings};
