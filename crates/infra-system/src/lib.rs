// procwatch Infrastructure - System Adapters
// Implements: OsAdapter (spawned processes, host services), TelemetryProbe

pub mod dispatcher;
pub mod service;
pub mod spawned_process;
pub mod sysinfo_probe;

mod command;

pub use dispatcher::KindDispatcher;
pub use service::ServiceAdapter;
pub use spawned_process::SpawnedProcessAdapter;
pub use sysinfo_probe::SysinfoProbe;
