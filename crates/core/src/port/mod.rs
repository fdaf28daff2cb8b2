// Port Layer - Interfaces for external dependencies

pub mod config_store;
pub mod os_adapter;
pub mod telemetry_probe;
pub mod time_provider; // For deterministic testing

// Re-exports
pub use config_store::{ConfigStore, ConfigStoreError};
pub use os_adapter::{AdapterError, ExitInfo, Launch, LiveState, OsAdapter, OsState, StopSignal};
pub use telemetry_probe::TelemetryProbe;
pub use time_provider::{SystemTimeProvider, TimeProvider};
