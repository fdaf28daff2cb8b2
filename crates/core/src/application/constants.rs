// Supervisor constants (no magic values)
use std::time::Duration;

/// Delay before a crashed target with auto-restart is started again (3s)
pub const AUTO_RESTART_DELAY: Duration = Duration::from_secs(3);

/// Liveness poll interval while gracefully stopping a spawned process (500ms)
pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Sampler tick (1 Hz)
pub const SAMPLER_INTERVAL: Duration = Duration::from_secs(1);

/// Metrics history per target (1 hour at 1 Hz)
pub const METRICS_CAPACITY: usize = 3600;

/// Shared lifecycle event log capacity
pub const EVENT_LOG_CAPACITY: usize = 500;

/// Per-subscriber outbound queue depth; also the hub intake depth
pub const HUB_QUEUE_CAPACITY: usize = 64;

/// Bytes read from the end of a log file when tailing (128 KiB)
pub const TAIL_READ_BYTES: u64 = 128 * 1024;

/// Extra time `stop()` waits for the exit watcher after force-terminate
pub const EXIT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(5);
