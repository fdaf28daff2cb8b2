// Bounded in-memory histories (per-target metrics, shared event log)

use parking_lot::Mutex;

use crate::domain::{LifecycleEvent, MetricSample, RingBuffer};

/// Per-target metrics ring, one sample per sampler tick
pub struct MetricsHistory {
    buf: Mutex<RingBuffer<MetricSample>>,
}

impl MetricsHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Mutex::new(RingBuffer::new(capacity)),
        }
    }

    pub fn push(&self, sample: MetricSample) {
        self.buf.lock().push(sample);
    }

    /// Most recent `window_secs` samples, chronological (window clamped to capacity)
    pub fn window(&self, window_secs: usize) -> Vec<MetricSample> {
        let buf = self.buf.lock();
        let k = window_secs.min(buf.capacity());
        buf.last(k)
    }

    pub fn len(&self) -> usize {
        self.buf.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lifecycle events shared across all targets
pub struct EventLog {
    buf: Mutex<RingBuffer<LifecycleEvent>>,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Mutex::new(RingBuffer::new(capacity)),
        }
    }

    pub fn record(&self, event: LifecycleEvent) {
        self.buf.lock().push(event);
    }

    /// Every retained event, oldest first
    pub fn all(&self) -> Vec<LifecycleEvent> {
        self.buf.lock().to_vec()
    }

    pub fn len(&self) -> usize {
        self.buf.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EventKind;

    #[test]
    fn test_metrics_window_is_clamped() {
        let history = MetricsHistory::new(3);
        for ts in 0..5 {
            history.push(MetricSample {
                timestamp_ms: ts,
                cpu: 1.0,
                mem_mb: 2.0,
            });
        }
        let window = history.window(10_000);
        assert_eq!(window.len(), 3);
        assert_eq!(
            window.iter().map(|s| s.timestamp_ms).collect::<Vec<_>>(),
            vec![2, 3, 4]
        );
        assert_eq!(history.window(1)[0].timestamp_ms, 4);
    }

    #[test]
    fn test_event_log_keeps_newest() {
        let log = EventLog::new(2);
        for (ts, kind) in [(1, EventKind::Started), (2, EventKind::Crashed), (3, EventKind::Started)] {
            log.record(LifecycleEvent {
                timestamp_ms: ts,
                target_id: "api".to_string(),
                target_name: "API".to_string(),
                kind,
            });
        }
        let events = log.all();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::Crashed);
        assert_eq!(events[1].timestamp_ms, 3);
    }
}
