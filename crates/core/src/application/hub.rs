//! # Snapshot fan-out to a dynamic subscriber set.
//!
//! ```text
//! publish(snapshot) ──► serialize once ──► [intake] ──► run() ──┬──► [queue 1] ──► subscriber 1
//!                                          (bounded)            ├──► [queue 2] ──► subscriber 2
//!                                                               └──► [queue N] ──► subscriber N
//! ```
//!
//! ## Rules
//! - **Non-blocking**: `publish()` and delivery use `try_send`; nothing waits on a slow consumer
//! - **Overflow**: a full queue drops that message for that subscriber only
//! - **Pruning**: a subscriber whose receiver is gone is removed on the next delivery
//! - **Per-subscriber FIFO**: gaps are possible, reordering is not

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info};

use crate::application::shutdown::ShutdownToken;
use crate::error::{AppError, Result};

/// Serialized message shared by every subscriber
pub type Payload = Arc<str>;

/// Receiving end handed to a subscriber
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<Payload>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next payload, `None` once unsubscribed and drained
    pub async fn recv(&mut self) -> Option<Payload> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Payload> {
        self.rx.try_recv().ok()
    }
}

pub struct BroadcastHub {
    subscribers: RwLock<BTreeMap<u64, mpsc::Sender<Payload>>>,
    next_id: AtomicU64,
    queue_capacity: usize,
    intake_tx: mpsc::Sender<Payload>,
    intake_rx: Mutex<Option<mpsc::Receiver<Payload>>>,
}

impl BroadcastHub {
    /// Minimum queue capacity is 1
    pub fn new(queue_capacity: usize) -> Self {
        let queue_capacity = queue_capacity.max(1);
        let (intake_tx, intake_rx) = mpsc::channel(queue_capacity);
        Self {
            subscribers: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            queue_capacity,
            intake_tx,
            intake_rx: Mutex::new(Some(intake_rx)),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        self.subscribers.write().insert(id, tx);
        debug!(subscriber_id = id, "Subscriber registered");
        Subscription { id, rx }
    }

    /// Stop delivering to `id`; already-queued payloads can still be drained
    pub fn unsubscribe(&self, id: u64) -> bool {
        let removed = self.subscribers.write().remove(&id).is_some();
        if removed {
            debug!(subscriber_id = id, "Subscriber unregistered");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Serialize once and enqueue for delivery (dropped if the intake is full)
    pub fn publish<T: Serialize + ?Sized>(&self, message: &T) -> Result<()> {
        let json = serde_json::to_string(message)?;
        self.publish_payload(Arc::from(json));
        Ok(())
    }

    pub fn publish_payload(&self, payload: Payload) {
        if let Err(TrySendError::Full(_)) = self.intake_tx.try_send(payload) {
            debug!("Hub intake full, snapshot dropped");
        }
    }

    /// Deliver one payload to every current subscriber
    pub fn deliver(&self, payload: &Payload) {
        let mut closed = Vec::new();
        {
            let subscribers = self.subscribers.read();
            for (id, tx) in subscribers.iter() {
                match tx.try_send(Arc::clone(payload)) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        debug!(subscriber_id = *id, "Subscriber queue full, snapshot dropped");
                    }
                    Err(TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }
        if !closed.is_empty() {
            let mut subscribers = self.subscribers.write();
            for id in closed {
                subscribers.remove(&id);
                debug!(subscriber_id = id, "Subscriber pruned");
            }
        }
    }

    /// Single delivery path: drain the intake until shutdown
    ///
    /// # Errors
    /// - AppError::InvalidState if `run` was already started
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        let mut intake = self
            .intake_rx
            .lock()
            .take()
            .ok_or_else(|| AppError::InvalidState("broadcast hub already running".to_string()))?;

        info!("Broadcast hub started");
        loop {
            tokio::select! {
                maybe = intake.recv() => match maybe {
                    Some(payload) => self.deliver(&payload),
                    None => break,
                },
                _ = shutdown.wait() => break,
            }
        }
        info!("Broadcast hub stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::shutdown::shutdown_channel;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_two_subscribers_receive_identical_payload() {
        let hub = Arc::new(BroadcastHub::new(8));
        let (stop, token) = shutdown_channel();
        let runner = {
            let hub = Arc::clone(&hub);
            tokio::spawn(async move { hub.run(token).await })
        };

        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        hub.publish(&vec!["x", "y"]).unwrap();

        let pa = timeout(Duration::from_secs(1), a.recv()).await.unwrap().unwrap();
        let pb = timeout(Duration::from_secs(1), b.recv()).await.unwrap().unwrap();
        assert_eq!(&*pa, r#"["x","y"]"#);
        assert_eq!(pa, pb);
        // serialized once, shared
        assert!(Arc::ptr_eq(&pa, &pb));

        stop.shutdown();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_unsubscribed_never_receives_and_others_continue() {
        let hub = BroadcastHub::new(8);
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        hub.deliver(&Payload::from("1"));
        assert!(hub.unsubscribe(a.id()));
        hub.deliver(&Payload::from("2"));

        assert_eq!(a.try_recv().as_deref(), Some("1"));
        assert_eq!(a.recv().await, None);
        assert_eq!(b.try_recv().as_deref(), Some("1"));
        assert_eq!(b.try_recv().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let hub = BroadcastHub::new(2);
        let mut slow = hub.subscribe();
        for i in 0..5 {
            hub.deliver(&Payload::from(i.to_string()));
        }
        assert_eq!(slow.try_recv().as_deref(), Some("0"));
        assert_eq!(slow.try_recv().as_deref(), Some("1"));
        assert_eq!(slow.try_recv(), None);
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_pruned() {
        let hub = BroadcastHub::new(2);
        let gone = hub.subscribe();
        let _kept = hub.subscribe();
        drop(gone);
        hub.deliver(&Payload::from("x"));
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_run_twice_is_rejected() {
        let hub = BroadcastHub::new(2);
        let (stop, token) = shutdown_channel();
        stop.shutdown();
        hub.run(token.clone()).await.unwrap();
        assert!(hub.run(token).await.is_err());
    }
}
