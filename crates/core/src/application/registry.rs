// Target Registry - owns every runtime record

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;

use crate::application::history::MetricsHistory;
use crate::domain::{RuntimeRecord, SupervisorConfig, TargetConfig, TargetId, TargetStatus};
use crate::error::{AppError, Result};

/// Everything the supervisor keeps for one target
pub struct TargetSlot {
    /// Short critical sections only; never held across an OS call
    pub record: Mutex<RuntimeRecord>,
    /// Serializes start/stop on this target; may be held across OS calls
    pub op_lock: tokio::sync::Mutex<()>,
    pub metrics: MetricsHistory,
    /// Bumped by the exit watcher after it commits an exit
    exits: watch::Sender<u64>,
}

impl TargetSlot {
    fn new(config: TargetConfig, metrics_capacity: usize) -> Self {
        let (exits, _) = watch::channel(0);
        Self {
            record: Mutex::new(RuntimeRecord::new(config)),
            op_lock: tokio::sync::Mutex::new(()),
            metrics: MetricsHistory::new(metrics_capacity),
            exits,
        }
    }

    pub fn id(&self) -> TargetId {
        self.record.lock().config.id.clone()
    }

    pub fn config(&self) -> TargetConfig {
        self.record.lock().config.clone()
    }

    pub fn is_service(&self) -> bool {
        self.record.lock().config.is_service()
    }

    pub fn status(&self) -> TargetStatus {
        TargetStatus::from(&*self.record.lock())
    }

    pub fn watch_exits(&self) -> watch::Receiver<u64> {
        self.exits.subscribe()
    }

    pub(crate) fn notify_exit(&self) {
        self.exits.send_modify(|n| *n += 1);
    }
}

#[derive(Default)]
struct Inner {
    order: Vec<TargetId>,
    slots: HashMap<TargetId, Arc<TargetSlot>>,
}

/// Insertion-ordered set of targets
///
/// The registry lock guards structure only; per-target state lives behind each slot's own lock.
pub struct Registry {
    inner: RwLock<Inner>,
    metrics_capacity: usize,
}

impl Registry {
    pub fn new(metrics_capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            metrics_capacity,
        }
    }

    pub fn from_config(config: &SupervisorConfig, metrics_capacity: usize) -> Result<Self> {
        let registry = Self::new(metrics_capacity);
        for target in &config.targets {
            registry.register(target.clone())?;
        }
        Ok(registry)
    }

    /// Add a target in the Stopped state
    ///
    /// # Errors
    /// - AppError::Validation on a duplicate id
    pub fn register(&self, config: TargetConfig) -> Result<Arc<TargetSlot>> {
        let mut inner = self.inner.write();
        if inner.slots.contains_key(&config.id) {
            return Err(AppError::Validation(format!(
                "duplicate target id: {}",
                config.id
            )));
        }
        let id = config.id.clone();
        let slot = Arc::new(TargetSlot::new(config, self.metrics_capacity));
        inner.order.push(id.clone());
        inner.slots.insert(id, Arc::clone(&slot));
        Ok(slot)
    }

    pub fn lookup(&self, id: &str) -> Result<Arc<TargetSlot>> {
        self.inner
            .read()
            .slots
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("target {}", id)))
    }

    /// Ids in registration order
    pub fn ids(&self) -> Vec<TargetId> {
        self.inner.read().order.clone()
    }

    /// Slots in registration order
    pub fn slots(&self) -> Vec<Arc<TargetSlot>> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.slots.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current configuration document, in registration order
    pub fn config(&self) -> SupervisorConfig {
        SupervisorConfig {
            targets: self.slots().iter().map(|slot| slot.config()).collect(),
        }
    }

    /// Apply a whole replacement document
    ///
    /// Existing ids take the new config, new ids are registered Stopped and
    /// removed ids are dropped. All-or-nothing.
    ///
    /// # Errors
    /// - AppError::InvalidState if a removed target is still active, or an
    ///   active target would change kind
    pub fn replace(&self, config: &SupervisorConfig) -> Result<()> {
        let mut inner = self.inner.write();
        let keep: HashSet<&str> = config.targets.iter().map(|t| t.id.as_str()).collect();

        for (id, slot) in inner.slots.iter() {
            let rec = slot.record.lock();
            if !rec.state.is_active() {
                continue;
            }
            if !keep.contains(id.as_str()) {
                return Err(AppError::InvalidState(format!(
                    "cannot remove target {} while it is {}",
                    id, rec.state
                )));
            }
            let incoming = config.targets.iter().find(|t| &t.id == id);
            if incoming.is_some_and(|t| t.is_service() != rec.config.is_service()) {
                return Err(AppError::InvalidState(format!(
                    "cannot change kind of target {} while it is {}",
                    id, rec.state
                )));
            }
        }

        let mut slots = HashMap::with_capacity(config.targets.len());
        let mut order = Vec::with_capacity(config.targets.len());
        for target in &config.targets {
            let slot = match inner.slots.remove(&target.id) {
                Some(slot) => {
                    slot.record.lock().config = target.clone();
                    slot
                }
                None => Arc::new(TargetSlot::new(target.clone(), self.metrics_capacity)),
            };
            order.push(target.id.clone());
            slots.insert(target.id.clone(), slot);
        }
        inner.order = order;
        inner.slots = slots;
        Ok(())
    }
}
