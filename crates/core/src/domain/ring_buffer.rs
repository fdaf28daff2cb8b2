// Fixed-capacity ring buffer (oldest entry evicted on overflow)

/// Bounded FIFO with O(1) push
///
/// Backed by a slot array; `head` is the next write position.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Vec<Option<T>>,
    head: usize,
    len: usize,
}

impl<T: Clone> RingBuffer<T> {
    /// A capacity of 0 is bumped to 1
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push(&mut self, item: T) {
        let cap = self.capacity();
        self.slots[self.head] = Some(item);
        self.head = (self.head + 1) % cap;
        if self.len < cap {
            self.len += 1;
        }
    }

    /// Last `k` entries in chronological order (all of them if `k > len`)
    pub fn last(&self, k: usize) -> Vec<T> {
        let k = k.min(self.len);
        let cap = self.capacity();
        let start = (self.head + cap - k) % cap;
        (0..k)
            .filter_map(|i| self.slots[(start + i) % cap].clone())
            .collect()
    }

    /// Every retained entry, oldest first
    pub fn to_vec(&self) -> Vec<T> {
        self.last(self.len)
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.head = 0;
        self.len = 0;
    }
}
