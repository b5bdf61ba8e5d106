use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
};

use crate::{callbacks::TemporaryCallback, schema::PayloadKind, sync::lock};

/// Per-kind FIFO of one-shot callbacks. Entries carry no identity beyond
/// arrival order, so when several outstanding requests share a response
/// kind, the first arrival consumes the earliest-registered callback,
/// whichever request it actually answers. Use permanent callbacks with an
/// application-level request id when that correlation matters.
pub struct TemporaryRegistry {
    queues: Mutex<HashMap<PayloadKind, VecDeque<TemporaryCallback>>>,
}

impl TemporaryRegistry {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Appends a callback to the kind's FIFO.
    pub fn register(&self, kind: PayloadKind, callback: TemporaryCallback) {
        lock(&self.queues)
            .entry(kind)
            .or_default()
            .push_back(callback);
    }

    /// Pops and returns the head of the kind's FIFO. At-most-once: a
    /// popped entry can never be observed again.
    pub fn consume(&self, kind: PayloadKind) -> Option<TemporaryCallback> {
        let mut queues = lock(&self.queues);
        let queue = queues.get_mut(&kind)?;
        queue.pop_front()
    }

    /// Drops every pending callback for the kind.
    pub fn clear(&self, kind: PayloadKind) {
        if let Some(queue) = lock(&self.queues).get_mut(&kind) {
            queue.clear();
        }
    }

    pub fn is_empty(&self, kind: PayloadKind) -> bool {
        lock(&self.queues)
            .get(&kind)
            .map_or(true, VecDeque::is_empty)
    }
}

impl Default for TemporaryRegistry {
    fn default() -> Self {
        Self::new()
    }
}
