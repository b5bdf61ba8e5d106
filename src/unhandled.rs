use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
};

use crate::{
    schema::{envelope::Envelope, PayloadKind},
    sync::lock,
    types::UnhandledPolicy,
};

/// Per-kind policy table plus the retained-message queues it governs.
/// Queues exist only while a kind's policy is `Enqueue`; flipping a kind
/// to `Ignore` empties its queue.
pub struct UnhandledStore {
    default_policy: UnhandledPolicy,
    policies: Mutex<HashMap<PayloadKind, UnhandledPolicy>>,
    queues: Mutex<HashMap<PayloadKind, VecDeque<Envelope>>>,
}

impl UnhandledStore {
    pub fn new(default_policy: UnhandledPolicy) -> Self {
        Self {
            default_policy,
            policies: Mutex::new(HashMap::new()),
            queues: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy_for(&self, kind: PayloadKind) -> UnhandledPolicy {
        lock(&self.policies)
            .get(&kind)
            .copied()
            .unwrap_or(self.default_policy)
    }

    pub fn set_policy(&self, kind: PayloadKind, policy: UnhandledPolicy) {
        lock(&self.policies).insert(kind, policy);
        if policy == UnhandledPolicy::Ignore {
            lock(&self.queues).remove(&kind);
        }
    }

    /// Restores the constructor default for the kind.
    pub fn reset_policy(&self, kind: PayloadKind) {
        self.set_policy(kind, self.default_policy);
    }

    /// Consulted when an arrival matched no callback. Retains the
    /// envelope under `Enqueue`, drops it under `Ignore`.
    pub fn note(&self, envelope: Envelope) {
        match self.policy_for(envelope.kind()) {
            UnhandledPolicy::Ignore => {}
            UnhandledPolicy::Enqueue => {
                lock(&self.queues)
                    .entry(envelope.kind())
                    .or_default()
                    .push_back(envelope);
            }
        }
    }

    /// Atomically swaps out everything retained for the kind, in arrival
    /// order, leaving its queue empty.
    pub fn drain(&self, kind: PayloadKind) -> VecDeque<Envelope> {
        lock(&self.queues).remove(&kind).unwrap_or_default()
    }

    pub fn queued_len(&self, kind: PayloadKind) -> usize {
        lock(&self.queues).get(&kind).map_or(0, VecDeque::len)
    }
}
