use std::{
    collections::{BTreeMap, HashMap},
    sync::Mutex,
};

use crate::{
    callbacks::PermanentCallback,
    schema::PayloadKind,
    sync::lock,
    types::{CallbackTier, ObserverKey},
};

/// Per-kind map of durable observers, ordered by tier then name.
/// Re-registering the same `(kind, name, tier)` overwrites; entries
/// persist until explicitly cleared.
pub struct PermanentRegistry {
    observers: Mutex<HashMap<PayloadKind, BTreeMap<ObserverKey, PermanentCallback>>>,
}

impl PermanentRegistry {
    pub fn new() -> Self {
        Self {
            observers: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(
        &self,
        kind: PayloadKind,
        name: &str,
        tier: CallbackTier,
        callback: PermanentCallback,
    ) {
        lock(&self.observers)
            .entry(kind)
            .or_default()
            .insert(ObserverKey::new(name, tier), callback);
    }

    pub fn clear(&self, kind: PayloadKind, name: &str, tier: CallbackTier) {
        if let Some(map) = lock(&self.observers).get_mut(&kind) {
            map.remove(&ObserverKey::new(name, tier));
        }
    }

    /// Removes all observers for the kind, across all tiers.
    pub fn clear_all(&self, kind: PayloadKind) {
        if let Some(map) = lock(&self.observers).get_mut(&kind) {
            map.clear();
        }
    }

    pub fn has_any(&self, kind: PayloadKind) -> bool {
        lock(&self.observers)
            .get(&kind)
            .is_some_and(|map| !map.is_empty())
    }

    /// Point-in-time copy in tier/name order. Iterating the snapshot
    /// never holds the registry lock, so an observer may re-enter the
    /// engine (including registering or clearing observers) without
    /// deadlocking or mutating the in-flight iteration.
    pub fn snapshot(&self, kind: PayloadKind) -> Vec<PermanentCallback> {
        lock(&self.observers)
            .get(&kind)
            .map(|map| map.values().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for PermanentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
