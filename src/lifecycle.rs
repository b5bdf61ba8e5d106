use std::{
    collections::{BTreeMap, HashSet},
    sync::{Arc, Mutex},
};

use crate::{
    dispatch::Dispatcher,
    schema::PayloadKind,
    sync::lock,
    types::{CallbackTier, ObserverKey},
};

/// Durable observer for the transport-connected event.
pub type ConnectObserver = Arc<dyn Fn() + Send + Sync>;
/// Durable observer for the transport-disconnected event, receiving the
/// transport-supplied reason.
pub type DisconnectObserver = Arc<dyn Fn(&str) + Send + Sync>;

struct SuppressionState {
    /// Kinds whose arrival arms the one-shot disconnect suppression.
    suppressors: HashSet<PayloadKind>,
    /// Armed by a suppressor arrival, cleared on connect, consumed by at
    /// most one disconnect. No timer: an unbounded time may pass before
    /// it is consumed or overwritten.
    armed: bool,
}

/// Priority-ordered observer lists for the two transport lifecycle
/// events, plus the disconnect-suppression state.
pub struct LifecycleObservers {
    opened: Mutex<BTreeMap<ObserverKey, ConnectObserver>>,
    closed: Mutex<BTreeMap<ObserverKey, DisconnectObserver>>,
    suppression: Mutex<SuppressionState>,
}

impl LifecycleObservers {
    pub fn new() -> Self {
        Self {
            opened: Mutex::new(BTreeMap::new()),
            closed: Mutex::new(BTreeMap::new()),
            suppression: Mutex::new(SuppressionState {
                suppressors: HashSet::new(),
                armed: false,
            }),
        }
    }

    pub fn register_on_connect(&self, name: &str, tier: CallbackTier, observer: ConnectObserver) {
        lock(&self.opened).insert(ObserverKey::new(name, tier), observer);
    }

    pub fn clear_on_connect(&self, name: &str, tier: CallbackTier) {
        lock(&self.opened).remove(&ObserverKey::new(name, tier));
    }

    pub fn register_on_disconnect(
        &self,
        name: &str,
        tier: CallbackTier,
        observer: DisconnectObserver,
    ) {
        lock(&self.closed).insert(ObserverKey::new(name, tier), observer);
    }

    pub fn clear_on_disconnect(&self, name: &str, tier: CallbackTier) {
        lock(&self.closed).remove(&ObserverKey::new(name, tier));
    }

    /// Flags a kind as "arrival suppresses the next disconnect event".
    pub fn add_suppressor(&self, kind: PayloadKind) {
        lock(&self.suppression).suppressors.insert(kind);
    }

    /// Turns the suppression behaviour off entirely: forgets every
    /// suppressor kind and disarms any pending suppression.
    pub fn clear_suppressors(&self) {
        let mut suppression = lock(&self.suppression);
        suppression.suppressors.clear();
        suppression.armed = false;
    }

    /// Called for every unwrapped arrival; arms the one-shot suppression
    /// if the kind is flagged, whether or not a disconnect follows.
    pub fn note_arrival(&self, kind: PayloadKind) {
        let mut suppression = lock(&self.suppression);
        if suppression.suppressors.contains(&kind) {
            suppression.armed = true;
        }
    }

    pub fn disarm_suppression(&self) {
        lock(&self.suppression).armed = false;
    }

    /// Connect success: disarms suppression, then fans out to the connect
    /// observers in tier/name order via the connect-event dispatch mode.
    pub fn handle_connect(&self, dispatcher: &Dispatcher) {
        self.disarm_suppression();

        let observers: Vec<ConnectObserver> = lock(&self.opened).values().cloned().collect();
        let mode = dispatcher.connect_mode();
        for observer in observers {
            dispatcher.run_or_defer(mode, Box::new(move || observer()));
        }
    }

    /// Disconnect: a one-shot armed suppression swallows the event
    /// entirely; otherwise fans out to the disconnect observers in
    /// tier/name order with the transport's reason string.
    pub fn handle_disconnect(&self, dispatcher: &Dispatcher, reason: &str) {
        {
            let mut suppression = lock(&self.suppression);
            if suppression.armed {
                suppression.armed = false;
                return;
            }
        }

        let observers: Vec<DisconnectObserver> = lock(&self.closed).values().cloned().collect();
        let mode = dispatcher.disconnect_mode();
        for observer in observers {
            let reason = reason.to_string();
            dispatcher.run_or_defer(mode, Box::new(move || observer(&reason)));
        }
    }
}

impl Default for LifecycleObservers {
    fn default() -> Self {
        Self::new()
    }
}
