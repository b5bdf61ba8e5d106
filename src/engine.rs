use std::sync::{Arc, Mutex};

use log::warn;

use crate::{
    callbacks::{PermanentRegistry, TemporaryRegistry},
    dispatch::Dispatcher,
    lifecycle::LifecycleObservers,
    schema::{
        envelope::{self, Envelope},
        PackError, Payload, PayloadKind, Schema,
    },
    sync::lock,
    timeout::TimeoutScheduler,
    types::DispatchMode,
    unhandled::UnhandledStore,
};

/// Transform applied to outbound frames after packing (encryption,
/// compression, framing for a legacy peer, ...).
pub type SerializeOverride = Arc<dyn Fn(Vec<u8>) -> Vec<u8> + Send + Sync>;
/// Transform applied to inbound wire bytes before unwrapping.
pub type DeserializeOverride = Arc<dyn Fn(&[u8]) -> Vec<u8> + Send + Sync>;

/// Everything the transport hooks and the scheduler need to reach,
/// independent of the transport type parameter. Owned by the facade
/// through an `Arc`; the three hooks hold clones.
pub(crate) struct EngineCore {
    pub(crate) schema: Schema,
    pub(crate) temporary: Arc<TemporaryRegistry>,
    pub(crate) permanent: Arc<PermanentRegistry>,
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) unhandled: Arc<UnhandledStore>,
    pub(crate) lifecycle: Arc<LifecycleObservers>,
    pub(crate) scheduler: TimeoutScheduler,
    pub(crate) serialize_override: Mutex<Option<SerializeOverride>>,
    pub(crate) deserialize_override: Mutex<Option<DeserializeOverride>>,
}

impl EngineCore {
    /// Packs a payload and applies any custom serialization, yielding
    /// wire bytes ready for the transport.
    pub(crate) fn pack<P: Payload>(&self, payload: &P) -> Result<Vec<u8>, PackError> {
        let frame = envelope::pack(&self.schema, payload)?;
        let frame = match lock(&self.serialize_override).as_ref() {
            Some(custom) => custom(frame),
            None => frame,
        };
        Ok(frame)
    }

    /// Full inbound pipeline for one chunk of wire bytes. Recovers
    /// locally from every malformed-envelope condition; nothing
    /// propagates back to the transport.
    pub(crate) fn handle_data(&self, data: &[u8]) {
        let envelope = {
            let deserialize_override = lock(&self.deserialize_override).clone();
            match deserialize_override {
                Some(custom) => envelope::unwrap(&self.schema, &custom(data)),
                None => envelope::unwrap(&self.schema, data),
            }
        };
        match envelope {
            Ok(envelope) => self.receive(envelope),
            Err(err) => warn!("Dropping inbound message: {err}"),
        }
    }

    /// Dispatch decision for one unwrapped arrival: cancel the oldest
    /// racing timeout, arm suppression if flagged, then trigger now or
    /// queue the whole trigger for the pump.
    pub(crate) fn receive(&self, envelope: Envelope) {
        let kind = envelope.kind();
        self.first_response_arrived(kind);
        self.lifecycle.note_arrival(kind);

        match self.dispatcher.mode_for(kind) {
            DispatchMode::Immediate => self.trigger(envelope),
            DispatchMode::Deferred => {
                let temporary = self.temporary.clone();
                let permanent = self.permanent.clone();
                let unhandled = self.unhandled.clone();
                self.dispatcher.defer(Box::new(move || {
                    trigger_callbacks(&temporary, &permanent, &unhandled, envelope);
                }));
            }
        }
    }

    fn trigger(&self, envelope: Envelope) {
        trigger_callbacks(&self.temporary, &self.permanent, &self.unhandled, envelope);
    }

    /// Replays everything retained for the kind through the normal
    /// receive pipeline, in original arrival order.
    pub(crate) fn replay_unhandled(&self, kind: PayloadKind) {
        for envelope in self.unhandled.drain(kind) {
            self.receive(envelope);
        }
    }

    /// A response for this kind may have arrived: the oldest
    /// still-scheduled timeout loses the race.
    fn first_response_arrived(&self, kind: PayloadKind) {
        self.scheduler.cancel_first(kind);
    }
}

/// Registry consultation for one arrival: all permanent observers in
/// tier/name order, then the head of the temporary FIFO, then the
/// unhandled policy if nothing matched. Runs with no registry lock held,
/// so callbacks may re-enter the engine freely.
fn trigger_callbacks(
    temporary: &TemporaryRegistry,
    permanent: &PermanentRegistry,
    unhandled: &UnhandledStore,
    envelope: Envelope,
) {
    let kind = envelope.kind();

    let observers = permanent.snapshot(kind);
    let mut handled = !observers.is_empty();
    for observer in observers {
        observer(envelope.payload());
    }

    if let Some(callback) = temporary.consume(kind) {
        callback(envelope.payload());
        handled = true;
    }

    if !handled {
        unhandled.note(envelope);
    }
}
