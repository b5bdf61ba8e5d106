use std::{
    any::type_name,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use log::warn;

use crate::{
    callbacks::{PermanentRegistry, TemporaryCallback, TemporaryRegistry},
    config::HeraldConfig,
    dispatch::Dispatcher,
    engine::EngineCore,
    lifecycle::LifecycleObservers,
    schema::{PackError, Payload, PayloadKind, Schema},
    sync::lock,
    timeout::TimeoutScheduler,
    transport::Transport,
    types::{CallbackTier, DispatchMode, UnhandledPolicy},
    unhandled::UnhandledStore,
};

/// The dispatch engine. Owns a [`Transport`] and a [`Schema`], unwraps
/// every inbound frame, and routes each payload to the callbacks
/// registered for its kind; outbound payloads are packed and handed to
/// the transport. Thread-safe throughout: the transport may deliver its
/// events from any thread, concurrently with calls into this type.
///
/// Response correlation is by payload kind and arrival order only: with
/// two outstanding requests expecting the same response kind, the first
/// arrival is handed to the earlier-registered callback, whichever
/// request it actually answers. When that matters, use permanent
/// callbacks with an application-level request id in the payload.
///
/// Instances are fully independent; two engines over different
/// transports or schemas share no state.
pub struct Herald<T: Transport> {
    transport: Mutex<T>,
    core: Arc<EngineCore>,
}

impl<T: Transport + Default> Herald<T> {
    /// Creates an engine over a default-constructed transport.
    pub fn new(schema: Schema) -> Self {
        Self::with_transport(T::default(), schema)
    }
}

impl<T: Transport> Herald<T> {
    /// Creates an engine over a caller-initialized transport, with
    /// default behaviour settings.
    pub fn with_transport(transport: T, schema: Schema) -> Self {
        Self::with_config(transport, schema, HeraldConfig::default())
    }

    /// Creates an engine over a caller-initialized transport, choosing
    /// the engine-wide defaults for unhandled messages and dispatching.
    pub fn with_config(mut transport: T, schema: Schema, config: HeraldConfig) -> Self {
        let temporary = Arc::new(TemporaryRegistry::new());
        let permanent = Arc::new(PermanentRegistry::new());
        let dispatcher = Arc::new(Dispatcher::new(config.dispatch_mode));
        let unhandled = Arc::new(UnhandledStore::new(config.unhandled_policy));
        let lifecycle = Arc::new(LifecycleObservers::new());
        let scheduler = TimeoutScheduler::new(temporary.clone(), dispatcher.clone());

        let core = Arc::new(EngineCore {
            schema,
            temporary,
            permanent,
            dispatcher,
            unhandled,
            lifecycle,
            scheduler,
            serialize_override: Mutex::new(None),
            deserialize_override: Mutex::new(None),
        });

        // The only hook installation; the transport keeps these for its
        // whole life.
        let data_core = core.clone();
        transport.set_on_data(Arc::new(move |data: &[u8]| data_core.handle_data(data)));
        let connect_core = core.clone();
        transport.set_on_connect(Arc::new(move || {
            connect_core
                .lifecycle
                .handle_connect(&connect_core.dispatcher);
        }));
        let disconnect_core = core.clone();
        transport.set_on_disconnect(Arc::new(move |reason: &str| {
            disconnect_core
                .lifecycle
                .handle_disconnect(&disconnect_core.dispatcher, reason);
        }));

        Self {
            transport: Mutex::new(transport),
            core,
        }
    }

    // Transport handling

    /// Connects the owned transport to the given host and port, clearing
    /// any pending disconnect suppression first.
    pub fn connect(&self, host: &str, port: u16) {
        self.core.lifecycle.disarm_suppression();
        lock(&self.transport).connect(host, port);
    }

    /// Disconnects the owned transport from whatever connection it has.
    pub fn disconnect(&self) {
        lock(&self.transport).disconnect();
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.transport).is_connected()
    }

    /// Direct access to the owned transport. Typically unneeded during
    /// regular usage, but available for edge cases; the guard blocks
    /// engine sends while held.
    pub fn transport(&self) -> MutexGuard<'_, T> {
        lock(&self.transport)
    }

    // Sends

    /// Packs and transmits a payload, expecting nothing back.
    pub fn send<P: Payload>(&self, payload: &P) -> Result<(), PackError> {
        let frame = self.core.pack(payload)?;
        lock(&self.transport).send_data(&frame);
        Ok(())
    }

    /// Packs and transmits a payload, registering a one-shot callback
    /// for the first arrival of response kind `R`. The callback is
    /// consumed when it runs; for multi-response exchanges use
    /// [`register_permanent`](Self::register_permanent).
    pub fn send_with_callback<P: Payload, R: Payload>(
        &self,
        payload: &P,
        on_response: impl FnOnce(&R) + Send + 'static,
    ) -> Result<(), PackError> {
        let frame = self.core.pack(payload)?;
        self.core
            .temporary
            .register(PayloadKind::of::<R>(), erase_response(on_response));
        lock(&self.transport).send_data(&frame);
        Ok(())
    }

    /// Like [`send_with_callback`](Self::send_with_callback), but also
    /// races the response against `timeout`: if no `R` arrives in time,
    /// the response callback is discarded and `on_timeout` runs instead
    /// (through the dispatch mode configured for `R`). Exactly one of
    /// the two callbacks runs.
    pub fn send_with_callback_and_timeout<P: Payload, R: Payload>(
        &self,
        payload: &P,
        on_response: impl FnOnce(&R) + Send + 'static,
        timeout: Duration,
        on_timeout: impl FnOnce() + Send + 'static,
    ) -> Result<(), PackError> {
        let frame = self.core.pack(payload)?;
        // The response slot must exist before the worker can see the
        // timeout entry: a firing entry consumes the head slot, and a
        // zero timeout can fire immediately.
        self.core
            .temporary
            .register(PayloadKind::of::<R>(), erase_response(on_response));
        self.core
            .scheduler
            .schedule(PayloadKind::of::<R>(), timeout, Box::new(on_timeout));
        lock(&self.transport).send_data(&frame);
        Ok(())
    }

    // Permanent message callbacks

    /// Registers a durable callback invoked on every arrival of `R`,
    /// keyed by `(name, tier)`; re-registering the same key overwrites.
    /// If arrivals of `R` are queued under
    /// [`UnhandledPolicy::Enqueue`], they are replayed through the
    /// receive pipeline now, in arrival order.
    pub fn register_permanent<R: Payload>(
        &self,
        name: &str,
        tier: CallbackTier,
        on_message: impl Fn(&R) + Send + Sync + 'static,
    ) {
        let kind = PayloadKind::of::<R>();
        self.core.permanent.register(
            kind,
            name,
            tier,
            Arc::new(move |payload: &dyn Payload| {
                match payload.as_any().downcast_ref::<R>() {
                    Some(typed) => on_message(typed),
                    None => warn!(
                        "Skipping permanent callback for {}: arrived payload has a different type",
                        type_name::<R>()
                    ),
                }
            }),
        );
        self.core.replay_unhandled(kind);
    }

    /// Clears the permanent callback registered under `(name, tier)`;
    /// both must match the registration.
    pub fn clear_permanent<R: Payload>(&self, name: &str, tier: CallbackTier) {
        self.core
            .permanent
            .clear(PayloadKind::of::<R>(), name, tier);
    }

    /// Clears all permanent callbacks for `R`, across all tiers.
    pub fn clear_all_permanent<R: Payload>(&self) {
        self.core.permanent.clear_all(PayloadKind::of::<R>());
    }

    /// Drops any not-yet-consumed one-shot response callbacks for `R`.
    pub fn clear_temporary<R: Payload>(&self) {
        self.core.temporary.clear(PayloadKind::of::<R>());
    }

    /// Cancels every outstanding response timeout for `R` without
    /// running the timeout callbacks. The response callbacks stay
    /// registered; pair with [`clear_temporary`](Self::clear_temporary)
    /// to abandon the exchanges entirely.
    pub fn cancel_timeouts_for<R: Payload>(&self) {
        self.core.scheduler.cancel_all_for(PayloadKind::of::<R>());
    }

    // Transport event callbacks

    pub fn register_on_connect(
        &self,
        name: &str,
        tier: CallbackTier,
        on_connect: impl Fn() + Send + Sync + 'static,
    ) {
        self.core
            .lifecycle
            .register_on_connect(name, tier, Arc::new(on_connect));
    }

    pub fn clear_on_connect(&self, name: &str, tier: CallbackTier) {
        self.core.lifecycle.clear_on_connect(name, tier);
    }

    pub fn register_on_disconnect(
        &self,
        name: &str,
        tier: CallbackTier,
        on_disconnect: impl Fn(&str) + Send + Sync + 'static,
    ) {
        self.core
            .lifecycle
            .register_on_disconnect(name, tier, Arc::new(on_disconnect));
    }

    pub fn clear_on_disconnect(&self, name: &str, tier: CallbackTier) {
        self.core.lifecycle.clear_on_disconnect(name, tier);
    }

    // Unhandled behaviour

    /// Overrides the engine default for arrivals of `M` that match no
    /// callback. Switching to [`UnhandledPolicy::Ignore`] clears
    /// anything currently queued for `M`.
    pub fn set_unhandled_policy<M: Payload>(&self, policy: UnhandledPolicy) {
        self.core.unhandled.set_policy(PayloadKind::of::<M>(), policy);
    }

    /// Restores the engine default chosen at construction for `M`.
    pub fn set_unhandled_policy_to_default<M: Payload>(&self) {
        self.core.unhandled.reset_policy(PayloadKind::of::<M>());
    }

    // Dispatching behaviour

    /// Overrides how callbacks for `M` are invoked: inline on the
    /// delivering thread, or queued for [`pump()`](Self::pump).
    pub fn set_dispatch_mode<M: Payload>(&self, mode: DispatchMode) {
        self.core.dispatcher.set_mode(PayloadKind::of::<M>(), mode);
    }

    /// Removes the override for `M` so it tracks the engine default.
    pub fn set_dispatch_mode_to_default<M: Payload>(&self) {
        self.core.dispatcher.reset_mode(PayloadKind::of::<M>());
    }

    pub fn set_connect_dispatch_mode(&self, mode: DispatchMode) {
        self.core.dispatcher.set_connect_mode(mode);
    }

    pub fn set_connect_dispatch_mode_to_default(&self) {
        self.core.dispatcher.reset_connect_mode();
    }

    pub fn set_disconnect_dispatch_mode(&self, mode: DispatchMode) {
        self.core.dispatcher.set_disconnect_mode(mode);
    }

    pub fn set_disconnect_dispatch_mode_to_default(&self) {
        self.core.dispatcher.reset_disconnect_mode();
    }

    /// Runs every queued deferred callback, in enqueue order, on the
    /// calling thread. Anything running in [`DispatchMode::Deferred`]
    /// never runs unless this is called; queued messages are kept in
    /// memory until then.
    pub fn pump(&self) {
        self.core.dispatcher.pump();
    }

    // Disconnect suppression

    /// Flags `M` so its arrival suppresses the next disconnect event:
    /// useful when the protocol defines a formal disconnect message that
    /// the peer follows with a socket close, which would otherwise be
    /// handled twice. No timer bounds the suppression; if `M` does not
    /// always precede a disconnect, a later unrelated disconnect may be
    /// swallowed instead.
    pub fn suppress_disconnect_after<M: Payload>(&self) {
        self.core.lifecycle.add_suppressor(PayloadKind::of::<M>());
    }

    /// Turns the suppression behaviour off entirely.
    pub fn clear_suppression(&self) {
        self.core.lifecycle.clear_suppressors();
    }

    // Serialization processing

    /// Installs a transform applied to every outbound frame after
    /// packing, for when plain encoding is not enough (encryption,
    /// compression, an outer framing layer, ...).
    pub fn set_custom_serialization(
        &self,
        serialize: impl Fn(Vec<u8>) -> Vec<u8> + Send + Sync + 'static,
    ) {
        *lock(&self.core.serialize_override) = Some(Arc::new(serialize));
    }

    /// Returns to sending packed frames as-is.
    pub fn clear_custom_serialization(&self) {
        *lock(&self.core.serialize_override) = None;
    }

    /// Installs a transform applied to every inbound chunk of wire bytes
    /// before unwrapping; the inverse of the custom serialization.
    pub fn set_custom_deserialization(
        &self,
        deserialize: impl Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
    ) {
        *lock(&self.core.deserialize_override) = Some(Arc::new(deserialize));
    }

    /// Returns to unwrapping received bytes as-is.
    pub fn clear_custom_deserialization(&self) {
        *lock(&self.core.deserialize_override) = None;
    }
}

impl<T: Transport> Drop for Herald<T> {
    /// Cancels all outstanding timeouts and joins the scheduler worker
    /// before the transport is released, so no callback can fire into a
    /// torn-down engine.
    fn drop(&mut self) {
        self.core.scheduler.shutdown();
    }
}

fn erase_response<R: Payload>(on_response: impl FnOnce(&R) + Send + 'static) -> TemporaryCallback {
    Box::new(move |payload: &dyn Payload| {
        match payload.as_any().downcast_ref::<R>() {
            Some(typed) => on_response(typed),
            None => warn!(
                "Skipping response callback for {}: arrived payload has a different type",
                type_name::<R>()
            ),
        }
    })
}
