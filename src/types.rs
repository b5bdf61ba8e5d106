/// Invocation-order priority for permanent callbacks and lifecycle
/// observers. All `First` callbacks for a payload kind run before any
/// `Asap` callback, and all `Asap` callbacks run before any `Normal`
/// callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CallbackTier {
    First,
    Asap,
    Normal,
}

/// What the engine should do with an arrived message that has no
/// registered temporary or permanent callback.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum UnhandledPolicy {
    /// Discard the message.
    #[default]
    Ignore,
    /// Retain the message, to be replayed when the first permanent
    /// callback for its kind is registered. Only bounded by available
    /// memory, so callers are responsible for eventually registering a
    /// listener or switching back to `Ignore`.
    Enqueue,
}

/// How callbacks are invoked when a triggering event arrives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DispatchMode {
    /// Run synchronously on whatever thread delivered the event
    /// (typically the transport's inbound thread).
    #[default]
    Immediate,
    /// Queue the invocation until [`pump()`](crate::Herald::pump) is
    /// called; it then runs on the pumping thread.
    Deferred,
}

/// Identity of a durable callback registration: tier first, then name.
/// The derived ordering is the invocation ordering.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverKey {
    pub tier: CallbackTier,
    pub name: String,
}

impl ObserverKey {
    pub fn new(name: &str, tier: CallbackTier) -> Self {
        Self {
            tier,
            name: name.to_string(),
        }
    }
}
