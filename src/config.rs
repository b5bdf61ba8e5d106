use crate::types::{DispatchMode, UnhandledPolicy};

/// Contains engine-wide defaults, overridable per payload kind through
/// the corresponding `Herald` setters after construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeraldConfig {
    /// What to do with an arrival no callback is listening for:
    /// discard it, or retain it until the first permanent callback for
    /// its kind is registered. Defaults to [`UnhandledPolicy::Ignore`].
    pub unhandled_policy: UnhandledPolicy,
    /// Whether callbacks run inline on the delivering thread or wait for
    /// [`pump()`](crate::Herald::pump). Defaults to
    /// [`DispatchMode::Immediate`].
    pub dispatch_mode: DispatchMode,
}
