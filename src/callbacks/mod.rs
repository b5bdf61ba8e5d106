use std::sync::Arc;

use crate::schema::Payload;

pub mod permanent;
pub mod temporary;

pub use permanent::PermanentRegistry;
pub use temporary::TemporaryRegistry;

/// One-shot callback, consumed by the first matching arrival or by a
/// timeout firing.
pub type TemporaryCallback = Box<dyn FnOnce(&dyn Payload) + Send>;

/// Durable observer, invoked on every matching arrival until cleared.
pub type PermanentCallback = Arc<dyn Fn(&dyn Payload) + Send + Sync>;
