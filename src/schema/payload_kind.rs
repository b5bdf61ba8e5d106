use std::any::TypeId;

use crate::schema::Payload;

/// The universal dispatch key: a compact value identifying a payload's
/// concrete type. Every registry in the engine is keyed by this. Unlike a
/// schema-supplied name string, equality and hashing are exact and cheap,
/// and an unknown kind is a checked case at registration time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PayloadKind(TypeId);

impl PayloadKind {
    /// The kind of a statically-known payload type.
    pub fn of<P: Payload>() -> Self {
        Self(TypeId::of::<P>())
    }

    /// The kind of a type-erased payload value.
    pub fn of_value(payload: &dyn Payload) -> Self {
        Self(payload.as_any().type_id())
    }
}
