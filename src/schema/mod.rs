use std::{
    any::{type_name, Any},
    collections::HashMap,
};

use serde::{de::DeserializeOwned, Serialize};

pub mod envelope;
pub mod error;
pub mod payload_kind;

pub use error::{PackError, UnwrapError};
pub use payload_kind::PayloadKind;

/// A value that can travel through the engine. Blanket-implemented for
/// every `'static` thread-safe type; whether a type can actually cross
/// the wire is decided by registering it with a [`Schema`].
pub trait Payload: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Send + Sync> Payload for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

type EncodeFn = fn(&dyn Payload) -> Result<Vec<u8>, PackError>;
type DecodeFn = fn(&[u8]) -> Result<Box<dyn Payload>, UnwrapError>;

struct SchemaEntry {
    net_id: u16,
    type_name: &'static str,
    encode: EncodeFn,
    decode: DecodeFn,
}

/// The closed set of payload types a [`Herald`](crate::Herald) instance
/// speaks. Registration order assigns each type a stable wire id, so
/// both peers must register the same types in the same order.
pub struct Schema {
    by_kind: HashMap<PayloadKind, SchemaEntry>,
    by_net_id: HashMap<u16, PayloadKind>,
    next_net_id: u16,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            by_kind: HashMap::new(),
            by_net_id: HashMap::new(),
            next_net_id: 0,
        }
    }
}

impl Schema {
    pub fn builder() -> Self {
        Self::default()
    }

    /// Registers a payload type, assigning it the next wire id.
    /// Re-registering an already-known type is a no-op.
    pub fn add_payload<P: Payload + Serialize + DeserializeOwned>(&mut self) -> &mut Self {
        let kind = PayloadKind::of::<P>();
        if self.by_kind.contains_key(&kind) {
            log::warn!(
                "Payload type {} registered more than once, keeping the original wire id",
                type_name::<P>()
            );
            return self;
        }

        let net_id = self.next_net_id;
        self.next_net_id += 1;
        self.by_kind.insert(
            kind,
            SchemaEntry {
                net_id,
                type_name: type_name::<P>(),
                encode: encode_erased::<P>,
                decode: decode_erased::<P>,
            },
        );
        self.by_net_id.insert(net_id, kind);
        self
    }

    pub fn is_registered(&self, kind: PayloadKind) -> bool {
        self.by_kind.contains_key(&kind)
    }

    /// Registered display name for a kind, for logging.
    pub fn name_of(&self, kind: PayloadKind) -> Option<&'static str> {
        self.by_kind.get(&kind).map(|entry| entry.type_name)
    }

    fn entry(&self, kind: PayloadKind) -> Option<&SchemaEntry> {
        self.by_kind.get(&kind)
    }

    fn kind_for_net_id(&self, net_id: u16) -> Option<PayloadKind> {
        self.by_net_id.get(&net_id).copied()
    }
}

fn encode_erased<P: Payload + Serialize>(payload: &dyn Payload) -> Result<Vec<u8>, PackError> {
    let payload = payload
        .as_any()
        .downcast_ref::<P>()
        .ok_or_else(|| PackError::PayloadEncodeFailed {
            type_name: type_name::<P>(),
            reason: "payload value does not match its registered type".to_string(),
        })?;
    bincode::serde::encode_to_vec(payload, bincode::config::standard()).map_err(|err| {
        PackError::PayloadEncodeFailed {
            type_name: type_name::<P>(),
            reason: err.to_string(),
        }
    })
}

fn decode_erased<P: Payload + DeserializeOwned>(
    bytes: &[u8],
) -> Result<Box<dyn Payload>, UnwrapError> {
    let (payload, _) =
        bincode::serde::decode_from_slice::<P, _>(bytes, bincode::config::standard()).map_err(
            |err| UnwrapError::PayloadDecodeFailed {
                type_name: type_name::<P>(),
                reason: err.to_string(),
            },
        )?;
    Ok(Box::new(payload))
}
