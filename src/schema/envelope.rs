use std::any::type_name;

use crate::schema::{PackError, Payload, PayloadKind, Schema, UnwrapError};

/// Little-endian wire id, then payload bytes.
const NET_ID_BYTES: usize = 2;

/// A decoded inbound message: the payload value together with its
/// dispatch key. The payload is owned here; nothing upstream retains a
/// reference to it.
pub struct Envelope {
    kind: PayloadKind,
    payload: Box<dyn Payload>,
}

impl Envelope {
    pub(crate) fn new(kind: PayloadKind, payload: Box<dyn Payload>) -> Self {
        Self { kind, payload }
    }

    pub fn kind(&self) -> PayloadKind {
        self.kind
    }

    pub fn payload(&self) -> &dyn Payload {
        self.payload.as_ref()
    }
}

/// Packs an outbound payload into a wire frame: the type's registered
/// wire id followed by its encoded bytes. An unregistered payload type
/// is a loud error, never a silently empty frame.
pub fn pack<P: Payload>(schema: &Schema, payload: &P) -> Result<Vec<u8>, PackError> {
    let kind = PayloadKind::of::<P>();
    let entry = schema
        .entry(kind)
        .ok_or(PackError::PayloadNotRegistered {
            type_name: type_name::<P>(),
        })?;

    let payload_bytes = (entry.encode)(payload)?;
    let mut frame = Vec::with_capacity(NET_ID_BYTES + payload_bytes.len());
    frame.extend_from_slice(&entry.net_id.to_le_bytes());
    frame.extend_from_slice(&payload_bytes);
    Ok(frame)
}

/// Unwraps an inbound wire frame into its single payload and kind.
pub fn unwrap(schema: &Schema, frame: &[u8]) -> Result<Envelope, UnwrapError> {
    if frame.len() < NET_ID_BYTES {
        return Err(UnwrapError::EmptyFrame);
    }

    let net_id = u16::from_le_bytes([frame[0], frame[1]]);
    let kind = schema
        .kind_for_net_id(net_id)
        .ok_or(UnwrapError::UnknownNetId { net_id })?;
    let entry = schema
        .entry(kind)
        .ok_or(UnwrapError::UnknownNetId { net_id })?;

    let payload = (entry.decode)(&frame[NET_ID_BYTES..])?;
    Ok(Envelope::new(kind, payload))
}
