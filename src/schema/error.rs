use thiserror::Error;

/// Errors that can occur while packing an outbound payload into a wire
/// frame
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackError {
    /// Payload type was never registered with the Schema
    #[error("Payload type {type_name} is not registered. Payload types must be registered with Schema via add_payload() before sending")]
    PayloadNotRegistered { type_name: &'static str },

    /// Payload value could not be encoded
    #[error("Failed to encode payload of type {type_name}: {reason}")]
    PayloadEncodeFailed {
        type_name: &'static str,
        reason: String,
    },
}

/// Errors that can occur while unwrapping an inbound wire frame. All of
/// these are recovered locally: the frame is logged and dropped, nothing
/// surfaces to the transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnwrapError {
    /// Frame too short to carry a payload identifier
    #[error("Received frame is empty or truncated before the payload identifier. The peer sent a malformed envelope")]
    EmptyFrame,

    /// Payload identifier not present in the schema
    #[error("Received frame carries unknown payload id {net_id}. The sending peer's schema does not match this one")]
    UnknownNetId { net_id: u16 },

    /// Payload bytes did not decode as the identified type
    #[error("Failed to decode payload bytes as {type_name}: {reason}")]
    PayloadDecodeFailed {
        type_name: &'static str,
        reason: String,
    },
}
