//! # Herald
//! A transport-agnostic message-dispatch engine. Herald sits between a
//! byte-oriented connection and application code: it unwraps inbound
//! frames, routes each payload to the callbacks registered for its
//! type, and manages the timeout, back-pressure, and threading concerns
//! of doing so safely. Build request/response or publish/subscribe
//! protocols over any connection (TCP, WebSocket, in-process, ...) by
//! wrapping it in the [`Transport`] trait.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod callbacks;
mod config;
mod dispatch;
mod engine;
mod herald;
mod lifecycle;
mod schema;
mod sync;
mod timeout;
mod transport;
mod types;
mod unhandled;

pub use callbacks::{
    PermanentCallback, PermanentRegistry, TemporaryCallback, TemporaryRegistry,
};
pub use schema::{
    envelope::{pack, unwrap, Envelope},
    error::{PackError, UnwrapError},
    payload_kind::PayloadKind,
    Payload, Schema,
};
pub use transport::{OnConnect, OnData, OnDisconnect, Transport};

pub use config::HeraldConfig;
pub use dispatch::DeferredJob;
pub use engine::{DeserializeOverride, SerializeOverride};
pub use herald::Herald;
pub use lifecycle::{ConnectObserver, DisconnectObserver};
pub use timeout::TimeoutCallback;
pub use types::{CallbackTier, DispatchMode, ObserverKey, UnhandledPolicy};
