use std::sync::Arc;

/// Hook invoked when the transport considers its connection open.
pub type OnConnect = Arc<dyn Fn() + Send + Sync>;
/// Hook invoked with every chunk of inbound wire bytes.
pub type OnData = Arc<dyn Fn(&[u8]) + Send + Sync>;
/// Hook invoked when the connection breaks, with a human-readable reason.
pub type OnDisconnect = Arc<dyn Fn(&str) + Send + Sync>;

/// The connection the engine drives. Implement this as a thin decorator
/// over whichever byte-oriented transport you want to use (TCP,
/// WebSocket, an in-process channel, ...). The engine takes ownership of
/// the instance and installs its three hooks exactly once, at
/// construction.
///
/// The engine never constrains what "connected" means or which thread
/// invokes the hooks: they may arrive from any thread, concurrently with
/// application calls into the engine. One caveat for fully synchronous
/// transports: the engine holds its transport lock while `send_data`
/// runs, so a transport that delivers inbound data *inside* `send_data`
/// must not be driven by callbacks that themselves send (deliver from a
/// separate thread instead).
pub trait Transport: Send + 'static {
    /// Called when the engine's `connect` operation is invoked.
    fn connect(&mut self, host: &str, port: u16);

    /// Called when the engine's `disconnect` operation is invoked.
    fn disconnect(&mut self);

    /// Should return true while the transport is ready for communication.
    fn is_connected(&self) -> bool;

    /// Called with fully serialized wire bytes to transmit.
    fn send_data(&mut self, data: &[u8]);

    /// Installed once at engine construction. Invoke the hook whenever
    /// the underlying connection becomes ready.
    fn set_on_connect(&mut self, hook: OnConnect);

    /// Installed once at engine construction. Invoke the hook with every
    /// chunk of received wire bytes.
    fn set_on_data(&mut self, hook: OnData);

    /// Installed once at engine construction. Invoke the hook when the
    /// underlying connection breaks, passing a reason string.
    fn set_on_disconnect(&mut self, hook: OnDisconnect);
}
