#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};

use herald::{OnConnect, OnData, OnDisconnect, Schema, Transport};

// Payload types shared by the integration tests.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ping {
    pub seq: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pong {
    pub seq: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Farewell {
    pub reason: String,
}

pub fn schema() -> Schema {
    let mut schema = Schema::builder();
    schema
        .add_payload::<Ping>()
        .add_payload::<Pong>()
        .add_payload::<Chat>()
        .add_payload::<Farewell>();
    schema
}

#[derive(Default)]
struct Hooks {
    on_connect: Option<OnConnect>,
    on_data: Option<OnData>,
    on_disconnect: Option<OnDisconnect>,
}

/// The far side of a test link. The engine owns the transport itself;
/// the test keeps a `Peer` clone and uses it to inject inbound frames
/// and connection events, and to inspect what was sent.
#[derive(Clone, Default)]
pub struct Peer {
    hooks: Arc<Mutex<Hooks>>,
    connected: Arc<AtomicBool>,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl Peer {
    /// Feeds a frame to the engine as inbound wire bytes.
    pub fn deliver(&self, frame: &[u8]) {
        let hook = self.hooks.lock().unwrap().on_data.clone();
        if let Some(hook) = hook {
            hook(frame);
        }
    }

    /// Breaks the link from the far side.
    pub fn drop_link(&self, reason: &str) {
        self.connected.store(false, Ordering::SeqCst);
        let hook = self.hooks.lock().unwrap().on_disconnect.clone();
        if let Some(hook) = hook {
            hook(reason);
        }
    }

    /// Opens the link from the far side.
    pub fn open_link(&self) {
        self.connected.store(true, Ordering::SeqCst);
        let hook = self.hooks.lock().unwrap().on_connect.clone();
        if let Some(hook) = hook {
            hook();
        }
    }

    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, data: &[u8]) {
        self.sent.lock().unwrap().push(data.to_vec());
    }
}

/// Transport driven entirely from the test side through its [`Peer`]
/// handle. Sent frames are recorded, never looped back.
#[derive(Default)]
pub struct ScriptedTransport {
    peer: Peer,
}

impl ScriptedTransport {
    pub fn peer(&self) -> Peer {
        self.peer.clone()
    }
}

impl Transport for ScriptedTransport {
    fn connect(&mut self, _host: &str, _port: u16) {
        self.peer.open_link();
    }

    fn disconnect(&mut self) {
        self.peer.drop_link("closed locally");
    }

    fn is_connected(&self) -> bool {
        self.peer.connected.load(Ordering::SeqCst)
    }

    fn send_data(&mut self, data: &[u8]) {
        self.peer.record(data);
    }

    fn set_on_connect(&mut self, hook: OnConnect) {
        self.peer.hooks.lock().unwrap().on_connect = Some(hook);
    }

    fn set_on_data(&mut self, hook: OnData) {
        self.peer.hooks.lock().unwrap().on_data = Some(hook);
    }

    fn set_on_disconnect(&mut self, hook: OnDisconnect) {
        self.peer.hooks.lock().unwrap().on_disconnect = Some(hook);
    }
}

/// Transport that reflects every sent frame straight back as inbound
/// data, synchronously on the sending thread.
#[derive(Default)]
pub struct EchoTransport {
    peer: Peer,
}

impl EchoTransport {
    pub fn peer(&self) -> Peer {
        self.peer.clone()
    }
}

impl Transport for EchoTransport {
    fn connect(&mut self, _host: &str, _port: u16) {
        self.peer.open_link();
    }

    fn disconnect(&mut self) {
        self.peer.drop_link("closed locally");
    }

    fn is_connected(&self) -> bool {
        self.peer.connected.load(Ordering::SeqCst)
    }

    fn send_data(&mut self, data: &[u8]) {
        self.peer.record(data);
        let hook = self.peer.hooks.lock().unwrap().on_data.clone();
        if let Some(hook) = hook {
            hook(data);
        }
    }

    fn set_on_connect(&mut self, hook: OnConnect) {
        self.peer.hooks.lock().unwrap().on_connect = Some(hook);
    }

    fn set_on_data(&mut self, hook: OnData) {
        self.peer.hooks.lock().unwrap().on_data = Some(hook);
    }

    fn set_on_disconnect(&mut self, hook: OnDisconnect) {
        self.peer.hooks.lock().unwrap().on_disconnect = Some(hook);
    }
}

/// Like [`EchoTransport`], but the reflection happens on a spawned
/// thread after a fixed delay, so responses can race timeouts.
pub struct TimedEchoTransport {
    peer: Peer,
    delay: Duration,
}

impl TimedEchoTransport {
    pub fn new(delay: Duration) -> Self {
        Self {
            peer: Peer::default(),
            delay,
        }
    }

    pub fn peer(&self) -> Peer {
        self.peer.clone()
    }
}

impl Transport for TimedEchoTransport {
    fn connect(&mut self, _host: &str, _port: u16) {
        self.peer.open_link();
    }

    fn disconnect(&mut self) {
        self.peer.drop_link("closed locally");
    }

    fn is_connected(&self) -> bool {
        self.peer.connected.load(Ordering::SeqCst)
    }

    fn send_data(&mut self, data: &[u8]) {
        self.peer.record(data);
        let peer = self.peer.clone();
        let delay = self.delay;
        let frame = data.to_vec();
        thread::spawn(move || {
            thread::sleep(delay);
            peer.deliver(&frame);
        });
    }

    fn set_on_connect(&mut self, hook: OnConnect) {
        self.peer.hooks.lock().unwrap().on_connect = Some(hook);
    }

    fn set_on_data(&mut self, hook: OnData) {
        self.peer.hooks.lock().unwrap().on_data = Some(hook);
    }

    fn set_on_disconnect(&mut self, hook: OnDisconnect) {
        self.peer.hooks.lock().unwrap().on_disconnect = Some(hook);
    }
}

/// Polls `condition` until it holds or `limit` elapses, returning the
/// final observation.
pub fn wait_until(limit: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}
