use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
};

use crate::{schema::PayloadKind, sync::lock, types::DispatchMode};

/// A queued invocation awaiting the pump.
pub type DeferredJob = Box<dyn FnOnce() + Send>;

/// Decides, per payload kind and per lifecycle event, whether callbacks
/// run inline on the delivering thread or wait for an explicit
/// [`pump`](Dispatcher::pump) call, and owns the queue of deferred jobs.
pub struct Dispatcher {
    default_mode: DispatchMode,
    overrides: Mutex<HashMap<PayloadKind, DispatchMode>>,
    connect_mode: Mutex<DispatchMode>,
    disconnect_mode: Mutex<DispatchMode>,
    pending: Mutex<VecDeque<DeferredJob>>,
}

impl Dispatcher {
    pub fn new(default_mode: DispatchMode) -> Self {
        Self {
            default_mode,
            overrides: Mutex::new(HashMap::new()),
            connect_mode: Mutex::new(default_mode),
            disconnect_mode: Mutex::new(default_mode),
            pending: Mutex::new(VecDeque::new()),
        }
    }

    pub fn mode_for(&self, kind: PayloadKind) -> DispatchMode {
        lock(&self.overrides)
            .get(&kind)
            .copied()
            .unwrap_or(self.default_mode)
    }

    pub fn set_mode(&self, kind: PayloadKind, mode: DispatchMode) {
        lock(&self.overrides).insert(kind, mode);
    }

    /// Removes the kind's override so it tracks the default again.
    pub fn reset_mode(&self, kind: PayloadKind) {
        lock(&self.overrides).remove(&kind);
    }

    pub fn connect_mode(&self) -> DispatchMode {
        *lock(&self.connect_mode)
    }

    pub fn set_connect_mode(&self, mode: DispatchMode) {
        *lock(&self.connect_mode) = mode;
    }

    pub fn reset_connect_mode(&self) {
        *lock(&self.connect_mode) = self.default_mode;
    }

    pub fn disconnect_mode(&self) -> DispatchMode {
        *lock(&self.disconnect_mode)
    }

    pub fn set_disconnect_mode(&self, mode: DispatchMode) {
        *lock(&self.disconnect_mode) = mode;
    }

    pub fn reset_disconnect_mode(&self) {
        *lock(&self.disconnect_mode) = self.default_mode;
    }

    /// Appends a job to the pending queue, to run on the next pump.
    pub fn defer(&self, job: DeferredJob) {
        lock(&self.pending).push_back(job);
    }

    /// Runs the job now or queues it, per the given mode.
    pub fn run_or_defer(&self, mode: DispatchMode, job: DeferredJob) {
        match mode {
            DispatchMode::Immediate => job(),
            DispatchMode::Deferred => self.defer(job),
        }
    }

    /// Drains a snapshot of the pending queue and runs each job in
    /// enqueue order on the calling thread. Jobs enqueued while the pump
    /// runs wait for the next pump, which bounds reentrancy and keeps one
    /// pump's duration independent of concurrent producers.
    pub fn pump(&self) {
        let snapshot = {
            let mut pending = lock(&self.pending);
            std::mem::take(&mut *pending)
        };
        for job in snapshot {
            job();
        }
    }
}
