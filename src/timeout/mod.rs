use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap},
    sync::{Arc, Condvar, Mutex},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crate::{
    callbacks::TemporaryRegistry,
    dispatch::Dispatcher,
    schema::PayloadKind,
    sync::lock,
};

/// Invoked when a scheduled timeout elapses before a response arrives.
pub type TimeoutCallback = Box<dyn FnOnce() + Send>;

/// `Scheduled -> { Fired | Cancelled }`; `valid == true` is `Scheduled`.
struct TimeoutEntry {
    kind: PayloadKind,
    valid: bool,
    on_timeout: Option<TimeoutCallback>,
}

struct SchedulerState {
    entries: HashMap<u64, TimeoutEntry>,
    /// Ids per kind in scheduling order; "oldest" for cancellation means
    /// the front-most still-valid id here.
    order: HashMap<PayloadKind, Vec<u64>>,
    deadlines: BinaryHeap<Reverse<(Instant, u64)>>,
    next_id: u64,
    shutdown: bool,
}

struct SchedulerShared {
    state: Mutex<SchedulerState>,
    wake: Condvar,
    temporary: Arc<TemporaryRegistry>,
    dispatcher: Arc<Dispatcher>,
}

/// Races response timeouts against arrivals on a single worker thread
/// with a deadline heap, instead of one thread per outstanding request.
///
/// The race contract: both the arrival path ([`cancel_first`]) and the
/// firing path read-and-flip an entry's validity under the scheduler
/// lock, so only the side that observes `Scheduled` consumes the
/// temporary-callback slot. This prevents double-consumption, but which
/// of two concurrently outstanding requests for the same kind gets
/// cancelled is decided by scheduling order alone.
///
/// [`cancel_first`]: TimeoutScheduler::cancel_first
pub struct TimeoutScheduler {
    shared: Arc<SchedulerShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TimeoutScheduler {
    pub fn new(temporary: Arc<TemporaryRegistry>, dispatcher: Arc<Dispatcher>) -> Self {
        let shared = Arc::new(SchedulerShared {
            state: Mutex::new(SchedulerState {
                entries: HashMap::new(),
                order: HashMap::new(),
                deadlines: BinaryHeap::new(),
                next_id: 0,
                shutdown: false,
            }),
            wake: Condvar::new(),
            temporary,
            dispatcher,
        });

        let worker_shared = shared.clone();
        let worker = thread::Builder::new()
            .name("herald-timeouts".to_string())
            .spawn(move || run_worker(&worker_shared))
            .expect("failed to spawn the timeout scheduler thread");

        Self {
            shared,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Registers a `Scheduled` entry that fires after `delay` unless a
    /// response for `kind` cancels it first.
    pub fn schedule(&self, kind: PayloadKind, delay: Duration, on_timeout: TimeoutCallback) {
        {
            let mut state = lock(&self.shared.state);
            if state.shutdown {
                return;
            }
            let id = state.next_id;
            state.next_id += 1;
            state.entries.insert(
                id,
                TimeoutEntry {
                    kind,
                    valid: true,
                    on_timeout: Some(on_timeout),
                },
            );
            state.order.entry(kind).or_default().push(id);
            state.deadlines.push(Reverse((Instant::now() + delay, id)));
        }
        self.shared.wake.notify_one();
    }

    /// Arrival path: marks the oldest still-`Scheduled` entry for the
    /// kind `Cancelled`, so the about-to-fire timeout (if racing)
    /// no-ops. Physical removal happens when its deadline drains.
    pub fn cancel_first(&self, kind: PayloadKind) {
        let mut state = lock(&self.shared.state);
        let Some(ids) = state.order.get(&kind) else {
            return;
        };
        let oldest_valid = ids
            .iter()
            .copied()
            .find(|id| state.entries.get(id).is_some_and(|entry| entry.valid));
        if let Some(id) = oldest_valid {
            if let Some(entry) = state.entries.get_mut(&id) {
                entry.valid = false;
                entry.on_timeout = None;
            }
        }
    }

    /// Cancels every outstanding entry for the kind.
    pub fn cancel_all_for(&self, kind: PayloadKind) {
        let mut state = lock(&self.shared.state);
        let ids: Vec<u64> = state.order.get(&kind).cloned().unwrap_or_default();
        for id in ids {
            if let Some(entry) = state.entries.get_mut(&id) {
                entry.valid = false;
                entry.on_timeout = None;
            }
        }
    }

    /// Number of still-`Scheduled` entries for the kind.
    pub fn pending_for(&self, kind: PayloadKind) -> usize {
        let state = lock(&self.shared.state);
        state
            .entries
            .values()
            .filter(|entry| entry.kind == kind && entry.valid)
            .count()
    }

    /// Cancels everything and joins the worker. Guarantees no timeout
    /// callback fires after this returns. Idempotent.
    pub fn shutdown(&self) {
        {
            let mut state = lock(&self.shared.state);
            state.shutdown = true;
            for entry in state.entries.values_mut() {
                entry.valid = false;
                entry.on_timeout = None;
            }
        }
        self.shared.wake.notify_one();

        if let Some(worker) = lock(&self.worker).take() {
            let _ = worker.join();
        }
    }
}

impl Drop for TimeoutScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(shared: &SchedulerShared) {
    let mut state = lock(&shared.state);
    loop {
        if state.shutdown {
            return;
        }

        let mut fired: Vec<(PayloadKind, TimeoutCallback)> = Vec::new();
        let now = Instant::now();
        while let Some(&Reverse((deadline, id))) = state.deadlines.peek() {
            if deadline > now {
                break;
            }
            state.deadlines.pop();

            let Some(mut entry) = state.entries.remove(&id) else {
                continue;
            };
            if let Some(ids) = state.order.get_mut(&entry.kind) {
                ids.retain(|&other| other != id);
            }
            if entry.valid {
                entry.valid = false;
                // Same FIFO slot the timed send registered, consumed by
                // position while still under the scheduler lock; an
                // arrival racing in must observe the flipped validity.
                let _ = shared.temporary.consume(entry.kind);
                if let Some(on_timeout) = entry.on_timeout.take() {
                    fired.push((entry.kind, on_timeout));
                }
            }
        }

        if !fired.is_empty() {
            drop(state);
            for (kind, on_timeout) in fired {
                let mode = shared.dispatcher.mode_for(kind);
                shared.dispatcher.run_or_defer(mode, on_timeout);
            }
            state = lock(&shared.state);
            continue;
        }

        state = match state.deadlines.peek() {
            Some(&Reverse((deadline, _))) => {
                let wait_for = deadline.saturating_duration_since(Instant::now());
                match shared.wake.wait_timeout(state, wait_for) {
                    Ok((guard, _)) => guard,
                    Err(poisoned) => poisoned.into_inner().0,
                }
            }
            None => match shared.wake.wait(state) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            },
        };
    }
}
