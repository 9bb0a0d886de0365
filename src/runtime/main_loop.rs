// Single-threaded main loop: a crossbeam task queue plus a deadline-ordered timer set.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use super::{Clock, SystemClock, Task, TimerId, UiScheduler};

/// Upper bound on `run_until_idle` passes, so a task that keeps re-posting
/// itself cannot wedge the caller.
const MAX_IDLE_PASSES: usize = 10_000;

#[derive(Default)]
struct Timers {
    next_id: u64,
    queue: BTreeMap<(Instant, TimerId), Task>,
    deadlines: HashMap<TimerId, Instant>,
}

impl Timers {
    fn insert(&mut self, deadline: Instant, task: Task) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.queue.insert((deadline, id), task);
        self.deadlines.insert(id, deadline);
        id
    }

    fn remove(&mut self, id: TimerId) -> bool {
        match self.deadlines.remove(&id) {
            Some(deadline) => self.queue.remove(&(deadline, id)).is_some(),
            None => false,
        }
    }

    /// Pop every timer whose deadline is at or before `now`, earliest first.
    fn take_due(&mut self, now: Instant) -> Vec<Task> {
        let mut due = Vec::new();
        while let Some(entry) = self.queue.first_entry() {
            let (deadline, id) = *entry.key();
            if deadline > now {
                break;
            }
            due.push(entry.remove());
            self.deadlines.remove(&id);
        }
        due
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.queue.keys().next().map(|(deadline, _)| *deadline)
    }
}

struct Shared {
    timers: Mutex<Timers>,
    clock: Arc<dyn Clock>,
}

impl Shared {
    fn timers(&self) -> std::sync::MutexGuard<'_, Timers> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cloneable, thread-safe handle for posting onto a [`MainLoop`].
#[derive(Clone)]
pub struct LoopHandle {
    tx: Sender<Task>,
    shared: Arc<Shared>,
}

impl LoopHandle {
    /// The clock the loop measures timer deadlines against.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.shared.clock)
    }
}

impl UiScheduler for LoopHandle {
    fn post(&self, task: Task) {
        if self.tx.send(task).is_err() {
            log::warn!("UI loop is gone, dropping posted task");
        }
    }

    fn post_after(&self, delay: Duration, task: Task) -> TimerId {
        let deadline = self.shared.clock.now() + delay;
        self.shared.timers().insert(deadline, task)
    }

    fn cancel(&self, id: TimerId) -> bool {
        self.shared.timers().remove(id)
    }

    fn is_pending(&self, id: TimerId) -> bool {
        self.shared.timers().deadlines.contains_key(&id)
    }
}

/// The UI loop. Owns the receiving end of the task queue; only the thread
/// that drives it may touch widget state.
pub struct MainLoop {
    rx: Receiver<Task>,
    handle: LoopHandle,
}

impl MainLoop {
    /// Create a loop measured against the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a loop whose timers are measured against `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        let shared = Arc::new(Shared {
            timers: Mutex::new(Timers::default()),
            clock,
        });
        Self {
            rx,
            handle: LoopHandle { tx, shared },
        }
    }

    pub fn handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    /// Fire due timers, then run the tasks that were queued on entry.
    /// Tasks posted while this runs wait for the next call.
    /// Returns the number of callbacks executed.
    pub fn run_pending(&self) -> usize {
        let now = self.handle.shared.clock.now();
        let due = self.handle.shared.timers().take_due(now);
        let mut ran = due.len();
        for task in due {
            task();
        }

        let queued = self.rx.len();
        for _ in 0..queued {
            match self.rx.try_recv() {
                Ok(task) => {
                    task();
                    ran += 1;
                }
                Err(_) => break,
            }
        }
        ran
    }

    /// Keep running until nothing is queued or due.
    pub fn run_until_idle(&self) -> usize {
        let mut total = 0;
        for _ in 0..MAX_IDLE_PASSES {
            let ran = self.run_pending();
            if ran == 0 {
                return total;
            }
            total += ran;
        }
        log::warn!("UI loop still busy after {MAX_IDLE_PASSES} passes");
        total
    }

    /// Earliest pending timer deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.handle.shared.timers().next_deadline()
    }

    /// Number of timers waiting to fire.
    pub fn pending_timers(&self) -> usize {
        self.handle.shared.timers().deadlines.len()
    }

    /// Block until a task is posted (typically from a worker thread) and run
    /// it. Returns false if nothing arrived within `timeout`.
    pub fn run_next_posted(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(task) => {
                task();
                true
            }
            Err(_) => false,
        }
    }

    /// Drive the loop in real time for `duration`, sleeping on the task queue
    /// between timer deadlines.
    pub fn run_for(&self, duration: Duration) {
        let clock = Arc::clone(&self.handle.shared.clock);
        let end = clock.now() + duration;
        loop {
            self.run_pending();
            let now = clock.now();
            if now >= end {
                break;
            }
            let wake = self.next_deadline().map_or(end, |d| d.min(end));
            let wait = wake.saturating_duration_since(now);
            match self.rx.recv_timeout(wait) {
                Ok(task) => task(),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }
}

impl Default for MainLoop {
    fn default() -> Self {
        Self::new()
    }
}
