// Cooperative UI-loop runtime: task posting, cancellable timers, stale-result tokens.

pub mod clock;
pub mod main_loop;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use main_loop::{LoopHandle, MainLoop};
pub use timer::{StateVersion, TimerSlot};

use std::time::Duration;

/// A unit of work executed on the UI loop.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// Posts work onto the single UI thread.
///
/// Worker threads never touch widgets: they post a task here and the loop
/// runs it at the next idle slot.
pub trait UiScheduler: Send + Sync {
    /// Run `task` at the next idle slot.
    fn post(&self, task: Task);

    /// Run `task` once `delay` has elapsed.
    fn post_after(&self, delay: Duration, task: Task) -> TimerId;

    /// Cancel a timer. Returns false if it already fired or was cancelled.
    fn cancel(&self, id: TimerId) -> bool;

    /// Whether the timer is still waiting to fire.
    fn is_pending(&self, id: TimerId) -> bool;
}
