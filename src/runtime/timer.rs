// Single-purpose timers and version tokens for discarding superseded callbacks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::{Task, TimerId, UiScheduler};

/// Holds at most one pending timer for a given purpose.
/// Scheduling again cancels whatever was still pending.
#[derive(Debug, Default)]
pub struct TimerSlot {
    pending: Mutex<Option<TimerId>>,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any pending timer with a new one firing after `delay`.
    pub fn schedule(&self, scheduler: &dyn UiScheduler, delay: Duration, task: Task) -> TimerId {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.take() {
            scheduler.cancel(previous);
        }
        let id = scheduler.post_after(delay, task);
        *pending = Some(id);
        id
    }

    /// Cancel the pending timer. Returns true if one was actually stopped.
    pub fn cancel(&self, scheduler: &dyn UiScheduler) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.take().is_some_and(|id| scheduler.cancel(id))
    }

    pub fn is_pending(&self, scheduler: &dyn UiScheduler) -> bool {
        let pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        (*pending).is_some_and(|id| scheduler.is_pending(id))
    }
}

/// Monotonically increasing token. Deferred callbacks capture the value at
/// scheduling time and drop themselves when it has moved on.
#[derive(Debug, Default)]
pub struct StateVersion(AtomicU64);

impl StateVersion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidate every outstanding token and return the new one.
    pub fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, token: u64) -> bool {
        self.current() == token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MainLoop, ManualClock};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    // ── TimerSlot ──────────────────────────────────────────────────

    #[test]
    fn rescheduling_cancels_previous_timer() {
        let clock = Arc::new(ManualClock::new());
        let main_loop = MainLoop::with_clock(clock.clone());
        let handle = main_loop.handle();
        let slot = TimerSlot::new();
        let fired = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let fired = Arc::clone(&fired);
            slot.schedule(
                &handle,
                Duration::from_millis(100),
                Box::new(move || fired.lock().unwrap().push(label)),
            );
            clock.advance(Duration::from_millis(50));
            main_loop.run_pending();
        }
        assert_eq!(main_loop.pending_timers(), 1);

        clock.advance(Duration::from_millis(100));
        main_loop.run_pending();
        assert_eq!(*fired.lock().unwrap(), vec!["third"]);
    }

    #[test]
    fn cancel_reports_whether_a_timer_was_stopped() {
        let main_loop = MainLoop::with_clock(Arc::new(ManualClock::new()));
        let handle = main_loop.handle();
        let slot = TimerSlot::new();
        assert!(!slot.cancel(&handle));

        slot.schedule(&handle, Duration::from_millis(10), Box::new(|| {}));
        assert!(slot.is_pending(&handle));
        assert!(slot.cancel(&handle));
        assert!(!slot.is_pending(&handle));
        assert!(!slot.cancel(&handle));
    }

    #[test]
    fn slot_is_not_pending_after_fire() {
        let clock = Arc::new(ManualClock::new());
        let main_loop = MainLoop::with_clock(clock.clone());
        let handle = main_loop.handle();
        let slot = TimerSlot::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_in = Arc::clone(&hits);
        slot.schedule(
            &handle,
            Duration::from_millis(1),
            Box::new(move || {
                hits_in.fetch_add(1, Ordering::SeqCst);
            }),
        );
        clock.advance(Duration::from_millis(1));
        main_loop.run_pending();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!slot.is_pending(&handle));
    }

    // ── StateVersion ───────────────────────────────────────────────

    #[test]
    fn bump_invalidates_earlier_tokens() {
        let version = StateVersion::new();
        let first = version.bump();
        assert!(version.is_current(first));
        let second = version.bump();
        assert!(!version.is_current(first));
        assert!(version.is_current(second));
        assert!(second > first);
    }

    #[test]
    fn fresh_version_starts_at_zero() {
        let version = StateVersion::new();
        assert_eq!(version.current(), 0);
        assert!(version.is_current(0));
    }
}
