// Two-child divider container driven by a target ratio rather than a pixel offset.
//
// The paned has no size until the toolkit lays it out, so the ratio is
// applied once a non-zero allocation shows up (map signal or frame retry).

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::widgets::{Orientation, PanedWidget, SignalId, WidgetRef};
use super::LayoutContext;
use crate::config::SplitConfig;
use crate::runtime::{TimerSlot, UiScheduler};

/// Called with the new ratio after a user drag settles.
pub type RatioCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// Result of one attempt to push the ratio into the paned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Divider moved to this pixel position.
    Applied(i32),
    /// No allocation yet along the split axis.
    Deferred,
}

/// Externally observable ratio state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatioState {
    PendingAllocation,
    Applied,
}

enum RatioPhase {
    /// Subscriptions waiting for a usable size. `tick` is dropped once the
    /// frame budget runs out; the map subscription stays armed.
    PendingAllocation {
        map: SignalId,
        tick: Option<SignalId>,
    },
    Applied,
}

struct SplitState {
    ratio: f64,
    start: WidgetRef,
    end: WidgetRef,
    phase: RatioPhase,
    notify: Option<SignalId>,
    on_ratio_changed: Option<RatioCallback>,
}

pub struct SplitView {
    paned: Arc<dyn PanedWidget>,
    orientation: Orientation,
    scheduler: Arc<dyn UiScheduler>,
    settings: SplitConfig,
    state: Mutex<SplitState>,
    /// Set while `apply_ratio` writes the position, so it isn't mistaken for a drag.
    applying: AtomicBool,
    drag_timer: TimerSlot,
    this: Weak<SplitView>,
}

impl SplitView {
    pub fn new(
        ctx: &LayoutContext,
        orientation: Orientation,
        start: WidgetRef,
        end: WidgetRef,
        ratio: f64,
    ) -> Arc<Self> {
        let paned = ctx.factory.new_paned(orientation);
        paned.set_start_child(Some(&start));
        paned.set_end_child(Some(&end));
        paned.set_resize_start_child(true);
        paned.set_resize_end_child(true);
        paned.set_wide_handle(ctx.settings.split.wide_handle);
        paned.set_hexpand(true);
        paned.set_vexpand(true);

        let view = Arc::new_cyclic(|this| SplitView {
            paned,
            orientation,
            scheduler: Arc::clone(&ctx.scheduler),
            settings: ctx.settings.split.clone(),
            state: Mutex::new(SplitState {
                ratio: ratio.clamp(0.0, 1.0),
                start,
                end,
                phase: RatioPhase::Applied,
                notify: None,
                on_ratio_changed: None,
            }),
            applying: AtomicBool::new(false),
            drag_timer: TimerSlot::new(),
            this: this.clone(),
        });

        // Connected before the first apply so the initial write is filtered too.
        let weak = view.this.clone();
        let notify = view.paned.connect_notify_position(Arc::new(move || {
            if let Some(view) = weak.upgrade() {
                view.on_position_notify();
            }
        }));
        view.state().notify = Some(notify);
        view.apply_or_defer();
        view
    }

    fn state(&self) -> MutexGuard<'_, SplitState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The paned as a plain widget, for attaching into a parent.
    pub fn widget(&self) -> WidgetRef {
        self.paned.clone()
    }

    pub fn paned(&self) -> &Arc<dyn PanedWidget> {
        &self.paned
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn ratio(&self) -> f64 {
        self.state().ratio
    }

    pub fn ratio_state(&self) -> RatioState {
        match self.state().phase {
            RatioPhase::PendingAllocation { .. } => RatioState::PendingAllocation,
            RatioPhase::Applied => RatioState::Applied,
        }
    }

    pub fn start_child(&self) -> WidgetRef {
        Arc::clone(&self.state().start)
    }

    pub fn end_child(&self) -> WidgetRef {
        Arc::clone(&self.state().end)
    }

    pub fn set_on_ratio_changed(&self, callback: Option<RatioCallback>) {
        self.state().on_ratio_changed = callback;
    }

    /// Store a new ratio (clamped to [0, 1]) and push it into the paned.
    pub fn set_ratio(&self, ratio: f64) {
        let ratio = ratio.clamp(0.0, 1.0);
        let pending = {
            let mut state = self.state();
            state.ratio = ratio;
            matches!(state.phase, RatioPhase::PendingAllocation { .. })
        };
        // The map and frame subscriptions may never fire again, so try now.
        if pending {
            self.try_settle();
        } else {
            self.apply_or_defer();
        }
    }

    fn axis_size(&self) -> i32 {
        match self.orientation {
            Orientation::Horizontal => self.paned.allocated_width(),
            Orientation::Vertical => self.paned.allocated_height(),
        }
    }

    /// Move the divider to `round(size * ratio)` if the paned has a size.
    pub fn apply_ratio(&self) -> ApplyOutcome {
        let size = self.axis_size();
        if size <= 0 {
            return ApplyOutcome::Deferred;
        }
        let ratio = self.ratio();
        let position = (f64::from(size) * ratio).round() as i32;
        self.applying.store(true, Ordering::SeqCst);
        self.paned.set_position(position);
        self.applying.store(false, Ordering::SeqCst);
        ApplyOutcome::Applied(position)
    }

    fn apply_or_defer(&self) {
        match self.apply_ratio() {
            ApplyOutcome::Applied(position) => {
                log::debug!("split ratio {:.3} applied at {position}px", self.ratio());
            }
            ApplyOutcome::Deferred => self.arm_deferred(),
        }
    }

    fn arm_deferred(&self) {
        if matches!(self.state().phase, RatioPhase::PendingAllocation { .. }) {
            return;
        }

        let weak = self.this.clone();
        let map = self.paned.connect_map(Arc::new(move || {
            if let Some(view) = weak.upgrade() {
                view.try_settle();
            }
        }));

        let weak = self.this.clone();
        let max_frames = self.settings.max_retry_frames;
        let mut frames = 0u32;
        let tick = self.paned.add_tick_callback(Box::new(move || {
            let Some(view) = weak.upgrade() else {
                return ControlFlow::Break(());
            };
            if view.try_settle() {
                return ControlFlow::Break(());
            }
            frames += 1;
            if frames >= max_frames {
                log::warn!(
                    "split: no allocation after {max_frames} frames, waiting for map to apply ratio"
                );
                view.drop_tick_subscription();
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        }));

        self.state().phase = RatioPhase::PendingAllocation {
            map,
            tick: Some(tick),
        };
        log::debug!("split ratio deferred until allocation");
    }

    /// Retry from a pending subscription. True once the ratio is applied.
    fn try_settle(&self) -> bool {
        if matches!(self.state().phase, RatioPhase::Applied) {
            return true;
        }
        let ApplyOutcome::Applied(position) = self.apply_ratio() else {
            return false;
        };
        let previous = std::mem::replace(&mut self.state().phase, RatioPhase::Applied);
        if let RatioPhase::PendingAllocation { map, tick } = previous {
            self.paned.disconnect(map);
            if let Some(tick) = tick {
                self.paned.disconnect(tick);
            }
        }
        log::debug!("split ratio applied at {position}px after allocation");
        true
    }

    fn drop_tick_subscription(&self) {
        if let RatioPhase::PendingAllocation { tick, .. } = &mut self.state().phase {
            *tick = None;
        }
    }

    fn on_position_notify(&self) {
        if self.applying.load(Ordering::SeqCst) {
            return;
        }
        let size = self.axis_size();
        if size <= 0 {
            return;
        }
        let ratio = (f64::from(self.paned.position()) / f64::from(size)).clamp(0.0, 1.0);
        self.state().ratio = ratio;

        let weak = self.this.clone();
        self.drag_timer.schedule(
            self.scheduler.as_ref(),
            self.settings.drag_notify_debounce(),
            Box::new(move || {
                if let Some(view) = weak.upgrade() {
                    view.emit_ratio_changed();
                }
            }),
        );
    }

    fn emit_ratio_changed(&self) {
        let (callback, ratio) = {
            let state = self.state();
            (state.on_ratio_changed.clone(), state.ratio)
        };
        if let Some(callback) = callback {
            callback(ratio);
        }
    }

    /// Replace the start child, releasing the previous one first.
    pub fn swap_start(&self, widget: WidgetRef) {
        self.paned.set_start_child(None);
        self.paned.set_start_child(Some(&widget));
        self.state().start = widget;
    }

    /// Replace the end child, releasing the previous one first.
    pub fn swap_end(&self, widget: WidgetRef) {
        self.paned.set_end_child(None);
        self.paned.set_end_child(Some(&widget));
        self.state().end = widget;
    }
}

impl Drop for SplitView {
    fn drop(&mut self) {
        self.drag_timer.cancel(self.scheduler.as_ref());
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(notify) = state.notify.take() {
            self.paned.disconnect(notify);
        }
        if let RatioPhase::PendingAllocation { map, tick } =
            std::mem::replace(&mut state.phase, RatioPhase::Applied)
        {
            self.paned.disconnect(map);
            if let Some(tick) = tick {
                self.paned.disconnect(tick);
            }
        }
    }
}

impl std::fmt::Debug for SplitView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SplitView")
            .field("paned", &self.paned.id())
            .field("orientation", &self.orientation)
            .field("ratio", &self.ratio())
            .field("state", &self.ratio_state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{LayoutSettings, WidgetFactory};
    use crate::runtime::{MainLoop, ManualClock};
    use crate::toolkit::HeadlessToolkit;
    use rstest::rstest;
    use std::time::Duration;

    struct Fixture {
        tk: HeadlessToolkit,
        clock: Arc<ManualClock>,
        main_loop: MainLoop,
        ctx: LayoutContext,
    }

    fn fixture() -> Fixture {
        let tk = HeadlessToolkit::new();
        let clock = Arc::new(ManualClock::new());
        let main_loop = MainLoop::with_clock(clock.clone());
        let ctx = LayoutContext::new(Arc::new(tk.clone()), Arc::new(main_loop.handle()));
        Fixture {
            tk,
            clock,
            main_loop,
            ctx,
        }
    }

    fn split(f: &Fixture, orientation: Orientation, ratio: f64) -> Arc<SplitView> {
        let start: WidgetRef = f.tk.new_overlay();
        let end: WidgetRef = f.tk.new_overlay();
        SplitView::new(&f.ctx, orientation, start, end, ratio)
    }

    // ── Ratio clamping ────────────────────────────────────────────────

    #[rstest]
    #[case(-0.5, 0.0)]
    #[case(1.5, 1.0)]
    #[case(0.3, 0.3)]
    #[case(0.0, 0.0)]
    #[case(1.0, 1.0)]
    fn set_ratio_clamps(#[case] input: f64, #[case] expected: f64) {
        let f = fixture();
        let view = split(&f, Orientation::Horizontal, 0.5);
        view.set_ratio(input);
        assert_eq!(view.ratio(), expected);
    }

    #[test]
    fn constructor_clamps_ratio() {
        let f = fixture();
        let view = split(&f, Orientation::Horizontal, 7.0);
        assert_eq!(view.ratio(), 1.0);
    }

    // ── Deferred application ──────────────────────────────────────────

    #[test]
    fn unallocated_split_is_pending() {
        let f = fixture();
        let view = split(&f, Orientation::Horizontal, 0.5);
        assert_eq!(view.ratio_state(), RatioState::PendingAllocation);
        assert_eq!(view.apply_ratio(), ApplyOutcome::Deferred);
        assert_eq!(view.paned().position(), 0);
        assert_eq!(f.tk.tick_callbacks(), 1);
    }

    #[test]
    fn tick_applies_once_allocated_and_unsubscribes() {
        let f = fixture();
        let view = split(&f, Orientation::Horizontal, 0.25);
        f.tk.tick();
        assert_eq!(view.ratio_state(), RatioState::PendingAllocation);

        f.tk.allocate(view.paned().as_ref(), 400, 300);
        f.tk.tick();
        assert_eq!(view.ratio_state(), RatioState::Applied);
        assert_eq!(view.paned().position(), 100);
        assert_eq!(f.tk.tick_callbacks(), 0);
        // Only the position-notify subscription remains.
        assert_eq!(f.tk.signal_count(), 1);
    }

    #[test]
    fn map_applies_once_allocated() {
        let f = fixture();
        let view = split(&f, Orientation::Vertical, 0.5);
        f.tk.allocate(view.paned().as_ref(), 400, 301);
        f.tk.map(view.paned().as_ref());
        assert_eq!(view.ratio_state(), RatioState::Applied);
        // Vertical splits measure the height; 150.5 rounds away from zero.
        assert_eq!(view.paned().position(), 151);
        assert_eq!(f.tk.tick_callbacks(), 0);
    }

    #[test]
    fn tick_budget_exhaustion_leaves_map_armed() {
        let f = fixture();
        let view = split(&f, Orientation::Horizontal, 0.5);
        let frames = f.ctx.settings.split.max_retry_frames;
        for _ in 0..frames + 5 {
            f.tk.tick();
        }
        assert_eq!(f.tk.tick_callbacks(), 0);
        assert_eq!(view.ratio_state(), RatioState::PendingAllocation);

        f.tk.allocate(view.paned().as_ref(), 200, 100);
        f.tk.map(view.paned().as_ref());
        assert_eq!(view.ratio_state(), RatioState::Applied);
        assert_eq!(view.paned().position(), 100);
    }

    #[test]
    fn custom_frame_budget() {
        let tk = HeadlessToolkit::new();
        let main_loop = MainLoop::new();
        let mut settings = LayoutSettings::default();
        settings.split.max_retry_frames = 3;
        let ctx = LayoutContext::new(Arc::new(tk.clone()), Arc::new(main_loop.handle()))
            .with_settings(settings);
        let start: WidgetRef = tk.new_overlay();
        let end: WidgetRef = tk.new_overlay();
        let _view = SplitView::new(&ctx, Orientation::Horizontal, start, end, 0.5);
        assert_eq!(tk.tick(), 1);
        assert_eq!(tk.tick(), 1);
        assert_eq!(tk.tick(), 1);
        assert_eq!(tk.tick(), 0);
    }

    #[test]
    fn set_ratio_while_pending_applies_latest_value() {
        let f = fixture();
        let view = split(&f, Orientation::Horizontal, 0.5);
        view.set_ratio(0.75);
        f.tk.allocate(view.paned().as_ref(), 400, 100);
        f.tk.tick();
        assert_eq!(view.paned().position(), 300);
    }

    #[test]
    fn set_ratio_settles_after_map_and_frames_are_spent() {
        let f = fixture();
        let view = split(&f, Orientation::Horizontal, 0.5);
        f.tk.map(view.paned().as_ref());
        for _ in 0..=f.ctx.settings.split.max_retry_frames {
            f.tk.tick();
        }
        assert_eq!(view.ratio_state(), RatioState::PendingAllocation);

        f.tk.allocate(view.paned().as_ref(), 1000, 100);
        view.set_ratio(0.3);
        assert_eq!(view.ratio_state(), RatioState::Applied);
        assert_eq!(view.paned().position(), 300);
        assert_eq!(f.tk.tick_callbacks(), 0);
        assert_eq!(f.tk.signal_count(), 1);
    }

    #[test]
    fn set_ratio_while_pending_and_unallocated_stays_pending() {
        let f = fixture();
        let view = split(&f, Orientation::Horizontal, 0.5);
        view.set_ratio(0.2);
        assert_eq!(view.ratio_state(), RatioState::PendingAllocation);
        assert_eq!(view.paned().position(), 0);
        assert_eq!(f.tk.tick_callbacks(), 1);
    }

    #[test]
    fn set_ratio_after_applied_moves_divider() {
        let f = fixture();
        let view = split(&f, Orientation::Horizontal, 0.5);
        f.tk.allocate(view.paned().as_ref(), 1000, 100);
        f.tk.tick();
        view.set_ratio(0.3);
        assert_eq!(view.paned().position(), 300);
        assert_eq!(view.ratio(), 0.3);
    }

    // ── Drag notification ─────────────────────────────────────────────

    #[test]
    fn drag_updates_ratio_and_debounces_callback() {
        let f = fixture();
        let view = split(&f, Orientation::Horizontal, 0.5);
        f.tk.allocate(view.paned().as_ref(), 400, 100);
        f.tk.tick();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        view.set_on_ratio_changed(Some(Arc::new(move |r: f64| sink.lock().unwrap().push(r))));

        f.tk.drag_divider(view.paned().as_ref(), 120);
        f.tk.drag_divider(view.paned().as_ref(), 100);
        assert_eq!(view.ratio(), 0.25);
        f.main_loop.run_pending();
        assert!(seen.lock().unwrap().is_empty());

        f.clock.advance(Duration::from_millis(100));
        f.main_loop.run_pending();
        assert_eq!(*seen.lock().unwrap(), vec![0.25]);
    }

    #[test]
    fn programmatic_position_is_not_a_drag() {
        let f = fixture();
        let view = split(&f, Orientation::Horizontal, 0.5);
        f.tk.allocate(view.paned().as_ref(), 400, 100);
        f.tk.tick();
        view.set_ratio(0.3);
        assert_eq!(f.main_loop.pending_timers(), 0);
        assert_eq!(view.ratio(), 0.3);
    }

    // ── Child swapping ────────────────────────────────────────────────

    #[test]
    fn swap_children_keeps_divider() {
        let f = fixture();
        let view = split(&f, Orientation::Horizontal, 0.5);
        f.tk.allocate(view.paned().as_ref(), 400, 100);
        f.tk.tick();
        let old_start = view.start_child();
        let old_end = view.end_child();

        let new_start: WidgetRef = f.tk.new_overlay();
        let new_end: WidgetRef = f.tk.new_overlay();
        view.swap_start(new_start.clone());
        view.swap_end(new_end.clone());

        assert_eq!(old_start.parent(), None);
        assert_eq!(old_end.parent(), None);
        assert_eq!(view.paned().start_child(), Some(new_start.id()));
        assert_eq!(view.paned().end_child(), Some(new_end.id()));
        assert_eq!(view.paned().position(), 200);
        assert!(f.tk.criticals().is_empty());
    }

    #[test]
    fn dropping_view_releases_subscriptions() {
        let f = fixture();
        let view = split(&f, Orientation::Horizontal, 0.5);
        assert_eq!(f.tk.signal_count(), 2);
        drop(view);
        assert_eq!(f.tk.signal_count(), 0);
        assert_eq!(f.tk.tick_callbacks(), 0);
    }
}
