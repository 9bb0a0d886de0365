// Chrome around one pane's hosted content: active border, loading spinner,
// pane-anchored overlays and focus-follows-mouse.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;

use super::hover::HoverHandler;
use crate::layout::{
    BoxWidget, Orientation, OverlayWidget, SpinnerWidget, WidgetFactory, WidgetRef,
};
use crate::pane::PaneId;
use crate::runtime::UiScheduler;

/// CSS class on the border box of the active pane.
pub const ACTIVE_PANE_CLASS: &str = "pane-active";

pub type PaneCallback = Arc<dyn Fn(&PaneId) + Send + Sync>;

#[derive(Default)]
struct PaneViewState {
    content: Option<WidgetRef>,
    spinner: Option<Arc<dyn SpinnerWidget>>,
    active: bool,
    on_focus_in: Option<PaneCallback>,
    on_hover: Option<PaneCallback>,
    hover: Option<Arc<HoverHandler>>,
}

pub struct PaneView {
    pane_id: PaneId,
    factory: Arc<dyn WidgetFactory>,
    overlay: Arc<dyn OverlayWidget>,
    border: Arc<dyn BoxWidget>,
    state: RwLock<PaneViewState>,
    this: Weak<PaneView>,
}

impl PaneView {
    pub fn new(
        factory: Arc<dyn WidgetFactory>,
        pane_id: PaneId,
        content: Option<WidgetRef>,
    ) -> Arc<Self> {
        let overlay = factory.new_overlay();
        overlay.set_hexpand(true);
        overlay.set_vexpand(true);
        overlay.add_css_class("pane-overlay");

        // Pointer events pass through the border to the content.
        let border = factory.new_box(Orientation::Vertical, 0);
        border.set_can_target(false);
        border.add_css_class("pane-border");
        border.set_hexpand(true);
        border.set_vexpand(true);
        let border_widget: WidgetRef = border.clone();
        overlay.add_overlay(&border_widget);
        overlay.set_clip_overlay(&border_widget, false);
        overlay.set_measure_overlay(&border_widget, false);

        let view = Arc::new_cyclic(|this| PaneView {
            pane_id,
            factory,
            overlay,
            border,
            state: RwLock::new(PaneViewState::default()),
            this: this.clone(),
        });
        if content.is_some() {
            view.set_content(content);
        }
        view
    }

    fn read(&self) -> RwLockReadGuard<'_, PaneViewState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, PaneViewState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn pane_id(&self) -> &PaneId {
        &self.pane_id
    }

    /// The widget to place in the layout.
    pub fn widget(&self) -> WidgetRef {
        self.overlay.clone()
    }

    pub fn overlay(&self) -> &Arc<dyn OverlayWidget> {
        &self.overlay
    }

    pub fn border(&self) -> &Arc<dyn BoxWidget> {
        &self.border
    }

    pub fn set_active(&self, active: bool) {
        let mut state = self.write();
        if state.active == active {
            return;
        }
        state.active = active;
        if active {
            self.border.add_css_class(ACTIVE_PANE_CLASS);
        } else {
            self.border.remove_css_class(ACTIVE_PANE_CLASS);
        }
    }

    pub fn is_active(&self) -> bool {
        self.read().active
    }

    pub fn content(&self) -> Option<WidgetRef> {
        self.read().content.clone()
    }

    /// Replace the hosted content. A widget still parented elsewhere (left
    /// over from a previous build) is detached first.
    pub fn set_content(&self, content: Option<WidgetRef>) {
        let mut state = self.write();
        if state.content.take().is_some() {
            self.overlay.set_child(None);
        }
        if let Some(widget) = &content {
            if widget.parent().is_some() {
                widget.unparent();
            }
            widget.set_visible(true);
            self.overlay.set_child(Some(widget));
        }
        state.content = content;
    }

    /// Focus the hosted content. Returns false without content.
    pub fn grab_focus(&self) -> bool {
        let (content, callback) = {
            let state = self.read();
            (state.content.clone(), state.on_focus_in.clone())
        };
        let Some(content) = content else {
            return false;
        };
        let focused = content.grab_focus();
        if focused {
            if let Some(callback) = callback {
                callback(&self.pane_id);
            }
        }
        focused
    }

    pub fn has_focus(&self) -> bool {
        self.read().content.as_ref().is_some_and(|c| c.has_focus())
    }

    pub fn set_on_focus_in(&self, callback: Option<PaneCallback>) {
        self.write().on_focus_in = callback;
    }

    pub fn set_on_hover(&self, callback: Option<PaneCallback>) {
        self.write().on_hover = callback;
    }

    /// Start debounced hover tracking on the overlay.
    pub fn attach_hover_handler(&self, scheduler: Arc<dyn UiScheduler>, delay: Duration) {
        let handler = HoverHandler::new(self.pane_id.clone(), scheduler, delay);
        let weak = self.this.clone();
        handler.set_on_enter(Some(Arc::new(move |_: &PaneId| {
            let Some(view) = weak.upgrade() else { return };
            let callback = view.read().on_hover.clone();
            if let Some(callback) = callback {
                callback(&view.pane_id);
            }
        })));
        handler.attach_to(&self.overlay);

        let previous = self.write().hover.replace(handler);
        if let Some(previous) = previous {
            previous.detach();
        }
    }

    pub fn hover_handler(&self) -> Option<Arc<HoverHandler>> {
        self.read().hover.clone()
    }

    pub fn cancel_pending_hover(&self) {
        let hover = self.read().hover.clone();
        if let Some(hover) = hover {
            hover.cancel_pending();
        }
    }

    pub fn set_hover_delay(&self, delay: Duration) {
        if let Some(hover) = self.read().hover.as_ref() {
            hover.set_delay(delay);
        }
    }

    /// Layer `widget` above the content. It neither clips nor affects size.
    pub fn add_overlay_widget(&self, widget: &WidgetRef) {
        self.overlay.add_overlay(widget);
        self.overlay.set_clip_overlay(widget, false);
        self.overlay.set_measure_overlay(widget, false);
    }

    pub fn remove_overlay_widget(&self, widget: &WidgetRef) {
        self.overlay.remove_overlay(widget);
    }

    /// Show or hide the loading spinner. The spinner is created on first use
    /// and skipped if the toolkit can't provide one.
    pub fn set_loading(&self, loading: bool) {
        let mut state = self.write();
        if state.spinner.is_none() && loading {
            let Some(spinner) = self.factory.new_spinner() else {
                log::debug!("pane {}: no spinner available", self.pane_id);
                return;
            };
            spinner.set_can_target(false);
            spinner.add_css_class("pane-loading");
            let widget: WidgetRef = spinner.clone();
            self.add_overlay_widget(&widget);
            state.spinner = Some(spinner);
        }
        if let Some(spinner) = &state.spinner {
            spinner.set_visible(loading);
            if loading {
                spinner.start();
            } else {
                spinner.stop();
            }
        }
    }

    pub fn is_loading(&self) -> bool {
        self.read().spinner.as_ref().is_some_and(|s| s.is_spinning())
    }

    pub fn content_dimensions(&self) -> (i32, i32) {
        (self.overlay.allocated_width(), self.overlay.allocated_height())
    }

    /// Release everything this view holds so the hosted content can be
    /// destroyed safely. The view must not be reused afterwards.
    pub fn cleanup(&self) {
        let (hover, spinner, had_content) = {
            let mut state = self.write();
            state.on_focus_in = None;
            state.on_hover = None;
            (
                state.hover.take(),
                state.spinner.take(),
                state.content.take().is_some(),
            )
        };
        if let Some(hover) = hover {
            hover.detach();
        }
        if had_content {
            self.overlay.set_child(None);
        }
        if let Some(spinner) = spinner {
            spinner.stop();
            let widget: WidgetRef = spinner;
            self.overlay.remove_overlay(&widget);
        }
        log::debug!("pane {}: cleaned up", self.pane_id);
    }
}

impl std::fmt::Debug for PaneView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaneView")
            .field("pane_id", &self.pane_id)
            .field("overlay", &self.overlay.id())
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MainLoop, ManualClock};
    use crate::toolkit::HeadlessToolkit;
    use std::sync::Mutex;

    fn view_with_content(tk: &HeadlessToolkit) -> (Arc<PaneView>, WidgetRef) {
        let content: WidgetRef = tk.new_box(Orientation::Vertical, 0);
        let view = PaneView::new(Arc::new(tk.clone()), PaneId::from("p1"), Some(content.clone()));
        (view, content)
    }

    // ── Structure ─────────────────────────────────────────────────

    #[test]
    fn content_is_main_child_and_border_overlays_it() {
        let tk = HeadlessToolkit::new();
        let (view, content) = view_with_content(&tk);
        assert_eq!(view.overlay().child(), Some(content.id()));
        assert_eq!(view.overlay().overlays(), vec![view.border().id()]);
        let flags = tk.overlay_flags(view.overlay().as_ref(), view.border().as_ref()).unwrap();
        assert!(!flags.clip && !flags.measure);
    }

    #[test]
    fn set_active_toggles_border_class() {
        let tk = HeadlessToolkit::new();
        let (view, _) = view_with_content(&tk);
        assert!(!view.border().has_css_class(ACTIVE_PANE_CLASS));
        view.set_active(true);
        assert!(view.is_active());
        assert!(view.border().has_css_class(ACTIVE_PANE_CLASS));
        view.set_active(false);
        assert!(!view.border().has_css_class(ACTIVE_PANE_CLASS));
    }

    #[test]
    fn set_content_reparents_widget_from_old_owner() {
        let tk = HeadlessToolkit::new();
        let (old_view, content) = view_with_content(&tk);
        let new_view = PaneView::new(Arc::new(tk.clone()), PaneId::from("p1"), None);
        new_view.set_content(Some(content.clone()));
        assert_eq!(new_view.overlay().child(), Some(content.id()));
        assert_eq!(old_view.overlay().child(), None);
        assert!(tk.criticals().is_empty());
    }

    // ── Focus ─────────────────────────────────────────────────────

    #[test]
    fn grab_focus_focuses_content_and_reports() {
        let tk = HeadlessToolkit::new();
        let (view, content) = view_with_content(&tk);
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        view.set_on_focus_in(Some(Arc::new(move |id: &PaneId| {
            *sink.lock().unwrap() = Some(id.clone());
        })));
        assert!(view.grab_focus());
        assert_eq!(tk.focused(), Some(content.id()));
        assert!(view.has_focus());
        assert_eq!(*seen.lock().unwrap(), Some(PaneId::from("p1")));
    }

    #[test]
    fn grab_focus_without_content_fails() {
        let tk = HeadlessToolkit::new();
        let view = PaneView::new(Arc::new(tk.clone()), PaneId::from("p1"), None);
        assert!(!view.grab_focus());
        assert!(!view.has_focus());
    }

    #[test]
    fn hover_reaches_on_hover_after_delay() {
        let tk = HeadlessToolkit::new();
        let clock = Arc::new(ManualClock::new());
        let main_loop = MainLoop::with_clock(clock.clone());
        let (view, _) = view_with_content(&tk);
        let hovered = Arc::new(Mutex::new(0));
        let sink = hovered.clone();
        view.set_on_hover(Some(Arc::new(move |_: &PaneId| *sink.lock().unwrap() += 1)));
        view.attach_hover_handler(Arc::new(main_loop.handle()), Duration::from_millis(150));

        tk.pointer_enter(view.overlay().as_ref());
        clock.advance(Duration::from_millis(150));
        main_loop.run_until_idle();
        assert_eq!(*hovered.lock().unwrap(), 1);

        tk.pointer_enter(view.overlay().as_ref());
        view.cancel_pending_hover();
        clock.advance(Duration::from_millis(150));
        main_loop.run_until_idle();
        assert_eq!(*hovered.lock().unwrap(), 1);
    }

    // ── Overlays and spinner ──────────────────────────────────────

    #[test]
    fn overlay_widgets_are_unclipped_and_unmeasured() {
        let tk = HeadlessToolkit::new();
        let (view, _) = view_with_content(&tk);
        let bar: WidgetRef = tk.new_box(Orientation::Horizontal, 0);
        view.add_overlay_widget(&bar);
        assert_eq!(bar.parent(), Some(view.overlay().id()));
        let flags = tk.overlay_flags(view.overlay().as_ref(), bar.as_ref()).unwrap();
        assert!(!flags.clip && !flags.measure);
        view.remove_overlay_widget(&bar);
        assert_eq!(bar.parent(), None);
    }

    #[test]
    fn spinner_is_created_lazily() {
        let tk = HeadlessToolkit::new();
        let (view, _) = view_with_content(&tk);
        let before = view.overlay().overlays().len();
        view.set_loading(false);
        assert_eq!(view.overlay().overlays().len(), before);
        view.set_loading(true);
        assert!(view.is_loading());
        assert_eq!(view.overlay().overlays().len(), before + 1);
        view.set_loading(false);
        assert!(!view.is_loading());
    }

    #[test]
    fn missing_spinner_is_tolerated() {
        let tk = HeadlessToolkit::new();
        let (view, _) = view_with_content(&tk);
        tk.fail_decorations(true);
        view.set_loading(true);
        assert!(!view.is_loading());
    }

    // ── Cleanup ───────────────────────────────────────────────────

    #[test]
    fn cleanup_detaches_content_spinner_and_hover() {
        let tk = HeadlessToolkit::new();
        let main_loop = MainLoop::new();
        let (view, content) = view_with_content(&tk);
        view.attach_hover_handler(Arc::new(main_loop.handle()), Duration::from_millis(150));
        view.set_loading(true);
        let signals = tk.signal_count();

        view.cleanup();
        assert_eq!(content.parent(), None);
        assert!(view.content().is_none());
        assert_eq!(view.overlay().overlays(), vec![view.border().id()]);
        assert_eq!(tk.signal_count(), signals - 1);
        assert!(view.hover_handler().is_none());
        assert!(tk.criticals().is_empty());
    }
}
