// Workspace coordinator: renders a workspace, owns the active pane, arbitrates
// hover against keyboard focus and anchors the omnibox and find bar to panes.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::{Duration, Instant};

use super::find_bar::FindBar;
use super::omnibox::{Omnibox, SuggestionSource};
use super::pane_view::{PaneCallback, PaneView};
use super::{ContentFactory, ViewError};
use crate::config::{Config, FindConfig, FocusConfig, OmniboxConfig};
use crate::layout::tree::SplitRatioCallback;
use crate::layout::{
    BoxWidget, LayoutContext, Orientation, OverlayWidget, PaneViewFactory, TreeRenderer, Widget,
    WidgetFactory, WidgetRef,
};
use crate::pane::{Pane, PaneId, PaneNode, SharedWorkspace, Workspace};
use crate::runtime::{Clock, UiScheduler};

/// Set on the outer overlay while at most one pane is rendered.
pub const SINGLE_PANE_CLASS: &str = "single-pane";

/// Receives the pane the omnibox was anchored to and the URL to load.
pub type PaneNavigateCallback = Arc<dyn Fn(&PaneId, &str) + Send + Sync>;

/// An overlay component and the pane whose overlay it was added to.
struct Anchored<T> {
    component: Arc<T>,
    widget: WidgetRef,
    pane_id: PaneId,
}

/// Overlay components the coordinator can put away.
trait Dismiss {
    const KIND: &'static str;
    fn dismiss(&self);
}

impl Dismiss for Omnibox {
    const KIND: &'static str = "omnibox";
    fn dismiss(&self) {
        self.hide();
    }
}

impl Dismiss for FindBar {
    const KIND: &'static str = "find bar";
    fn dismiss(&self) {
        self.hide();
    }
}

type Stale<T> = Option<(Anchored<T>, Option<Arc<PaneView>>)>;

#[derive(Default)]
struct Inner {
    workspace: Option<SharedWorkspace>,
    root_widget: Option<WidgetRef>,
    pane_views: HashMap<PaneId, Arc<PaneView>>,
    omnibox: Option<Anchored<Omnibox>>,
    find_bar: Option<Anchored<FindBar>>,
    hover_suppressed_until: Option<Instant>,
    suggestions: Option<Arc<dyn SuggestionSource>>,
    focus: FocusConfig,
    omnibox_config: OmniboxConfig,
    find_config: FindConfig,
    on_pane_focused: Option<PaneCallback>,
    on_split_ratio_dragged: Option<SplitRatioCallback>,
    on_navigate: Option<PaneNavigateCallback>,
    on_close_pane_requested: Option<PaneCallback>,
}

/// Leaf callback handed to the tree renderer; builds a pane view per leaf
/// and records it in the coordinator.
struct LeafViews(Weak<WorkspaceView>);

impl PaneViewFactory for LeafViews {
    fn create_pane_view(&self, _node: &PaneNode, pane: &Pane) -> Option<WidgetRef> {
        let view = self.0.upgrade()?;
        let pane_view = view.create_pane_view(pane);
        let widget = pane_view.widget();
        let replaced = view.write().pane_views.insert(pane.id.clone(), pane_view);
        if let Some(replaced) = replaced {
            log::warn!("pane {} rendered twice, keeping the later view", pane.id);
            replaced.cleanup();
        }
        Some(widget)
    }
}

/// Single source of truth for the active pane of one rendered workspace.
pub struct WorkspaceView {
    factory: Arc<dyn WidgetFactory>,
    scheduler: Arc<dyn UiScheduler>,
    clock: Arc<dyn Clock>,
    content: Arc<dyn ContentFactory>,
    tree: Arc<TreeRenderer>,
    container: Arc<dyn BoxWidget>,
    overlay: Arc<dyn OverlayWidget>,
    inner: RwLock<Inner>,
    this: Weak<WorkspaceView>,
}

impl WorkspaceView {
    pub fn new(
        ctx: LayoutContext,
        clock: Arc<dyn Clock>,
        content: Arc<dyn ContentFactory>,
    ) -> Arc<Self> {
        let container = ctx.factory.new_box(Orientation::Vertical, 0);
        container.set_hexpand(true);
        container.set_vexpand(true);
        container.add_css_class("workspace-container");

        let overlay = ctx.factory.new_overlay();
        overlay.set_hexpand(true);
        overlay.set_vexpand(true);
        overlay.add_css_class("workspace");
        let container_widget: WidgetRef = container.clone();
        overlay.set_child(Some(&container_widget));

        let view = Arc::new_cyclic(|this: &Weak<WorkspaceView>| {
            let tree = TreeRenderer::new(ctx.clone(), Arc::new(LeafViews(this.clone())));
            WorkspaceView {
                factory: Arc::clone(&ctx.factory),
                scheduler: Arc::clone(&ctx.scheduler),
                clock,
                content,
                tree,
                container,
                overlay,
                inner: RwLock::new(Inner::default()),
                this: this.clone(),
            }
        });
        view.wire_tree();
        view.update_single_pane_mode();
        view
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn wire_tree(&self) {
        let weak = self.this.clone();
        self.tree
            .set_on_split_ratio_changed(Some(Arc::new(move |node_id: &str, ratio: f64| {
                let Some(view) = weak.upgrade() else { return };
                log::debug!("split {node_id} dragged to {ratio:.3}");
                let callback = view.read().on_split_ratio_dragged.clone();
                if let Some(callback) = callback {
                    callback(node_id, ratio);
                }
            })));

        let weak = self.this.clone();
        self.tree
            .set_on_stack_activate(Some(Arc::new(move |pane_id: &PaneId| {
                let Some(view) = weak.upgrade() else { return };
                match view.set_active_pane_id(pane_id) {
                    Ok(()) => {
                        view.focus_pane(pane_id);
                    }
                    Err(e) => log::warn!("activating stacked pane {pane_id} failed: {e}"),
                }
            })));

        let weak = self.this.clone();
        self.tree
            .set_on_stack_close_pane(Some(Arc::new(move |pane_id: &PaneId| {
                let Some(view) = weak.upgrade() else { return };
                let callback = view.read().on_close_pane_requested.clone();
                match callback {
                    Some(callback) => callback(pane_id),
                    None => log::debug!("close requested for {pane_id}, nobody listening"),
                }
            })));
    }

    // ── Accessors ─────────────────────────────────────────────────────

    /// The widget to place in the window.
    pub fn widget(&self) -> WidgetRef {
        self.overlay.clone()
    }

    pub fn container(&self) -> &Arc<dyn BoxWidget> {
        &self.container
    }

    pub fn tree(&self) -> &Arc<TreeRenderer> {
        &self.tree
    }

    pub fn workspace(&self) -> Option<SharedWorkspace> {
        self.read().workspace.clone()
    }

    pub fn root_widget(&self) -> Option<WidgetRef> {
        self.read().root_widget.clone()
    }

    pub fn pane_view(&self, pane_id: &PaneId) -> Option<Arc<PaneView>> {
        self.read().pane_views.get(pane_id).cloned()
    }

    pub fn active_pane_view(&self) -> Option<Arc<PaneView>> {
        let active = self.active_pane_id()?;
        self.pane_view(&active)
    }

    /// Registered pane ids in sorted order.
    pub fn pane_ids(&self) -> Vec<PaneId> {
        let mut ids: Vec<PaneId> = self.read().pane_views.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn pane_count(&self) -> usize {
        self.read().pane_views.len()
    }

    pub fn set_suggestion_source(&self, source: Option<Arc<dyn SuggestionSource>>) {
        self.write().suggestions = source;
    }

    /// Fired when a pane's content takes keyboard focus.
    pub fn set_on_pane_focused(&self, callback: Option<PaneCallback>) {
        self.write().on_pane_focused = callback;
    }

    /// Fired after a user drags a divider. Notification only: the workspace
    /// model is not updated, the listener decides whether to persist it.
    pub fn set_on_split_ratio_dragged(&self, callback: Option<SplitRatioCallback>) {
        self.write().on_split_ratio_dragged = callback;
    }

    pub fn set_on_navigate(&self, callback: Option<PaneNavigateCallback>) {
        self.write().on_navigate = callback;
    }

    /// Fired by a stacked pane's close button.
    pub fn set_on_close_pane_requested(&self, callback: Option<PaneCallback>) {
        self.write().on_close_pane_requested = callback;
    }

    // ── Rendering ─────────────────────────────────────────────────────

    /// Discard the rendered tree and build `workspace` from scratch.
    pub fn set_workspace(&self, workspace: SharedWorkspace) -> Result<(), ViewError> {
        let (old_views, omnibox, find_bar, old_root) = {
            let mut inner = self.write();
            inner.workspace = Some(Arc::clone(&workspace));
            (
                std::mem::take(&mut inner.pane_views),
                inner.omnibox.take(),
                inner.find_bar.take(),
                inner.root_widget.take(),
            )
        };

        // Overlays first: they live inside the outgoing pane views.
        if let Some(anchored) = omnibox {
            let anchor = old_views.get(&anchored.pane_id).cloned();
            teardown(anchored, anchor);
        }
        if let Some(anchored) = find_bar {
            let anchor = old_views.get(&anchored.pane_id).cloned();
            teardown(anchored, anchor);
        }
        if let Some(root) = old_root {
            self.detach_root(&root);
        }
        for view in old_views.values() {
            view.cleanup();
        }
        drop(old_views);

        let (built, workspace_id, active) = {
            let ws = read_workspace(&workspace);
            let built = match &ws.root {
                Some(root) => self.tree.build(Some(root)).map(Some),
                None => {
                    self.tree.clear();
                    Ok(None)
                }
            };
            (built, ws.id.clone(), ws.active_pane_id.clone())
        };
        let built = match built {
            Ok(built) => built,
            Err(e) => {
                log::error!("workspace {workspace_id}: build failed: {e}");
                self.discard_partial_views();
                self.update_single_pane_mode();
                return Err(e.into());
            }
        };

        if let Some(root) = &built {
            root.set_visible(true);
            self.container.append(root);
        }
        self.write().root_widget = built;
        self.update_single_pane_mode();

        if let Some(active) = active {
            self.set_active_pane_id(&active)?;
        }
        log::info!(
            "workspace {workspace_id}: rendered {} panes, {} registered nodes",
            self.pane_count(),
            self.tree.node_count()
        );
        Ok(())
    }

    /// Rebuild from the current workspace.
    pub fn rebuild(&self) -> Result<(), ViewError> {
        let workspace = self.workspace().ok_or(ViewError::NilWorkspace)?;
        self.set_workspace(workspace)
    }

    // A failed build may have created views for leaves visited before the error.
    fn discard_partial_views(&self) {
        let views = std::mem::take(&mut self.write().pane_views);
        for view in views.values() {
            view.cleanup();
        }
    }

    fn detach_root(&self, root: &WidgetRef) {
        match root.parent() {
            Some(parent) if parent == self.container.id() => self.container.remove(root),
            Some(_) => root.unparent(),
            None => {}
        }
    }

    fn update_single_pane_mode(&self) {
        if self.pane_count() <= 1 {
            self.overlay.add_css_class(SINGLE_PANE_CLASS);
        } else {
            self.overlay.remove_css_class(SINGLE_PANE_CLASS);
        }
    }

    /// Build a pane view for `pane` wired to this coordinator. It is not
    /// registered; see [`register_pane_view`](Self::register_pane_view).
    pub fn create_pane_view(&self, pane: &Pane) -> Arc<PaneView> {
        let content = self.content.create_content(pane);
        if content.is_none() {
            log::debug!("pane {}: no content yet", pane.id);
        }
        let view = PaneView::new(Arc::clone(&self.factory), pane.id.clone(), content);

        let weak = self.this.clone();
        view.set_on_focus_in(Some(Arc::new(move |pane_id: &PaneId| {
            let Some(workspace_view) = weak.upgrade() else { return };
            let callback = workspace_view.read().on_pane_focused.clone();
            if let Some(callback) = callback {
                callback(pane_id);
            }
        })));

        let weak = self.this.clone();
        view.set_on_hover(Some(Arc::new(move |pane_id: &PaneId| {
            if let Some(workspace_view) = weak.upgrade() {
                workspace_view.request_hover_activation(pane_id);
            }
        })));

        let delay = self.read().focus.hover_focus_delay();
        view.attach_hover_handler(Arc::clone(&self.scheduler), delay);
        view
    }

    /// Add a view built outside of a full rebuild, e.g. after converting a
    /// pane into a stack.
    pub fn register_pane_view(&self, pane_id: PaneId, view: Arc<PaneView>) {
        let replaced = self.write().pane_views.insert(pane_id.clone(), Arc::clone(&view));
        if let Some(replaced) = replaced {
            if !Arc::ptr_eq(&replaced, &view) {
                log::debug!("pane {pane_id}: replacing registered view");
                replaced.cleanup();
            }
        }
        self.update_single_pane_mode();
    }

    /// Remove a pane's view, tearing down overlays anchored to it and
    /// releasing its widgets. Call before destroying the pane's content.
    pub fn unregister_pane_view(&self, pane_id: &PaneId) -> Option<Arc<PaneView>> {
        let (view, omnibox, find_bar) = {
            let mut guard = self.write();
            let inner = &mut *guard;
            let view = inner.pane_views.remove(pane_id)?;
            let omnibox = inner.omnibox.take_if(|a| a.pane_id == *pane_id);
            let find_bar = inner.find_bar.take_if(|a| a.pane_id == *pane_id);
            (view, omnibox, find_bar)
        };
        if let Some(anchored) = omnibox {
            teardown(anchored, Some(Arc::clone(&view)));
        }
        if let Some(anchored) = find_bar {
            teardown(anchored, Some(Arc::clone(&view)));
        }
        view.cleanup();
        self.tree.unregister_pane(pane_id);
        self.update_single_pane_mode();
        log::debug!("pane {pane_id}: view unregistered");
        Some(view)
    }

    /// Swap the hosted content of a rendered pane.
    pub fn set_content_widget(
        &self,
        pane_id: &PaneId,
        content: Option<WidgetRef>,
    ) -> Result<(), ViewError> {
        let view = self
            .pane_view(pane_id)
            .ok_or_else(|| ViewError::PaneNotFound(pane_id.clone()))?;
        view.set_content(content);
        Ok(())
    }

    // ── Active pane ───────────────────────────────────────────────────

    pub fn active_pane_id(&self) -> Option<PaneId> {
        let workspace = self.workspace()?;
        let active = read_workspace(&workspace).active_pane_id.clone();
        active
    }

    /// Make `pane_id` the active pane. Overlays anchored elsewhere are torn
    /// down before the previous pane loses its active styling.
    pub fn set_active_pane_id(&self, pane_id: &PaneId) -> Result<(), ViewError> {
        let (target, others, omnibox, find_bar, workspace) = {
            let mut guard = self.write();
            let inner = &mut *guard;
            let target = inner
                .pane_views
                .get(pane_id)
                .cloned()
                .ok_or_else(|| ViewError::PaneNotFound(pane_id.clone()))?;
            let others: Vec<Arc<PaneView>> = inner
                .pane_views
                .iter()
                .filter(|(id, _)| *id != pane_id)
                .map(|(_, view)| Arc::clone(view))
                .collect();
            let omnibox = take_stale(&mut inner.omnibox, pane_id, &inner.pane_views);
            let find_bar = take_stale(&mut inner.find_bar, pane_id, &inner.pane_views);
            (target, others, omnibox, find_bar, inner.workspace.clone())
        };

        if let Some((anchored, anchor)) = omnibox {
            teardown(anchored, anchor);
        }
        if let Some((anchored, anchor)) = find_bar {
            teardown(anchored, anchor);
        }
        for view in others.iter().filter(|v| v.is_active()) {
            view.set_active(false);
        }
        target.set_active(true);

        if let Some(stack) = self.tree.stacked_view_for_pane(pane_id) {
            if let Some(index) = stack.find_pane_index(pane_id) {
                if stack.active_index() != Some(index) {
                    if let Err(e) = stack.set_active(index) {
                        log::warn!("stack refused pane {pane_id}: {e}");
                    }
                }
            }
        }

        if let Some(workspace) = workspace {
            let mut ws = write_workspace(&workspace);
            if !ws.set_active(pane_id) {
                log::debug!("pane {pane_id} is rendered but not in workspace {}", ws.id);
                ws.active_pane_id = Some(pane_id.clone());
            }
        }
        log::debug!("active pane: {pane_id}");
        Ok(())
    }

    /// Give keyboard focus to a pane's content. False if the pane is unknown
    /// or cannot take focus.
    pub fn focus_pane(&self, pane_id: &PaneId) -> bool {
        match self.pane_view(pane_id) {
            Some(view) => view.grab_focus(),
            None => false,
        }
    }

    // ── Hover arbitration ─────────────────────────────────────────────

    /// Ignore hover activations for `duration` from now.
    pub fn suppress_hover(&self, duration: Duration) {
        let until = self.clock.now() + duration;
        self.write().hover_suppressed_until = Some(until);
        log::debug!("hover suppressed for {}ms", duration.as_millis());
    }

    pub fn is_hover_suppressed(&self) -> bool {
        let until = self.read().hover_suppressed_until;
        until.is_some_and(|until| self.clock.now() < until)
    }

    pub fn cancel_all_pending_hovers(&self) {
        let views: Vec<Arc<PaneView>> = self.read().pane_views.values().cloned().collect();
        for view in views {
            view.cancel_pending_hover();
        }
    }

    /// Activation driven by a keyboard shortcut. Blocks hover activations
    /// for the keyboard suppression window, including ones already in flight.
    pub fn activate_pane_from_keyboard(&self, pane_id: &PaneId) -> Result<(), ViewError> {
        let window = self.read().focus.keyboard_suppress();
        self.suppress_hover(window);
        self.cancel_all_pending_hovers();
        self.set_active_pane_id(pane_id)?;
        self.focus_pane(pane_id);
        Ok(())
    }

    /// Activation requested by a settled hover. True if it was honored.
    pub fn request_hover_activation(&self, pane_id: &PaneId) -> bool {
        if !self.read().focus.focus_follows_mouse {
            return false;
        }
        if self.is_hover_suppressed() {
            log::debug!("hover on {pane_id} ignored: keyboard focus changed recently");
            return false;
        }
        if self.active_pane_id().as_ref() == Some(pane_id) {
            return false;
        }
        match self.set_active_pane_id(pane_id) {
            Ok(()) => {
                self.focus_pane(pane_id);
                true
            }
            Err(e) => {
                log::debug!("hover activation of {pane_id} failed: {e}");
                false
            }
        }
    }

    // ── Omnibox ───────────────────────────────────────────────────────

    /// Show the omnibox on the active pane, reusing it if it is already
    /// anchored there.
    pub fn show_omnibox(&self, query: &str) -> Result<(), ViewError> {
        let active = self.active_pane_id().ok_or(ViewError::NoActivePane)?;
        let (view, existing, stale, config, source) = {
            let mut guard = self.write();
            let inner = &mut *guard;
            let view = inner
                .pane_views
                .get(&active)
                .cloned()
                .ok_or_else(|| ViewError::PaneNotFound(active.clone()))?;
            let stale = take_stale(&mut inner.omnibox, &active, &inner.pane_views);
            let existing = inner.omnibox.as_ref().map(|a| Arc::clone(&a.component));
            (
                view,
                existing,
                stale,
                inner.omnibox_config.clone(),
                inner.suggestions.clone(),
            )
        };
        if let Some((anchored, anchor)) = stale {
            teardown(anchored, anchor);
        }
        if let Some(omnibox) = existing {
            omnibox.show(query);
            return Ok(());
        }

        let omnibox = Omnibox::new(
            Arc::clone(&self.factory),
            Arc::clone(&self.scheduler),
            source,
            config,
        );
        let weak = self.this.clone();
        let anchor_id = active.clone();
        omnibox.set_on_navigate(Some(Arc::new(move |url: &str| {
            let Some(view) = weak.upgrade() else { return };
            let callback = view.read().on_navigate.clone();
            match callback {
                Some(callback) => callback(&anchor_id, url),
                None => log::debug!("navigate {url} from {anchor_id}, nobody listening"),
            }
        })));
        let weak = self.this.clone();
        omnibox.set_on_close(Some(Arc::new(move || {
            if let Some(view) = weak.upgrade() {
                view.hide_omnibox();
            }
        })));

        let widget = omnibox.widget();
        view.add_overlay_widget(&widget);
        self.write().omnibox = Some(Anchored {
            component: Arc::clone(&omnibox),
            widget,
            pane_id: active.clone(),
        });
        omnibox.show(query);
        log::debug!("omnibox created on pane {active}");
        Ok(())
    }

    pub fn hide_omnibox(&self) {
        let taken = {
            let mut guard = self.write();
            let inner = &mut *guard;
            inner.omnibox.take().map(|anchored| {
                let anchor = inner.pane_views.get(&anchored.pane_id).cloned();
                (anchored, anchor)
            })
        };
        if let Some((anchored, anchor)) = taken {
            teardown(anchored, anchor);
        }
    }

    pub fn omnibox(&self) -> Option<Arc<Omnibox>> {
        self.read().omnibox.as_ref().map(|a| Arc::clone(&a.component))
    }

    pub fn omnibox_pane_id(&self) -> Option<PaneId> {
        self.read().omnibox.as_ref().map(|a| a.pane_id.clone())
    }

    pub fn is_omnibox_visible(&self) -> bool {
        self.omnibox().is_some_and(|o| o.is_visible())
    }

    // ── Find bar ──────────────────────────────────────────────────────

    /// Show the find bar on the active pane, searching through the pane's
    /// find controller.
    pub fn show_find_bar(&self) -> Result<(), ViewError> {
        let active = self.active_pane_id().ok_or(ViewError::NoActivePane)?;
        let (view, existing, stale, config) = {
            let mut guard = self.write();
            let inner = &mut *guard;
            let view = inner
                .pane_views
                .get(&active)
                .cloned()
                .ok_or_else(|| ViewError::PaneNotFound(active.clone()))?;
            let stale = take_stale(&mut inner.find_bar, &active, &inner.pane_views);
            let existing = inner.find_bar.as_ref().map(|a| Arc::clone(&a.component));
            (view, existing, stale, inner.find_config.clone())
        };
        if let Some((anchored, anchor)) = stale {
            teardown(anchored, anchor);
        }
        if let Some(find_bar) = existing {
            find_bar.show();
            return Ok(());
        }

        let find_bar = FindBar::new(self.factory.as_ref(), &config);
        let controller = self.content.find_controller(&active);
        if controller.is_none() {
            log::debug!("pane {active} has no find controller");
        }
        find_bar.set_controller(controller);
        let weak = self.this.clone();
        find_bar.set_on_close(Some(Arc::new(move || {
            if let Some(view) = weak.upgrade() {
                view.hide_find_bar();
            }
        })));

        let widget = find_bar.widget();
        view.add_overlay_widget(&widget);
        self.write().find_bar = Some(Anchored {
            component: Arc::clone(&find_bar),
            widget,
            pane_id: active.clone(),
        });
        find_bar.show();
        log::debug!("find bar created on pane {active}");
        Ok(())
    }

    pub fn hide_find_bar(&self) {
        let taken = {
            let mut guard = self.write();
            let inner = &mut *guard;
            inner.find_bar.take().map(|anchored| {
                let anchor = inner.pane_views.get(&anchored.pane_id).cloned();
                (anchored, anchor)
            })
        };
        if let Some((anchored, anchor)) = taken {
            teardown(anchored, anchor);
        }
    }

    pub fn find_next(&self) {
        if let Some(find_bar) = self.find_bar() {
            find_bar.find_next();
        }
    }

    pub fn find_previous(&self) {
        if let Some(find_bar) = self.find_bar() {
            find_bar.find_previous();
        }
    }

    pub fn find_bar(&self) -> Option<Arc<FindBar>> {
        self.read().find_bar.as_ref().map(|a| Arc::clone(&a.component))
    }

    pub fn find_bar_pane_id(&self) -> Option<PaneId> {
        self.read().find_bar.as_ref().map(|a| a.pane_id.clone())
    }

    pub fn is_find_bar_visible(&self) -> bool {
        self.find_bar().is_some_and(|f| f.is_visible())
    }

    // ── Settings ──────────────────────────────────────────────────────

    /// Apply every section the coordinator consumes. Split and stack
    /// settings are read by containers at construction, so they take
    /// effect on the next rebuild.
    pub fn apply_settings(&self, config: &Config) {
        self.apply_focus_settings(config.focus.clone());
        self.apply_omnibox_config(config.omnibox.clone());
        self.apply_find_config(config.find.clone());
    }

    pub fn apply_focus_settings(&self, focus: FocusConfig) {
        let delay = focus.hover_focus_delay();
        let views: Vec<Arc<PaneView>> = {
            let mut inner = self.write();
            inner.focus = focus;
            inner.pane_views.values().cloned().collect()
        };
        for view in views {
            view.set_hover_delay(delay);
        }
    }

    pub fn apply_omnibox_config(&self, config: OmniboxConfig) {
        let omnibox = {
            let mut inner = self.write();
            inner.omnibox_config = config.clone();
            inner.omnibox.as_ref().map(|a| Arc::clone(&a.component))
        };
        if let Some(omnibox) = omnibox {
            omnibox.apply_config(config);
        }
    }

    /// Defaults for the next find bar; a visible one keeps its toggles.
    pub fn apply_find_config(&self, config: FindConfig) {
        self.write().find_config = config;
    }
}

impl std::fmt::Debug for WorkspaceView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.read();
        f.debug_struct("WorkspaceView")
            .field("panes", &inner.pane_views.len())
            .field("omnibox", &inner.omnibox.as_ref().map(|a| &a.pane_id))
            .field("find_bar", &inner.find_bar.as_ref().map(|a| &a.pane_id))
            .finish()
    }
}

fn read_workspace(workspace: &SharedWorkspace) -> RwLockReadGuard<'_, Workspace> {
    workspace.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_workspace(workspace: &SharedWorkspace) -> RwLockWriteGuard<'_, Workspace> {
    workspace.write().unwrap_or_else(PoisonError::into_inner)
}

/// Take an overlay out of `slot` unless it is anchored to `keep`, along with
/// the view it was anchored to.
fn take_stale<T>(
    slot: &mut Option<Anchored<T>>,
    keep: &PaneId,
    views: &HashMap<PaneId, Arc<PaneView>>,
) -> Stale<T> {
    let anchored = slot.take_if(|a| a.pane_id != *keep)?;
    let anchor = views.get(&anchored.pane_id).cloned();
    Some((anchored, anchor))
}

/// Hide an overlay and detach its widget. Removed through the anchor's
/// overlay only if it is still parented there; otherwise unparented from
/// wherever a rebuild left it.
fn teardown<T: Dismiss>(anchored: Anchored<T>, anchor: Option<Arc<PaneView>>) {
    anchored.component.dismiss();
    let widget = &anchored.widget;
    match (widget.parent(), anchor) {
        (Some(parent), Some(view)) if parent == view.overlay().id() => {
            view.remove_overlay_widget(widget);
        }
        (Some(_), _) => widget.unparent(),
        (None, _) => {}
    }
    log::debug!("{} on pane {} torn down", T::KIND, anchored.pane_id);
}
