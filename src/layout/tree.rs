// Builds the widget tree for a pane tree and keeps the node id -> widget registry.
//
// Every build starts from an empty registry; there is no incremental diffing.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use super::split::SplitView;
use super::stacked::StackedView;
use super::widgets::{Orientation, WidgetRef};
use super::{LayoutContext, LayoutError};
use crate::pane::{NodeKind, Pane, PaneId, PaneNode, SplitDirection};

const UNTITLED: &str = "Untitled";

/// Produces the widget for a leaf pane.
pub trait PaneViewFactory: Send + Sync {
    /// `None` means the leaf can't be shown; it is rendered as an empty
    /// placeholder and left unregistered.
    fn create_pane_view(&self, node: &PaneNode, pane: &Pane) -> Option<WidgetRef>;
}

/// What kind of tree node a registered widget renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Leaf,
    Split,
    Stack,
}

#[derive(Debug, Clone)]
pub struct RegisteredNode {
    pub widget: WidgetRef,
    pub role: NodeRole,
}

pub type SplitRatioCallback = Arc<dyn Fn(&str, f64) + Send + Sync>;
pub type StackPaneCallback = Arc<dyn Fn(&PaneId) + Send + Sync>;

#[derive(Default)]
struct Registry {
    widgets: HashMap<String, RegisteredNode>,
    splits: HashMap<String, Arc<SplitView>>,
    stacks: HashMap<String, Arc<StackedView>>,
    /// Pane id -> the stack displaying it.
    pane_stacks: HashMap<PaneId, Arc<StackedView>>,
    /// Splits without a node id still have to outlive the build.
    unnamed_splits: Vec<Arc<SplitView>>,
}

impl Registry {
    fn register(&mut self, node_id: &str, widget: &WidgetRef, role: NodeRole) {
        if node_id.is_empty() {
            return;
        }
        self.widgets.insert(
            node_id.to_string(),
            RegisteredNode {
                widget: Arc::clone(widget),
                role,
            },
        );
    }
}

#[derive(Default)]
struct Callbacks {
    on_split_ratio_changed: Option<SplitRatioCallback>,
    on_stack_activate: Option<StackPaneCallback>,
    on_stack_close_pane: Option<StackPaneCallback>,
}

pub struct TreeRenderer {
    ctx: LayoutContext,
    pane_views: Arc<dyn PaneViewFactory>,
    registry: RwLock<Registry>,
    callbacks: RwLock<Callbacks>,
    this: Weak<TreeRenderer>,
}

impl TreeRenderer {
    pub fn new(ctx: LayoutContext, pane_views: Arc<dyn PaneViewFactory>) -> Arc<Self> {
        log::debug!("creating tree renderer");
        Arc::new_cyclic(|this| TreeRenderer {
            ctx,
            pane_views,
            registry: RwLock::new(Registry::default()),
            callbacks: RwLock::new(Callbacks::default()),
            this: this.clone(),
        })
    }

    fn registry(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry_mut(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn callbacks(&self) -> RwLockReadGuard<'_, Callbacks> {
        self.callbacks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn callbacks_mut(&self) -> RwLockWriteGuard<'_, Callbacks> {
        self.callbacks.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn context(&self) -> &LayoutContext {
        &self.ctx
    }

    pub fn set_on_split_ratio_changed(&self, callback: Option<SplitRatioCallback>) {
        self.callbacks_mut().on_split_ratio_changed = callback;
    }

    /// Fired after a stack title row activates its pane.
    pub fn set_on_stack_activate(&self, callback: Option<StackPaneCallback>) {
        self.callbacks_mut().on_stack_activate = callback;
    }

    pub fn set_on_stack_close_pane(&self, callback: Option<StackPaneCallback>) {
        self.callbacks_mut().on_stack_close_pane = callback;
    }

    /// Build the whole widget tree for `root`, replacing the registry.
    ///
    /// The registry is cleared first, so a failed build leaves it empty
    /// rather than mixing two trees.
    pub fn build(&self, root: Option<&PaneNode>) -> Result<WidgetRef, LayoutError> {
        let root = root.ok_or(LayoutError::NilRoot)?;
        let previous = std::mem::take(&mut *self.registry_mut());
        drop(previous);

        root.validate()?;
        log::debug!("tree: building from root {}", root.id);

        let mut staging = Registry::default();
        let widget = self.render_node(root, &mut staging);
        let count = staging.widgets.len();
        *self.registry_mut() = staging;
        log::info!("tree: built {count} registered nodes ({} leaves)", root.leaf_count());
        Ok(widget)
    }

    fn render_node(&self, node: &PaneNode, staging: &mut Registry) -> WidgetRef {
        match &node.kind {
            NodeKind::Leaf(pane) => self.render_leaf(node, pane, staging),
            NodeKind::Split {
                direction,
                ratio,
                first,
                second,
            } => {
                let start = self.render_node(first, staging);
                let end = self.render_node(second, staging);
                self.render_split(node, *direction, *ratio, start, end, staging)
            }
            NodeKind::Stack { active, children } => {
                self.render_stack(node, *active, children, staging)
            }
        }
    }

    /// Leaves are not wrapped in a one-pane stack. A leaf becomes a stack on the
    /// next rebuild; panes added to a live stack go through `register_pane_in_stack`.
    fn render_leaf(&self, node: &PaneNode, pane: &Pane, staging: &mut Registry) -> WidgetRef {
        match self.pane_views.create_pane_view(node, pane) {
            Some(widget) => {
                staging.register(&node.id, &widget, NodeRole::Leaf);
                widget
            }
            None => {
                log::warn!("tree: no view for pane {}, using placeholder", pane.id);
                let placeholder: WidgetRef = self.ctx.factory.new_box(Orientation::Vertical, 0);
                placeholder
            }
        }
    }

    fn render_split(
        &self,
        node: &PaneNode,
        direction: SplitDirection,
        ratio: f64,
        start: WidgetRef,
        end: WidgetRef,
        staging: &mut Registry,
    ) -> WidgetRef {
        let orientation = match direction {
            SplitDirection::Horizontal => Orientation::Horizontal,
            SplitDirection::Vertical => Orientation::Vertical,
        };
        let split = SplitView::new(&self.ctx, orientation, start, end, ratio);

        let weak = self.this.clone();
        let node_id = node.id.clone();
        split.set_on_ratio_changed(Some(Arc::new(move |ratio: f64| {
            let Some(tree) = weak.upgrade() else { return };
            let callback = tree.callbacks().on_split_ratio_changed.clone();
            if let Some(callback) = callback {
                callback(&node_id, ratio);
            }
        })));

        let widget = split.widget();
        staging.register(&node.id, &widget, NodeRole::Split);
        if node.id.is_empty() {
            staging.unnamed_splits.push(split);
        } else {
            staging.splits.insert(node.id.clone(), split);
        }
        widget
    }

    fn render_stack(
        &self,
        node: &PaneNode,
        active: usize,
        children: &[PaneNode],
        staging: &mut Registry,
    ) -> WidgetRef {
        let stack = StackedView::new(&self.ctx);
        log::debug!("tree: stack {} with {} panes", node.id, children.len());

        for child in children {
            let widget = self.render_node(child, staging);
            match child.pane() {
                Some(pane) => {
                    let title = if pane.title.is_empty() {
                        UNTITLED
                    } else {
                        pane.title.as_str()
                    };
                    stack.add_pane(pane.id.clone(), title, pane.favicon.as_deref(), Some(widget));
                    staging.pane_stacks.insert(pane.id.clone(), Arc::clone(&stack));
                }
                // Nested splits and stacks sit in the stack under their node id.
                None => {
                    stack.add_pane(PaneId::from(child.id.as_str()), UNTITLED, None, Some(widget));
                }
            }
        }
        if active < stack.count() {
            if let Err(e) = stack.set_active(active) {
                log::warn!("tree: stack {} rejected active index {active}: {e}", node.id);
            }
        }

        self.wire_stack(&stack);
        let widget = stack.widget();
        staging.register(&node.id, &widget, NodeRole::Stack);
        if !node.id.is_empty() {
            staging.stacks.insert(node.id.clone(), stack);
        }
        widget
    }

    /// Title row presses switch the stack and report the pane; close buttons
    /// only report, the owner decides what closing means.
    fn wire_stack(&self, stack: &Arc<StackedView>) {
        let weak_tree = self.this.clone();
        let weak_stack = Arc::downgrade(stack);
        stack.set_on_activate(Some(Arc::new(move |index: usize| {
            let (Some(tree), Some(stack)) = (weak_tree.upgrade(), weak_stack.upgrade()) else {
                return;
            };
            let Some(pane_id) = stack.pane_id_at(index) else {
                return;
            };
            if let Err(e) = stack.set_active(index) {
                log::warn!("tree: activating stacked pane {pane_id} failed: {e}");
                return;
            }
            let callback = tree.callbacks().on_stack_activate.clone();
            if let Some(callback) = callback {
                callback(&pane_id);
            }
        })));

        let weak_tree = self.this.clone();
        stack.set_on_close_pane(Some(Arc::new(move |pane_id: &PaneId| {
            let Some(tree) = weak_tree.upgrade() else { return };
            let callback = tree.callbacks().on_stack_close_pane.clone();
            if let Some(callback) = callback {
                callback(pane_id);
            }
        })));
    }

    pub fn lookup(&self, node_id: &str) -> Option<WidgetRef> {
        self.registry()
            .widgets
            .get(node_id)
            .map(|n| Arc::clone(&n.widget))
    }

    pub fn lookup_node(&self, node_id: &str) -> Option<RegisteredNode> {
        self.registry().widgets.get(node_id).cloned()
    }

    pub fn node_count(&self) -> usize {
        self.registry().widgets.len()
    }

    /// Registered node ids, sorted.
    pub fn node_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.registry().widgets.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn clear(&self) {
        let previous = std::mem::take(&mut *self.registry_mut());
        drop(previous);
    }

    /// Add or replace a mapping without a rebuild.
    pub fn register_widget(&self, node_id: &str, widget: WidgetRef, role: NodeRole) {
        self.registry_mut().register(node_id, &widget, role);
    }

    pub fn register_split(&self, node_id: &str, split: Arc<SplitView>) {
        let mut registry = self.registry_mut();
        registry.register(node_id, &split.widget(), NodeRole::Split);
        registry.splits.insert(node_id.to_string(), split);
    }

    pub fn unregister_widget(&self, node_id: &str) -> Option<RegisteredNode> {
        let mut registry = self.registry_mut();
        registry.splits.remove(node_id);
        registry.stacks.remove(node_id);
        registry.widgets.remove(node_id)
    }

    pub fn register_pane_in_stack(&self, pane_id: PaneId, stack: Arc<StackedView>) {
        self.registry_mut().pane_stacks.insert(pane_id, stack);
    }

    pub fn unregister_pane(&self, pane_id: &PaneId) {
        self.registry_mut().pane_stacks.remove(pane_id);
    }

    /// Change a split's ratio in place.
    pub fn update_split_ratio(&self, node_id: &str, ratio: f64) -> Result<(), LayoutError> {
        let split = {
            let registry = self.registry();
            if !registry.widgets.contains_key(node_id) {
                return Err(LayoutError::NodeNotFound(node_id.to_string()));
            }
            registry
                .splits
                .get(node_id)
                .cloned()
                .ok_or_else(|| LayoutError::NotASplit(node_id.to_string()))?
        };
        split.set_ratio(ratio);
        Ok(())
    }

    pub fn split_view(&self, node_id: &str) -> Option<Arc<SplitView>> {
        self.registry().splits.get(node_id).cloned()
    }

    pub fn stacked_view(&self, node_id: &str) -> Option<Arc<StackedView>> {
        self.registry().stacks.get(node_id).cloned()
    }

    pub fn stacked_view_for_pane(&self, pane_id: &PaneId) -> Option<Arc<StackedView>> {
        self.registry().pane_stacks.get(pane_id).cloned()
    }
}

impl std::fmt::Debug for TreeRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeRenderer")
            .field("nodes", &self.node_count())
            .finish()
    }
}
