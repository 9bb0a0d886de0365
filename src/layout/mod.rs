// Layout engine: widget capabilities, split/stack containers and the tree renderer.

pub mod split;
pub mod stacked;
pub mod tree;
pub mod widgets;

pub use split::{ApplyOutcome, RatioState, SplitView};
pub use stacked::StackedView;
pub use tree::{NodeRole, PaneViewFactory, RegisteredNode, TreeRenderer};
pub use widgets::{
    BoxWidget, ButtonWidget, ImageWidget, LabelWidget, Orientation, OverlayWidget, PanedWidget,
    PointerEvent, SignalId, SpinnerWidget, Widget, WidgetFactory, WidgetId, WidgetRef,
};

use std::sync::Arc;

use crate::config::{SplitConfig, StackConfig};
use crate::pane::TreeError;
use crate::runtime::UiScheduler;

/// Structural errors raised by the layout engine.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("root node is missing")]
    NilRoot,
    #[error("node not found: {0}")]
    NodeNotFound(String),
    #[error("node {0} is not a split")]
    NotASplit(String),
    #[error("stack is empty")]
    StackEmpty,
    #[error("index {index} out of bounds for {len} panes")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("cannot remove last pane from stack")]
    CannotRemoveLastPane,
    #[error("malformed pane tree: {0}")]
    MalformedTree(#[from] TreeError),
}

/// Tunables the containers read at construction time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutSettings {
    pub split: SplitConfig,
    pub stack: StackConfig,
}

/// Everything a container needs to build itself: widget constructors,
/// the UI-loop scheduler and settings.
#[derive(Clone)]
pub struct LayoutContext {
    pub factory: Arc<dyn WidgetFactory>,
    pub scheduler: Arc<dyn UiScheduler>,
    pub settings: LayoutSettings,
}

impl LayoutContext {
    pub fn new(factory: Arc<dyn WidgetFactory>, scheduler: Arc<dyn UiScheduler>) -> Self {
        Self {
            factory,
            scheduler,
            settings: LayoutSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: LayoutSettings) -> Self {
        self.settings = settings;
        self
    }
}
