// Pane chrome, pane-anchored overlays and the workspace coordinator.

pub mod find_bar;
pub mod hover;
pub mod omnibox;
pub mod pane_view;
pub mod workspace_view;

pub use find_bar::FindBar;
pub use hover::HoverHandler;
pub use omnibox::{Omnibox, Suggestion, SuggestionSource};
pub use pane_view::PaneView;
pub use workspace_view::WorkspaceView;

pub use crate::search::{FindController, FindOptions, FindStatus};

use std::sync::Arc;

use crate::layout::{LayoutError, WidgetRef};
use crate::pane::{Pane, PaneId};

/// Supplies the hosted content for each pane.
pub trait ContentFactory: Send + Sync {
    /// The widget rendering `pane`'s content. `None` leaves the pane empty
    /// until [`WorkspaceView::set_content_widget`] provides one.
    fn create_content(&self, pane: &Pane) -> Option<WidgetRef>;

    /// Find-in-page for the pane's content, if it supports searching.
    fn find_controller(&self, _pane_id: &PaneId) -> Option<Arc<dyn FindController>> {
        None
    }
}

/// Errors returned by the workspace coordinator.
#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("no workspace set")]
    NilWorkspace,
    #[error("pane not found: {0}")]
    PaneNotFound(PaneId),
    #[error("workspace has no active pane")]
    NoActivePane,
    #[error(transparent)]
    Layout(#[from] LayoutError),
}
