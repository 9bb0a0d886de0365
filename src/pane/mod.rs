// Pane domain model: the split/stack/leaf tree and the workspace that owns it.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

/// Global monotonically increasing node ID counter.
static NEXT_NODE_ID: AtomicU32 = AtomicU32::new(1);

/// Generate a fresh, unique node id.
pub fn next_node_id() -> String {
    format!("node-{}", NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
}

/// Reset the global counter (for testing only).
#[cfg(test)]
pub(crate) fn reset_node_counter() {
    NEXT_NODE_ID.store(1, Ordering::Relaxed);
}

/// Unique identifier for a content pane.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PaneId(pub String);

impl PaneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PaneId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A leaf unit of hosted content. The content itself lives elsewhere;
/// this only carries what the chrome needs to render.
#[derive(Debug, Clone, PartialEq)]
pub struct Pane {
    pub id: PaneId,
    pub uri: String,
    pub title: String,
    /// Icon name shown in stacked title rows.
    pub favicon: Option<String>,
}

impl Pane {
    pub fn new(id: impl Into<PaneId>, uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uri: uri.into(),
            title: String::new(),
            favicon: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_favicon(mut self, icon: impl Into<String>) -> Self {
        self.favicon = Some(icon.into());
        self
    }
}

/// Direction of a split in the pane tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitDirection {
    /// Children side by side, left/right.
    Horizontal,
    /// Children stacked top/bottom.
    Vertical,
}

/// A node in the pane tree.
#[derive(Debug, Clone, PartialEq)]
pub struct PaneNode {
    /// Stable id. Nodes with an empty id are rendered but never registered.
    pub id: String,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Leaf(Pane),
    Split {
        direction: SplitDirection,
        /// Share of the space given to `first`, in [0, 1].
        ratio: f64,
        first: Box<PaneNode>,
        second: Box<PaneNode>,
    },
    /// Tab-like group of leaves with one visible.
    Stack { active: usize, children: Vec<PaneNode> },
}

/// Structural problems that make a tree unrenderable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TreeError {
    #[error("stack {0} has no children")]
    EmptyStack(String),
    #[error("duplicate node id {0}")]
    DuplicateNodeId(String),
}

/// Result of a remove_leaf operation.
#[derive(Debug, PartialEq)]
pub enum RemoveResult {
    /// The node itself was the target and should be replaced by its parent.
    RemovedSelf,
    /// The target was found and removed within this subtree.
    Removed,
    /// The target was not found in this subtree.
    NotFound,
}

impl PaneNode {
    /// Create a new leaf node with a fresh id.
    pub fn leaf(pane: Pane) -> Self {
        Self {
            id: next_node_id(),
            kind: NodeKind::Leaf(pane),
        }
    }

    /// Create a new split node with a fresh id.
    pub fn split(direction: SplitDirection, ratio: f64, first: PaneNode, second: PaneNode) -> Self {
        Self {
            id: next_node_id(),
            kind: NodeKind::Split {
                direction,
                ratio: ratio.clamp(0.0, 1.0),
                first: Box::new(first),
                second: Box::new(second),
            },
        }
    }

    /// Create a new stack node with a fresh id.
    pub fn stack(children: Vec<PaneNode>, active: usize) -> Self {
        Self {
            id: next_node_id(),
            kind: NodeKind::Stack { active, children },
        }
    }

    /// Replace the generated id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }

    pub fn is_split(&self) -> bool {
        matches!(self.kind, NodeKind::Split { .. })
    }

    pub fn is_stack(&self) -> bool {
        matches!(self.kind, NodeKind::Stack { .. })
    }

    /// The pane if this is a leaf node.
    pub fn pane(&self) -> Option<&Pane> {
        match &self.kind {
            NodeKind::Leaf(pane) => Some(pane),
            _ => None,
        }
    }

    /// Direct children in order.
    pub fn children(&self) -> Vec<&PaneNode> {
        match &self.kind {
            NodeKind::Leaf(_) => Vec::new(),
            NodeKind::Split { first, second, .. } => vec![first.as_ref(), second.as_ref()],
            NodeKind::Stack { children, .. } => children.iter().collect(),
        }
    }

    /// Pre-order traversal.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a PaneNode)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    /// Count the number of leaf nodes in this subtree.
    pub fn leaf_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |node| {
            if node.is_leaf() {
                count += 1;
            }
        });
        count
    }

    /// Number of nodes that carry a non-empty id.
    pub fn registered_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |node| {
            if !node.id.is_empty() {
                count += 1;
            }
        });
        count
    }

    /// Collect all leaf PaneIds in this subtree, in order.
    pub fn leaf_ids(&self) -> Vec<PaneId> {
        let mut ids = Vec::new();
        self.walk(&mut |node| {
            if let Some(pane) = node.pane() {
                ids.push(pane.id.clone());
            }
        });
        ids
    }

    pub fn find_pane(&self, target: &PaneId) -> Option<&Pane> {
        let mut found = None;
        self.walk(&mut |node| {
            if found.is_none() {
                found = node.pane().filter(|pane| &pane.id == target);
            }
        });
        found
    }

    pub fn contains_pane(&self, target: &PaneId) -> bool {
        self.find_pane(target).is_some()
    }

    pub fn find_node(&self, node_id: &str) -> Option<&PaneNode> {
        let mut found = None;
        self.walk(&mut |node| {
            if found.is_none() && !node_id.is_empty() && node.id == node_id {
                found = Some(node);
            }
        });
        found
    }

    /// Check the structural rules a renderer relies on.
    pub fn validate(&self) -> Result<(), TreeError> {
        let mut seen = HashSet::new();
        self.validate_into(&mut seen)
    }

    fn validate_into<'a>(&'a self, seen: &mut HashSet<&'a str>) -> Result<(), TreeError> {
        if !self.id.is_empty() && !seen.insert(self.id.as_str()) {
            return Err(TreeError::DuplicateNodeId(self.id.clone()));
        }
        match &self.kind {
            NodeKind::Leaf(_) => Ok(()),
            NodeKind::Split { first, second, .. } => {
                first.validate_into(seen)?;
                second.validate_into(seen)
            }
            NodeKind::Stack { children, .. } => {
                if children.is_empty() {
                    return Err(TreeError::EmptyStack(self.id.clone()));
                }
                children.iter().try_for_each(|child| child.validate_into(seen))
            }
        }
    }

    /// Split the leaf (or the stack holding it) so `new_pane` sits beside it.
    /// Returns true if the target was found.
    pub fn split_leaf(&mut self, target: &PaneId, direction: SplitDirection, new_pane: Pane) -> bool {
        let wraps_target = match &self.kind {
            NodeKind::Leaf(pane) => &pane.id == target,
            NodeKind::Stack { children, .. } => children
                .iter()
                .any(|c| c.pane().is_some_and(|p| &p.id == target)),
            NodeKind::Split { .. } => false,
        };
        if wraps_target {
            let original = std::mem::replace(self, PaneNode::placeholder());
            *self = PaneNode::split(direction, 0.5, original, PaneNode::leaf(new_pane));
            return true;
        }
        match &mut self.kind {
            NodeKind::Split { first, second, .. } => {
                if first.split_leaf(target, direction, new_pane.clone()) {
                    return true;
                }
                second.split_leaf(target, direction, new_pane)
            }
            NodeKind::Stack { children, .. } => children
                .iter_mut()
                .any(|c| !c.is_leaf() && c.split_leaf(target, direction, new_pane.clone())),
            NodeKind::Leaf(_) => false,
        }
    }

    /// Remove the leaf with the given pane id, promoting its sibling.
    pub fn remove_leaf(&mut self, target: &PaneId) -> RemoveResult {
        match &mut self.kind {
            NodeKind::Leaf(pane) if &pane.id == target => RemoveResult::RemovedSelf,
            NodeKind::Leaf(_) => RemoveResult::NotFound,
            NodeKind::Stack { active, children } => {
                let mut emptied = None;
                for (index, child) in children.iter_mut().enumerate() {
                    match child.remove_leaf(target) {
                        RemoveResult::NotFound => {}
                        RemoveResult::Removed => return RemoveResult::Removed,
                        RemoveResult::RemovedSelf => {
                            emptied = Some(index);
                            break;
                        }
                    }
                }
                let Some(index) = emptied else {
                    return RemoveResult::NotFound;
                };
                if children.len() == 1 {
                    return RemoveResult::RemovedSelf;
                }
                children.remove(index);
                // Adjust active index
                if *active >= children.len() {
                    *active = children.len() - 1;
                } else if *active > index {
                    *active -= 1;
                }
                RemoveResult::Removed
            }
            NodeKind::Split { first, second, .. } => match first.remove_leaf(target) {
                RemoveResult::RemovedSelf => {
                    // First child was the target; replace self with second
                    let surviving = std::mem::replace(second.as_mut(), PaneNode::placeholder());
                    *self = surviving;
                    RemoveResult::Removed
                }
                RemoveResult::Removed => RemoveResult::Removed,
                RemoveResult::NotFound => match second.remove_leaf(target) {
                    RemoveResult::RemovedSelf => {
                        let surviving = std::mem::replace(first.as_mut(), PaneNode::placeholder());
                        *self = surviving;
                        RemoveResult::Removed
                    }
                    other => other,
                },
            },
        }
    }

    /// Group `new_pane` with the target: a leaf becomes a two-pane stack,
    /// a stack gains the pane right after the target. The new pane is active.
    pub fn stack_onto(&mut self, target: &PaneId, new_pane: Pane) -> bool {
        match &mut self.kind {
            NodeKind::Leaf(pane) if &pane.id == target => {
                let original = std::mem::replace(self, PaneNode::placeholder());
                *self = PaneNode::stack(vec![original, PaneNode::leaf(new_pane)], 1);
                true
            }
            NodeKind::Leaf(_) => false,
            NodeKind::Stack { active, children } => {
                match children
                    .iter()
                    .position(|c| c.pane().is_some_and(|p| &p.id == target))
                {
                    Some(index) => {
                        children.insert(index + 1, PaneNode::leaf(new_pane));
                        *active = index + 1;
                        true
                    }
                    None => children
                        .iter_mut()
                        .any(|c| !c.is_leaf() && c.stack_onto(target, new_pane.clone())),
                }
            }
            NodeKind::Split { first, second, .. } => {
                first.stack_onto(target, new_pane.clone()) || second.stack_onto(target, new_pane)
            }
        }
    }

    /// Update the ratio of the split with the given node id (clamped to [0, 1]).
    pub fn set_split_ratio(&mut self, node_id: &str, new_ratio: f64) -> bool {
        let is_target = self.id == node_id;
        match &mut self.kind {
            NodeKind::Split {
                ratio,
                first,
                second,
                ..
            } => {
                if is_target {
                    *ratio = new_ratio.clamp(0.0, 1.0);
                    return true;
                }
                first.set_split_ratio(node_id, new_ratio) || second.set_split_ratio(node_id, new_ratio)
            }
            _ => false,
        }
    }

    /// Make the pane the active member of its stack. False if it is not stacked.
    pub fn set_stack_active(&mut self, target: &PaneId) -> bool {
        match &mut self.kind {
            NodeKind::Leaf(_) => false,
            NodeKind::Stack { active, children } => {
                match children
                    .iter()
                    .position(|c| c.pane().is_some_and(|p| &p.id == target))
                {
                    Some(index) => {
                        *active = index;
                        true
                    }
                    None => {
                        let Some(index) = children.iter().position(|c| c.contains_pane(target))
                        else {
                            return false;
                        };
                        *active = index;
                        children[index].set_stack_active(target);
                        true
                    }
                }
            }
            NodeKind::Split { first, second, .. } => {
                first.set_stack_active(target) || second.set_stack_active(target)
            }
        }
    }

    fn placeholder() -> Self {
        Self {
            id: String::new(),
            kind: NodeKind::Leaf(Pane::new("", "")),
        }
    }
}

/// A window's pane tree plus which pane is active.
#[derive(Debug, Clone, PartialEq)]
pub struct Workspace {
    pub id: String,
    pub root: Option<PaneNode>,
    /// Always names a leaf under `root` while `root` is present.
    pub active_pane_id: Option<PaneId>,
}

/// The workspace as shared between the application and the view layer.
pub type SharedWorkspace = Arc<RwLock<Workspace>>;

impl Workspace {
    /// Create a workspace holding a single pane, which is active.
    pub fn new(id: impl Into<String>, first: Pane) -> Self {
        let active = first.id.clone();
        Self {
            id: id.into(),
            root: Some(PaneNode::leaf(first)),
            active_pane_id: Some(active),
        }
    }

    pub fn empty(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            root: None,
            active_pane_id: None,
        }
    }

    /// Wrap in the shared handle the view layer consumes.
    pub fn into_shared(self) -> SharedWorkspace {
        Arc::new(RwLock::new(self))
    }

    pub fn pane_ids(&self) -> Vec<PaneId> {
        self.root.as_ref().map(PaneNode::leaf_ids).unwrap_or_default()
    }

    pub fn pane_count(&self) -> usize {
        self.root.as_ref().map_or(0, PaneNode::leaf_count)
    }

    /// Split the active pane, making the new pane active.
    pub fn split_active(&mut self, direction: SplitDirection, new_pane: Pane) -> Option<PaneId> {
        let target = self.active_pane_id.clone()?;
        let new_id = new_pane.id.clone();
        let root = self.root.as_mut()?;
        if !root.split_leaf(&target, direction, new_pane) {
            return None;
        }
        self.active_pane_id = Some(new_id.clone());
        Some(new_id)
    }

    /// Stack a new pane onto the active one, making it active.
    pub fn stack_on_active(&mut self, new_pane: Pane) -> Option<PaneId> {
        let target = self.active_pane_id.clone()?;
        let new_id = new_pane.id.clone();
        let root = self.root.as_mut()?;
        if !root.stack_onto(&target, new_pane) {
            return None;
        }
        self.active_pane_id = Some(new_id.clone());
        Some(new_id)
    }

    /// Close a pane. If it was active, the first remaining pane takes over.
    /// Returns false if the pane does not exist.
    pub fn close_pane(&mut self, target: &PaneId) -> bool {
        let Some(root) = self.root.as_mut() else {
            return false;
        };
        match root.remove_leaf(target) {
            RemoveResult::NotFound => false,
            RemoveResult::RemovedSelf => {
                self.root = None;
                self.active_pane_id = None;
                true
            }
            RemoveResult::Removed => {
                let ids = root.leaf_ids();
                let still_valid = self
                    .active_pane_id
                    .as_ref()
                    .is_some_and(|active| ids.contains(active));
                if !still_valid {
                    self.active_pane_id = ids.first().cloned();
                }
                true
            }
        }
    }

    /// Set the active pane. No-op (false) if the pane doesn't exist.
    pub fn set_active(&mut self, target: &PaneId) -> bool {
        let Some(root) = self.root.as_mut() else {
            return false;
        };
        if !root.contains_pane(target) {
            return false;
        }
        root.set_stack_active(target);
        self.active_pane_id = Some(target.clone());
        true
    }

    /// Whether the active pane invariant holds.
    pub fn is_consistent(&self) -> bool {
        match (&self.root, &self.active_pane_id) {
            (None, None) => true,
            (None, Some(_)) => false,
            (Some(root), Some(active)) => root.contains_pane(active),
            (Some(_), None) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pane(id: &str) -> Pane {
        Pane::new(id, format!("https://{id}.example"))
    }

    fn leaf(id: &str) -> PaneNode {
        PaneNode::leaf(pane(id))
    }

    // ── Node id tests ─────────────────────────────────────────────────

    #[test]
    fn node_ids_are_unique() {
        let a = next_node_id();
        let b = next_node_id();
        assert_ne!(a, b);
    }

    #[test]
    fn node_ids_carry_prefix() {
        reset_node_counter();
        assert!(next_node_id().starts_with("node-"));
    }

    // ── Construction ──────────────────────────────────────────────────

    #[test]
    fn split_constructor_clamps_ratio() {
        let node = PaneNode::split(SplitDirection::Horizontal, 1.7, leaf("a"), leaf("b"));
        match node.kind {
            NodeKind::Split { ratio, .. } => assert_eq!(ratio, 1.0),
            _ => panic!("expected split"),
        }
    }

    #[test]
    fn leaf_ids_in_order() {
        let tree = PaneNode::split(
            SplitDirection::Horizontal,
            0.5,
            leaf("a"),
            PaneNode::split(SplitDirection::Vertical, 0.5, leaf("b"), leaf("c")),
        );
        assert_eq!(
            tree.leaf_ids(),
            vec![PaneId::from("a"), PaneId::from("b"), PaneId::from("c")]
        );
        assert_eq!(tree.leaf_count(), 3);
        assert_eq!(tree.registered_count(), 5);
    }

    #[test]
    fn registered_count_skips_empty_ids() {
        let tree = PaneNode::split(
            SplitDirection::Horizontal,
            0.5,
            leaf("a").with_id(""),
            leaf("b"),
        );
        assert_eq!(tree.registered_count(), 2);
    }

    // ── Validation ────────────────────────────────────────────────────

    #[test]
    fn validate_rejects_empty_stack() {
        let tree = PaneNode::stack(Vec::new(), 0).with_id("s");
        assert_eq!(tree.validate(), Err(TreeError::EmptyStack("s".to_string())));
    }

    #[test]
    fn validate_accepts_out_of_range_active() {
        let tree = PaneNode::stack(vec![leaf("a")], 3).with_id("s");
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn validate_accepts_split_inside_stack() {
        let inner = PaneNode::split(SplitDirection::Vertical, 0.5, leaf("a"), leaf("b"));
        let tree = PaneNode::stack(vec![inner, leaf("c")], 0).with_id("s");
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn validate_checks_ids_below_nested_stack_children() {
        let inner = PaneNode::split(
            SplitDirection::Vertical,
            0.5,
            leaf("a").with_id("dup"),
            leaf("b"),
        );
        let tree = PaneNode::stack(vec![inner, leaf("c").with_id("dup")], 0);
        assert_eq!(tree.validate(), Err(TreeError::DuplicateNodeId("dup".to_string())));
    }

    #[test]
    fn validate_rejects_duplicate_ids() {
        let tree = PaneNode::split(
            SplitDirection::Horizontal,
            0.5,
            leaf("a").with_id("dup"),
            leaf("b").with_id("dup"),
        );
        assert_eq!(tree.validate(), Err(TreeError::DuplicateNodeId("dup".to_string())));
    }

    #[test]
    fn validate_allows_repeated_empty_ids() {
        let tree = PaneNode::split(
            SplitDirection::Horizontal,
            0.5,
            leaf("a").with_id(""),
            leaf("b").with_id(""),
        );
        assert!(tree.validate().is_ok());
    }

    // ── Split / remove / stack ────────────────────────────────────────

    #[test]
    fn split_leaf_wraps_target() {
        let mut tree = leaf("a");
        assert!(tree.split_leaf(&"a".into(), SplitDirection::Vertical, pane("b")));
        assert!(tree.is_split());
        assert_eq!(tree.leaf_ids(), vec![PaneId::from("a"), PaneId::from("b")]);
    }

    #[test]
    fn split_leaf_missing_target() {
        let mut tree = leaf("a");
        assert!(!tree.split_leaf(&"zz".into(), SplitDirection::Vertical, pane("b")));
        assert!(tree.is_leaf());
    }

    #[test]
    fn split_of_stacked_pane_wraps_whole_stack() {
        let mut tree = PaneNode::stack(vec![leaf("a"), leaf("b")], 0);
        assert!(tree.split_leaf(&"b".into(), SplitDirection::Horizontal, pane("c")));
        match &tree.kind {
            NodeKind::Split { first, second, .. } => {
                assert!(first.is_stack());
                assert_eq!(second.pane().unwrap().id, PaneId::from("c"));
            }
            _ => panic!("expected split"),
        }
    }

    #[test]
    fn remove_leaf_promotes_sibling() {
        let mut tree = PaneNode::split(SplitDirection::Horizontal, 0.5, leaf("a"), leaf("b"));
        assert_eq!(tree.remove_leaf(&"a".into()), RemoveResult::Removed);
        assert!(tree.is_leaf());
        assert_eq!(tree.pane().unwrap().id, PaneId::from("b"));
    }

    #[test]
    fn remove_only_leaf_reports_self() {
        let mut tree = leaf("a");
        assert_eq!(tree.remove_leaf(&"a".into()), RemoveResult::RemovedSelf);
    }

    #[test]
    fn remove_from_stack_adjusts_active() {
        let mut tree = PaneNode::stack(vec![leaf("a"), leaf("b"), leaf("c")], 2);
        assert_eq!(tree.remove_leaf(&"a".into()), RemoveResult::Removed);
        match tree.kind {
            NodeKind::Stack { active, ref children } => {
                assert_eq!(children.len(), 2);
                assert_eq!(active, 1);
            }
            _ => panic!("expected stack"),
        }
    }

    #[test]
    fn remove_last_stack_member_removes_stack() {
        let mut tree = PaneNode::split(
            SplitDirection::Horizontal,
            0.5,
            PaneNode::stack(vec![leaf("a")], 0),
            leaf("b"),
        );
        assert_eq!(tree.remove_leaf(&"a".into()), RemoveResult::Removed);
        assert_eq!(tree.leaf_ids(), vec![PaneId::from("b")]);
    }

    #[test]
    fn stack_onto_leaf_creates_stack_with_new_active() {
        let mut tree = leaf("a");
        let original_id = tree.id.clone();
        assert!(tree.stack_onto(&"a".into(), pane("b")));
        match &tree.kind {
            NodeKind::Stack { active, children } => {
                assert_eq!(*active, 1);
                assert_eq!(children[0].id, original_id);
            }
            _ => panic!("expected stack"),
        }
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn stack_onto_stack_inserts_after_target() {
        let mut tree = PaneNode::stack(vec![leaf("a"), leaf("b")], 0);
        assert!(tree.stack_onto(&"a".into(), pane("c")));
        assert_eq!(
            tree.leaf_ids(),
            vec![PaneId::from("a"), PaneId::from("c"), PaneId::from("b")]
        );
    }

    #[test]
    fn edits_reach_panes_under_a_split_in_a_stack() {
        let inner = PaneNode::split(SplitDirection::Vertical, 0.5, leaf("a"), leaf("b"));
        let mut tree = PaneNode::stack(vec![leaf("c"), inner], 0);

        assert!(tree.set_stack_active(&"b".into()));
        match &tree.kind {
            NodeKind::Stack { active, .. } => assert_eq!(*active, 1),
            _ => panic!("expected stack"),
        }

        assert!(tree.stack_onto(&"a".into(), pane("d")));
        assert!(tree.split_leaf(&"b".into(), SplitDirection::Horizontal, pane("e")));
        assert_eq!(
            tree.leaf_ids(),
            vec![
                PaneId::from("c"),
                PaneId::from("a"),
                PaneId::from("d"),
                PaneId::from("b"),
                PaneId::from("e"),
            ]
        );

        assert_eq!(tree.remove_leaf(&"e".into()), RemoveResult::Removed);
        assert_eq!(tree.remove_leaf(&"missing".into()), RemoveResult::NotFound);
        assert_eq!(tree.leaf_count(), 4);
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn set_split_ratio_by_node_id() {
        let mut tree =
            PaneNode::split(SplitDirection::Horizontal, 0.5, leaf("a"), leaf("b")).with_id("root");
        assert!(tree.set_split_ratio("root", 2.0));
        assert!(!tree.set_split_ratio("missing", 0.2));
        match tree.kind {
            NodeKind::Split { ratio, .. } => assert_eq!(ratio, 1.0),
            _ => panic!("expected split"),
        }
    }

    // ── Workspace ─────────────────────────────────────────────────────

    #[test]
    fn workspace_split_moves_focus_to_new_pane() {
        let mut ws = Workspace::new("w", pane("a"));
        let new_id = ws.split_active(SplitDirection::Horizontal, pane("b"));
        assert_eq!(new_id, Some(PaneId::from("b")));
        assert_eq!(ws.active_pane_id, Some(PaneId::from("b")));
        assert_eq!(ws.pane_count(), 2);
        assert!(ws.is_consistent());
    }

    #[test]
    fn workspace_close_active_retargets_first_leaf() {
        let mut ws = Workspace::new("w", pane("a"));
        ws.split_active(SplitDirection::Horizontal, pane("b"));
        ws.split_active(SplitDirection::Vertical, pane("c"));
        assert!(ws.close_pane(&"c".into()));
        assert_eq!(ws.active_pane_id, Some(PaneId::from("a")));
        assert!(ws.is_consistent());
    }

    #[test]
    fn workspace_close_inactive_keeps_active() {
        let mut ws = Workspace::new("w", pane("a"));
        ws.split_active(SplitDirection::Horizontal, pane("b"));
        assert!(ws.close_pane(&"a".into()));
        assert_eq!(ws.active_pane_id, Some(PaneId::from("b")));
    }

    #[test]
    fn workspace_close_last_pane_empties_root() {
        let mut ws = Workspace::new("w", pane("a"));
        assert!(ws.close_pane(&"a".into()));
        assert!(ws.root.is_none());
        assert!(ws.active_pane_id.is_none());
        assert!(ws.is_consistent());
    }

    #[test]
    fn workspace_close_unknown_pane() {
        let mut ws = Workspace::new("w", pane("a"));
        assert!(!ws.close_pane(&"zz".into()));
    }

    #[test]
    fn workspace_stack_on_active() {
        let mut ws = Workspace::new("w", pane("a"));
        assert_eq!(ws.stack_on_active(pane("b")), Some(PaneId::from("b")));
        assert!(ws.root.as_ref().unwrap().is_stack());
        assert!(ws.set_active(&"a".into()));
        match &ws.root.as_ref().unwrap().kind {
            NodeKind::Stack { active, .. } => assert_eq!(*active, 0),
            _ => panic!("expected stack"),
        }
    }

    #[test]
    fn workspace_set_active_rejects_unknown() {
        let mut ws = Workspace::new("w", pane("a"));
        assert!(!ws.set_active(&"zz".into()));
        assert_eq!(ws.active_pane_id, Some(PaneId::from("a")));
    }

    #[test]
    fn empty_workspace_is_consistent() {
        let mut ws = Workspace::empty("w");
        assert!(ws.is_consistent());
        assert!(ws.split_active(SplitDirection::Horizontal, pane("a")).is_none());
    }

    // ── Property tests ────────────────────────────────────────────────

    #[derive(Debug, Clone)]
    enum Op {
        Split(bool),
        Stack,
        Close(usize),
        Focus(usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            any::<bool>().prop_map(Op::Split),
            Just(Op::Stack),
            (0usize..8).prop_map(Op::Close),
            (0usize..8).prop_map(Op::Focus),
        ]
    }

    proptest! {
        #[test]
        fn workspace_ops_preserve_invariants(ops in proptest::collection::vec(op_strategy(), 1..40)) {
            let mut ws = Workspace::new("w", pane("p0"));
            let mut next = 1;
            for op in ops {
                match op {
                    Op::Split(horizontal) => {
                        let dir = if horizontal { SplitDirection::Horizontal } else { SplitDirection::Vertical };
                        ws.split_active(dir, pane(&format!("p{next}")));
                        next += 1;
                    }
                    Op::Stack => {
                        ws.stack_on_active(pane(&format!("p{next}")));
                        next += 1;
                    }
                    Op::Close(i) => {
                        let ids = ws.pane_ids();
                        if !ids.is_empty() {
                            ws.close_pane(&ids[i % ids.len()]);
                        }
                    }
                    Op::Focus(i) => {
                        let ids = ws.pane_ids();
                        if !ids.is_empty() {
                            ws.set_active(&ids[i % ids.len()]);
                        }
                    }
                }
                prop_assert!(ws.is_consistent());
                if let Some(root) = &ws.root {
                    prop_assert!(root.validate().is_ok());
                }
            }
        }
    }
}
