// In-memory widget toolkit. Implements every layout widget capability over an
// arena of nodes and exposes driver hooks (allocation, mapping, frames, input).

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::{self, Write as _};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::layout::widgets::{
    BoxWidget, ButtonWidget, ImageWidget, LabelWidget, Orientation, OverlayWidget, PanedWidget,
    PointerCallback, PointerEvent, SignalCallback, SignalId, SpinnerWidget, TickCallback, Widget,
    WidgetFactory, WidgetId, WidgetRef,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Paned(Orientation),
    Box(Orientation),
    Overlay,
    Label,
    Image,
    Button,
    Spinner,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let axis = |o: &Orientation| match o {
            Orientation::Horizontal => "h",
            Orientation::Vertical => "v",
        };
        match self {
            Kind::Paned(o) => write!(f, "Paned({})", axis(o)),
            Kind::Box(o) => write!(f, "Box({})", axis(o)),
            Kind::Overlay => f.write_str("Overlay"),
            Kind::Label => f.write_str("Label"),
            Kind::Image => f.write_str("Image"),
            Kind::Button => f.write_str("Button"),
            Kind::Spinner => f.write_str("Spinner"),
        }
    }
}

/// Per-overlay-child layout flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlayFlags {
    pub clip: bool,
    pub measure: bool,
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Start,
    End,
    Child,
}

struct Node {
    kind: Kind,
    parent: Option<WidgetId>,
    visible: bool,
    mapped: bool,
    /// Set by the driver for top-level widgets (the window content).
    root_mapped: bool,
    can_target: bool,
    hexpand: bool,
    vexpand: bool,
    width: i32,
    height: i32,
    css: BTreeSet<String>,
    // Paned
    start: Option<WidgetId>,
    end: Option<WidgetId>,
    position: i32,
    resize_start: bool,
    resize_end: bool,
    wide_handle: bool,
    // Box
    children: Vec<WidgetId>,
    // Overlay
    child: Option<WidgetId>,
    overlays: Vec<(WidgetId, OverlayFlags)>,
    // Decorations
    text: String,
    ellipsize_end: bool,
    max_width_chars: Option<u32>,
    xalign: f32,
    icon: Option<String>,
    pixel_size: i32,
    focus_on_click: bool,
    spinning: bool,
}

impl Node {
    fn new(kind: Kind) -> Self {
        Self {
            kind,
            parent: None,
            visible: true,
            mapped: false,
            root_mapped: false,
            can_target: true,
            hexpand: false,
            vexpand: false,
            width: 0,
            height: 0,
            css: BTreeSet::new(),
            start: None,
            end: None,
            position: 0,
            resize_start: true,
            resize_end: true,
            wide_handle: false,
            children: Vec::new(),
            child: None,
            overlays: Vec::new(),
            text: String::new(),
            ellipsize_end: false,
            max_width_chars: None,
            xalign: 0.5,
            icon: None,
            pixel_size: -1,
            focus_on_click: true,
            spinning: false,
        }
    }

    fn slot(&self, slot: Slot) -> Option<WidgetId> {
        match slot {
            Slot::Start => self.start,
            Slot::End => self.end,
            Slot::Child => self.child,
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Option<WidgetId> {
        match slot {
            Slot::Start => &mut self.start,
            Slot::End => &mut self.end,
            Slot::Child => &mut self.child,
        }
    }

    /// All children in layout order.
    fn child_ids(&self) -> Vec<WidgetId> {
        let mut ids = Vec::new();
        ids.extend(self.start);
        ids.extend(self.end);
        ids.extend(self.child);
        ids.extend(self.children.iter().copied());
        ids.extend(self.overlays.iter().map(|(id, _)| *id));
        ids
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignalKind {
    Map,
    NotifyPosition,
    Pressed,
    Clicked,
}

enum Handler {
    Signal(SignalKind, SignalCallback),
    Pointer(PointerCallback),
}

#[derive(Default)]
struct Arena {
    next_widget: u64,
    next_signal: u64,
    nodes: HashMap<WidgetId, Node>,
    handlers: BTreeMap<SignalId, (WidgetId, Handler)>,
    /// A tick callback is `None` while it is running.
    ticks: BTreeMap<SignalId, Option<TickCallback>>,
    focused: Option<WidgetId>,
    criticals: Vec<String>,
    fail_decorations: bool,
    /// Signal emissions queued during a mutation, fired once the lock is released.
    pending: Vec<SignalCallback>,
}

impl Arena {
    fn insert(&mut self, kind: Kind) -> WidgetId {
        self.next_widget += 1;
        let id = WidgetId(self.next_widget);
        self.nodes.insert(id, Node::new(kind));
        id
    }

    fn next_signal(&mut self) -> SignalId {
        self.next_signal += 1;
        SignalId(self.next_signal)
    }

    fn connect(&mut self, widget: WidgetId, handler: Handler) -> SignalId {
        let id = self.next_signal();
        self.handlers.insert(id, (widget, handler));
        id
    }

    fn disconnect(&mut self, signal: SignalId) {
        if self.handlers.remove(&signal).is_none() && self.ticks.remove(&signal).is_none() {
            log::debug!("disconnect: signal {signal:?} already gone");
        }
    }

    fn critical(&mut self, message: String) {
        log::warn!("toolkit critical: {message}");
        self.criticals.push(message);
    }

    fn callbacks(&self, widget: WidgetId, kind: SignalKind) -> Vec<SignalCallback> {
        self.handlers
            .values()
            .filter_map(|(owner, handler)| match handler {
                Handler::Signal(k, cb) if *owner == widget && *k == kind => Some(Arc::clone(cb)),
                _ => None,
            })
            .collect()
    }

    fn pointer_callbacks(&self, widget: WidgetId) -> Vec<PointerCallback> {
        self.handlers
            .values()
            .filter_map(|(owner, handler)| match handler {
                Handler::Pointer(cb) if *owner == widget => Some(Arc::clone(cb)),
                _ => None,
            })
            .collect()
    }

    fn emit(&mut self, widget: WidgetId, kind: SignalKind) {
        let callbacks = self.callbacks(widget, kind);
        self.pending.extend(callbacks);
    }

    /// Whether `ancestor` is `widget` or one of its ancestors.
    fn contains(&self, ancestor: WidgetId, widget: WidgetId) -> bool {
        let mut cursor = Some(widget);
        while let Some(id) = cursor {
            if id == ancestor {
                return true;
            }
            cursor = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    /// Give `child` a parent. Refuses (and records a critical) if it already has one.
    fn attach(&mut self, parent: WidgetId, child: WidgetId, op: &str) -> bool {
        let existing = match self.nodes.get(&child) {
            Some(node) => node.parent,
            None => {
                self.critical(format!("{op}: unknown widget {child}"));
                return false;
            }
        };
        if let Some(existing) = existing {
            self.critical(format!("{op}: {child} already has parent {existing}"));
            return false;
        }
        if self.contains(child, parent) {
            self.critical(format!("{op}: attaching {child} under {parent} would create a cycle"));
            return false;
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        true
    }

    /// Clear the parent link after the child was removed from its slot.
    fn detach(&mut self, child: WidgetId) {
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = None;
        }
        if self.focused.is_some_and(|focused| self.contains(child, focused)) {
            self.focused = None;
        }
        self.sync_mapped(child);
    }

    fn remove_from_parent(&mut self, child: WidgetId) -> bool {
        let Some(parent) = self.nodes.get(&child).and_then(|n| n.parent) else {
            return false;
        };
        if let Some(node) = self.nodes.get_mut(&parent) {
            for slot in [Slot::Start, Slot::End, Slot::Child] {
                if node.slot(slot) == Some(child) {
                    *node.slot_mut(slot) = None;
                }
            }
            node.children.retain(|c| *c != child);
            node.overlays.retain(|(c, _)| *c != child);
        }
        self.detach(child);
        true
    }

    fn set_slot(&mut self, parent: WidgetId, slot: Slot, child: Option<WidgetId>, op: &str) {
        let current = self.nodes.get(&parent).and_then(|n| n.slot(slot));
        if current == child {
            return;
        }
        if let Some(old) = current {
            if let Some(node) = self.nodes.get_mut(&parent) {
                *node.slot_mut(slot) = None;
            }
            self.detach(old);
        }
        if let Some(new) = child {
            if self.attach(parent, new, op) {
                if let Some(node) = self.nodes.get_mut(&parent) {
                    *node.slot_mut(slot) = Some(new);
                }
                self.sync_mapped(new);
            }
        }
    }

    /// Recompute mapped state for a subtree, queueing map signals on transitions.
    fn sync_mapped(&mut self, id: WidgetId) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let parent_mapped = node
            .parent
            .and_then(|p| self.nodes.get(&p))
            .is_some_and(|p| p.mapped);
        let should = node.visible && (node.root_mapped || parent_mapped);
        let was = node.mapped;
        let children = node.child_ids();
        if let Some(node) = self.nodes.get_mut(&id) {
            node.mapped = should;
        }
        if should && !was {
            self.emit(id, SignalKind::Map);
        }
        for child in children {
            self.sync_mapped(child);
        }
    }

    fn set_position(&mut self, id: WidgetId, position: i32) {
        let position = position.max(0);
        let changed = match self.nodes.get_mut(&id) {
            Some(node) if node.position != position => {
                node.position = position;
                true
            }
            _ => false,
        };
        if changed {
            self.emit(id, SignalKind::NotifyPosition);
        }
    }

    fn describe_into(&self, id: WidgetId, depth: usize, out: &mut String) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let _ = write!(out, "{:indent$}{} {id}", "", node.kind, indent = depth * 2);
        match node.kind {
            Kind::Paned(_) => {
                let _ = write!(out, " position={}", node.position);
            }
            Kind::Label => {
                let _ = write!(out, " {:?}", node.text);
            }
            Kind::Image | Kind::Button => {
                if let Some(icon) = &node.icon {
                    let _ = write!(out, " icon={icon}");
                }
            }
            _ => {}
        }
        for class in &node.css {
            let _ = write!(out, " .{class}");
        }
        if !node.visible {
            out.push_str(" hidden");
        }
        if self.focused == Some(id) {
            out.push_str(" focused");
        }
        out.push('\n');
        for child in node.child_ids() {
            self.describe_into(child, depth + 1, out);
        }
    }
}

fn lock(arena: &Mutex<Arena>) -> MutexGuard<'_, Arena> {
    arena.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run `f` against the arena, then fire whatever signals it queued
/// with the lock released so handlers may call back into the toolkit.
fn mutate<R>(arena: &Mutex<Arena>, f: impl FnOnce(&mut Arena) -> R) -> R {
    let (result, pending) = {
        let mut guard = lock(arena);
        let result = f(&mut guard);
        (result, std::mem::take(&mut guard.pending))
    };
    for callback in pending {
        callback();
    }
    result
}

/// A handle to one arena node. The node's kind decides which capability
/// the factory hands out for it.
pub struct HeadlessWidget {
    arena: Arc<Mutex<Arena>>,
    id: WidgetId,
}

impl fmt::Debug for HeadlessWidget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessWidget").field("id", &self.id).finish()
    }
}

impl HeadlessWidget {
    fn get<R: Default>(&self, f: impl FnOnce(&Node) -> R) -> R {
        lock(&self.arena).nodes.get(&self.id).map(f).unwrap_or_default()
    }

    fn with_node(&self, f: impl FnOnce(&mut Node)) {
        if let Some(node) = lock(&self.arena).nodes.get_mut(&self.id) {
            f(node);
        }
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut Arena, WidgetId) -> R) -> R {
        let id = self.id;
        mutate(&self.arena, |arena| f(arena, id))
    }

    fn disconnect_signal(&self, signal: SignalId) {
        lock(&self.arena).disconnect(signal);
    }

    fn connect(&self, handler: Handler) -> SignalId {
        lock(&self.arena).connect(self.id, handler)
    }

    /// Remove `child` from one of the multi-child lists, or record a critical.
    fn remove_listed(&self, child: WidgetId, op: &str) {
        self.mutate(|arena, id| {
            let listed = arena.nodes.get(&id).is_some_and(|n| {
                n.children.contains(&child) || n.overlays.iter().any(|(c, _)| *c == child)
            });
            if !listed {
                arena.critical(format!("{op}: {child} is not a child of {id}"));
                return;
            }
            arena.remove_from_parent(child);
        });
    }

    fn set_overlay_flag(&self, overlay: &WidgetRef, op: &str, apply: impl FnOnce(&mut OverlayFlags)) {
        let child = overlay.id();
        let id = self.id;
        let mut guard = lock(&self.arena);
        let found = match guard
            .nodes
            .get_mut(&id)
            .and_then(|n| n.overlays.iter_mut().find(|(c, _)| *c == child))
        {
            Some((_, flags)) => {
                apply(flags);
                true
            }
            None => false,
        };
        if !found {
            guard.critical(format!("{op}: {child} is not an overlay of {id}"));
        }
    }
}

impl Widget for HeadlessWidget {
    fn id(&self) -> WidgetId {
        self.id
    }

    fn set_visible(&self, visible: bool) {
        self.mutate(|arena, id| {
            if let Some(node) = arena.nodes.get_mut(&id) {
                node.visible = visible;
            }
            if !visible && arena.focused.is_some_and(|f| arena.contains(id, f)) {
                arena.focused = None;
            }
            arena.sync_mapped(id);
        });
    }

    fn is_visible(&self) -> bool {
        self.get(|n| n.visible)
    }

    fn is_mapped(&self) -> bool {
        self.get(|n| n.mapped)
    }

    fn grab_focus(&self) -> bool {
        let mut arena = lock(&self.arena);
        let focusable = arena.nodes.get(&self.id).is_some_and(|n| n.visible);
        if focusable {
            arena.focused = Some(self.id);
        }
        focusable
    }

    fn has_focus(&self) -> bool {
        lock(&self.arena).focused == Some(self.id)
    }

    fn set_can_target(&self, can_target: bool) {
        self.with_node(|n| n.can_target = can_target);
    }

    fn set_hexpand(&self, expand: bool) {
        self.with_node(|n| n.hexpand = expand);
    }

    fn set_vexpand(&self, expand: bool) {
        self.with_node(|n| n.vexpand = expand);
    }

    fn allocated_width(&self) -> i32 {
        self.get(|n| n.width)
    }

    fn allocated_height(&self) -> i32 {
        self.get(|n| n.height)
    }

    fn add_css_class(&self, class: &str) {
        self.with_node(|n| {
            n.css.insert(class.to_string());
        });
    }

    fn remove_css_class(&self, class: &str) {
        self.with_node(|n| {
            n.css.remove(class);
        });
    }

    fn has_css_class(&self, class: &str) -> bool {
        self.get(|n| n.css.contains(class))
    }

    fn parent(&self) -> Option<WidgetId> {
        self.get(|n| n.parent)
    }

    fn unparent(&self) {
        self.mutate(|arena, id| {
            arena.remove_from_parent(id);
        });
    }
}

impl PanedWidget for HeadlessWidget {
    fn set_start_child(&self, child: Option<&WidgetRef>) {
        let child = child.map(|c| c.id());
        self.mutate(|arena, id| arena.set_slot(id, Slot::Start, child, "set_start_child"));
    }

    fn set_end_child(&self, child: Option<&WidgetRef>) {
        let child = child.map(|c| c.id());
        self.mutate(|arena, id| arena.set_slot(id, Slot::End, child, "set_end_child"));
    }

    fn start_child(&self) -> Option<WidgetId> {
        self.get(|n| n.start)
    }

    fn end_child(&self) -> Option<WidgetId> {
        self.get(|n| n.end)
    }

    fn set_position(&self, position: i32) {
        self.mutate(|arena, id| arena.set_position(id, position));
    }

    fn position(&self) -> i32 {
        self.get(|n| n.position)
    }

    fn set_resize_start_child(&self, resize: bool) {
        self.with_node(|n| n.resize_start = resize);
    }

    fn set_resize_end_child(&self, resize: bool) {
        self.with_node(|n| n.resize_end = resize);
    }

    fn set_wide_handle(&self, wide: bool) {
        self.with_node(|n| n.wide_handle = wide);
    }

    fn connect_map(&self, callback: SignalCallback) -> SignalId {
        self.connect(Handler::Signal(SignalKind::Map, callback))
    }

    fn connect_notify_position(&self, callback: SignalCallback) -> SignalId {
        self.connect(Handler::Signal(SignalKind::NotifyPosition, callback))
    }

    fn add_tick_callback(&self, callback: TickCallback) -> SignalId {
        let mut arena = lock(&self.arena);
        let id = arena.next_signal();
        arena.ticks.insert(id, Some(callback));
        id
    }

    fn disconnect(&self, signal: SignalId) {
        self.disconnect_signal(signal);
    }
}

impl BoxWidget for HeadlessWidget {
    fn append(&self, child: &WidgetRef) {
        let child = child.id();
        self.mutate(|arena, id| {
            if arena.attach(id, child, "append") {
                if let Some(node) = arena.nodes.get_mut(&id) {
                    node.children.push(child);
                }
                arena.sync_mapped(child);
            }
        });
    }

    fn prepend(&self, child: &WidgetRef) {
        let child = child.id();
        self.mutate(|arena, id| {
            if arena.attach(id, child, "prepend") {
                if let Some(node) = arena.nodes.get_mut(&id) {
                    node.children.insert(0, child);
                }
                arena.sync_mapped(child);
            }
        });
    }

    fn remove(&self, child: &WidgetRef) {
        self.remove_listed(child.id(), "remove");
    }

    fn insert_child_after(&self, child: &WidgetRef, sibling: &WidgetRef) {
        let (child, sibling) = (child.id(), sibling.id());
        self.mutate(|arena, id| {
            let index = arena
                .nodes
                .get(&id)
                .and_then(|n| n.children.iter().position(|c| *c == sibling));
            let Some(index) = index else {
                arena.critical(format!("insert_child_after: {sibling} is not a child of {id}"));
                return;
            };
            if arena.attach(id, child, "insert_child_after") {
                if let Some(node) = arena.nodes.get_mut(&id) {
                    node.children.insert(index + 1, child);
                }
                arena.sync_mapped(child);
            }
        });
    }

    fn children(&self) -> Vec<WidgetId> {
        self.get(|n| n.children.clone())
    }

    fn connect_pressed(&self, callback: SignalCallback) -> SignalId {
        self.connect(Handler::Signal(SignalKind::Pressed, callback))
    }

    fn disconnect(&self, signal: SignalId) {
        self.disconnect_signal(signal);
    }
}

impl OverlayWidget for HeadlessWidget {
    fn set_child(&self, child: Option<&WidgetRef>) {
        let child = child.map(|c| c.id());
        self.mutate(|arena, id| arena.set_slot(id, Slot::Child, child, "set_child"));
    }

    fn child(&self) -> Option<WidgetId> {
        self.get(|n| n.child)
    }

    fn add_overlay(&self, overlay: &WidgetRef) {
        let child = overlay.id();
        self.mutate(|arena, id| {
            if arena.attach(id, child, "add_overlay") {
                if let Some(node) = arena.nodes.get_mut(&id) {
                    node.overlays.push((child, OverlayFlags::default()));
                }
                arena.sync_mapped(child);
            }
        });
    }

    fn remove_overlay(&self, overlay: &WidgetRef) {
        self.remove_listed(overlay.id(), "remove_overlay");
    }

    fn overlays(&self) -> Vec<WidgetId> {
        self.get(|n| n.overlays.iter().map(|(id, _)| *id).collect())
    }

    fn set_clip_overlay(&self, overlay: &WidgetRef, clip: bool) {
        self.set_overlay_flag(overlay, "set_clip_overlay", |flags| flags.clip = clip);
    }

    fn set_measure_overlay(&self, overlay: &WidgetRef, measure: bool) {
        self.set_overlay_flag(overlay, "set_measure_overlay", |flags| flags.measure = measure);
    }

    fn connect_pointer(&self, callback: PointerCallback) -> SignalId {
        self.connect(Handler::Pointer(callback))
    }

    fn disconnect(&self, signal: SignalId) {
        self.disconnect_signal(signal);
    }
}

impl LabelWidget for HeadlessWidget {
    fn set_text(&self, text: &str) {
        self.with_node(|n| n.text = text.to_string());
    }

    fn text(&self) -> String {
        self.get(|n| n.text.clone())
    }

    fn set_ellipsize_end(&self, ellipsize: bool) {
        self.with_node(|n| n.ellipsize_end = ellipsize);
    }

    fn set_max_width_chars(&self, chars: u32) {
        self.with_node(|n| n.max_width_chars = Some(chars));
    }

    fn set_xalign(&self, xalign: f32) {
        self.with_node(|n| n.xalign = xalign);
    }
}

impl ImageWidget for HeadlessWidget {
    fn set_from_icon_name(&self, name: &str) {
        self.with_node(|n| n.icon = Some(name.to_string()));
    }

    fn icon_name(&self) -> Option<String> {
        self.get(|n| n.icon.clone())
    }

    fn set_pixel_size(&self, size: i32) {
        self.with_node(|n| n.pixel_size = size);
    }
}

impl ButtonWidget for HeadlessWidget {
    fn set_icon_name(&self, name: &str) {
        self.with_node(|n| n.icon = Some(name.to_string()));
    }

    fn set_focus_on_click(&self, focus: bool) {
        self.with_node(|n| n.focus_on_click = focus);
    }

    fn connect_clicked(&self, callback: SignalCallback) -> SignalId {
        self.connect(Handler::Signal(SignalKind::Clicked, callback))
    }

    fn disconnect(&self, signal: SignalId) {
        self.disconnect_signal(signal);
    }
}

impl SpinnerWidget for HeadlessWidget {
    fn start(&self) {
        self.with_node(|n| n.spinning = true);
    }

    fn stop(&self) {
        self.with_node(|n| n.spinning = false);
    }

    fn is_spinning(&self) -> bool {
        self.get(|n| n.spinning)
    }
}

/// Widget factory plus the driver hooks a real toolkit's event loop would
/// otherwise provide. Clones share one arena.
#[derive(Clone, Default)]
pub struct HeadlessToolkit {
    arena: Arc<Mutex<Arena>>,
}

impl fmt::Debug for HeadlessToolkit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arena = lock(&self.arena);
        f.debug_struct("HeadlessToolkit")
            .field("widgets", &arena.nodes.len())
            .field("criticals", &arena.criticals.len())
            .finish()
    }
}

impl HeadlessToolkit {
    pub fn new() -> Self {
        Self::default()
    }

    fn create(&self, kind: Kind) -> Arc<HeadlessWidget> {
        let id = lock(&self.arena).insert(kind);
        Arc::new(HeadlessWidget {
            arena: Arc::clone(&self.arena),
            id,
        })
    }

    fn decoration(&self, kind: Kind) -> Option<Arc<HeadlessWidget>> {
        if lock(&self.arena).fail_decorations {
            log::debug!("refusing to construct {kind}");
            return None;
        }
        Some(self.create(kind))
    }

    fn fire(&self, widget: WidgetId, kind: SignalKind) -> usize {
        let callbacks = lock(&self.arena).callbacks(widget, kind);
        for callback in &callbacks {
            callback();
        }
        callbacks.len()
    }

    // ── Driver hooks ──────────────────────────────────────────────────

    /// Simulate a layout pass giving `widget` a size.
    pub fn allocate<W: Widget + ?Sized>(&self, widget: &W, width: i32, height: i32) {
        if let Some(node) = lock(&self.arena).nodes.get_mut(&widget.id()) {
            node.width = width.max(0);
            node.height = height.max(0);
        }
    }

    /// Map `widget` as a top-level (window content). Emits map signals down
    /// the visible subtree.
    pub fn map<W: Widget + ?Sized>(&self, widget: &W) {
        let id = widget.id();
        mutate(&self.arena, |arena| {
            if let Some(node) = arena.nodes.get_mut(&id) {
                node.root_mapped = true;
            }
            arena.sync_mapped(id);
        });
    }

    pub fn unmap<W: Widget + ?Sized>(&self, widget: &W) {
        let id = widget.id();
        mutate(&self.arena, |arena| {
            if let Some(node) = arena.nodes.get_mut(&id) {
                node.root_mapped = false;
            }
            arena.sync_mapped(id);
        });
    }

    /// Run one frame: every registered tick callback once. Returns how many ran.
    pub fn tick(&self) -> usize {
        let ids: Vec<SignalId> = lock(&self.arena).ticks.keys().copied().collect();
        let mut ran = 0;
        for id in ids {
            let callback = lock(&self.arena).ticks.get_mut(&id).and_then(Option::take);
            let Some(mut callback) = callback else {
                continue;
            };
            ran += 1;
            let flow = callback();
            let finished = {
                let mut arena = lock(&self.arena);
                match arena.ticks.get_mut(&id) {
                    Some(slot) if flow.is_continue() => {
                        *slot = Some(callback);
                        None
                    }
                    Some(_) => {
                        arena.ticks.remove(&id);
                        Some(callback)
                    }
                    // Disconnected while running.
                    None => Some(callback),
                }
            };
            drop(finished);
        }
        ran
    }

    pub fn tick_callbacks(&self) -> usize {
        lock(&self.arena).ticks.len()
    }

    /// Simulate the user dragging a divider to `position`.
    pub fn drag_divider<W: Widget + ?Sized>(&self, paned: &W, position: i32) {
        let id = paned.id();
        mutate(&self.arena, |arena| arena.set_position(id, position));
    }

    /// Primary-button press on a box. Returns the number of handlers run.
    pub fn press<W: Widget + ?Sized>(&self, widget: &W) -> usize {
        self.fire(widget.id(), SignalKind::Pressed)
    }

    pub fn click<W: Widget + ?Sized>(&self, widget: &W) -> usize {
        self.fire(widget.id(), SignalKind::Clicked)
    }

    pub fn pointer_enter<W: Widget + ?Sized>(&self, widget: &W) {
        self.pointer(widget.id(), PointerEvent::Enter);
    }

    pub fn pointer_leave<W: Widget + ?Sized>(&self, widget: &W) {
        self.pointer(widget.id(), PointerEvent::Leave);
    }

    fn pointer(&self, widget: WidgetId, event: PointerEvent) {
        let callbacks = lock(&self.arena).pointer_callbacks(widget);
        for callback in callbacks {
            callback(event);
        }
    }

    /// Rule violations the engine committed against the toolkit.
    pub fn criticals(&self) -> Vec<String> {
        lock(&self.arena).criticals.clone()
    }

    /// Make decoration constructors (label, image, button, spinner) fail.
    pub fn fail_decorations(&self, fail: bool) {
        lock(&self.arena).fail_decorations = fail;
    }

    pub fn focused(&self) -> Option<WidgetId> {
        lock(&self.arena).focused
    }

    /// Whether `ancestor` is `widget` or contains it.
    pub fn contains<A: Widget + ?Sized, W: Widget + ?Sized>(&self, ancestor: &A, widget: &W) -> bool {
        lock(&self.arena).contains(ancestor.id(), widget.id())
    }

    pub fn overlay_flags<A: Widget + ?Sized, W: Widget + ?Sized>(
        &self,
        overlay: &A,
        child: &W,
    ) -> Option<OverlayFlags> {
        let arena = lock(&self.arena);
        let child = child.id();
        arena
            .nodes
            .get(&overlay.id())
            .and_then(|n| n.overlays.iter().find(|(c, _)| *c == child))
            .map(|(_, flags)| *flags)
    }

    pub fn signal_count(&self) -> usize {
        lock(&self.arena).handlers.len()
    }

    pub fn widget_count(&self) -> usize {
        lock(&self.arena).nodes.len()
    }

    /// Indented dump of the subtree rooted at `widget`.
    pub fn describe<W: Widget + ?Sized>(&self, widget: &W) -> String {
        let mut out = String::new();
        lock(&self.arena).describe_into(widget.id(), 0, &mut out);
        out
    }
}

impl WidgetFactory for HeadlessToolkit {
    fn new_paned(&self, orientation: Orientation) -> Arc<dyn PanedWidget> {
        self.create(Kind::Paned(orientation))
    }

    fn new_box(&self, orientation: Orientation, _spacing: i32) -> Arc<dyn BoxWidget> {
        self.create(Kind::Box(orientation))
    }

    fn new_overlay(&self) -> Arc<dyn OverlayWidget> {
        self.create(Kind::Overlay)
    }

    fn new_label(&self, text: &str) -> Option<Arc<dyn LabelWidget>> {
        let label = self.decoration(Kind::Label)?;
        label.set_text(text);
        Some(label as Arc<dyn LabelWidget>)
    }

    fn new_image(&self) -> Option<Arc<dyn ImageWidget>> {
        self.decoration(Kind::Image).map(|w| w as Arc<dyn ImageWidget>)
    }

    fn new_button(&self) -> Option<Arc<dyn ButtonWidget>> {
        self.decoration(Kind::Button).map(|w| w as Arc<dyn ButtonWidget>)
    }

    fn new_spinner(&self) -> Option<Arc<dyn SpinnerWidget>> {
        self.decoration(Kind::Spinner).map(|w| w as Arc<dyn SpinnerWidget>)
    }
}
