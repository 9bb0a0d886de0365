// Toolkit-agnostic widget capabilities consumed by the layout engine.
//
// Every concrete toolkit adapter implements these traits; the engine only
// ever talks to `dyn` handles, so it never names a native widget type.

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

/// Identity of a widget inside its toolkit. Two handles are the same widget
/// iff their ids are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(pub u64);

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// Handle to a connected signal or tick callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalId(pub u64);

/// Axis along which a paned or box lays out its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Children side by side; the divider moves along the width.
    Horizontal,
    /// Children top/bottom; the divider moves along the height.
    Vertical,
}

/// Pointer crossing events delivered to overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Enter,
    Leave,
}

pub type WidgetRef = Arc<dyn Widget>;
pub type SignalCallback = Arc<dyn Fn() + Send + Sync>;
pub type PointerCallback = Arc<dyn Fn(PointerEvent) + Send + Sync>;
/// Per-frame callback. Returning `Break` unregisters it.
pub type TickCallback = Box<dyn FnMut() -> ControlFlow<()> + Send>;

/// Base capability shared by every widget.
pub trait Widget: Send + Sync + fmt::Debug {
    fn id(&self) -> WidgetId;

    fn set_visible(&self, visible: bool);
    fn is_visible(&self) -> bool;
    fn is_mapped(&self) -> bool;

    fn grab_focus(&self) -> bool;
    fn has_focus(&self) -> bool;
    /// Whether pointer events can land on this widget.
    fn set_can_target(&self, can_target: bool);

    fn set_hexpand(&self, expand: bool);
    fn set_vexpand(&self, expand: bool);

    /// Allocated size after layout, 0 before the first layout pass.
    fn allocated_width(&self) -> i32;
    fn allocated_height(&self) -> i32;

    fn add_css_class(&self, class: &str);
    fn remove_css_class(&self, class: &str);
    fn has_css_class(&self, class: &str) -> bool;

    fn parent(&self) -> Option<WidgetId>;
    /// Detach from whatever container currently holds this widget.
    fn unparent(&self);
}

/// Two-child container with a draggable divider.
pub trait PanedWidget: Widget {
    fn set_start_child(&self, child: Option<&WidgetRef>);
    fn set_end_child(&self, child: Option<&WidgetRef>);
    fn start_child(&self) -> Option<WidgetId>;
    fn end_child(&self) -> Option<WidgetId>;

    fn set_position(&self, position: i32);
    fn position(&self) -> i32;

    fn set_resize_start_child(&self, resize: bool);
    fn set_resize_end_child(&self, resize: bool);
    fn set_wide_handle(&self, wide: bool);

    /// Fired each time the widget transitions to mapped.
    fn connect_map(&self, callback: SignalCallback) -> SignalId;
    /// Fired whenever the divider position changes.
    fn connect_notify_position(&self, callback: SignalCallback) -> SignalId;
    fn add_tick_callback(&self, callback: TickCallback) -> SignalId;
    /// Disconnects a signal or removes a tick callback.
    fn disconnect(&self, signal: SignalId);
}

/// Linear container.
pub trait BoxWidget: Widget {
    fn append(&self, child: &WidgetRef);
    fn prepend(&self, child: &WidgetRef);
    fn remove(&self, child: &WidgetRef);
    fn insert_child_after(&self, child: &WidgetRef, sibling: &WidgetRef);
    fn children(&self) -> Vec<WidgetId>;

    /// Primary-button press anywhere on the box.
    fn connect_pressed(&self, callback: SignalCallback) -> SignalId;
    fn disconnect(&self, signal: SignalId);
}

/// Main child plus floating overlay children.
pub trait OverlayWidget: Widget {
    fn set_child(&self, child: Option<&WidgetRef>);
    fn child(&self) -> Option<WidgetId>;

    fn add_overlay(&self, overlay: &WidgetRef);
    fn remove_overlay(&self, overlay: &WidgetRef);
    fn overlays(&self) -> Vec<WidgetId>;
    fn set_clip_overlay(&self, overlay: &WidgetRef, clip: bool);
    fn set_measure_overlay(&self, overlay: &WidgetRef, measure: bool);

    fn connect_pointer(&self, callback: PointerCallback) -> SignalId;
    fn disconnect(&self, signal: SignalId);
}

pub trait LabelWidget: Widget {
    fn set_text(&self, text: &str);
    fn text(&self) -> String;
    fn set_ellipsize_end(&self, ellipsize: bool);
    fn set_max_width_chars(&self, chars: u32);
    fn set_xalign(&self, xalign: f32);
}

pub trait ImageWidget: Widget {
    fn set_from_icon_name(&self, name: &str);
    fn icon_name(&self) -> Option<String>;
    fn set_pixel_size(&self, size: i32);
}

pub trait ButtonWidget: Widget {
    fn set_icon_name(&self, name: &str);
    fn set_focus_on_click(&self, focus: bool);
    fn connect_clicked(&self, callback: SignalCallback) -> SignalId;
    fn disconnect(&self, signal: SignalId);
}

pub trait SpinnerWidget: Widget {
    fn start(&self);
    fn stop(&self);
    fn is_spinning(&self) -> bool;
}

/// Constructors for toolkit primitives.
///
/// Containers are structural and always succeed. Decorations (labels,
/// images, buttons, spinners) may fail; callers omit them and carry on.
pub trait WidgetFactory: Send + Sync {
    fn new_paned(&self, orientation: Orientation) -> Arc<dyn PanedWidget>;
    fn new_box(&self, orientation: Orientation, spacing: i32) -> Arc<dyn BoxWidget>;
    fn new_overlay(&self) -> Arc<dyn OverlayWidget>;

    fn new_label(&self, text: &str) -> Option<Arc<dyn LabelWidget>>;
    fn new_image(&self) -> Option<Arc<dyn ImageWidget>>;
    fn new_button(&self) -> Option<Arc<dyn ButtonWidget>>;
    fn new_spinner(&self) -> Option<Arc<dyn SpinnerWidget>>;
}

/// Whether two handles refer to the same widget.
pub fn same_widget(a: &dyn Widget, b: &dyn Widget) -> bool {
    a.id() == b.id()
}
