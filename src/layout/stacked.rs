// Tab-like container: a column of title rows with exactly one pane's content shown.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use super::widgets::{
    BoxWidget, ButtonWidget, ImageWidget, LabelWidget, Orientation, SignalId, WidgetFactory,
    WidgetRef,
};
use super::{LayoutContext, LayoutError};
use crate::config::StackConfig;
use crate::pane::PaneId;

const DEFAULT_FAVICON: &str = "web-browser-symbolic";
const CLOSE_ICON: &str = "window-close-symbolic";
const FAVICON_SIZE: i32 = 16;

/// Fired with the current index when a title row is pressed.
pub type ActivateCallback = Arc<dyn Fn(usize) + Send + Sync>;
/// Fired when a title row's close button is clicked.
pub type ClosePaneCallback = Arc<dyn Fn(&PaneId) + Send + Sync>;

struct TitleBar {
    row: Arc<dyn BoxWidget>,
    favicon: Option<Arc<dyn ImageWidget>>,
    label: Option<Arc<dyn LabelWidget>>,
    close_button: Option<Arc<dyn ButtonWidget>>,
    press_signal: Option<SignalId>,
    close_signal: Option<SignalId>,
}

struct StackedPane {
    pane_id: PaneId,
    title: String,
    title_bar: TitleBar,
    container: Option<WidgetRef>,
}

#[derive(Default)]
struct StackState {
    panes: Vec<StackedPane>,
    active: Option<usize>,
    on_activate: Option<ActivateCallback>,
    on_close_pane: Option<ClosePaneCallback>,
}

impl StackState {
    fn find(&self, pane_id: &PaneId) -> Option<usize> {
        self.panes.iter().position(|p| &p.pane_id == pane_id)
    }

    fn check_index(&self, index: usize) -> Result<(), LayoutError> {
        if index >= self.panes.len() {
            return Err(LayoutError::IndexOutOfBounds {
                index,
                len: self.panes.len(),
            });
        }
        Ok(())
    }

    /// Active title row hidden, its content shown; the rest the other way round.
    fn update_visibility(&mut self) {
        for (i, pane) in self.panes.iter().enumerate() {
            let is_active = self.active == Some(i);
            let row = &pane.title_bar.row;
            row.set_visible(!is_active);
            if is_active {
                row.add_css_class("active");
            } else {
                row.remove_css_class("active");
            }
            if let Some(container) = &pane.container {
                container.set_visible(is_active);
            }
        }
    }

    fn set_active(&mut self, index: usize) {
        self.active = Some(index);
        self.update_visibility();
    }
}

pub struct StackedView {
    factory: Arc<dyn WidgetFactory>,
    settings: StackConfig,
    column: Arc<dyn BoxWidget>,
    state: RwLock<StackState>,
    this: Weak<StackedView>,
}

impl StackedView {
    pub fn new(ctx: &LayoutContext) -> Arc<Self> {
        let column = ctx.factory.new_box(Orientation::Vertical, 0);
        column.set_hexpand(true);
        column.set_vexpand(true);
        Arc::new_cyclic(|this| StackedView {
            factory: Arc::clone(&ctx.factory),
            settings: ctx.settings.stack.clone(),
            column,
            state: RwLock::new(StackState::default()),
            this: this.clone(),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, StackState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StackState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn widget(&self) -> WidgetRef {
        self.column.clone()
    }

    pub fn box_widget(&self) -> &Arc<dyn BoxWidget> {
        &self.column
    }

    fn create_title_bar(&self, pane_id: &PaneId, title: &str, favicon: Option<&str>) -> TitleBar {
        let row = self.factory.new_box(Orientation::Horizontal, 4);
        row.add_css_class("stacked-pane-titlebar");
        row.add_css_class("stacked-pane-title-clickable");
        row.set_vexpand(false);
        row.set_hexpand(true);

        let image = self.factory.new_image();
        if let Some(image) = &image {
            image.set_from_icon_name(favicon.unwrap_or(DEFAULT_FAVICON));
            image.set_pixel_size(FAVICON_SIZE);
            let image: WidgetRef = image.clone();
            row.append(&image);
        }

        let label = self.factory.new_label(title);
        if let Some(label) = &label {
            label.set_ellipsize_end(true);
            label.set_max_width_chars(self.settings.title_max_width_chars);
            label.set_hexpand(true);
            label.set_xalign(0.0);
            let label: WidgetRef = label.clone();
            row.append(&label);
        }

        let close_button = self.factory.new_button();
        let mut close_signal = None;
        if let Some(button) = &close_button {
            button.set_icon_name(CLOSE_ICON);
            button.add_css_class("stacked-pane-close-button");
            button.set_focus_on_click(false);
            button.set_hexpand(false);
            button.set_vexpand(false);

            let weak = self.this.clone();
            let id = pane_id.clone();
            close_signal = Some(button.connect_clicked(Arc::new(move || {
                let Some(view) = weak.upgrade() else { return };
                let callback = view.read().on_close_pane.clone();
                if let Some(callback) = callback {
                    callback(&id);
                }
            })));
            let button: WidgetRef = button.clone();
            row.append(&button);
        }

        // Resolve the index at press time; earlier removals shift it.
        let weak = self.this.clone();
        let id = pane_id.clone();
        let press_signal = row.connect_pressed(Arc::new(move || {
            let Some(view) = weak.upgrade() else { return };
            let (callback, index) = {
                let state = view.read();
                (state.on_activate.clone(), state.find(&id))
            };
            if let (Some(callback), Some(index)) = (callback, index) {
                callback(index);
            }
        }));

        TitleBar {
            row,
            favicon: image,
            label,
            close_button,
            press_signal: Some(press_signal),
            close_signal,
        }
    }

    /// Append a pane and make it active. Returns its index.
    pub fn add_pane(
        &self,
        pane_id: PaneId,
        title: &str,
        favicon: Option<&str>,
        container: Option<WidgetRef>,
    ) -> usize {
        let title_bar = self.create_title_bar(&pane_id, title, favicon);
        let mut state = self.write();
        let row: WidgetRef = title_bar.row.clone();
        self.column.append(&row);
        if let Some(container) = &container {
            self.column.append(container);
        }

        let index = state.panes.len();
        log::debug!("stack: add pane {pane_id} at {index}");
        state.panes.push(StackedPane {
            pane_id,
            title: title.to_string(),
            title_bar,
            container,
        });
        state.set_active(index);
        index
    }

    /// Insert a pane after `after` (`None` prepends; out-of-range values
    /// append) and make it active. Returns its index.
    pub fn insert_pane_after(
        &self,
        after: Option<usize>,
        pane_id: PaneId,
        title: &str,
        favicon: Option<&str>,
        container: Option<WidgetRef>,
    ) -> usize {
        let title_bar = self.create_title_bar(&pane_id, title, favicon);
        let mut state = self.write();
        let len = state.panes.len();
        let index = match after {
            None => 0,
            Some(after) => after.min(len.saturating_sub(1)) + usize::from(len > 0),
        };

        let row: WidgetRef = title_bar.row.clone();
        match index.checked_sub(1).and_then(|prev| state.panes.get(prev)) {
            Some(prev) => {
                let anchor: WidgetRef = match &prev.container {
                    Some(container) => Arc::clone(container),
                    None => {
                        let row: WidgetRef = prev.title_bar.row.clone();
                        row
                    }
                };
                self.column.insert_child_after(&row, &anchor);
                if let Some(container) = &container {
                    self.column.insert_child_after(container, &row);
                }
            }
            None => {
                if let Some(container) = &container {
                    self.column.prepend(container);
                }
                self.column.prepend(&row);
            }
        }

        log::debug!("stack: insert pane {pane_id} at {index} (after {after:?}, count {len})");
        state.panes.insert(
            index,
            StackedPane {
                pane_id,
                title: title.to_string(),
                title_bar,
                container,
            },
        );
        state.set_active(index);
        index
    }

    /// Remove the pane at `index`. The last pane can never be removed.
    pub fn remove_pane(&self, index: usize) -> Result<(), LayoutError> {
        let mut state = self.write();
        if state.panes.is_empty() {
            return Err(LayoutError::StackEmpty);
        }
        state.check_index(index)?;
        if state.panes.len() == 1 {
            return Err(LayoutError::CannotRemoveLastPane);
        }

        let pane = state.panes.remove(index);
        let bar = &pane.title_bar;
        if let Some(signal) = bar.press_signal {
            bar.row.disconnect(signal);
        }
        if let (Some(button), Some(signal)) = (&bar.close_button, bar.close_signal) {
            button.disconnect(signal);
        }
        let row: WidgetRef = bar.row.clone();
        self.column.remove(&row);
        if let Some(container) = &pane.container {
            self.column.remove(container);
        }

        // Adjust active index
        let len = state.panes.len();
        state.active = match state.active {
            Some(active) if active >= len => Some(len - 1),
            Some(active) if active > index => Some(active - 1),
            other => other,
        };
        state.update_visibility();
        log::debug!("stack: removed pane {} at {index}, active {:?}", pane.pane_id, state.active);
        Ok(())
    }

    pub fn set_active(&self, index: usize) -> Result<(), LayoutError> {
        let mut state = self.write();
        if state.panes.is_empty() {
            return Err(LayoutError::StackEmpty);
        }
        state.check_index(index)?;
        state.set_active(index);
        Ok(())
    }

    /// Index of the visible pane, `None` only when the stack is empty.
    pub fn active_index(&self) -> Option<usize> {
        self.read().active
    }

    pub fn count(&self) -> usize {
        self.read().panes.len()
    }

    pub fn find_pane_index(&self, pane_id: &PaneId) -> Option<usize> {
        self.read().find(pane_id)
    }

    pub fn pane_id_at(&self, index: usize) -> Option<PaneId> {
        self.read().panes.get(index).map(|p| p.pane_id.clone())
    }

    pub fn title_at(&self, index: usize) -> Option<String> {
        self.read().panes.get(index).map(|p| p.title.clone())
    }

    pub fn set_on_activate(&self, callback: Option<ActivateCallback>) {
        self.write().on_activate = callback;
    }

    pub fn set_on_close_pane(&self, callback: Option<ClosePaneCallback>) {
        self.write().on_close_pane = callback;
    }

    pub fn update_title(&self, index: usize, title: &str) -> Result<(), LayoutError> {
        let mut state = self.write();
        state.check_index(index)?;
        let pane = &mut state.panes[index];
        pane.title = title.to_string();
        if let Some(label) = &pane.title_bar.label {
            label.set_text(title);
        }
        Ok(())
    }

    /// Set the title row icon; `None` restores the generic one.
    pub fn update_favicon(&self, index: usize, icon: Option<&str>) -> Result<(), LayoutError> {
        let state = self.read();
        state.check_index(index)?;
        if let Some(favicon) = &state.panes[index].title_bar.favicon {
            favicon.set_from_icon_name(icon.unwrap_or(DEFAULT_FAVICON));
        }
        Ok(())
    }

    /// The content widget of the pane at `index`.
    pub fn container(&self, index: usize) -> Result<Option<WidgetRef>, LayoutError> {
        let state = self.read();
        state.check_index(index)?;
        Ok(state.panes[index].container.clone())
    }

    /// The title row of the pane at `index`.
    pub fn title_row(&self, index: usize) -> Result<Arc<dyn BoxWidget>, LayoutError> {
        let state = self.read();
        state.check_index(index)?;
        Ok(Arc::clone(&state.panes[index].title_bar.row))
    }

    pub fn close_button(&self, index: usize) -> Result<Option<Arc<dyn ButtonWidget>>, LayoutError> {
        let state = self.read();
        state.check_index(index)?;
        Ok(state.panes[index].title_bar.close_button.clone())
    }

    /// Move to the next pane, wrapping around.
    pub fn navigate_next(&self) -> Result<(), LayoutError> {
        self.navigate(1)
    }

    /// Move to the previous pane, wrapping around.
    pub fn navigate_previous(&self) -> Result<(), LayoutError> {
        self.navigate(-1)
    }

    fn navigate(&self, step: isize) -> Result<(), LayoutError> {
        let mut state = self.write();
        let len = state.panes.len();
        if len == 0 {
            return Err(LayoutError::StackEmpty);
        }
        let current = state.active.unwrap_or(0);
        let next = (current as isize + step).rem_euclid(len as isize) as usize;
        log::debug!("stack: navigate {current} -> {next}");
        state.set_active(next);
        Ok(())
    }
}

impl Drop for StackedView {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for pane in &state.panes {
            let bar = &pane.title_bar;
            if let Some(signal) = bar.press_signal {
                bar.row.disconnect(signal);
            }
            if let (Some(button), Some(signal)) = (&bar.close_button, bar.close_signal) {
                button.disconnect(signal);
            }
        }
    }
}

impl std::fmt::Debug for StackedView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("StackedView")
            .field("column", &self.column.id())
            .field("count", &state.panes.len())
            .field("active", &state.active)
            .finish()
    }
}
