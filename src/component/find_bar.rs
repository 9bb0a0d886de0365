// Compact find-in-page overlay driving a pane's FindController.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use crate::config::FindConfig;
use crate::layout::{
    BoxWidget, ButtonWidget, LabelWidget, Orientation, SignalId, WidgetFactory, WidgetRef,
};
use crate::search::{FindController, FindOptions, FindStatus};

const ROW_SPACING: i32 = 6;

pub type CloseCallback = Arc<dyn Fn() + Send + Sync>;

/// Text for the match counter.
pub fn count_text(query: &str, status: FindStatus) -> String {
    if query.is_empty() {
        String::new()
    } else if status.total == 0 {
        "No results".to_string()
    } else {
        format!("{} of {}", status.current, status.total)
    }
}

#[derive(Default)]
struct FindState {
    visible: bool,
    query: String,
    options: FindOptions,
    status: FindStatus,
    controller: Option<Arc<dyn FindController>>,
    on_close: Option<CloseCallback>,
}

pub struct FindBar {
    outer: Arc<dyn BoxWidget>,
    query_label: Option<Arc<dyn LabelWidget>>,
    count_label: Option<Arc<dyn LabelWidget>>,
    prev_button: Option<Arc<dyn ButtonWidget>>,
    next_button: Option<Arc<dyn ButtonWidget>>,
    close_button: Option<Arc<dyn ButtonWidget>>,
    signals: Vec<(Arc<dyn ButtonWidget>, SignalId)>,
    state: RwLock<FindState>,
}

impl FindBar {
    pub fn new(factory: &dyn WidgetFactory, defaults: &FindConfig) -> Arc<Self> {
        let outer = factory.new_box(Orientation::Horizontal, ROW_SPACING);
        outer.add_css_class("find-bar-outer");
        outer.set_hexpand(false);
        outer.set_vexpand(false);
        outer.set_visible(false);

        let query_label = factory.new_label("");
        if let Some(label) = &query_label {
            label.add_css_class("find-bar-query");
            label.set_hexpand(true);
            label.set_xalign(0.0);
            let label: WidgetRef = label.clone();
            outer.append(&label);
        }

        let prev_button = button(factory, &outer, "go-up-symbolic", "find-bar-prev");
        let next_button = button(factory, &outer, "go-down-symbolic", "find-bar-next");

        let count_label = factory.new_label("");
        if let Some(label) = &count_label {
            label.add_css_class("find-bar-count");
            let label: WidgetRef = label.clone();
            outer.append(&label);
        }

        let close_button = button(factory, &outer, "window-close-symbolic", "find-bar-close");

        Arc::new_cyclic(|this: &Weak<FindBar>| {
            let mut signals = Vec::new();
            let wire = |button: &Option<Arc<dyn ButtonWidget>>,
                        action: fn(&FindBar),
                        signals: &mut Vec<(Arc<dyn ButtonWidget>, SignalId)>| {
                let Some(button) = button else { return };
                let weak = this.clone();
                let signal = button.connect_clicked(Arc::new(move || {
                    if let Some(bar) = weak.upgrade() {
                        action(&bar);
                    }
                }));
                signals.push((Arc::clone(button), signal));
            };
            wire(&prev_button, FindBar::find_previous, &mut signals);
            wire(&next_button, FindBar::find_next, &mut signals);
            wire(&close_button, FindBar::request_close, &mut signals);

            FindBar {
                outer,
                query_label,
                count_label,
                prev_button,
                next_button,
                close_button,
                signals,
                state: RwLock::new(FindState {
                    options: FindOptions {
                        case_sensitive: defaults.case_sensitive,
                        whole_word: defaults.whole_word,
                    },
                    ..FindState::default()
                }),
            }
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, FindState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, FindState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn widget(&self) -> WidgetRef {
        self.outer.clone()
    }

    pub fn set_controller(&self, controller: Option<Arc<dyn FindController>>) {
        self.write().controller = controller;
    }

    pub fn has_controller(&self) -> bool {
        self.read().controller.is_some()
    }

    pub fn set_on_close(&self, callback: Option<CloseCallback>) {
        self.write().on_close = callback;
    }

    pub fn show(&self) {
        self.write().visible = true;
        self.outer.set_visible(true);
        if let Some(label) = &self.query_label {
            label.grab_focus();
        }
    }

    /// Hide and clear the controller's highlights. The query is kept for the
    /// next `show`.
    pub fn hide(&self) {
        let controller = {
            let mut state = self.write();
            state.visible = false;
            state.status = FindStatus::default();
            state.controller.clone()
        };
        if let Some(controller) = controller {
            controller.finish();
        }
        self.outer.set_visible(false);
        self.refresh_count("");
    }

    pub fn is_visible(&self) -> bool {
        self.read().visible
    }

    pub fn query(&self) -> String {
        self.read().query.clone()
    }

    pub fn options(&self) -> FindOptions {
        self.read().options
    }

    pub fn status(&self) -> FindStatus {
        self.read().status
    }

    /// Run a fresh search for `query`.
    pub fn set_query(&self, query: &str) -> FindStatus {
        let (controller, options) = {
            let mut state = self.write();
            state.query = query.to_string();
            (state.controller.clone(), state.options)
        };
        if let Some(label) = &self.query_label {
            label.set_text(query);
        }
        let status = match controller {
            Some(controller) if !query.is_empty() => controller.search(query, options),
            Some(controller) => {
                controller.finish();
                FindStatus::default()
            }
            None => {
                log::debug!("find bar has no controller, ignoring query");
                FindStatus::default()
            }
        };
        self.record(status)
    }

    pub fn find_next(&self) {
        self.step(|c| c.next());
    }

    pub fn find_previous(&self) {
        self.step(|c| c.previous());
    }

    fn step(&self, f: impl FnOnce(&dyn FindController) -> FindStatus) {
        let controller = {
            let state = self.read();
            if state.query.is_empty() {
                return;
            }
            state.controller.clone()
        };
        if let Some(controller) = controller {
            self.record(f(controller.as_ref()));
        }
    }

    pub fn set_case_sensitive(&self, case_sensitive: bool) {
        self.set_options(|o| o.case_sensitive = case_sensitive);
    }

    pub fn set_whole_word(&self, whole_word: bool) {
        self.set_options(|o| o.whole_word = whole_word);
    }

    /// Change options and re-run the current query, if any.
    fn set_options(&self, f: impl FnOnce(&mut FindOptions)) {
        let query = {
            let mut state = self.write();
            f(&mut state.options);
            state.query.clone()
        };
        if !query.is_empty() {
            self.set_query(&query);
        }
    }

    /// User dismissed the bar.
    pub fn request_close(&self) {
        let callback = self.read().on_close.clone();
        match callback {
            Some(callback) => callback(),
            None => self.hide(),
        }
    }

    pub fn count_label_text(&self) -> Option<String> {
        self.count_label.as_ref().map(|l| l.text())
    }

    pub fn prev_button(&self) -> Option<&Arc<dyn ButtonWidget>> {
        self.prev_button.as_ref()
    }

    pub fn next_button(&self) -> Option<&Arc<dyn ButtonWidget>> {
        self.next_button.as_ref()
    }

    pub fn close_button(&self) -> Option<&Arc<dyn ButtonWidget>> {
        self.close_button.as_ref()
    }

    fn record(&self, status: FindStatus) -> FindStatus {
        let query = {
            let mut state = self.write();
            state.status = status;
            state.query.clone()
        };
        self.refresh_count(&query);
        status
    }

    fn refresh_count(&self, query: &str) {
        let status = self.read().status;
        if let Some(label) = &self.count_label {
            label.set_text(&count_text(query, status));
            if status.total > 0 {
                label.add_css_class("find-bar-count-has");
            } else {
                label.remove_css_class("find-bar-count-has");
            }
        }
        if !query.is_empty() && status.total == 0 {
            self.outer.add_css_class("not-found");
        } else {
            self.outer.remove_css_class("not-found");
        }
    }
}

fn button(
    factory: &dyn WidgetFactory,
    row: &Arc<dyn BoxWidget>,
    icon: &str,
    class: &str,
) -> Option<Arc<dyn ButtonWidget>> {
    let button = factory.new_button()?;
    button.set_icon_name(icon);
    button.add_css_class(class);
    button.set_focus_on_click(false);
    let widget: WidgetRef = button.clone();
    row.append(&widget);
    Some(button)
}

impl Drop for FindBar {
    fn drop(&mut self) {
        for (button, signal) in &self.signals {
            button.disconnect(*signal);
        }
    }
}

impl std::fmt::Debug for FindBar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("FindBar")
            .field("visible", &state.visible)
            .field("query", &state.query)
            .field("status", &state.status)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::TextFindController;
    use crate::toolkit::HeadlessToolkit;
    use rstest::rstest;
    use std::sync::Mutex;

    fn bar_over(text: &[&str]) -> (HeadlessToolkit, Arc<FindBar>, Arc<TextFindController>) {
        let tk = HeadlessToolkit::new();
        let bar = FindBar::new(&tk, &FindConfig::default());
        let controller = Arc::new(TextFindController::new(text.iter().copied()));
        bar.set_controller(Some(controller.clone()));
        (tk, bar, controller)
    }

    // ── Count label ───────────────────────────────────────────────

    #[rstest]
    #[case::empty_query("", 0, 0, "")]
    #[case::no_results("foo", 0, 0, "No results")]
    #[case::first_of_many("foo", 1, 3, "1 of 3")]
    fn count_text_formats(
        #[case] query: &str,
        #[case] current: usize,
        #[case] total: usize,
        #[case] expected: &str,
    ) {
        assert_eq!(count_text(query, FindStatus { current, total }), expected);
    }

    #[test]
    fn query_updates_count_label() {
        let (_tk, bar, _) = bar_over(&["foo bar foo"]);
        assert_eq!(bar.set_query("foo"), FindStatus { current: 1, total: 2 });
        assert_eq!(bar.count_label_text().as_deref(), Some("1 of 2"));
        bar.set_query("zzz");
        assert_eq!(bar.count_label_text().as_deref(), Some("No results"));
        assert!(bar.widget().has_css_class("not-found"));
        bar.set_query("");
        assert_eq!(bar.count_label_text().as_deref(), Some(""));
        assert!(!bar.widget().has_css_class("not-found"));
    }

    // ── Navigation ────────────────────────────────────────────────

    #[test]
    fn next_and_previous_move_the_cursor() {
        let (_tk, bar, _) = bar_over(&["a a a"]);
        bar.set_query("a");
        bar.find_next();
        assert_eq!(bar.status().current, 2);
        bar.find_previous();
        bar.find_previous();
        assert_eq!(bar.status().current, 3);
        assert_eq!(bar.count_label_text().as_deref(), Some("3 of 3"));
    }

    #[test]
    fn buttons_drive_navigation() {
        let (tk, bar, _) = bar_over(&["a a"]);
        bar.set_query("a");
        tk.click(bar.next_button().unwrap().as_ref());
        assert_eq!(bar.status().current, 2);
        tk.click(bar.prev_button().unwrap().as_ref());
        assert_eq!(bar.status().current, 1);
    }

    #[test]
    fn navigation_without_query_is_ignored() {
        let (_tk, bar, _) = bar_over(&["a a"]);
        bar.find_next();
        assert_eq!(bar.status(), FindStatus::default());
    }

    #[test]
    fn options_rerun_current_query() {
        let (_tk, bar, _) = bar_over(&["Foo foo"]);
        bar.set_query("foo");
        assert_eq!(bar.status().total, 2);
        bar.set_case_sensitive(true);
        assert_eq!(bar.status().total, 1);
        assert!(bar.options().case_sensitive);
        bar.set_whole_word(true);
        assert!(bar.options().whole_word);
    }

    #[test]
    fn defaults_come_from_config() {
        let tk = HeadlessToolkit::new();
        let cfg = FindConfig {
            case_sensitive: true,
            whole_word: true,
        };
        let bar = FindBar::new(&tk, &cfg);
        assert_eq!(
            bar.options(),
            FindOptions {
                case_sensitive: true,
                whole_word: true
            }
        );
    }

    // ── Visibility ────────────────────────────────────────────────

    #[test]
    fn show_and_hide_toggle_visibility_and_finish_search() {
        let (_tk, bar, controller) = bar_over(&["foo"]);
        assert!(!bar.widget().is_visible());
        bar.show();
        assert!(bar.is_visible());
        assert!(bar.widget().is_visible());
        bar.set_query("foo");

        bar.hide();
        assert!(!bar.is_visible());
        assert!(!bar.widget().is_visible());
        assert_eq!(controller.query(), "");
        assert_eq!(bar.query(), "foo");
    }

    #[test]
    fn close_button_fires_on_close() {
        let (tk, bar, _) = bar_over(&["foo"]);
        let closed = Arc::new(Mutex::new(false));
        let sink = closed.clone();
        bar.set_on_close(Some(Arc::new(move || *sink.lock().unwrap() = true)));
        bar.show();
        tk.click(bar.close_button().unwrap().as_ref());
        assert!(*closed.lock().unwrap());
    }

    #[test]
    fn close_without_callback_hides() {
        let (_tk, bar, _) = bar_over(&["foo"]);
        bar.show();
        bar.request_close();
        assert!(!bar.is_visible());
    }

    #[test]
    fn missing_decorations_still_search() {
        let tk = HeadlessToolkit::new();
        tk.fail_decorations(true);
        let bar = FindBar::new(&tk, &FindConfig::default());
        bar.set_controller(Some(Arc::new(TextFindController::new(["x x"]))));
        assert_eq!(bar.set_query("x").total, 2);
        assert!(bar.count_label_text().is_none());
        assert!(bar.close_button().is_none());
    }

    #[test]
    fn drop_disconnects_button_signals() {
        let (tk, bar, _) = bar_over(&["foo"]);
        assert_eq!(tk.signal_count(), 3);
        drop(bar);
        assert_eq!(tk.signal_count(), 0);
    }
}
