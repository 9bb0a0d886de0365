// Address/search overlay: query, history suggestions from a background
// source, keyboard selection and URL resolution.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use linkify::{LinkFinder, LinkKind};

use crate::config::OmniboxConfig;
use crate::layout::{
    BoxWidget, LabelWidget, Orientation, SignalId, WidgetFactory, WidgetRef,
};
use crate::runtime::{StateVersion, TimerSlot, UiScheduler};

const SELECTED_CLASS: &str = "selected";
const SHORTCUT_PREFIX_MAX: usize = 10;

/// A history entry offered for the current query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub url: String,
    pub title: String,
}

impl Suggestion {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
        }
    }
}

/// Backing store for suggestions. Called on a worker thread, never on the UI loop.
pub trait SuggestionSource: Send + Sync {
    /// Best matches for `query`. An empty query asks for recent entries.
    fn search(&self, query: &str, limit: usize) -> Vec<Suggestion>;
}

pub type NavigateCallback = Arc<dyn Fn(&str) + Send + Sync>;
pub type CloseCallback = Arc<dyn Fn() + Send + Sync>;

/// Whether `input` should be opened directly rather than searched for.
pub fn looks_like_url(input: &str) -> bool {
    let input = input.trim();
    if input.is_empty() || input.contains(char::is_whitespace) {
        return false;
    }
    if input.contains("://") || input.starts_with("about:") || input.starts_with("file:") {
        return true;
    }
    if input == "localhost" || input.starts_with("localhost:") || input.starts_with("localhost/") {
        return true;
    }
    let mut finder = LinkFinder::new();
    finder.url_must_have_scheme(false);
    finder.kinds(&[LinkKind::Url]);
    finder
        .links(input)
        .any(|link| link.start() == 0 && link.end() == input.len())
}

/// Add a scheme to a bare host.
pub fn normalize_url(input: &str) -> String {
    let input = input.trim();
    if input.contains("://") || input.starts_with("about:") || input.starts_with("file:") {
        input.to_string()
    } else {
        format!("https://{input}")
    }
}

/// Resolve typed text: `prefix:query` shortcuts, then URL-like input, then
/// the default search template.
pub fn build_url(input: &str, config: &OmniboxConfig) -> String {
    let input = input.trim();
    if input.is_empty() {
        return String::new();
    }
    if let Some((prefix, rest)) = input.split_once(':') {
        if !prefix.is_empty() && prefix.len() < SHORTCUT_PREFIX_MAX {
            if let Some(template) = config.shortcuts.get(prefix) {
                return template.replacen("%s", rest.trim(), 1);
            }
        }
    }
    if looks_like_url(input) {
        return normalize_url(input);
    }
    config.default_search.replacen("%s", input, 1)
}

struct ResultRow {
    row: Arc<dyn BoxWidget>,
    signal: SignalId,
}

#[derive(Default)]
struct OmniboxState {
    visible: bool,
    query: String,
    suggestions: Vec<Suggestion>,
    selected: Option<usize>,
    /// Set once the user moves the selection with the keyboard; typing resets it.
    has_navigated: bool,
    last_query: Option<String>,
    rows: Vec<ResultRow>,
    on_navigate: Option<NavigateCallback>,
    on_close: Option<CloseCallback>,
}

pub struct Omnibox {
    factory: Arc<dyn WidgetFactory>,
    scheduler: Arc<dyn UiScheduler>,
    source: Option<Arc<dyn SuggestionSource>>,
    config: RwLock<OmniboxConfig>,
    outer: Arc<dyn BoxWidget>,
    entry: Option<Arc<dyn LabelWidget>>,
    results: Arc<dyn BoxWidget>,
    debounce: TimerSlot,
    /// Bumped on every visibility change and search; batches carry the value
    /// they were started with.
    version: StateVersion,
    state: RwLock<OmniboxState>,
    this: Weak<Omnibox>,
}

impl Omnibox {
    pub fn new(
        factory: Arc<dyn WidgetFactory>,
        scheduler: Arc<dyn UiScheduler>,
        source: Option<Arc<dyn SuggestionSource>>,
        config: OmniboxConfig,
    ) -> Arc<Self> {
        let outer = factory.new_box(Orientation::Vertical, 0);
        outer.add_css_class("omnibox-outer");
        outer.set_hexpand(false);
        outer.set_vexpand(false);
        outer.set_visible(false);

        let entry = factory.new_label("");
        if let Some(entry) = &entry {
            entry.add_css_class("omnibox-entry");
            entry.set_xalign(0.0);
            let entry: WidgetRef = entry.clone();
            outer.append(&entry);
        }

        let results = factory.new_box(Orientation::Vertical, 0);
        results.add_css_class("omnibox-results");
        let results_widget: WidgetRef = results.clone();
        outer.append(&results_widget);

        log::debug!("omnibox created");
        Arc::new_cyclic(|this| Omnibox {
            factory,
            scheduler,
            source,
            config: RwLock::new(config),
            outer,
            entry,
            results,
            debounce: TimerSlot::new(),
            version: StateVersion::new(),
            state: RwLock::new(OmniboxState::default()),
            this: this.clone(),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, OmniboxState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, OmniboxState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn config(&self) -> OmniboxConfig {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn widget(&self) -> WidgetRef {
        self.outer.clone()
    }

    pub fn apply_config(&self, config: OmniboxConfig) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    pub fn set_on_navigate(&self, callback: Option<NavigateCallback>) {
        self.write().on_navigate = callback;
    }

    pub fn set_on_close(&self, callback: Option<CloseCallback>) {
        self.write().on_close = callback;
    }

    pub fn is_visible(&self) -> bool {
        self.read().visible
    }

    pub fn query(&self) -> String {
        self.read().query.clone()
    }

    pub fn suggestions(&self) -> Vec<Suggestion> {
        self.read().suggestions.clone()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.read().selected
    }

    pub fn has_navigated(&self) -> bool {
        self.read().has_navigated
    }

    pub fn row_count(&self) -> usize {
        self.read().rows.len()
    }

    /// Result row widget at `index`, for hosts that style or test rows.
    pub fn row(&self, index: usize) -> Option<Arc<dyn BoxWidget>> {
        self.read().rows.get(index).map(|r| Arc::clone(&r.row))
    }

    /// Show with `query` and search right away. Showing again while visible
    /// replaces the query.
    pub fn show(&self, query: &str) {
        log::debug!("omnibox: show {query:?}");
        let expect_content = !query.is_empty() || self.config().initial_behavior != "none";
        {
            let mut state = self.write();
            if !state.visible {
                state.visible = true;
                self.version.bump();
            }
            state.query = query.to_string();
            state.has_navigated = false;
            state.last_query = None;
        }
        self.debounce.cancel(self.scheduler.as_ref());
        if let Some(entry) = &self.entry {
            entry.set_text(query);
            entry.grab_focus();
        }
        self.results.set_visible(expect_content);
        self.outer.set_visible(true);
        self.perform_search();
    }

    /// Hide and clear everything. In-flight results are discarded.
    pub fn hide(&self) {
        let rows = {
            let mut state = self.write();
            if !state.visible {
                return;
            }
            state.visible = false;
            state.query.clear();
            state.suggestions.clear();
            state.selected = None;
            state.has_navigated = false;
            state.last_query = None;
            std::mem::take(&mut state.rows)
        };
        self.version.bump();
        self.debounce.cancel(self.scheduler.as_ref());
        self.clear_rows(rows);
        if let Some(entry) = &self.entry {
            entry.set_text("");
        }
        self.outer.set_visible(false);
        log::debug!("omnibox: hidden");
    }

    /// User dismissed the omnibox.
    pub fn request_close(&self) {
        self.hide();
        let callback = self.read().on_close.clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    /// Typed text changed; search after the debounce delay.
    pub fn set_query(&self, query: &str) {
        {
            let mut state = self.write();
            state.query = query.to_string();
            state.has_navigated = false;
        }
        if let Some(entry) = &self.entry {
            entry.set_text(query);
        }
        let weak = self.this.clone();
        self.debounce.schedule(
            self.scheduler.as_ref(),
            self.config().debounce(),
            Box::new(move || {
                if let Some(omnibox) = weak.upgrade() {
                    omnibox.perform_search();
                }
            }),
        );
    }

    fn perform_search(&self) {
        let config = self.config();
        let query = {
            let mut state = self.write();
            if !state.visible {
                return;
            }
            if !state.query.is_empty() && state.last_query.as_deref() == Some(state.query.as_str()) {
                log::debug!("omnibox: skipping duplicate query {:?}", state.query);
                return;
            }
            state.last_query = Some(state.query.clone());
            state.query.clone()
        };

        let token = self.version.bump();
        if query.is_empty() && config.initial_behavior == "none" {
            self.apply_results(token, Vec::new());
            return;
        }
        let Some(source) = self.source.clone() else {
            log::debug!("omnibox: no suggestion source");
            return;
        };

        let scheduler = Arc::clone(&self.scheduler);
        let weak = self.this.clone();
        let limit = config.max_results;
        let spawned = std::thread::Builder::new()
            .name("omnibox-search".into())
            .spawn(move || {
                let suggestions = source.search(&query, limit);
                scheduler.post(Box::new(move || {
                    if let Some(omnibox) = weak.upgrade() {
                        omnibox.apply_results(token, suggestions);
                    }
                }));
            });
        if let Err(e) = spawned {
            log::error!("omnibox: failed to spawn search worker: {e}");
        }
    }

    /// Install a batch of results on the UI loop unless a newer search or a
    /// visibility change has superseded it.
    fn apply_results(&self, token: u64, mut suggestions: Vec<Suggestion>) {
        if !self.version.is_current(token) {
            log::debug!("omnibox: dropping stale results (token {token})");
            return;
        }
        suggestions.truncate(self.config().max_results);
        let old_rows = {
            let mut state = self.write();
            if !state.visible {
                return;
            }
            state.selected = if suggestions.is_empty() { None } else { Some(0) };
            state.suggestions = suggestions;
            std::mem::take(&mut state.rows)
        };
        self.clear_rows(old_rows);

        let suggestions = self.suggestions();
        let rows: Vec<ResultRow> = suggestions
            .iter()
            .enumerate()
            .map(|(i, s)| self.create_row(i, s))
            .collect();
        self.results.set_visible(!rows.is_empty());
        log::debug!("omnibox: showing {} suggestions", rows.len());
        self.write().rows = rows;
        self.refresh_selection();
    }

    fn create_row(&self, index: usize, suggestion: &Suggestion) -> ResultRow {
        let row = self.factory.new_box(Orientation::Vertical, 2);
        row.add_css_class("omnibox-row");
        let title = if suggestion.title.is_empty() {
            suggestion.url.as_str()
        } else {
            suggestion.title.as_str()
        };
        if let Some(label) = self.factory.new_label(title) {
            label.add_css_class("omnibox-row-title");
            label.set_ellipsize_end(true);
            let label: WidgetRef = label;
            row.append(&label);
        }
        if let Some(label) = self.factory.new_label(&suggestion.url) {
            label.add_css_class("omnibox-row-url");
            label.set_ellipsize_end(true);
            let label: WidgetRef = label;
            row.append(&label);
        }

        let weak = self.this.clone();
        let signal = row.connect_pressed(Arc::new(move || {
            if let Some(omnibox) = weak.upgrade() {
                omnibox.select_and_navigate(index);
            }
        }));
        let widget: WidgetRef = row.clone();
        self.results.append(&widget);
        ResultRow { row, signal }
    }

    fn clear_rows(&self, rows: Vec<ResultRow>) {
        for ResultRow { row, signal } in rows {
            row.disconnect(signal);
            let widget: WidgetRef = row;
            self.results.remove(&widget);
        }
    }

    fn refresh_selection(&self) {
        let state = self.read();
        for (i, row) in state.rows.iter().enumerate() {
            if state.selected == Some(i) {
                row.row.add_css_class(SELECTED_CLASS);
            } else {
                row.row.remove_css_class(SELECTED_CLASS);
            }
        }
    }

    pub fn select_index(&self, index: usize) {
        {
            let mut state = self.write();
            if index >= state.suggestions.len() {
                return;
            }
            state.selected = Some(index);
        }
        self.refresh_selection();
    }

    pub fn select_next(&self) {
        self.step_selection(1);
    }

    pub fn select_previous(&self) {
        self.step_selection(-1);
    }

    fn step_selection(&self, step: isize) {
        {
            let mut state = self.write();
            state.has_navigated = true;
            let len = state.suggestions.len();
            if len == 0 {
                return;
            }
            let next = match state.selected {
                Some(current) => (current as isize + step).rem_euclid(len as isize) as usize,
                None if step > 0 => 0,
                None => len - 1,
            };
            state.selected = Some(next);
        }
        self.refresh_selection();
    }

    pub fn select_and_navigate(&self, index: usize) {
        self.select_index(index);
        self.navigate_to_selected();
    }

    /// Resolve the URL to open and hand it to `on_navigate`. URL-like typed
    /// input wins over the selection; with neither, the typed text is searched.
    pub fn navigate_to_selected(&self) {
        let config = self.config();
        let (url, callback) = {
            let state = self.read();
            let url = if looks_like_url(&state.query) {
                build_url(&state.query, &config)
            } else if let Some(s) = state.selected.and_then(|i| state.suggestions.get(i)) {
                s.url.clone()
            } else {
                build_url(&state.query, &config)
            };
            (url, state.on_navigate.clone())
        };
        if url.is_empty() {
            return;
        }
        log::info!("omnibox: navigating to {url}");
        self.hide();
        if let Some(callback) = callback {
            callback(&url);
        }
    }
}

impl Drop for Omnibox {
    fn drop(&mut self) {
        self.debounce.cancel(self.scheduler.as_ref());
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for row in &state.rows {
            row.row.disconnect(row.signal);
        }
    }
}

impl std::fmt::Debug for Omnibox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("Omnibox")
            .field("visible", &state.visible)
            .field("query", &state.query)
            .field("suggestions", &state.suggestions.len())
            .field("selected", &state.selected)
            .finish()
    }
}
