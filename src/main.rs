use std::sync::{Arc, Weak};
use std::time::Duration;

use anyhow::Context;

use paneweave::component::{ContentFactory, FindController, Suggestion, SuggestionSource, WorkspaceView};
use paneweave::config::{Config, ConfigWatcher};
use paneweave::layout::{LayoutContext, LayoutSettings, WidgetFactory, WidgetRef};
use paneweave::pane::{Pane, PaneId, SplitDirection, Workspace};
use paneweave::runtime::MainLoop;
use paneweave::search::TextFindController;
use paneweave::toolkit::HeadlessToolkit;

/// How long to wait for a suggestion worker to report back.
const WORKER_WAIT: Duration = Duration::from_secs(2);

fn main() {
    // Handle --print-default-config before any other initialization
    if std::env::args().any(|a| a == "--print-default-config") {
        print!("{}", Config::print_default());
        return;
    }

    env_logger::init();
    log::info!("paneweave v{} starting", env!("CARGO_PKG_VERSION"));

    let config_path = dirs_config_path();
    let config = match Config::load(&config_path) {
        Ok(cfg) => {
            log::info!("Config loaded from {}", config_path.display());
            cfg
        }
        Err(e) => {
            log::warn!("Config load error ({}), using defaults", e);
            Config::default()
        }
    };
    log::info!(
        "Hover delay: {}ms, keyboard suppression: {}ms, focus follows mouse: {}",
        config.focus.hover_focus_delay_ms,
        config.focus.keyboard_suppress_ms,
        config.focus.focus_follows_mouse
    );

    let watch = std::env::args().any(|a| a == "--watch");
    if let Err(e) = run(config, &config_path, watch) {
        log::error!("Application error: {e:#}");
        std::process::exit(1);
    }
}

/// Drive a scripted session against the headless toolkit and print the
/// resulting widget tree.
fn run(config: Config, config_path: &std::path::Path, watch: bool) -> anyhow::Result<()> {
    let tk = HeadlessToolkit::new();
    let main_loop = MainLoop::new();
    let handle = main_loop.handle();
    let ctx = LayoutContext::new(Arc::new(tk.clone()), Arc::new(handle.clone())).with_settings(
        LayoutSettings {
            split: config.split.clone(),
            stack: config.stack.clone(),
        },
    );

    let content = Arc::new(DemoContent { tk: tk.clone() });
    let view = WorkspaceView::new(ctx, handle.clock(), content);
    view.apply_settings(&config);
    view.set_suggestion_source(Some(Arc::new(History::default())));
    view.set_on_navigate(Some(Arc::new(|pane: &PaneId, url: &str| {
        log::info!("pane {pane} navigates to {url}");
    })));
    view.set_on_split_ratio_dragged(Some(Arc::new(|node: &str, ratio: f64| {
        log::info!("split {node} dragged to {ratio:.2}");
    })));

    let workspace = Workspace::new(
        "main",
        Pane::new("home", "https://example.org").with_title("Home"),
    )
    .into_shared();
    view.set_workspace(Arc::clone(&workspace))
        .context("rendering initial workspace")?;

    // Split, then group a second page with the new pane.
    {
        let mut ws = workspace.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        ws.split_active(
            SplitDirection::Horizontal,
            Pane::new("docs", "https://docs.rs").with_title("Docs.rs"),
        )
        .context("splitting the home pane")?;
        ws.stack_on_active(Pane::new("crates", "https://crates.io").with_title("crates.io"))
            .context("stacking onto the docs pane")?;
    }
    view.rebuild().context("rebuilding after split")?;

    let root = view.root_widget().context("workspace rendered no root")?;
    tk.allocate(root.as_ref(), 1200, 800);
    tk.tick();

    // Drag the outer divider, then rest the pointer on the home pane.
    tk.drag_divider(root.as_ref(), 400);
    let home = view
        .pane_view(&PaneId::from("home"))
        .context("home pane was not rendered")?;
    tk.pointer_enter(home.overlay().as_ref());
    main_loop.run_for(config.focus.hover_focus_delay() + Duration::from_millis(50));
    log::info!("after hover: active pane {:?}", view.active_pane_id());

    view.activate_pane_from_keyboard(&PaneId::from("crates"))
        .context("keyboard focus")?;

    view.show_omnibox("rust").context("opening omnibox")?;
    if !main_loop.run_next_posted(WORKER_WAIT) {
        log::warn!("suggestion worker did not report back");
    }
    if let Some(omnibox) = view.omnibox() {
        log::info!("omnibox: {} suggestions", omnibox.suggestions().len());
        omnibox.select_next();
        omnibox.navigate_to_selected();
    }

    view.show_find_bar().context("opening find bar")?;
    if let Some(find_bar) = view.find_bar() {
        let status = find_bar.set_query("example");
        log::info!("find: {} of {}", status.current, status.total);
    }
    main_loop.run_until_idle();

    println!("{}", tk.describe(view.widget().as_ref()));

    if watch {
        let weak: Weak<WorkspaceView> = Arc::downgrade(&view);
        let _watcher = ConfigWatcher::on_loop(
            config_path,
            config,
            Arc::new(handle),
            move |config: Config, delta| {
                let Some(view) = weak.upgrade() else { return };
                log::info!("config reloaded: {delta:?}");
                view.apply_settings(&config);
            },
        )
        .with_context(|| format!("watching {}", config_path.display()))?;
        log::info!("watching {} for 60s", config_path.display());
        main_loop.run_for(Duration::from_secs(60));
    }
    Ok(())
}

/// Labels standing in for page content.
struct DemoContent {
    tk: HeadlessToolkit,
}

impl ContentFactory for DemoContent {
    fn create_content(&self, pane: &Pane) -> Option<WidgetRef> {
        let label = self.tk.new_label(&pane.uri)?;
        let widget: WidgetRef = label;
        Some(widget)
    }

    fn find_controller(&self, pane_id: &PaneId) -> Option<Arc<dyn FindController>> {
        Some(Arc::new(TextFindController::new([
            format!("{pane_id}: example page"),
            "This domain is for use in illustrative examples.".to_string(),
        ])))
    }
}

/// Fixed browsing history for the omnibox.
struct History(Vec<Suggestion>);

impl Default for History {
    fn default() -> Self {
        Self(vec![
            Suggestion::new("https://www.rust-lang.org", "Rust Programming Language"),
            Suggestion::new("https://docs.rs", "Docs.rs"),
            Suggestion::new("https://crates.io", "crates.io: Rust Package Registry"),
        ])
    }
}

impl SuggestionSource for History {
    fn search(&self, query: &str, limit: usize) -> Vec<Suggestion> {
        let query = query.to_lowercase();
        self.0
            .iter()
            .filter(|s| {
                s.title.to_lowercase().contains(&query) || s.url.to_lowercase().contains(&query)
            })
            .take(limit)
            .cloned()
            .collect()
    }
}

/// Get the config file path (~/.config/paneweave/config.toml).
fn dirs_config_path() -> std::path::PathBuf {
    let mut path = dirs_home().join(".config").join("paneweave");
    std::fs::create_dir_all(&path).ok();
    path.push("config.toml");
    path
}

/// Get the user's home directory.
fn dirs_home() -> std::path::PathBuf {
    std::env::var("HOME")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("."))
}
