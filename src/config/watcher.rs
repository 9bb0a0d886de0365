// Live config reload: watch the file's directory, re-validate, diff, notify.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use super::types::{Config, ConfigDelta};
use crate::runtime::UiScheduler;

/// Last accepted config for one file. Rejected edits never replace it.
struct Reloader {
    path: PathBuf,
    accepted: Mutex<Config>,
}

impl Reloader {
    /// Writes and atomic saves (rename into place) both surface as
    /// modify/create on the watched directory.
    fn concerns(&self, event: &notify::Event) -> bool {
        if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
            return false;
        }
        let name = self.path.file_name().map(Path::new).unwrap_or(&self.path);
        event.paths.is_empty() || event.paths.iter().any(|p| p.ends_with(name))
    }

    /// Re-read the file. Returns the new config and what changed, or `None`
    /// if it is unreadable, invalid or unchanged.
    fn reload(&self) -> Option<(Config, ConfigDelta)> {
        let candidate = match Config::load(&self.path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("config reload rejected, keeping previous: {e}");
                return None;
            }
        };
        let mut accepted = self.accepted.lock().unwrap_or_else(PoisonError::into_inner);
        let delta = accepted.diff(&candidate);
        if delta.is_empty() {
            log::debug!("{} touched without changes", self.path.display());
            return None;
        }
        *accepted = candidate.clone();
        log::info!("config reloaded from {}: {delta:?}", self.path.display());
        Some((candidate, delta))
    }

    fn accepted(&self) -> Config {
        self.accepted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Watches a config file and reports valid edits. Dropping it stops the
/// notify thread.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    reloader: Arc<Reloader>,
}

impl ConfigWatcher {
    /// `on_reload` runs on the notify thread with the new config and the
    /// sections that differ from `current_config` or the last accepted edit.
    pub fn new<F>(path: &Path, current_config: Config, on_reload: F) -> Result<Self, notify::Error>
    where
        F: Fn(Config, ConfigDelta) + Send + 'static,
    {
        let reloader = Arc::new(Reloader {
            path: path.to_path_buf(),
            accepted: Mutex::new(current_config),
        });

        let events = Arc::clone(&reloader);
        let mut watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                match res {
                    Ok(event) if events.concerns(&event) => {
                        if let Some((config, delta)) = events.reload() {
                            on_reload(config, delta);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => log::warn!("config watcher error: {e}"),
                }
            })?;

        let dir = path.parent().unwrap_or(path);
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        log::debug!("watching {} for config changes", dir.display());

        Ok(Self {
            _watcher: watcher,
            reloader,
        })
    }

    /// Like [`ConfigWatcher::new`], but `apply` is posted to the UI loop.
    pub fn on_loop<F>(
        path: &Path,
        current_config: Config,
        scheduler: Arc<dyn UiScheduler>,
        apply: F,
    ) -> Result<Self, notify::Error>
    where
        F: Fn(Config, ConfigDelta) + Send + Sync + 'static,
    {
        let apply = Arc::new(apply);
        Self::new(path, current_config, move |config, delta| {
            let apply = Arc::clone(&apply);
            scheduler.post(Box::new(move || apply(config, delta)));
        })
    }

    pub fn path(&self) -> &Path {
        &self.reloader.path
    }

    /// The config most recently accepted.
    pub fn current(&self) -> Config {
        self.reloader.accepted()
    }
}

impl std::fmt::Debug for ConfigWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigWatcher")
            .field("path", &self.reloader.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MainLoop;
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    fn seed(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[stack]\ntitle_max_width_chars = 30\n").unwrap();
        path
    }

    fn reloader(path: &Path) -> Reloader {
        Reloader {
            path: path.to_path_buf(),
            accepted: Mutex::new(Config::default()),
        }
    }

    fn event(kind: EventKind, path: &Path) -> notify::Event {
        notify::Event::new(kind).add_path(path.to_path_buf())
    }

    // ── Reloader ──────────────────────────────────────────────────────

    #[test]
    fn reload_reports_changed_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = seed(&dir);
        let r = reloader(&path);

        std::fs::write(&path, "[focus]\nhover_focus_delay_ms = 90\n").unwrap();
        let (config, delta) = r.reload().unwrap();
        assert_eq!(config.focus.hover_focus_delay_ms, 90);
        assert!(delta.focus_changed);
        assert!(!delta.omnibox_changed);
        assert_eq!(r.accepted().focus.hover_focus_delay_ms, 90);
    }

    #[test]
    fn unchanged_file_is_not_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = seed(&dir);
        let r = reloader(&path);
        assert!(r.reload().is_none());
    }

    #[test]
    fn invalid_edit_keeps_accepted_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = seed(&dir);
        let r = reloader(&path);

        std::fs::write(&path, "[omnibox]\nmax_results = 0\n").unwrap();
        assert!(r.reload().is_none());
        assert_eq!(r.accepted(), Config::default());

        std::fs::write(&path, "[focus\nbroken").unwrap();
        assert!(r.reload().is_none());
    }

    #[test]
    fn only_modify_and_create_for_the_file_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = seed(&dir);
        let r = reloader(&path);

        let modify = EventKind::Modify(notify::event::ModifyKind::Any);
        let create = EventKind::Create(notify::event::CreateKind::File);
        let remove = EventKind::Remove(notify::event::RemoveKind::File);
        assert!(r.concerns(&event(modify, &path)));
        assert!(r.concerns(&event(create, &path)));
        assert!(!r.concerns(&event(remove, &path)));
        assert!(!r.concerns(&event(modify, &dir.path().join("other.toml"))));
        assert!(r.concerns(&notify::Event::new(modify)));
    }

    // ── Watcher ───────────────────────────────────────────────────────

    #[test]
    fn watcher_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = seed(&dir);
        let watcher = ConfigWatcher::new(&path, Config::default(), |_, _| {}).unwrap();
        assert_eq!(watcher.path(), path.as_path());
        assert_eq!(watcher.current(), Config::default());
    }

    #[test]
    fn watcher_detects_file_modification() {
        let dir = tempfile::tempdir().unwrap();
        let path = seed(&dir);

        let (tx, rx) = mpsc::channel::<(Config, ConfigDelta)>();
        let watcher = ConfigWatcher::new(&path, Config::default(), move |cfg, delta| {
            let _ = tx.send((cfg, delta));
        })
        .unwrap();

        std::thread::sleep(Duration::from_millis(200));
        std::fs::write(&path, "[stack]\ntitle_max_width_chars = 42\n").unwrap();

        let (config, delta) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(config.stack.title_max_width_chars, 42);
        assert!(delta.stack_changed);
        assert!(!delta.focus_changed);
        assert_eq!(watcher.current().stack.title_max_width_chars, 42);
    }

    #[test]
    fn on_loop_delivers_reload_through_ui_loop() {
        let dir = tempfile::tempdir().unwrap();
        let path = seed(&dir);
        let main_loop = MainLoop::new();
        let received = Arc::new(Mutex::new(None));

        let sink = Arc::clone(&received);
        let _watcher = ConfigWatcher::on_loop(
            &path,
            Config::default(),
            Arc::new(main_loop.handle()),
            move |config, _delta| {
                *sink.lock().unwrap() = Some(config);
            },
        )
        .unwrap();

        std::thread::sleep(Duration::from_millis(200));
        std::fs::write(&path, "[focus]\nkeyboard_suppress_ms = 450\n").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while received.lock().unwrap().is_none() && Instant::now() < deadline {
            main_loop.run_for(Duration::from_millis(20));
        }
        let config = received.lock().unwrap().clone().expect("reload applied on loop");
        assert_eq!(config.focus.keyboard_suppress_ms, 450);
    }
}
