use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

const VALID_INITIAL_BEHAVIORS: &[&str] = &["recent", "none"];
const MAX_OMNIBOX_RESULTS: usize = 50;
const SEARCH_PLACEHOLDER: &str = "%s";

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Config {
    pub focus: FocusConfig,
    pub split: SplitConfig,
    pub stack: StackConfig,
    pub omnibox: OmniboxConfig,
    pub find: FindConfig,
}

/// Hover/keyboard focus arbitration.
#[derive(Debug, Clone, PartialEq)]
pub struct FocusConfig {
    /// Debounce before a hovered pane becomes active.
    pub hover_focus_delay_ms: u64,
    /// How long hover focus stays blocked after keyboard focus.
    pub keyboard_suppress_ms: u64,
    pub focus_follows_mouse: bool,
}

/// Divider containers.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitConfig {
    /// Frames to keep retrying the ratio before giving up on an allocation.
    pub max_retry_frames: u32,
    pub drag_notify_debounce_ms: u64,
    pub wide_handle: bool,
}

/// Stacked tab groups.
#[derive(Debug, Clone, PartialEq)]
pub struct StackConfig {
    pub title_max_width_chars: u32,
}

/// Address/search overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct OmniboxConfig {
    pub max_results: usize,
    pub debounce_ms: u64,
    /// Search URL template, `%s` is replaced by the query.
    pub default_search: String,
    /// What an empty query shows: "recent" history or "none".
    pub initial_behavior: String,
    /// `prefix:query` shortcuts, e.g. `g` → a search URL template.
    pub shortcuts: BTreeMap<String, String>,
}

/// Find-in-page defaults.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FindConfig {
    pub case_sensitive: bool,
    pub whole_word: bool,
}

/// Which config sections changed between two loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfigDelta {
    pub focus_changed: bool,
    pub split_changed: bool,
    pub stack_changed: bool,
    pub omnibox_changed: bool,
    pub find_changed: bool,
}

impl ConfigDelta {
    pub fn is_empty(&self) -> bool {
        !(self.focus_changed
            || self.split_changed
            || self.stack_changed
            || self.omnibox_changed
            || self.find_changed)
    }
}

/// Errors that can occur during config loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("validation error: {0}")]
    Validation(String),
}

// ── Serde intermediate structs ──────────────────────────────────────────

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawConfig {
    focus: RawFocusConfig,
    split: RawSplitConfig,
    stack: RawStackConfig,
    omnibox: RawOmniboxConfig,
    find: RawFindConfig,
}

#[derive(Deserialize)]
#[serde(default)]
struct RawFocusConfig {
    hover_focus_delay_ms: u64,
    keyboard_suppress_ms: u64,
    focus_follows_mouse: bool,
}

impl Default for RawFocusConfig {
    fn default() -> Self {
        let d = FocusConfig::default();
        Self {
            hover_focus_delay_ms: d.hover_focus_delay_ms,
            keyboard_suppress_ms: d.keyboard_suppress_ms,
            focus_follows_mouse: d.focus_follows_mouse,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct RawSplitConfig {
    max_retry_frames: u32,
    drag_notify_debounce_ms: u64,
    wide_handle: bool,
}

impl Default for RawSplitConfig {
    fn default() -> Self {
        let d = SplitConfig::default();
        Self {
            max_retry_frames: d.max_retry_frames,
            drag_notify_debounce_ms: d.drag_notify_debounce_ms,
            wide_handle: d.wide_handle,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct RawStackConfig {
    title_max_width_chars: u32,
}

impl Default for RawStackConfig {
    fn default() -> Self {
        Self {
            title_max_width_chars: StackConfig::default().title_max_width_chars,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct RawOmniboxConfig {
    max_results: usize,
    debounce_ms: u64,
    default_search: String,
    initial_behavior: String,
    shortcuts: BTreeMap<String, String>,
}

impl Default for RawOmniboxConfig {
    fn default() -> Self {
        let d = OmniboxConfig::default();
        Self {
            max_results: d.max_results,
            debounce_ms: d.debounce_ms,
            default_search: d.default_search,
            initial_behavior: d.initial_behavior,
            shortcuts: d.shortcuts,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawFindConfig {
    case_sensitive: bool,
    whole_word: bool,
}

// ── Default impls ───────────────────────────────────────────────────────

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            hover_focus_delay_ms: 150,
            keyboard_suppress_ms: 300,
            focus_follows_mouse: true,
        }
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            max_retry_frames: 120,
            drag_notify_debounce_ms: 100,
            wide_handle: false,
        }
    }
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            title_max_width_chars: 30,
        }
    }
}

impl Default for OmniboxConfig {
    fn default() -> Self {
        Self {
            max_results: 10,
            debounce_ms: 150,
            default_search: "https://duckduckgo.com/?q=%s".to_string(),
            initial_behavior: "recent".to_string(),
            shortcuts: BTreeMap::new(),
        }
    }
}

impl FocusConfig {
    pub fn hover_focus_delay(&self) -> Duration {
        Duration::from_millis(self.hover_focus_delay_ms)
    }

    pub fn keyboard_suppress(&self) -> Duration {
        Duration::from_millis(self.keyboard_suppress_ms)
    }
}

impl SplitConfig {
    pub fn drag_notify_debounce(&self) -> Duration {
        Duration::from_millis(self.drag_notify_debounce_ms)
    }
}

impl OmniboxConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

// ── Config implementation ───────────────────────────────────────────────

const DEFAULT_CONFIG_TOML: &str = r#"# paneweave configuration

[focus]
# Delay before hovering a pane makes it active (ms)
hover_focus_delay_ms = 150
# Hover focus is ignored for this long after keyboard focus (ms)
keyboard_suppress_ms = 300
focus_follows_mouse = true

[split]
# Frames to retry applying a divider ratio while the container has no size
max_retry_frames = 120
# Debounce for divider-drag notifications (ms)
drag_notify_debounce_ms = 100
wide_handle = false

[stack]
title_max_width_chars = 30

[omnibox]
max_results = 10
debounce_ms = 150
default_search = "https://duckduckgo.com/?q=%s"
# "recent" or "none"
initial_behavior = "recent"

[omnibox.shortcuts]
# g = "https://www.google.com/search?q=%s"

[find]
case_sensitive = false
whole_word = false
"#;

impl Config {
    /// Load config from a TOML file path. Returns defaults if file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    /// Parse a TOML string into a Config.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let config = Self {
            focus: FocusConfig {
                hover_focus_delay_ms: raw.focus.hover_focus_delay_ms,
                keyboard_suppress_ms: raw.focus.keyboard_suppress_ms,
                focus_follows_mouse: raw.focus.focus_follows_mouse,
            },
            split: SplitConfig {
                max_retry_frames: raw.split.max_retry_frames,
                drag_notify_debounce_ms: raw.split.drag_notify_debounce_ms,
                wide_handle: raw.split.wide_handle,
            },
            stack: StackConfig {
                title_max_width_chars: raw.stack.title_max_width_chars,
            },
            omnibox: OmniboxConfig {
                max_results: raw.omnibox.max_results,
                debounce_ms: raw.omnibox.debounce_ms,
                default_search: raw.omnibox.default_search,
                initial_behavior: raw.omnibox.initial_behavior,
                shortcuts: raw.omnibox.shortcuts,
            },
            find: FindConfig {
                case_sensitive: raw.find.case_sensitive,
                whole_word: raw.find.whole_word,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the config, returning an error if any values are out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.focus.hover_focus_delay_ms == 0 {
            return Err(ConfigError::Validation(
                "hover_focus_delay_ms must be > 0".to_string(),
            ));
        }
        if self.focus.keyboard_suppress_ms == 0 {
            return Err(ConfigError::Validation(
                "keyboard_suppress_ms must be > 0".to_string(),
            ));
        }

        if self.split.max_retry_frames == 0 {
            return Err(ConfigError::Validation(
                "max_retry_frames must be > 0".to_string(),
            ));
        }
        if self.split.drag_notify_debounce_ms == 0 {
            return Err(ConfigError::Validation(
                "drag_notify_debounce_ms must be > 0".to_string(),
            ));
        }

        if self.stack.title_max_width_chars == 0 {
            return Err(ConfigError::Validation(
                "title_max_width_chars must be > 0".to_string(),
            ));
        }

        if self.omnibox.max_results == 0 || self.omnibox.max_results > MAX_OMNIBOX_RESULTS {
            return Err(ConfigError::Validation(format!(
                "omnibox max_results must be between 1 and {MAX_OMNIBOX_RESULTS}"
            )));
        }
        if self.omnibox.debounce_ms == 0 {
            return Err(ConfigError::Validation(
                "omnibox debounce_ms must be > 0".to_string(),
            ));
        }
        if !self.omnibox.default_search.contains(SEARCH_PLACEHOLDER) {
            return Err(ConfigError::Validation(format!(
                "default_search must contain '{SEARCH_PLACEHOLDER}'"
            )));
        }
        if !VALID_INITIAL_BEHAVIORS.contains(&self.omnibox.initial_behavior.as_str()) {
            return Err(ConfigError::Validation(format!(
                "unknown initial_behavior '{}', valid values: {}",
                self.omnibox.initial_behavior,
                VALID_INITIAL_BEHAVIORS.join(", ")
            )));
        }
        for (prefix, url) in &self.omnibox.shortcuts {
            if prefix.is_empty() || prefix.contains(':') {
                return Err(ConfigError::Validation(format!(
                    "invalid shortcut prefix '{prefix}'"
                )));
            }
            if !url.contains(SEARCH_PLACEHOLDER) {
                return Err(ConfigError::Validation(format!(
                    "shortcut '{prefix}' must contain '{SEARCH_PLACEHOLDER}'"
                )));
            }
        }

        Ok(())
    }

    /// Compare against a newer config and report which sections differ.
    pub fn diff(&self, other: &Config) -> ConfigDelta {
        ConfigDelta {
            focus_changed: self.focus != other.focus,
            split_changed: self.split != other.split,
            stack_changed: self.stack != other.stack,
            omnibox_changed: self.omnibox != other.omnibox,
            find_changed: self.find != other.find,
        }
    }

    /// The commented default config file, as printed by `--print-default-config`.
    pub fn print_default() -> &'static str {
        DEFAULT_CONFIG_TOML
    }
}
