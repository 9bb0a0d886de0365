// Configuration: TOML file, validation, diffing and live reload.

pub mod types;
pub mod watcher;

pub use types::{
    Config, ConfigDelta, ConfigError, FindConfig, FocusConfig, OmniboxConfig, SplitConfig,
    StackConfig,
};
pub use watcher::ConfigWatcher;
