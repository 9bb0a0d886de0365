pub mod component;
pub mod config;
pub mod layout;
pub mod pane;
pub mod runtime;
pub mod search;
pub mod toolkit;
