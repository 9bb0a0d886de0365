// Toolkit adapters implementing the layout widget capabilities.

pub mod headless;

pub use headless::{HeadlessToolkit, HeadlessWidget, OverlayFlags};
