//! Terminal reader for the article feed.
//!
//! # Module Structure
//!
//! - `loop_runner` - Main event loop and terminal management
//! - `input` - Keyboard input handling
//! - `events` - Background task event processing
//! - `render` - Layout dispatch
//! - `helpers` - Task spawning and text wrapping
//! - `articles` - Loaded article list widget
//! - `reader` - Continuous article reader widget
//! - `status` - Status bar widget

mod articles;
mod events;
mod helpers;
mod input;
mod loop_runner;
mod reader;
mod render;
mod status;

pub use loop_runner::{run, Action};
