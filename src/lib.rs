//! Infinite article feed for the GSTV news content API.
//!
//! The crate is split into layers:
//!
//! - [`api`] - request/response types and the HTTP client for the content API
//! - [`feed`] - the infinite-scroll feed controller, its state and route helpers
//! - [`metadata`] - page metadata (title, canonical link, social tags) and the sink seam
//! - [`config`] - optional TOML configuration
//! - [`util`] - text and URL helpers shared by the reader UI
//!
//! The `gstv` binary wraps these in a terminal reader.

pub mod api;
pub mod config;
pub mod feed;
pub mod metadata;
pub mod util;
