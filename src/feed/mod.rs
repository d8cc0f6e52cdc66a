//! Infinite article feed.
//!
//! Starting from one article, the feed keeps appending "next" articles from
//! the content API until the backend runs dry or only repeats itself.
//!
//! - [`state`] - pure session state: dedup by id, exclusion list, duplicate streak
//! - [`controller`] - async driver: in-flight guard, auto-retry, liveness, snapshots
//! - [`route`] - article paths and hard-navigation detection
//! - [`category`] - fallback slug -> category id table
//!
//! # Example
//!
//! ```ignore
//! use gstv_feed::feed::{ArticleRoute, FeedSettings, InfiniteArticleFeed};
//! use gstv_feed::metadata::NullSink;
//!
//! let feed = InfiniteArticleFeed::new(client, FeedSettings::default(), Arc::new(NullSink));
//! feed.initialize(ArticleRoute::new(Some("gujarat"), "rain-alert")).await?;
//! let outcome = feed.load_more().await;
//! ```

mod category;
mod controller;
mod route;
mod state;

pub use category::CategoryTable;
pub use controller::{
    FeedError, FeedPhase, FeedSettings, FeedSnapshot, InfiniteArticleFeed, LoadOutcome,
    SkipReason,
};
pub use route::{article_path, ArticleRoute, Navigation};
pub use state::{Classification, ExhaustReason, FeedState};
