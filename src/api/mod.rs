//! Content API layer.
//!
//! - [`article`] - tolerant decoding of a single article object
//! - [`response`] - the accepted response shapes, resolved once into [`DetailPayload`]
//! - [`client`] - HTTP transport with timeouts, size limits and retry classification
//!
//! The feed controller only talks to the [`ArticleSource`] trait, so tests can
//! drive it with scripted responses instead of a live backend.

mod article;
mod client;
mod response;

pub use article::Article;
pub(crate) use article::join_ids;
pub use client::{ApiError, ClientSettings, ContentClient};
pub use response::{decode, ContentResponse, DetailPayload};

use serde::Serialize;
use std::future::Future;

/// Feed-specific part of a content fetch.
///
/// Identity fields (`user_id`, `device_id`) are added by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedQuery {
    /// Target slug; empty means "continue the feed".
    pub slug: String,
    /// Comma-joined exclusion list.
    #[serde(rename = "loadedSlugs")]
    pub loaded_slugs: String,
    /// Comma-joined category ids scoping the feed.
    #[serde(rename = "categoryIds")]
    pub category_ids: String,
}

impl FeedQuery {
    /// Query for one specific article.
    pub fn article(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            ..Self::default()
        }
    }
}

/// Anything that can answer a [`FeedQuery`].
pub trait ArticleSource: Send + Sync + 'static {
    fn fetch(
        &self,
        query: &FeedQuery,
    ) -> impl Future<Output = Result<ContentResponse, ApiError>> + Send;
}
