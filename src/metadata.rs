//! Page metadata published for the article the reader is looking at.
//!
//! The feed never touches the environment directly: it builds a plain
//! [`PageMetadata`] value and hands it to a [`MetadataSink`]. The terminal
//! reader sets the window title from it; tests record it.

use crate::api::Article;
use crate::util::{html_to_text, truncate_to_width};
use std::sync::Mutex;
use url::Url;

/// Longest description placed in social preview tags, in columns.
const DESCRIPTION_WIDTH: usize = 160;

/// Site name appended to page titles.
pub const SITE_NAME: &str = "GSTV";

/// Title, canonical link and social preview fields for one article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMetadata {
    pub title: String,
    pub description: Option<String>,
    /// Site-relative path, e.g. `/gujarat/rain-alert`.
    pub path: String,
    /// Absolute canonical URL when a site URL is configured.
    pub canonical_url: Option<String>,
    pub image: Option<String>,
    pub og_type: &'static str,
    pub twitter_card: &'static str,
}

impl PageMetadata {
    /// Build metadata for `article` living at `path`.
    pub fn for_article(article: &Article, path: String, site_url: Option<&Url>) -> Self {
        let title = if article.title.is_empty() {
            SITE_NAME.to_string()
        } else {
            format!("{} | {}", article.title, SITE_NAME)
        };

        let description = article
            .sub_title
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| {
                article
                    .body
                    .as_deref()
                    .map(html_to_text)
                    .and_then(|text| text.split("\n\n").next().map(str::to_string))
                    .filter(|s| !s.is_empty())
            })
            .map(|text| truncate_to_width(&text, DESCRIPTION_WIDTH).into_owned());

        let canonical_url = site_url
            .and_then(|base| base.join(path.trim_start_matches('/')).ok())
            .map(String::from);

        Self {
            title,
            description,
            path,
            canonical_url,
            image: article.image.clone(),
            og_type: "article",
            twitter_card: if article.image.is_some() {
                "summary_large_image"
            } else {
                "summary"
            },
        }
    }
}

/// Receiver for page metadata updates.
pub trait MetadataSink: Send + Sync {
    fn publish(&self, metadata: &PageMetadata);
}

/// Sink that discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl MetadataSink for NullSink {
    fn publish(&self, _metadata: &PageMetadata) {}
}

/// Sink that keeps the most recent metadata, for consumers that poll.
#[derive(Debug, Default)]
pub struct LatestMetadata {
    latest: Mutex<Option<PageMetadata>>,
}

impl LatestMetadata {
    pub fn get(&self) -> Option<PageMetadata> {
        self.latest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl MetadataSink for LatestMetadata {
    fn publish(&self, metadata: &PageMetadata) {
        tracing::debug!(
            title = %metadata.title,
            path = %metadata.path,
            "Page metadata updated"
        );
        *self
            .latest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(metadata.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article() -> Article {
        let mut article = Article::new(1, "rain-alert").with_title("Rain alert");
        article.body = Some("<p>Heavy rain expected.</p><p>More later.</p>".into());
        article
    }

    #[test]
    fn test_title_and_description_from_body() {
        let meta = PageMetadata::for_article(&article(), "/gujarat/rain-alert".into(), None);
        assert_eq!(meta.title, "Rain alert | GSTV");
        assert_eq!(meta.description.as_deref(), Some("Heavy rain expected."));
        assert_eq!(meta.path, "/gujarat/rain-alert");
        assert!(meta.canonical_url.is_none());
        assert_eq!(meta.twitter_card, "summary");
    }

    #[test]
    fn test_sub_title_preferred_for_description() {
        let mut article = article();
        article.sub_title = Some("Short teaser".into());
        let meta = PageMetadata::for_article(&article, "/news/rain-alert".into(), None);
        assert_eq!(meta.description.as_deref(), Some("Short teaser"));
    }

    #[test]
    fn test_canonical_url_joins_site() {
        let site = Url::parse("https://www.gstv.in/").unwrap();
        let meta = PageMetadata::for_article(&article(), "/gujarat/rain-alert".into(), Some(&site));
        assert_eq!(
            meta.canonical_url.as_deref(),
            Some("https://www.gstv.in/gujarat/rain-alert")
        );
    }

    #[test]
    fn test_image_switches_card_type() {
        let mut article = article();
        article.image = Some("https://cdn.example.com/a.jpg".into());
        let meta = PageMetadata::for_article(&article, "/news/a".into(), None);
        assert_eq!(meta.twitter_card, "summary_large_image");
        assert_eq!(meta.image.as_deref(), Some("https://cdn.example.com/a.jpg"));
    }

    #[test]
    fn test_untitled_article_uses_site_name() {
        let meta = PageMetadata::for_article(&Article::new(2, "x"), "/news/x".into(), None);
        assert_eq!(meta.title, "GSTV");
        assert!(meta.description.is_none());
    }

    #[test]
    fn test_latest_metadata_keeps_last() {
        let sink = LatestMetadata::default();
        assert!(sink.get().is_none());
        let first = PageMetadata::for_article(&article(), "/news/a".into(), None);
        let second = PageMetadata::for_article(&Article::new(2, "b"), "/news/b".into(), None);
        sink.publish(&first);
        sink.publish(&second);
        assert_eq!(sink.get().unwrap().path, "/news/b");
    }
}
