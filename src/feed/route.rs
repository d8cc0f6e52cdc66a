use crate::api::Article;
use std::fmt;

/// Section used in paths when neither the article nor the page has one.
const DEFAULT_SECTION: &str = "news";

/// An article page route: `/{category}/{slug}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRoute {
    /// Leading category segment, if the route has one.
    pub category: Option<String>,
    pub slug: String,
}

/// How a route change relates to the running feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// The feed's own URL rewrite while scrolling; keep the feed.
    Rewrite,
    /// A different article chain; tear the feed down and start again.
    Hard,
}

impl ArticleRoute {
    pub fn new(category: Option<&str>, slug: impl Into<String>) -> Self {
        Self {
            category: category
                .map(|c| c.trim().trim_matches('/').to_string())
                .filter(|c| !c.is_empty()),
            slug: slug.into(),
        }
    }

    /// Parse a site path or full URL.
    ///
    /// The last segment is the slug and, when there are at least two segments,
    /// the first is the category. Query strings and fragments are ignored.
    ///
    /// ```
    /// use gstv_feed::feed::ArticleRoute;
    ///
    /// let route = ArticleRoute::parse("/gujarat/rain-alert?ref=home").unwrap();
    /// assert_eq!(route.category.as_deref(), Some("gujarat"));
    /// assert_eq!(route.slug, "rain-alert");
    ///
    /// let bare = ArticleRoute::parse("rain-alert").unwrap();
    /// assert_eq!(bare.category, None);
    /// ```
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let path = match url::Url::parse(input) {
            Ok(url) if url.has_host() => url.path().to_string(),
            _ => input
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_string(),
        };

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let slug = segments.last()?;
        let category = if segments.len() >= 2 {
            segments.first().copied()
        } else {
            None
        };
        Some(Self::new(category, *slug))
    }

    pub fn path(&self) -> String {
        format!(
            "/{}/{}",
            self.category.as_deref().unwrap_or(DEFAULT_SECTION),
            self.slug
        )
    }

    /// Classify a move from this route (the feed's initial route) to `next`.
    ///
    /// A change of leading category, or a slug the feed never loaded, is a
    /// hard navigation. Anything else is the feed rewriting the URL.
    pub fn classify(&self, next: &ArticleRoute, is_loaded: impl Fn(&str) -> bool) -> Navigation {
        if self.category != next.category {
            return Navigation::Hard;
        }
        if next.slug == self.slug || is_loaded(&next.slug) {
            Navigation::Rewrite
        } else {
            Navigation::Hard
        }
    }
}

impl fmt::Display for ArticleRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Path the feed rewrites the URL to when `article` becomes visible.
///
/// The page's category wins so the leading segment stays stable while the
/// reader scrolls; otherwise the article's own section is used.
pub fn article_path(article: &Article, page_category: Option<&str>) -> String {
    let category = page_category
        .or(article.category_slug.as_deref())
        .filter(|c| !c.is_empty());
    ArticleRoute::new(category, article.slug.clone()).path()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_paths() {
        let route = ArticleRoute::parse("/gujarat/rain-alert").unwrap();
        assert_eq!(route, ArticleRoute::new(Some("gujarat"), "rain-alert"));

        let route = ArticleRoute::parse("gujarat/ahmedabad/metro-update/").unwrap();
        assert_eq!(route.category.as_deref(), Some("gujarat"));
        assert_eq!(route.slug, "metro-update");

        assert!(ArticleRoute::parse("/").is_none());
        assert!(ArticleRoute::parse("").is_none());
    }

    #[test]
    fn test_parse_full_url() {
        let route = ArticleRoute::parse("https://www.gstv.in/sports/final-score#top").unwrap();
        assert_eq!(route, ArticleRoute::new(Some("sports"), "final-score"));
    }

    #[test]
    fn test_path_defaults_section() {
        assert_eq!(ArticleRoute::new(None, "a").path(), "/news/a");
        assert_eq!(ArticleRoute::new(Some("world"), "a").path(), "/world/a");
        assert_eq!(ArticleRoute::new(Some(""), "a").path(), "/news/a");
    }

    #[test]
    fn test_rewrite_within_same_category() {
        let initial = ArticleRoute::new(Some("gujarat"), "a");
        let next = ArticleRoute::new(Some("gujarat"), "b");
        assert_eq!(initial.classify(&next, |s| s == "b"), Navigation::Rewrite);
        assert_eq!(initial.classify(&initial, |_| false), Navigation::Rewrite);
    }

    #[test]
    fn test_category_change_is_hard() {
        let initial = ArticleRoute::new(Some("gujarat"), "a");
        let next = ArticleRoute::new(Some("sports"), "b");
        assert_eq!(initial.classify(&next, |_| true), Navigation::Hard);
    }

    #[test]
    fn test_unknown_slug_is_hard() {
        let initial = ArticleRoute::new(Some("gujarat"), "a");
        let next = ArticleRoute::new(Some("gujarat"), "elsewhere");
        assert_eq!(initial.classify(&next, |_| false), Navigation::Hard);
    }

    #[test]
    fn test_article_path_prefers_page_category() {
        let mut article = Article::new(1, "b");
        article.category_slug = Some("national".into());
        assert_eq!(article_path(&article, Some("gujarat")), "/gujarat/b");
        assert_eq!(article_path(&article, None), "/national/b");
        assert_eq!(article_path(&Article::new(2, "c"), None), "/news/c");
    }
}
