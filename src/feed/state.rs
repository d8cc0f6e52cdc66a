use crate::api::{Article, ContentResponse, FeedQuery};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Why a feed stopped for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustReason {
    /// The backend returned no articles (or an unreadable body).
    EmptyResponse,
    /// Too many consecutive responses contained only articles already shown.
    DuplicateLimit,
}

/// What one load-more response did to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Appended { added: usize },
    Duplicates { streak: u32 },
    Exhausted(ExhaustReason),
}

/// Accumulated state of one feed session.
///
/// Owned by a single feed instance. `items` only grows and never holds two
/// articles with the same id; `loaded_slugs` only grows.
#[derive(Debug, Clone)]
pub struct FeedState {
    items: Vec<Arc<Article>>,
    seen_ids: HashSet<i64>,
    /// Insertion-ordered so the exclusion list is deterministic.
    loaded_slugs: Vec<String>,
    slug_set: HashSet<String>,
    category_ids: String,
    duplicate_streak: u32,
    has_more: bool,
    related: HashMap<i64, Arc<[Article]>>,
}

impl FeedState {
    /// Start a session from the article the reader opened.
    ///
    /// Category ids come from the article itself, else from `fallback_ids`.
    pub fn seed(article: Article, fallback_ids: Option<&[i64]>, related: Vec<Article>) -> Self {
        let category_ids = if article.category_ids.is_empty() {
            fallback_ids
                .map(crate::api::join_ids)
                .unwrap_or_default()
        } else {
            article.category_ids_joined()
        };

        let mut state = Self {
            items: Vec::new(),
            seen_ids: HashSet::new(),
            loaded_slugs: Vec::new(),
            slug_set: HashSet::new(),
            category_ids,
            duplicate_streak: 0,
            has_more: true,
            related: HashMap::new(),
        };
        let id = article.id;
        state.push(article);
        state.attach_related(id, related);
        state
    }

    /// Query for the next page: no target slug, everything loaded so far excluded.
    pub fn next_query(&self) -> FeedQuery {
        FeedQuery {
            slug: String::new(),
            loaded_slugs: self.loaded_slugs.join(","),
            category_ids: self.category_ids.clone(),
        }
    }

    /// Fold one load-more response into the state.
    ///
    /// Every returned article is checked against `items` by id regardless of
    /// what the backend was asked to exclude.
    pub fn apply(&mut self, response: ContentResponse, threshold: u32) -> Classification {
        let ContentResponse {
            payload, related, ..
        } = response;
        let articles = payload.into_articles();

        if articles.is_empty() {
            self.has_more = false;
            return Classification::Exhausted(ExhaustReason::EmptyResponse);
        }

        let mut first_new = None;
        let mut added = 0;
        for article in articles {
            if self.seen_ids.contains(&article.id) {
                tracing::trace!(id = article.id, slug = %article.slug, "Dropping duplicate article");
                continue;
            }
            if self.category_ids.is_empty() && !article.category_ids.is_empty() {
                self.category_ids = article.category_ids_joined();
                tracing::debug!(category_ids = %self.category_ids, "Category ids seeded from loaded article");
            }
            first_new.get_or_insert(article.id);
            self.push(article);
            added += 1;
        }

        match first_new {
            Some(id) => {
                self.duplicate_streak = 0;
                self.attach_related(id, related);
                Classification::Appended { added }
            }
            None => {
                self.duplicate_streak += 1;
                if self.duplicate_streak >= threshold.max(1) {
                    self.has_more = false;
                    Classification::Exhausted(ExhaustReason::DuplicateLimit)
                } else {
                    Classification::Duplicates {
                        streak: self.duplicate_streak,
                    }
                }
            }
        }
    }

    fn push(&mut self, article: Article) {
        self.seen_ids.insert(article.id);
        if self.slug_set.insert(article.slug.clone()) {
            self.loaded_slugs.push(article.slug.clone());
        }
        self.items.push(Arc::new(article));
    }

    fn attach_related(&mut self, id: i64, related: Vec<Article>) {
        if !related.is_empty() {
            self.related.insert(id, related.into());
        }
    }

    pub fn items(&self) -> &[Arc<Article>] {
        &self.items
    }

    pub fn find(&self, id: i64) -> Option<&Arc<Article>> {
        self.items.iter().find(|a| a.id == id)
    }

    pub fn loaded_slugs(&self) -> &[String] {
        &self.loaded_slugs
    }

    pub fn is_loaded(&self, slug: &str) -> bool {
        self.slug_set.contains(slug)
    }

    pub fn category_ids(&self) -> &str {
        &self.category_ids
    }

    pub fn duplicate_streak(&self) -> u32 {
        self.duplicate_streak
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn related(&self) -> &HashMap<i64, Arc<[Article]>> {
        &self.related
    }
}
