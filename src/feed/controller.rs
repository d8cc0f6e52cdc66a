use super::category::CategoryTable;
use super::route::{article_path, ArticleRoute, Navigation};
use super::state::{Classification, ExhaustReason, FeedState};
use crate::api::{ApiError, Article, ArticleSource, ContentResponse, FeedQuery};
use crate::metadata::{MetadataSink, PageMetadata};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use url::Url;

/// Tunables for one feed instance.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Consecutive duplicate-only responses before the feed gives up.
    pub duplicate_threshold: u32,
    /// Fixed delay before re-requesting after a duplicate-only response.
    pub retry_delay: Duration,
    /// Transport retries for the seed article.
    pub initial_retries: u32,
    /// First seed retry delay; doubles per attempt.
    pub initial_backoff: Duration,
    /// Public site root used for canonical links.
    pub site_url: Option<Url>,
    pub categories: CategoryTable,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            duplicate_threshold: 2,
            retry_delay: Duration::from_secs(2),
            initial_retries: 3,
            initial_backoff: Duration::from_secs(1),
            site_url: None,
            categories: CategoryTable::builtin(),
        }
    }
}

/// Lifecycle phase. `Exhausted` and `Error` are terminal for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FeedPhase {
    #[default]
    Idle,
    Initializing,
    Ready,
    LoadingMore,
    Exhausted,
    Error,
}

/// Everything the rendering layer needs, published on every change.
#[derive(Debug, Clone, Default)]
pub struct FeedSnapshot {
    pub phase: FeedPhase,
    pub items: Vec<Arc<Article>>,
    pub has_more: bool,
    /// Why initialization failed.
    pub error: Option<String>,
    /// Last load-more transport failure; cleared by the next success.
    pub load_error: Option<String>,
    pub category_ids: String,
    pub duplicate_count: u32,
    pub exhausted: Option<ExhaustReason>,
    pub related: HashMap<i64, Arc<[Article]>>,
    /// Id of the article last reported visible.
    pub visible: Option<i64>,
    /// Route the feed was initialized from.
    pub route: Option<ArticleRoute>,
}

impl FeedSnapshot {
    pub fn loading(&self) -> bool {
        self.phase == FeedPhase::Initializing
    }

    pub fn loading_more(&self) -> bool {
        self.phase == FeedPhase::LoadingMore
    }
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("Article not found: {slug}")]
    NotFound { slug: String },
    #[error("A request is already in flight")]
    Busy,
    #[error("Feed has been shut down")]
    Closed,
}

/// Why `load_more` sent nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another fetch was already in flight.
    Coalesced,
    /// The feed is not initialized, or initialization failed.
    NotReady,
    /// The feed is exhausted.
    NoMoreData,
    /// Shut down before or during the request.
    Closed,
}

/// Result of one `load_more` call.
#[derive(Debug)]
pub enum LoadOutcome {
    Appended { added: usize },
    /// Nothing new; one automatic retry is scheduled after `retry_in`.
    Duplicates { streak: u32, retry_in: Duration },
    Exhausted(ExhaustReason),
    /// Transport failure; the feed stays ready for the next scroll.
    Failed(ApiError),
    Skipped(SkipReason),
}

#[derive(Debug, Default)]
struct Inner {
    phase: FeedPhase,
    state: Option<FeedState>,
    route: Option<ArticleRoute>,
    error: Option<String>,
    load_error: Option<String>,
    exhausted: Option<ExhaustReason>,
    visible: Option<i64>,
}

impl Inner {
    fn snapshot(&self) -> FeedSnapshot {
        let mut snapshot = FeedSnapshot {
            phase: self.phase,
            error: self.error.clone(),
            load_error: self.load_error.clone(),
            exhausted: self.exhausted,
            visible: self.visible,
            route: self.route.clone(),
            ..FeedSnapshot::default()
        };
        if let Some(state) = &self.state {
            snapshot.items = state.items().to_vec();
            snapshot.has_more = state.has_more();
            snapshot.category_ids = state.category_ids().to_string();
            snapshot.duplicate_count = state.duplicate_streak();
            snapshot.related = state.related().clone();
        }
        snapshot
    }
}

/// Releases the in-flight flag when dropped.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn claim(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Infinite "next article" feed for one article page.
///
/// Starts from a seed article and keeps asking the backend for the next one,
/// excluding every slug already shown. At most one request is in flight at a
/// time. Responses that arrive after [`shutdown`](Self::shutdown) are dropped.
///
/// State changes are broadcast as [`FeedSnapshot`]s; subscribe with
/// [`subscribe`](Self::subscribe).
pub struct InfiniteArticleFeed<S> {
    source: S,
    settings: FeedSettings,
    sink: Arc<dyn MetadataSink>,
    inner: Mutex<Inner>,
    in_flight: AtomicBool,
    alive: AtomicBool,
    /// Bumped whenever a result is applied; a scheduled retry only fires if
    /// nothing happened since it was scheduled.
    epoch: AtomicU64,
    updates: watch::Sender<FeedSnapshot>,
}

impl<S: ArticleSource> InfiniteArticleFeed<S> {
    pub fn new(source: S, settings: FeedSettings, sink: Arc<dyn MetadataSink>) -> Arc<Self> {
        let (updates, _) = watch::channel(FeedSnapshot::default());
        Arc::new(Self {
            source,
            settings,
            sink,
            inner: Mutex::new(Inner::default()),
            in_flight: AtomicBool::new(false),
            alive: AtomicBool::new(true),
            epoch: AtomicU64::new(0),
            updates,
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn settings(&self) -> &FeedSettings {
        &self.settings
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.updates.borrow().clone()
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Fetch the seed article for `route` and start a fresh session.
    ///
    /// Transient transport failures are retried with exponential backoff. On
    /// failure the feed enters [`FeedPhase::Error`] and the error is returned.
    pub async fn initialize(self: &Arc<Self>, route: ArticleRoute) -> Result<FeedSnapshot, FeedError> {
        if !self.is_alive() {
            return Err(FeedError::Closed);
        }
        let _guard = InFlightGuard::claim(&self.in_flight).ok_or(FeedError::Busy)?;

        self.epoch.fetch_add(1, Ordering::AcqRel);
        {
            let mut inner = self.lock();
            *inner = Inner {
                phase: FeedPhase::Initializing,
                route: Some(route.clone()),
                ..Inner::default()
            };
            self.publish(&inner);
        }

        tracing::info!(slug = %route.slug, category = ?route.category, "Initializing article feed");
        let result = self.fetch_with_retries(&FeedQuery::article(&route.slug)).await;

        if !self.is_alive() {
            tracing::debug!(slug = %route.slug, "Dropping seed response for closed feed");
            return Err(FeedError::Closed);
        }

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(slug = %route.slug, error = %e, "Failed to load seed article");
                self.fail(e.to_string());
                return Err(e.into());
            }
        };

        let ContentResponse {
            payload, related, ..
        } = response;
        let mut articles = payload.into_articles().into_iter();
        let Some(article) = articles.next() else {
            let err = FeedError::NotFound {
                slug: route.slug.clone(),
            };
            tracing::warn!(slug = %route.slug, "Seed request returned no article");
            self.fail(err.to_string());
            return Err(err);
        };
        let ignored = articles.len();
        if ignored > 0 {
            tracing::debug!(
                slug = %route.slug,
                ignored,
                "Seed request returned several articles, using the first"
            );
        }

        let fallback: Option<Vec<i64>> = route
            .category
            .as_deref()
            .or(article.category_slug.as_deref())
            .and_then(|slug| self.settings.categories.ids_for(slug))
            .map(<[i64]>::to_vec);

        let seed_id = article.id;
        let (snapshot, metadata) = {
            let mut inner = self.lock();
            let state = FeedState::seed(article, fallback.as_deref(), related);
            tracing::info!(
                id = seed_id,
                category_ids = %state.category_ids(),
                "Article feed ready"
            );
            let metadata = state
                .find(seed_id)
                .map(|a| self.metadata_for(a, route.category.as_deref()));
            inner.state = Some(state);
            inner.phase = FeedPhase::Ready;
            inner.visible = Some(seed_id);
            self.publish(&inner);
            (inner.snapshot(), metadata)
        };

        if let Some(metadata) = metadata {
            self.sink.publish(&metadata);
        }
        Ok(snapshot)
    }

    /// Request the next batch of articles.
    ///
    /// Never fails: transport errors come back as [`LoadOutcome::Failed`] and
    /// leave the feed ready for another attempt.
    pub async fn load_more(self: &Arc<Self>) -> LoadOutcome {
        if !self.is_alive() {
            return LoadOutcome::Skipped(SkipReason::Closed);
        }
        let Some(guard) = InFlightGuard::claim(&self.in_flight) else {
            tracing::trace!("Load more coalesced with in-flight request");
            return LoadOutcome::Skipped(SkipReason::Coalesced);
        };

        let query = {
            let mut inner = self.lock();
            let query = match (&inner.phase, &inner.state) {
                (FeedPhase::Ready, Some(state)) if state.has_more() => state.next_query(),
                (FeedPhase::Exhausted, _) | (FeedPhase::Ready, Some(_)) => {
                    return LoadOutcome::Skipped(SkipReason::NoMoreData);
                }
                _ => return LoadOutcome::Skipped(SkipReason::NotReady),
            };
            inner.phase = FeedPhase::LoadingMore;
            self.publish(&inner);
            query
        };

        tracing::debug!(
            loaded = query.loaded_slugs.split(',').filter(|s| !s.is_empty()).count(),
            category_ids = %query.category_ids,
            "Loading more articles"
        );
        let result = self.source.fetch(&query).await;

        if !self.is_alive() {
            tracing::debug!("Dropping load-more response for closed feed");
            return LoadOutcome::Skipped(SkipReason::Closed);
        }

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, retryable = e.is_retryable(), "Load more failed");
                let mut inner = self.lock();
                inner.phase = FeedPhase::Ready;
                inner.load_error = Some(e.to_string());
                self.publish(&inner);
                return LoadOutcome::Failed(e);
            }
        };

        let (classification, epoch) = {
            let mut inner = self.lock();
            let Some(state) = inner.state.as_mut() else {
                return LoadOutcome::Skipped(SkipReason::NotReady);
            };
            let classification = state.apply(response, self.settings.duplicate_threshold);
            let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;

            inner.load_error = None;
            if let Classification::Exhausted(reason) = classification {
                inner.exhausted = Some(reason);
                inner.phase = FeedPhase::Exhausted;
            } else {
                inner.phase = FeedPhase::Ready;
            }
            self.publish(&inner);
            (classification, epoch)
        };
        drop(guard);

        match classification {
            Classification::Appended { added } => {
                tracing::debug!(added, "Appended new articles");
                LoadOutcome::Appended { added }
            }
            Classification::Duplicates { streak } => {
                let retry_in = self.settings.retry_delay;
                tracing::debug!(
                    streak,
                    threshold = self.settings.duplicate_threshold,
                    delay_ms = retry_in.as_millis() as u64,
                    "Only duplicates returned, retrying after delay"
                );
                self.schedule_retry(epoch);
                LoadOutcome::Duplicates { streak, retry_in }
            }
            Classification::Exhausted(reason) => {
                tracing::info!(reason = ?reason, "Article feed exhausted");
                LoadOutcome::Exhausted(reason)
            }
        }
    }

    /// Report the article the reader is looking at.
    ///
    /// Publishes its page metadata through the sink and returns it. Returns
    /// `None` when the id is unknown or already the visible article.
    pub fn mark_visible(&self, article_id: i64) -> Option<PageMetadata> {
        let metadata = {
            let mut inner = self.lock();
            if inner.visible == Some(article_id) {
                return None;
            }
            let page_category = inner.route.as_ref().and_then(|r| r.category.as_deref());
            let metadata = inner
                .state
                .as_ref()?
                .find(article_id)
                .map(|article| self.metadata_for(article, page_category))?;
            inner.visible = Some(article_id);
            self.publish(&inner);
            metadata
        };

        tracing::debug!(id = article_id, path = %metadata.path, "Visible article changed");
        self.sink.publish(&metadata);
        Some(metadata)
    }

    /// Decide whether moving to `next` should tear this feed down.
    pub fn classify_navigation(&self, next: &ArticleRoute) -> Navigation {
        let inner = self.lock();
        match (&inner.route, &inner.state) {
            (Some(initial), Some(state)) => initial.classify(next, |slug| state.is_loaded(slug)),
            (Some(initial), None) => initial.classify(next, |_| false),
            (None, _) => Navigation::Hard,
        }
    }

    /// Stop the feed. Pending retries and in-flight responses are discarded.
    pub fn shutdown(&self) {
        if self.alive.swap(false, Ordering::AcqRel) {
            self.epoch.fetch_add(1, Ordering::AcqRel);
            tracing::debug!("Article feed shut down");
        }
    }

    fn schedule_retry(self: &Arc<Self>, epoch: u64) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let delay = self.settings.retry_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(feed) = weak.upgrade() else {
                return;
            };
            if !feed.is_alive() || feed.epoch.load(Ordering::Acquire) != epoch {
                tracing::trace!("Skipping stale duplicate retry");
                return;
            }
            let outcome = feed.load_more().await;
            tracing::trace!(outcome = ?outcome, "Duplicate retry finished");
        });
    }

    async fn fetch_with_retries(&self, query: &FeedQuery) -> Result<ContentResponse, ApiError> {
        let mut retry_count = 0;
        loop {
            match self.source.fetch(query).await {
                Ok(response) => return Ok(response),
                Err(e)
                    if e.is_retryable()
                        && retry_count < self.settings.initial_retries
                        && self.is_alive() =>
                {
                    let delay = self
                        .settings
                        .initial_backoff
                        .saturating_mul(2u32.saturating_pow(retry_count));
                    tracing::warn!(
                        slug = %query.slug,
                        retry = retry_count + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Seed fetch failed, retrying after delay"
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn fail(&self, message: String) {
        let mut inner = self.lock();
        inner.phase = FeedPhase::Error;
        inner.error = Some(message);
        self.publish(&inner);
    }

    fn metadata_for(&self, article: &Article, page_category: Option<&str>) -> PageMetadata {
        PageMetadata::for_article(
            article,
            article_path(article, page_category),
            self.settings.site_url.as_ref(),
        )
    }

    fn publish(&self, inner: &Inner) {
        self.updates.send_replace(inner.snapshot());
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S> std::fmt::Debug for InfiniteArticleFeed<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfiniteArticleFeed")
            .field("settings", &self.settings)
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .field("alive", &self.alive.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
