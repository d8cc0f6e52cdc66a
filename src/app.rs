use crossterm::{execute, terminal::SetTitle};
use gstv_feed::api::ContentClient;
use gstv_feed::feed::{
    ArticleRoute, FeedSettings, FeedSnapshot, InfiniteArticleFeed, LoadOutcome, Navigation,
};
use gstv_feed::metadata::{LatestMetadata, MetadataSink, PageMetadata};
use ratatui::text::Line;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

pub type Feed = InfiniteArticleFeed<ContentClient>;

/// Status messages disappear after this many seconds.
const STATUS_TTL_SECS: u64 = 3;

/// Results from background feed tasks.
///
/// `generation` identifies the feed the task was spawned for; events from a
/// feed that has since been replaced are ignored.
#[derive(Debug)]
pub enum AppEvent {
    Initialized {
        generation: u64,
        result: Result<usize, String>,
    },
    LoadFinished {
        generation: u64,
        summary: LoadSummary,
    },
    /// A background task panicked.
    TaskPanicked { task: &'static str, error: String },
}

/// UI-facing digest of a [`LoadOutcome`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadSummary {
    Appended(usize),
    Retrying { streak: u32, delay_ms: u64 },
    Exhausted,
    Failed(String),
    Skipped,
}

impl From<LoadOutcome> for LoadSummary {
    fn from(outcome: LoadOutcome) -> Self {
        match outcome {
            LoadOutcome::Appended { added } => LoadSummary::Appended(added),
            LoadOutcome::Duplicates { streak, retry_in } => LoadSummary::Retrying {
                streak,
                delay_ms: retry_in.as_millis() as u64,
            },
            LoadOutcome::Exhausted(_) => LoadSummary::Exhausted,
            LoadOutcome::Failed(e) => LoadSummary::Failed(e.to_string()),
            LoadOutcome::Skipped(_) => LoadSummary::Skipped,
        }
    }
}

/// Sets the terminal title from page metadata and remembers the latest value.
#[derive(Debug, Default)]
pub struct TitleSink {
    latest: LatestMetadata,
}

impl TitleSink {
    pub fn latest(&self) -> Option<PageMetadata> {
        self.latest.get()
    }
}

impl MetadataSink for TitleSink {
    fn publish(&self, metadata: &PageMetadata) {
        self.latest.publish(metadata);
        if let Err(e) = execute!(std::io::stdout(), SetTitle(&metadata.title)) {
            tracing::debug!(error = %e, "Failed to set terminal title");
        }
    }
}

/// Pre-wrapped reader content for one terminal width.
#[derive(Debug, Default)]
pub struct ReaderLayout {
    pub lines: Vec<Line<'static>>,
    /// `(article id, first line)` for each article, in feed order.
    pub starts: Vec<(i64, usize)>,
    pub width: u16,
    pub item_count: usize,
}

impl ReaderLayout {
    /// Article whose section contains `line`.
    pub fn article_at(&self, line: usize) -> Option<i64> {
        self.starts
            .iter()
            .take_while(|(_, start)| *start <= line)
            .last()
            .map(|(id, _)| *id)
    }

    pub fn start_of(&self, id: i64) -> Option<usize> {
        self.starts
            .iter()
            .find(|(article, _)| *article == id)
            .map(|(_, start)| *start)
    }
}

/// Application state for the terminal reader.
pub struct App {
    pub client: ContentClient,
    pub settings: FeedSettings,
    pub sink: Arc<TitleSink>,
    pub feed: Arc<Feed>,
    pub updates: watch::Receiver<FeedSnapshot>,
    /// Bumped whenever the feed is replaced by a hard navigation.
    pub generation: u64,
    pub snapshot: FeedSnapshot,
    pub route: ArticleRoute,
    pub layout: ReaderLayout,
    pub scroll_offset: usize,
    pub reader_visible_lines: usize,
    /// Remaining lines below the viewport that trigger the next load.
    pub scroll_proximity: usize,
    /// Set by scrolling; the loop then checks whether to load more.
    pub load_check: bool,
    /// Slug prompt input while open.
    pub prompt: Option<String>,
    pub needs_redraw: bool,
    pub status_message: Option<(Cow<'static, str>, Instant)>,
    pub spinner_frame: usize,
}

impl App {
    pub fn new(
        client: ContentClient,
        settings: FeedSettings,
        route: ArticleRoute,
        scroll_proximity: usize,
    ) -> Self {
        let sink = Arc::new(TitleSink::default());
        let feed = Feed::new(client.clone(), settings.clone(), sink.clone());
        let updates = feed.subscribe();
        Self {
            client,
            settings,
            sink,
            feed,
            updates,
            generation: 0,
            snapshot: FeedSnapshot::default(),
            route,
            layout: ReaderLayout::default(),
            scroll_offset: 0,
            reader_visible_lines: 0,
            scroll_proximity,
            load_check: false,
            prompt: None,
            needs_redraw: true,
            status_message: None,
            spinner_frame: 0,
        }
    }

    /// Tear down the current feed and start a fresh one for `route`.
    pub fn replace_feed(&mut self, route: ArticleRoute) {
        self.feed.shutdown();
        let feed = Feed::new(self.client.clone(), self.settings.clone(), self.sink.clone());
        self.updates = feed.subscribe();
        self.feed = feed;
        self.generation = self.generation.wrapping_add(1);
        self.snapshot = FeedSnapshot::default();
        self.route = route;
        self.layout = ReaderLayout::default();
        self.scroll_offset = 0;
        self.needs_redraw = true;
        tracing::info!(route = %self.route, generation = self.generation, "Feed replaced");
    }

    /// Route change requested by the reader: jump within the feed or start over.
    pub fn navigate(&mut self, route: ArticleRoute) -> Navigation {
        let navigation = self.feed.classify_navigation(&route);
        match navigation {
            Navigation::Rewrite => {
                if let Some(id) = self
                    .snapshot
                    .items
                    .iter()
                    .find(|a| a.slug == route.slug)
                    .map(|a| a.id)
                {
                    self.jump_to(id);
                }
            }
            Navigation::Hard => self.replace_feed(route),
        }
        navigation
    }

    pub fn jump_to(&mut self, id: i64) {
        if let Some(start) = self.layout.start_of(id) {
            self.scroll_offset = start;
            self.clamp_scroll();
        }
    }

    pub fn visible_article(&self) -> Option<i64> {
        self.layout.article_at(self.scroll_offset)
    }

    /// Last scroll offset; one line past the content is kept for the footer.
    pub fn max_scroll(&self) -> usize {
        (self.layout.lines.len() + 1).saturating_sub(self.reader_visible_lines.max(1))
    }

    pub fn clamp_scroll(&mut self) {
        self.scroll_offset = self.scroll_offset.min(self.max_scroll());
    }

    pub fn scroll_by(&mut self, delta: isize) {
        self.scroll_offset = self.scroll_offset.saturating_add_signed(delta);
        self.clamp_scroll();
        self.load_check = true;
    }

    /// Take a new feed snapshot. Growth re-arms the load check, since appended
    /// articles may still leave the viewport near the end.
    pub fn apply_snapshot(&mut self, snapshot: FeedSnapshot) {
        if snapshot.items.len() > self.snapshot.items.len() {
            self.load_check = true;
        }
        self.snapshot = snapshot;
        self.needs_redraw = true;
    }

    /// Consume a pending load check; true when the reader should fetch more.
    pub fn should_load_more(&mut self) -> bool {
        std::mem::take(&mut self.load_check)
            && self.near_end()
            && self.snapshot.has_more
            && !self.snapshot.loading()
            && !self.snapshot.loading_more()
    }

    /// True when the viewport is within `scroll_proximity` lines of the end.
    pub fn near_end(&self) -> bool {
        let bottom = self.scroll_offset + self.reader_visible_lines;
        self.layout.lines.len().saturating_sub(bottom) <= self.scroll_proximity
    }

    pub fn set_status(&mut self, msg: impl Into<Cow<'static, str>>) {
        self.status_message = Some((msg.into(), Instant::now()));
    }

    /// Clear status message if expired. Returns true if one was cleared.
    pub fn clear_expired_status(&mut self) -> bool {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed().as_secs() >= STATUS_TTL_SECS {
                self.status_message = None;
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use gstv_feed::api::{Article, ClientSettings};
    use gstv_feed::feed::{ExhaustReason, FeedPhase};
    use std::time::Duration;

    pub(crate) fn test_app(proximity: usize) -> App {
        let settings = ClientSettings {
            base_url: "http://127.0.0.1:9".to_string(),
            detail_path: "api/news/detail".to_string(),
            user_id: "guest".to_string(),
            device_id: "test-device".to_string(),
            token: None,
            timeout: Duration::from_secs(1),
        };
        let client = ContentClient::new(reqwest::Client::new(), settings).unwrap();
        App::new(
            client,
            FeedSettings::default(),
            ArticleRoute::new(None, "a"),
            proximity,
        )
    }

    pub(crate) fn ready_snapshot(ids: &[i64]) -> FeedSnapshot {
        FeedSnapshot {
            phase: FeedPhase::Ready,
            has_more: true,
            items: ids
                .iter()
                .map(|id| Arc::new(Article::new(*id, format!("slug-{}", id))))
                .collect(),
            ..FeedSnapshot::default()
        }
    }

    fn layout(starts: &[(i64, usize)], total: usize) -> ReaderLayout {
        ReaderLayout {
            lines: vec![Line::from(""); total],
            starts: starts.to_vec(),
            width: 80,
            item_count: starts.len(),
        }
    }

    #[test]
    fn test_article_at_line() {
        let layout = layout(&[(1, 0), (2, 10), (3, 25)], 40);
        assert_eq!(layout.article_at(0), Some(1));
        assert_eq!(layout.article_at(9), Some(1));
        assert_eq!(layout.article_at(10), Some(2));
        assert_eq!(layout.article_at(39), Some(3));
        assert_eq!(layout.start_of(3), Some(25));
        assert_eq!(layout.start_of(9), None);
        assert_eq!(ReaderLayout::default().article_at(0), None);
    }

    #[test]
    fn test_load_summary_from_outcome() {
        assert_eq!(
            LoadSummary::from(LoadOutcome::Duplicates {
                streak: 1,
                retry_in: Duration::from_secs(2)
            }),
            LoadSummary::Retrying {
                streak: 1,
                delay_ms: 2000
            }
        );
        assert_eq!(
            LoadSummary::from(LoadOutcome::Exhausted(ExhaustReason::EmptyResponse)),
            LoadSummary::Exhausted
        );
    }

    #[test]
    fn test_near_end_boundary() {
        let mut app = test_app(3);
        app.layout = layout(&[(1, 0)], 30);
        app.reader_visible_lines = 10;

        // 30 - (17 + 10) = 3 lines left
        app.scroll_offset = 17;
        assert!(app.near_end());
        app.scroll_offset = 16;
        assert!(!app.near_end());
    }

    #[test]
    fn test_scroll_clamps_on_empty_content() {
        let mut app = test_app(3);
        app.reader_visible_lines = 20;
        assert_eq!(app.max_scroll(), 0);

        app.scroll_by(5);
        assert_eq!(app.scroll_offset, 0);
        assert!(app.load_check);
        assert!(app.near_end());
    }

    #[test]
    fn test_max_scroll_leaves_footer_line() {
        let mut app = test_app(3);
        app.layout = layout(&[(1, 0)], 30);
        app.reader_visible_lines = 10;
        assert_eq!(app.max_scroll(), 21);

        app.scroll_offset = 100;
        app.clamp_scroll();
        assert_eq!(app.scroll_offset, 21);
    }

    #[test]
    fn test_load_check_is_consumed() {
        let mut app = test_app(3);
        app.reader_visible_lines = 20;
        app.apply_snapshot(ready_snapshot(&[1]));

        assert!(app.should_load_more());
        assert!(!app.should_load_more());
    }

    #[test]
    fn test_no_load_when_far_from_end_or_exhausted() {
        let mut app = test_app(3);
        app.layout = layout(&[(1, 0)], 100);
        app.reader_visible_lines = 10;
        app.snapshot = ready_snapshot(&[1]);
        app.load_check = true;
        assert!(!app.should_load_more());

        app.scroll_offset = app.max_scroll();
        app.snapshot.has_more = false;
        app.load_check = true;
        assert!(!app.should_load_more());

        app.snapshot.has_more = true;
        app.snapshot.phase = FeedPhase::LoadingMore;
        app.load_check = true;
        assert!(!app.should_load_more());
    }

    #[test]
    fn test_growing_snapshot_rearms_load_check() {
        let mut app = test_app(3);
        app.reader_visible_lines = 20;
        app.apply_snapshot(ready_snapshot(&[1]));
        assert!(app.should_load_more());

        // Same items, new phase: nothing to re-check
        let mut loading = ready_snapshot(&[1]);
        loading.phase = FeedPhase::LoadingMore;
        app.apply_snapshot(loading);
        assert!(!app.load_check);

        // A background retry appended an article
        app.apply_snapshot(ready_snapshot(&[1, 2]));
        assert!(app.load_check);
        assert!(app.near_end());
        assert!(app.should_load_more());
    }
}
