use anyhow::{Context, Result};
use clap::Parser;
use gstv_feed::api::{Article, ContentClient};
use gstv_feed::config::Config;
use gstv_feed::feed::{
    article_path, ArticleRoute, FeedSettings, InfiniteArticleFeed, LoadOutcome, SkipReason,
};
use gstv_feed::metadata::NullSink;
use gstv_feed::util::strip_control_chars;
use reqwest::redirect::Policy;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

mod app;
mod ui;

use app::{App, AppEvent};

#[derive(Parser, Debug)]
#[command(name = "gstv", about = "Endless article reader for GSTV news")]
struct Args {
    /// Article slug, site path (gujarat/rain-alert) or full article URL
    article: String,

    /// Page category, overriding the one in the path
    #[arg(long, value_name = "SLUG")]
    category: Option<String>,

    /// Config file (default: ~/.config/gstv/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// API base URL, overriding the config file
    #[arg(long, value_name = "URL")]
    api: Option<String>,

    /// Print up to N articles to stdout and exit instead of starting the reader
    #[arg(long, value_name = "N")]
    print: Option<usize>,
}

fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= 3 {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        for prev in attempt.previous() {
            if prev.as_str() == url.as_str() {
                return attempt.error("Redirect loop detected");
            }
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

/// Logs go to stderr in print mode; the reader owns the terminal otherwise,
/// so they go to a file next to the config.
fn init_tracing(headless: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    if headless {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(());
    }

    let log_dir = Config::default_path()
        .and_then(|p| p.parent().map(PathBuf::from))
        .unwrap_or_else(std::env::temp_dir);
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let log_path = log_dir.join("gstv.log");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .init();
    Ok(())
}

/// Consecutive load-more failures tolerated in print mode.
const HEADLESS_LOAD_RETRIES: u32 = 3;

fn print_article(article: &Article, page_category: Option<&str>) {
    println!(
        "{}\t{}\t{}",
        article.id,
        article_path(article, page_category),
        strip_control_chars(&article.title)
    );
}

/// Walk the feed without a terminal UI, printing one line per article.
async fn run_headless(
    client: ContentClient,
    settings: FeedSettings,
    route: ArticleRoute,
    limit: usize,
) -> Result<()> {
    let page_category = route.category.clone();
    let feed = InfiniteArticleFeed::new(client, settings, Arc::new(NullSink));
    let mut updates = feed.subscribe();

    let snapshot = feed
        .initialize(route)
        .await
        .context("Failed to load article")?;
    let mut printed = 0;
    let mut failures = 0;
    for article in snapshot.items.iter().take(limit) {
        print_article(article, page_category.as_deref());
        printed += 1;
    }

    while printed < limit {
        match feed.load_more().await {
            LoadOutcome::Appended { .. } => failures = 0,
            LoadOutcome::Duplicates { retry_in, .. } => {
                tokio::time::sleep(retry_in).await;
            }
            LoadOutcome::Skipped(SkipReason::Coalesced) => {
                // A scheduled retry is running; wait for it to land
                let _ = updates.changed().await;
            }
            LoadOutcome::Failed(e) if failures < HEADLESS_LOAD_RETRIES => {
                failures += 1;
                let delay = feed.settings().retry_delay;
                tracing::warn!(
                    error = %e,
                    attempt = failures,
                    delay_ms = delay.as_millis() as u64,
                    "Load more failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            LoadOutcome::Failed(e) => {
                feed.shutdown();
                return Err(e).context("Failed to load more articles");
            }
            LoadOutcome::Exhausted(_) | LoadOutcome::Skipped(_) => {}
        }

        let snapshot = updates.borrow_and_update().clone();
        for article in snapshot.items.iter().skip(printed).take(limit - printed) {
            print_article(article, page_category.as_deref());
            printed += 1;
        }
        if !snapshot.has_more {
            break;
        }
    }

    feed.shutdown();
    tracing::info!(printed, "Headless run finished");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.print.is_some())?;

    let mut config = match args.config.clone().or_else(Config::default_path) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(api) = args.api {
        config.api_base_url = api;
    }

    let mut route = ArticleRoute::parse(&args.article)
        .with_context(|| format!("Not an article slug or path: {:?}", args.article))?;
    if let Some(category) = args.category.as_deref() {
        route = ArticleRoute::new(Some(category), route.slug);
    }

    let http_client = reqwest::Client::builder()
        .redirect(create_redirect_policy())
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .context("Failed to build HTTP client")?;

    let client = ContentClient::new(http_client, config.client_settings())
        .context("Invalid API configuration")?;
    let settings = config.feed_settings();

    if let Some(limit) = args.print {
        return run_headless(client, settings, route, limit).await;
    }

    let mut app = App::new(
        client,
        settings,
        route,
        config.scroll_proximity as usize,
    );
    let (event_tx, event_rx) = mpsc::channel::<AppEvent>(32);

    ui::run(&mut app, event_tx, event_rx).await?;

    Ok(())
}
