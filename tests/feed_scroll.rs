//! End-to-end tests: the feed controller driving the real HTTP client
//! against a mock content API.
//!
//! Each test starts its own mock server. Delays are kept short and run on
//! real time, since the client does real network IO.

use gstv_feed::api::{ClientSettings, ContentClient};
use gstv_feed::feed::{
    ArticleRoute, ExhaustReason, FeedPhase, FeedSettings, InfiniteArticleFeed, LoadOutcome,
    SkipReason,
};
use gstv_feed::metadata::{LatestMetadata, NullSink};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DETAIL_PATH: &str = "/api/news/detail";

fn client_for(server: &MockServer) -> ContentClient {
    let settings = ClientSettings {
        base_url: server.uri(),
        detail_path: DETAIL_PATH.to_string(),
        user_id: "42".to_string(),
        device_id: "device-abc".to_string(),
        token: None,
        timeout: Duration::from_secs(5),
    };
    ContentClient::new(reqwest::Client::new(), settings).unwrap()
}

fn fast_settings(threshold: u32) -> FeedSettings {
    FeedSettings {
        duplicate_threshold: threshold,
        retry_delay: Duration::from_millis(20),
        initial_backoff: Duration::from_millis(10),
        ..FeedSettings::default()
    }
}

async fn mount_seed(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(DETAIL_PATH))
        .and(body_partial_json(json!({ "slug": "a" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "newsDetail": {
                "id": 1,
                "slug": "a",
                "title": "Seed story",
                "category_ids": [3, 9]
            },
            "relatednews": [{ "id": 100, "slug": "related-one" }]
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_scroll_until_backend_runs_dry() {
    let server = MockServer::start().await;
    mount_seed(&server).await;

    Mock::given(method("POST"))
        .and(path(DETAIL_PATH))
        .and(body_partial_json(json!({
            "slug": "",
            "loadedSlugs": "a",
            "categoryIds": "3,9",
            "user_id": "42",
            "device_id": "device-abc"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "id": 2, "slug": "b", "title": "Second" },
                { "id": 1, "slug": "a", "title": "Seed story" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(DETAIL_PATH))
        .and(body_partial_json(json!({ "slug": "", "loadedSlugs": "a,b" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "newsDetail": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let feed = InfiniteArticleFeed::new(client_for(&server), fast_settings(2), Arc::new(NullSink));

    let snapshot = feed
        .initialize(ArticleRoute::new(Some("gujarat"), "a"))
        .await
        .unwrap();
    assert_eq!(snapshot.category_ids, "3,9");
    assert_eq!(snapshot.related.get(&1).map(|r| r.len()), Some(1));

    assert!(matches!(
        feed.load_more().await,
        LoadOutcome::Appended { added: 1 }
    ));
    assert!(matches!(
        feed.load_more().await,
        LoadOutcome::Exhausted(ExhaustReason::EmptyResponse)
    ));

    let snapshot = feed.snapshot();
    let slugs: Vec<&str> = snapshot.items.iter().map(|a| a.slug.as_str()).collect();
    assert_eq!(slugs, vec!["a", "b"]);
    assert_eq!(snapshot.phase, FeedPhase::Exhausted);
    assert!(!snapshot.has_more);
}

#[tokio::test]
async fn test_duplicate_stream_stops_after_threshold() {
    let server = MockServer::start().await;
    mount_seed(&server).await;

    // Backend keeps serving the seed article back
    Mock::given(method("POST"))
        .and(path(DETAIL_PATH))
        .and(body_partial_json(json!({ "slug": "" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "newsDetail": [{ "id": 1, "slug": "a" }]
        })))
        .expect(3)
        .mount(&server)
        .await;

    let feed = InfiniteArticleFeed::new(client_for(&server), fast_settings(3), Arc::new(NullSink));
    feed.initialize(ArticleRoute::new(None, "a")).await.unwrap();

    assert!(matches!(
        feed.load_more().await,
        LoadOutcome::Duplicates { streak: 1, .. }
    ));

    let mut updates = feed.subscribe();
    tokio::time::timeout(Duration::from_secs(5), async {
        while updates.borrow_and_update().phase != FeedPhase::Exhausted {
            updates.changed().await.unwrap();
        }
    })
    .await
    .unwrap();

    // No further requests after exhaustion
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(feed.snapshot().items.len(), 1);
    server.verify().await;
}

#[tokio::test]
async fn test_server_error_leaves_feed_ready() {
    let server = MockServer::start().await;
    mount_seed(&server).await;

    Mock::given(method("POST"))
        .and(path(DETAIL_PATH))
        .and(body_partial_json(json!({ "slug": "" })))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(DETAIL_PATH))
        .and(body_partial_json(json!({ "slug": "" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "newsDetail": { "id": 2, "slug": "b" }
        })))
        .mount(&server)
        .await;

    let feed = InfiniteArticleFeed::new(client_for(&server), fast_settings(2), Arc::new(NullSink));
    feed.initialize(ArticleRoute::new(None, "a")).await.unwrap();

    assert!(matches!(feed.load_more().await, LoadOutcome::Failed(_)));
    let snapshot = feed.snapshot();
    assert_eq!(snapshot.phase, FeedPhase::Ready);
    assert!(snapshot.has_more);

    assert!(matches!(
        feed.load_more().await,
        LoadOutcome::Appended { added: 1 }
    ));
}

#[tokio::test]
async fn test_seed_retried_after_server_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(DETAIL_PATH))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_seed(&server).await;

    let feed = InfiniteArticleFeed::new(client_for(&server), fast_settings(2), Arc::new(NullSink));
    let snapshot = feed.initialize(ArticleRoute::new(None, "a")).await.unwrap();
    assert_eq!(snapshot.items.len(), 1);
}

#[tokio::test]
async fn test_missing_article_is_an_error_state() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(DETAIL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let feed = InfiniteArticleFeed::new(client_for(&server), fast_settings(2), Arc::new(NullSink));
    assert!(feed
        .initialize(ArticleRoute::new(None, "missing"))
        .await
        .is_err());
    assert_eq!(feed.snapshot().phase, FeedPhase::Error);
}

#[tokio::test]
async fn test_late_response_after_shutdown_is_dropped() {
    let server = MockServer::start().await;
    mount_seed(&server).await;

    Mock::given(method("POST"))
        .and(path(DETAIL_PATH))
        .and(body_partial_json(json!({ "slug": "" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "newsDetail": { "id": 2, "slug": "b" } }))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let feed = InfiniteArticleFeed::new(client_for(&server), fast_settings(2), Arc::new(NullSink));
    feed.initialize(ArticleRoute::new(None, "a")).await.unwrap();

    let pending = tokio::spawn({
        let feed = feed.clone();
        async move { feed.load_more().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    feed.shutdown();

    assert!(matches!(
        pending.await.unwrap(),
        LoadOutcome::Skipped(SkipReason::Closed)
    ));
    assert_eq!(feed.snapshot().items.len(), 1);
}

#[tokio::test]
async fn test_visible_article_metadata_reaches_sink() {
    let server = MockServer::start().await;
    mount_seed(&server).await;

    Mock::given(method("POST"))
        .and(path(DETAIL_PATH))
        .and(body_partial_json(json!({ "slug": "" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "newsDetail": {
                "id": 2,
                "slug": "b",
                "title": "Second",
                "sub_title": "Teaser text"
            }
        })))
        .mount(&server)
        .await;

    let sink = Arc::new(LatestMetadata::default());
    let settings = FeedSettings {
        site_url: Some(url::Url::parse("https://www.gstv.in/").unwrap()),
        ..fast_settings(2)
    };
    let feed = InfiniteArticleFeed::new(client_for(&server), settings, sink.clone());
    feed.initialize(ArticleRoute::new(Some("gujarat"), "a"))
        .await
        .unwrap();
    assert_eq!(sink.get().unwrap().title, "Seed story | GSTV");

    feed.load_more().await;
    feed.mark_visible(2).unwrap();

    let latest = sink.get().unwrap();
    assert_eq!(latest.path, "/gujarat/b");
    assert_eq!(latest.description.as_deref(), Some("Teaser text"));
    assert_eq!(
        latest.canonical_url.as_deref(),
        Some("https://www.gstv.in/gujarat/b")
    );
}
