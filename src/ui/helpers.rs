use crate::app::{App, AppEvent, LoadSummary};
use futures::FutureExt;
use gstv_feed::util::display_width;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc;

/// Run a future, converting a panic into an error message.
///
/// Background tasks report panics as [`AppEvent::TaskPanicked`] instead of
/// dying silently.
pub(super) async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: std::future::Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| {
            if let Some(s) = panic.downcast_ref::<&'static str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                format!("Unknown panic: {:?}", (*panic).type_id())
            }
        })
}

/// Load the seed article for the app's current route in the background.
pub(super) fn spawn_initialize(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    let feed = app.feed.clone();
    let route = app.route.clone();
    let generation = app.generation;
    let tx = event_tx.clone();

    tracing::debug!(route = %route, generation, "Spawning feed initialization");

    tokio::spawn(async move {
        let event = match catch_task_panic(feed.initialize(route)).await {
            Ok(result) => AppEvent::Initialized {
                generation,
                result: result
                    .map(|snapshot| snapshot.items.len())
                    .map_err(|e| e.to_string()),
            },
            Err(error) => AppEvent::TaskPanicked {
                task: "initialize",
                error,
            },
        };
        if let Err(e) = tx.send(event).await {
            tracing::warn!(error = %e, "Failed to send init result (receiver dropped)");
        }
    });
}

/// Ask the feed for the next batch unless one is already on its way.
pub(super) fn spawn_load_more(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    if !app.snapshot.has_more || app.snapshot.loading_more() || app.snapshot.loading() {
        return;
    }
    let feed = app.feed.clone();
    let generation = app.generation;
    let tx = event_tx.clone();

    tokio::spawn(async move {
        let event = match catch_task_panic(feed.load_more()).await {
            Ok(outcome) => AppEvent::LoadFinished {
                generation,
                summary: LoadSummary::from(outcome),
            },
            Err(error) => AppEvent::TaskPanicked {
                task: "load_more",
                error,
            },
        };
        if let Err(e) = tx.send(event).await {
            tracing::warn!(error = %e, "Failed to send load result (receiver dropped)");
        }
    });
}

/// Greedy word wrap to `width` display columns.
///
/// Words wider than a line are split by character.
pub(super) fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut current = String::new();
        let mut current_width = 0;

        for word in paragraph.split_whitespace() {
            let word_width = display_width(word);
            let needed = if current.is_empty() {
                word_width
            } else {
                word_width + 1
            };

            if current_width + needed <= width {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(word);
                current_width += needed;
                continue;
            }

            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_width = 0;
            }

            if word_width <= width {
                current.push_str(word);
                current_width = word_width;
            } else {
                for ch in word.chars() {
                    let ch_width = display_width(ch.encode_utf8(&mut [0; 4]));
                    if current_width + ch_width > width && !current.is_empty() {
                        lines.push(std::mem::take(&mut current));
                        current_width = 0;
                    }
                    current.push(ch);
                    current_width += ch_width;
                }
            }
        }
        lines.push(current);
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_simple() {
        assert_eq!(
            wrap_text("the quick brown fox", 9),
            vec!["the quick", "brown fox"]
        );
    }

    #[test]
    fn test_wrap_keeps_blank_lines() {
        assert_eq!(wrap_text("a\n\nb", 10), vec!["a", "", "b"]);
    }

    #[test]
    fn test_wrap_splits_long_words() {
        assert_eq!(wrap_text("abcdefgh", 3), vec!["abc", "def", "gh"]);
    }

    #[test]
    fn test_wrap_counts_wide_chars() {
        // Each CJK char is two columns wide
        assert_eq!(wrap_text("日本語", 4), vec!["日本", "語"]);
    }

    #[tokio::test]
    async fn test_catch_task_panic() {
        let ok = catch_task_panic(async { 5 }).await;
        assert_eq!(ok, Ok(5));

        let err = catch_task_panic(async { panic!("boom") }).await;
        assert_eq!(err, Err::<(), _>("boom".to_string()));
    }
}
