//! Background task event processing.

use crate::app::{App, AppEvent, LoadSummary};

/// Apply the result of a background feed task.
///
/// Results from a feed that has since been replaced are dropped.
pub(super) fn handle_app_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Initialized { generation, result } => {
            if generation != app.generation {
                tracing::debug!(generation, "Ignoring init result from replaced feed");
                return;
            }
            match result {
                Ok(_) => {
                    // Short seed articles may not fill the screen
                    app.load_check = true;
                }
                Err(e) => app.set_status(format!("Error: {}", e)),
            }
        }
        AppEvent::LoadFinished {
            generation,
            summary,
        } => {
            if generation != app.generation {
                tracing::debug!(generation, "Ignoring load result from replaced feed");
                return;
            }
            match summary {
                LoadSummary::Appended(added) => {
                    tracing::debug!(added, "Feed grew");
                    app.load_check = true;
                }
                LoadSummary::Retrying { streak, delay_ms } => {
                    app.set_status(format!(
                        "No new articles yet, retrying in {:.1}s ({})",
                        delay_ms as f64 / 1000.0,
                        streak
                    ));
                }
                LoadSummary::Exhausted => app.set_status("No more articles"),
                LoadSummary::Failed(e) => app.set_status(format!("Failed to load more: {}", e)),
                LoadSummary::Skipped => {}
            }
        }
        AppEvent::TaskPanicked { task, error } => {
            tracing::error!(task, error = %error, "Background task panicked");
            app.set_status(format!("Internal error in {}: {}", task, error));
        }
    }
}

/// Pull the latest feed snapshot into the app.
pub(super) fn refresh_snapshot(app: &mut App) {
    let snapshot = app.updates.borrow_and_update().clone();
    app.apply_snapshot(snapshot);
}
