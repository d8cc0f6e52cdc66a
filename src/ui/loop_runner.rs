//! Main event loop for the TUI.
//!
//! Multiplexes terminal input, feed snapshots, background task results and a
//! periodic tick.

use crate::app::{App, AppEvent};
use anyhow::Result;
use crossterm::{
    event::Event,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout};
use std::time::Duration;
use tokio::sync::mpsc;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use super::events::{handle_app_event, refresh_snapshot};
use super::helpers::{spawn_initialize, spawn_load_more};
use super::input::handle_input;
use super::render::render;

/// What the loop should do after a key press.
pub enum Action {
    Continue,
    /// Leave the reader.
    Quit,
}

/// Runs the reader until the user quits.
///
/// Uses `tokio::select!` over signals, terminal input, feed snapshots,
/// background task results and a 250ms tick.
///
/// # Panic Safety
///
/// Installs a panic hook that restores terminal state before unwinding,
/// so the terminal is not left in raw mode on panic.
pub async fn run(
    app: &mut App,
    event_tx: mpsc::Sender<AppEvent>,
    mut event_rx: mpsc::Receiver<AppEvent>,
) -> Result<()> {
    // Hook goes in before raw mode so a panic never leaves the terminal raw
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let mut guard = TerminalGuard::enter()?;
    let mut event_stream = crossterm::event::EventStream::new();
    let mut tick_interval = tokio::time::interval(Duration::from_millis(250));

    #[cfg(unix)]
    let mut sigterm = signal(SignalKind::terminate())?;
    #[cfg(unix)]
    let mut sigint = signal(SignalKind::interrupt())?;

    spawn_initialize(app, &event_tx);

    loop {
        if app.updates.has_changed().unwrap_or(false) {
            refresh_snapshot(app);
        }

        // Only render when state has changed
        if app.needs_redraw {
            guard.terminal.draw(|f| render(f, app))?;
            app.needs_redraw = false;
        }

        sync_feed(app, &event_tx);

        if app.clear_expired_status() {
            app.needs_redraw = true;
        }

        // Drain pending task results before waiting on input
        while let Ok(event) = event_rx.try_recv() {
            app.needs_redraw = true;
            handle_app_event(app, event);
        }

        #[cfg(unix)]
        let sigterm_fut = sigterm.recv();
        #[cfg(not(unix))]
        let sigterm_fut = std::future::pending::<Option<()>>();

        #[cfg(unix)]
        let sigint_fut = sigint.recv();
        #[cfg(not(unix))]
        let sigint_fut = std::future::pending::<Option<()>>();

        // Cloned so the select arms below can borrow `app` mutably
        let mut updates = app.updates.clone();

        tokio::select! {
            biased;

            _ = sigterm_fut => {
                tracing::info!("Received SIGTERM, shutting down gracefully");
                break;
            }

            _ = sigint_fut => {
                tracing::info!("Received SIGINT, shutting down gracefully");
                break;
            }

            maybe_event = event_stream.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) => {
                        app.needs_redraw = true;
                        match handle_input(app, key.code, key.modifiers, &event_tx) {
                            Ok(Action::Quit) => break,
                            Ok(Action::Continue) => {}
                            Err(e) => app.set_status(format!("Error: {}", e)),
                        }
                    }
                    Some(Ok(Event::Resize(_, _))) => {
                        // A taller window may now reach past the content
                        app.needs_redraw = true;
                        app.load_check = true;
                    }
                    _ => {}
                }
            }

            changed = updates.changed() => {
                if changed.is_ok() {
                    refresh_snapshot(app);
                }
            }

            Some(event) = event_rx.recv() => {
                app.needs_redraw = true;
                handle_app_event(app, event);
            }

            _ = tick_interval.tick() => {
                handle_tick(app);
            }
        }
    }

    app.feed.shutdown();
    drop(guard);
    Ok(())
}

/// Number of frames in the loading spinner animation.
const SPINNER_FRAMES: usize = 10;

fn handle_tick(app: &mut App) {
    if app.snapshot.loading() || app.snapshot.loading_more() || app.snapshot.items.is_empty() {
        app.spinner_frame = (app.spinner_frame + 1) % SPINNER_FRAMES;
        app.needs_redraw = true;
    }
}

/// Report the visible article and load more when the reader nears the end.
///
/// Runs after a draw so the layout matches the current terminal size.
fn sync_feed(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    if let Some(id) = app.visible_article() {
        if app.feed.mark_visible(id).is_some() {
            app.needs_redraw = true;
        }
    }

    if app.should_load_more() {
        spawn_load_more(app, event_tx);
    }
}

/// Raw-mode alternate-screen terminal, restored on drop.
///
/// Dropping restores the terminal on every exit path, including `?` returns
/// out of the loop.
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            tracing::warn!(error = %e, "Failed to disable raw mode");
        }
        if let Err(e) = execute!(self.terminal.backend_mut(), LeaveAlternateScreen) {
            tracing::warn!(error = %e, "Failed to leave alternate screen");
        }
        let _ = self.terminal.show_cursor();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::{ready_snapshot, test_app};
    use crate::app::LoadSummary;

    #[tokio::test]
    async fn test_sync_feed_fires_one_load_near_end() {
        let mut app = test_app(3);
        app.reader_visible_lines = 20;
        app.snapshot = ready_snapshot(&[1]);
        let (tx, mut rx) = mpsc::channel(4);

        // Nothing armed yet
        sync_feed(&mut app, &tx);
        app.load_check = true;
        sync_feed(&mut app, &tx);
        sync_feed(&mut app, &tx);

        // The feed was never initialized, so the load is skipped
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            event,
            AppEvent::LoadFinished {
                generation: 0,
                summary: LoadSummary::Skipped
            }
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_sync_feed_waits_while_far_from_end() {
        let mut app = test_app(3);
        app.layout = crate::app::ReaderLayout {
            lines: vec![ratatui::text::Line::from(""); 100],
            starts: vec![(1, 0)],
            width: 80,
            item_count: 1,
        };
        app.reader_visible_lines = 10;
        app.snapshot = ready_snapshot(&[1]);
        app.load_check = true;
        let (tx, mut rx) = mpsc::channel(4);

        sync_feed(&mut app, &tx);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
        assert!(!app.load_check);
    }
}
