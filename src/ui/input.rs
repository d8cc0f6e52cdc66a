//! Keyboard input handling.

use crate::app::{App, AppEvent};
use anyhow::Result;
use crossterm::event::{KeyCode, KeyModifiers};
use gstv_feed::feed::{ArticleRoute, FeedPhase, Navigation};
use gstv_feed::util::validate_url_for_open;
use tokio::sync::mpsc;

use super::helpers::{spawn_initialize, spawn_load_more};
use super::Action;

/// Longest slug or path accepted by the go-to prompt.
const MAX_PROMPT_LENGTH: usize = 256;

/// Main input dispatch function.
pub(super) fn handle_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Result<Action> {
    if app.prompt.is_some() {
        handle_prompt_input(app, code, event_tx);
        return Ok(Action::Continue);
    }

    let half_page = (app.reader_visible_lines / 2).max(1) as isize;
    let page = app.reader_visible_lines.saturating_sub(1).max(1) as isize;

    match (code, modifiers) {
        (KeyCode::Char('c'), KeyModifiers::CONTROL) => return Ok(Action::Quit),
        (KeyCode::Char('d'), KeyModifiers::CONTROL) => app.scroll_by(half_page),
        (KeyCode::Char('u'), KeyModifiers::CONTROL) => app.scroll_by(-half_page),
        (KeyCode::Char('q') | KeyCode::Esc, _) => return Ok(Action::Quit),
        (KeyCode::Char('j') | KeyCode::Down, _) => app.scroll_by(1),
        (KeyCode::Char('k') | KeyCode::Up, _) => app.scroll_by(-1),
        (KeyCode::PageDown | KeyCode::Char(' '), _) => app.scroll_by(page),
        (KeyCode::PageUp, _) => app.scroll_by(-page),
        (KeyCode::Home | KeyCode::Char('g'), _) => {
            app.scroll_offset = 0;
        }
        (KeyCode::End | KeyCode::Char('G'), _) => {
            app.scroll_offset = app.max_scroll();
            app.load_check = true;
        }
        (KeyCode::Char('n'), _) => next_article(app),
        (KeyCode::Char('p'), _) => previous_article(app),
        (KeyCode::Char('o'), _) => open_in_browser(app),
        (KeyCode::Char('r'), _) => retry(app, event_tx),
        (KeyCode::Char(':'), _) => app.prompt = Some(String::new()),
        _ => {}
    }

    Ok(Action::Continue)
}

fn handle_prompt_input(app: &mut App, code: KeyCode, event_tx: &mpsc::Sender<AppEvent>) {
    let Some(input) = app.prompt.as_mut() else {
        return;
    };
    match code {
        KeyCode::Esc => app.prompt = None,
        KeyCode::Backspace => {
            input.pop();
        }
        KeyCode::Char(c) if !c.is_control() => {
            if input.len() < MAX_PROMPT_LENGTH {
                input.push(c);
            }
        }
        KeyCode::Enter => {
            let input = app.prompt.take().unwrap_or_default();
            let Some(route) = ArticleRoute::parse(&input) else {
                app.set_status("Enter a slug or an article path");
                return;
            };
            match app.navigate(route) {
                Navigation::Hard => spawn_initialize(app, event_tx),
                Navigation::Rewrite => app.set_status("Already in this feed"),
            }
        }
        _ => {}
    }
}

fn next_article(app: &mut App) {
    let next = app
        .layout
        .starts
        .iter()
        .find(|(_, start)| *start > app.scroll_offset)
        .map(|(_, start)| *start);
    match next {
        Some(start) => app.scroll_offset = start.min(app.max_scroll()),
        None => app.scroll_offset = app.max_scroll(),
    }
    app.load_check = true;
}

fn previous_article(app: &mut App) {
    app.scroll_offset = app
        .layout
        .starts
        .iter()
        .rev()
        .find(|(_, start)| *start < app.scroll_offset)
        .map(|(_, start)| *start)
        .unwrap_or(0);
}

fn open_in_browser(app: &mut App) {
    let Some(url) = app.sink.latest().and_then(|meta| meta.canonical_url) else {
        app.set_status("No link for this article");
        return;
    };
    // Validate before handing the URL to the OS
    if let Err(e) = validate_url_for_open(&url) {
        app.set_status(format!("Refusing to open URL: {}", e));
    } else if let Err(e) = open::that(&url) {
        app.set_status(format!("Failed to open browser: {}", e));
    } else {
        app.set_status(format!("Opened {}", url));
    }
}

fn retry(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    match app.snapshot.phase {
        FeedPhase::Error => spawn_initialize(app, event_tx),
        FeedPhase::Ready if app.snapshot.load_error.is_some() => spawn_load_more(app, event_tx),
        FeedPhase::Exhausted => app.set_status("No more articles"),
        _ => {}
    }
}
