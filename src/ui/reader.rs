use crate::app::{App, ReaderLayout};
use chrono::Local;
use gstv_feed::api::Article;
use gstv_feed::feed::FeedPhase;
use gstv_feed::util::{html_to_text, strip_control_chars};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use std::sync::Arc;

use super::helpers::wrap_text;

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Lay out every loaded article as one continuous column of lines.
pub(crate) fn build_layout(items: &[Arc<Article>], width: u16) -> ReaderLayout {
    let columns = width as usize;
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut starts = Vec::with_capacity(items.len());

    for (index, article) in items.iter().enumerate() {
        if index > 0 {
            lines.push(Line::from(Span::styled(
                "─".repeat(columns),
                Style::default().fg(Color::DarkGray),
            )));
            lines.push(Line::from(""));
        }
        starts.push((article.id, lines.len()));

        let title = strip_control_chars(if article.title.is_empty() {
            &article.slug
        } else {
            &article.title
        });
        for line in wrap_text(&title, columns) {
            lines.push(Line::from(Span::styled(
                line,
                Style::default().add_modifier(Modifier::BOLD),
            )));
        }

        let mut meta = Vec::new();
        if let Some(section) = &article.category_slug {
            meta.push(strip_control_chars(section).into_owned());
        }
        if let Some(published) = article.published_at {
            meta.push(
                published
                    .with_timezone(&Local)
                    .format("%d %b %Y %H:%M")
                    .to_string(),
            );
        }
        if !meta.is_empty() {
            lines.push(Line::from(Span::styled(
                meta.join(" • "),
                Style::default().fg(Color::DarkGray),
            )));
        }

        if let Some(sub_title) = article.sub_title.as_deref().filter(|s| !s.is_empty()) {
            lines.push(Line::from(""));
            for line in wrap_text(&strip_control_chars(sub_title), columns) {
                lines.push(Line::from(Span::styled(
                    line,
                    Style::default().add_modifier(Modifier::ITALIC),
                )));
            }
        }

        lines.push(Line::from(""));
        let body = article.body.as_deref().map(html_to_text).unwrap_or_default();
        if body.is_empty() {
            lines.push(Line::from(Span::styled(
                "(no text)",
                Style::default().fg(Color::DarkGray),
            )));
        } else {
            lines.extend(
                wrap_text(&strip_control_chars(&body), columns)
                    .into_iter()
                    .map(Line::from),
            );
        }
        lines.push(Line::from(""));
    }

    ReaderLayout {
        lines,
        starts,
        width,
        item_count: items.len(),
    }
}

/// Render the continuous article reader.
pub fn render(f: &mut Frame, app: &mut App, area: Rect) {
    // Layout may produce tiny rects during extreme terminal resizes
    if area.width < 3 || area.height < 3 {
        return;
    }

    let inner_width = area.width.saturating_sub(2);
    app.reader_visible_lines = area.height.saturating_sub(2) as usize;

    if app.layout.width != inner_width || app.layout.item_count != app.snapshot.items.len() {
        app.layout = build_layout(&app.snapshot.items, inner_width);
    }
    app.clamp_scroll();

    let title = app
        .sink
        .latest()
        .map(|meta| meta.path)
        .unwrap_or_else(|| app.route.path());
    let block = Block::default().borders(Borders::ALL).title(title);

    let text = if app.snapshot.items.is_empty() {
        placeholder(app)
    } else {
        let end = (app.scroll_offset + app.reader_visible_lines).min(app.layout.lines.len());
        let mut visible: Vec<Line<'static>> = app.layout.lines[app.scroll_offset..end].to_vec();
        if end == app.layout.lines.len() && visible.len() < app.reader_visible_lines {
            visible.push(footer(app));
        }
        Text::from(visible)
    };

    f.render_widget(Paragraph::new(text).block(block), area);
}

fn placeholder(app: &App) -> Text<'static> {
    match app.snapshot.phase {
        FeedPhase::Error => Text::from(vec![
            Line::from(Span::styled(
                format!(
                    "Failed to load article: {}",
                    app.snapshot.error.as_deref().unwrap_or("unknown error")
                ),
                Style::default().fg(Color::Red),
            )),
            Line::from(""),
            Line::from("Press r to retry or : to open another article."),
        ]),
        _ => Text::from(format!(
            "{} Loading {}...",
            SPINNER[app.spinner_frame % SPINNER.len()],
            app.route.slug
        )),
    }
}

fn footer(app: &App) -> Line<'static> {
    let snapshot = &app.snapshot;
    if snapshot.loading_more() {
        Line::from(Span::styled(
            format!(
                "{} Loading next article...",
                SPINNER[app.spinner_frame % SPINNER.len()]
            ),
            Style::default().fg(Color::Cyan),
        ))
    } else if let Some(error) = &snapshot.load_error {
        Line::from(Span::styled(
            format!("Could not load more: {} (scroll or press r to retry)", error),
            Style::default().fg(Color::Red),
        ))
    } else if !snapshot.has_more {
        Line::from(Span::styled(
            "No more articles.",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Line::from("")
    }
}
