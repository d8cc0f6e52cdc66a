use crate::app::App;
use gstv_feed::util::{strip_control_chars, truncate_to_width};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem},
    Frame,
};

/// Render the list of loaded articles, highlighting the visible one.
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let visible = app.visible_article();
    let max_title = area.width.saturating_sub(4) as usize;

    let items: Vec<ListItem> = if app.snapshot.items.is_empty() {
        vec![ListItem::new("No articles")]
    } else {
        app.snapshot
            .items
            .iter()
            .map(|article| {
                let raw = if article.title.is_empty() {
                    &article.slug
                } else {
                    &article.title
                };
                let title = strip_control_chars(raw);
                let title = truncate_to_width(&title, max_title).into_owned();

                let style = if Some(article.id) == visible {
                    Style::default().bg(Color::DarkGray).fg(Color::White)
                } else {
                    Style::default().add_modifier(Modifier::BOLD)
                };

                let mut spans = vec![Span::styled(title, style)];
                if let Some(related) = app.snapshot.related.get(&article.id) {
                    spans.push(Span::styled(
                        format!(" +{}", related.len()),
                        Style::default().fg(Color::DarkGray),
                    ));
                }
                ListItem::new(Line::from(spans))
            })
            .collect()
    };

    let title = if app.snapshot.loading_more() {
        format!("Articles ({}) ...", app.snapshot.items.len())
    } else if !app.snapshot.has_more && !app.snapshot.items.is_empty() {
        format!("Articles ({}, end)", app.snapshot.items.len())
    } else {
        format!("Articles ({})", app.snapshot.items.len())
    };

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(title),
    );

    f.render_widget(list, area);
}
