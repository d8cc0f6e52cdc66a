use crate::app::App;
use gstv_feed::feed::FeedPhase;
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::Paragraph,
    Frame,
};
use std::borrow::Cow;

/// Render the status bar
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    // Status bar needs at least 1 char width to be meaningful
    if area.width < 1 || area.height < 1 {
        return;
    }

    let text: Cow<'_, str> = if let Some(prompt) = &app.prompt {
        Cow::Owned(format!("Go to: {}_", prompt))
    } else if let Some((msg, _)) = &app.status_message {
        Cow::Borrowed(msg.as_ref())
    } else {
        match app.snapshot.phase {
            FeedPhase::Idle | FeedPhase::Initializing => Cow::Borrowed("Loading... [q]uit"),
            FeedPhase::Error => Cow::Borrowed("[r]etry [:]go to article [q]uit"),
            _ => Cow::Borrowed(
                "[j/k]scroll [Ctrl+d/u]page [n/p]next/prev [o]pen [:]go to [r]etry [q]uit",
            ),
        }
    };

    let style = Style::default().bg(Color::DarkGray).fg(Color::White);

    let paragraph = Paragraph::new(text).style(style);
    f.render_widget(paragraph, area);
}
