use crate::app::App;
use ratatui::{
    layout::{Constraint, Direction, Layout},
    Frame,
};

use super::{articles, reader, status};

/// Narrower terminals show the reader only.
const MIN_WIDTH_FOR_LIST: u16 = 80;

/// Main render dispatch
pub fn render(f: &mut Frame, app: &mut App) {
    let area = f.area();
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(area);

    if rows[0].width >= MIN_WIDTH_FOR_LIST {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
            .split(rows[0]);
        // Reader first: it refreshes the layout the list highlights from
        reader::render(f, app, columns[1]);
        articles::render(f, app, columns[0]);
    } else {
        reader::render(f, app, rows[0]);
    }

    status::render(f, app, rows[1]);
}
