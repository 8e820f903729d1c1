//! Terminal UI rendering.
//!
//! All drawing logic lives here, separated from application state ([`App`])
//! and input handling ([`crate::input`]).  Rendering only reads the latest
//! snapshot; it never talks to the list state machine or the image cache.
//!
//! ## For contributors
//!
//! * The layout is a three-row split: the news list, a one-line search bar,
//!   and a one-line status bar.
//! * The list records how many rows it showed in [`App::viewport_rows`] so
//!   the main loop knows which thumbnails to request.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

use crate::app::{App, Mode, Thumb};

/// Draw the complete UI for one frame.
pub fn draw(app: &mut App, frame: &mut Frame) {
    let [main_area, search_area, status_area] = Layout::vertical([
        Constraint::Min(1),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    draw_news_list(app, frame, main_area);
    draw_search_bar(app, frame, search_area);
    draw_status_bar(app, frame, status_area);
}

fn thumb_marker(thumb: Option<Thumb>) -> Span<'static> {
    match thumb {
        Some(Thumb::Ready { width, height }) => Span::styled(
            format!("{:>9}", format!("{width}x{height}")),
            Style::default().fg(Color::Green),
        ),
        Some(Thumb::Failed) => Span::styled(format!("{:>9}", "no image"), Style::default().fg(Color::Red)),
        Some(Thumb::Loading) => Span::styled(format!("{:>9}", "…"), Style::default().fg(Color::DarkGray)),
        None => Span::raw(" ".repeat(9)),
    }
}

/// Render the scrollable news list.
fn draw_news_list(app: &mut App, frame: &mut Frame, area: Rect) {
    let list_items: Vec<ListItem> = app
        .entries()
        .iter()
        .map(|entry| {
            let line = Line::from(vec![
                thumb_marker(app.thumb(&entry.image_url)),
                Span::raw("  "),
                Span::styled(entry.title.clone(), Style::default().fg(Color::White)),
                Span::styled(format!("  #{}", entry.id), Style::default().fg(Color::Cyan)),
            ]);
            ListItem::new(line)
        })
        .collect();

    let list = List::new(list_items)
        .block(Block::default().title(" News ").borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .add_modifier(Modifier::BOLD)
                .bg(Color::DarkGray),
        )
        .highlight_symbol("▸ ");

    // Border takes one row top and bottom.
    app.viewport_rows = usize::from(area.height.saturating_sub(2));
    frame.render_stateful_widget(list, area, &mut app.selection);
}

/// Render the search input line.
fn draw_search_bar(app: &App, frame: &mut Frame, area: Rect) {
    let style = match app.mode {
        Mode::Search => Style::default().fg(Color::Yellow),
        Mode::Browse => Style::default().fg(Color::DarkGray),
    };
    let cursor = if app.mode == Mode::Search { "▏" } else { "" };
    let bar = Paragraph::new(Line::from(vec![
        Span::styled(" /", style),
        Span::styled(format!("{}{cursor}", app.query), style),
    ]));
    frame.render_widget(bar, area);
}

/// Render the bottom status bar.
fn draw_status_bar(app: &App, frame: &mut Frame, area: Rect) {
    let status_color = if app.state.is_loading() {
        Color::Yellow
    } else {
        Color::Cyan
    };
    let status = Paragraph::new(Line::from(vec![
        Span::styled(" ", Style::default()),
        Span::styled(&app.status, Style::default().fg(status_color)),
        Span::raw("  "),
        Span::styled(
            format!("{} items", app.snapshot.len()),
            Style::default().fg(Color::Green),
        ),
        Span::raw("  q: quit  ↑/↓: scroll  /: search  r: reload  Enter: open"),
    ]));
    frame.render_widget(status, area);
}
