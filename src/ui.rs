use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, InputMode, ViewMode};

mod bulk_view;
mod footer;
mod grid_view;
mod status_bar;

use bulk_view::draw_bulk_view;
use footer::draw_footer;
use grid_view::draw_grid_view;
use status_bar::draw_status_bar;

const TITLE: &str = "SSHGrid - SSH Host Browser";

pub fn draw<B: Backend>(f: &mut Frame, app: &mut App) {
    let size = f.size();

    if app.loading {
        draw_loading::<B>(f, app, size);
        return;
    }
    if app.error.is_some() {
        draw_error::<B>(f, app, size);
        return;
    }

    let header = header_lines(app);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(header.len() as u16), // Title, breadcrumb, input
                Constraint::Min(3),                      // Main content
                Constraint::Length(1),                   // Status bar
                Constraint::Length(1),                   // Footer
            ]
            .as_ref(),
        )
        .split(size);

    f.render_widget(Paragraph::new(header), chunks[0]);

    match app.view_mode {
        ViewMode::BulkRunning => draw_bulk_view::<B>(f, app, chunks[1]),
        _ => draw_grid_view::<B>(f, app, chunks[1]),
    }

    draw_status_bar::<B>(f, app, chunks[2]);
    draw_footer::<B>(f, app, chunks[3]);
}

/// Title, breadcrumb trail and whatever text entry is active.
fn header_lines(app: &App) -> Vec<Line<'static>> {
    let palette = &app.options.palette;
    let mut lines = vec![
        Line::from(Span::styled(
            TITLE,
            Style::default().fg(palette.primary).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            app.breadcrumb.join(" > "),
            Style::default().fg(palette.muted),
        )),
    ];

    let entry = |label: &str| {
        Line::from(vec![
            Span::styled(format!("{label}: "), Style::default().fg(palette.secondary)),
            Span::styled(format!("{}_", app.input_buffer), Style::default().fg(palette.text)),
        ])
    };

    match app.input_mode {
        InputMode::Filter => lines.push(entry("Filter")),
        _ if !app.filter_text.is_empty() => lines.push(Line::from(vec![
            Span::styled("Filter: ", Style::default().fg(palette.secondary)),
            Span::styled(app.filter_text.clone(), Style::default().fg(palette.text)),
            Span::styled(" (Press Esc to clear)", Style::default().fg(palette.muted)),
        ])),
        _ => {}
    }

    match app.input_mode {
        InputMode::Username => lines.push(entry("Enter username")),
        InputMode::BulkCommand => lines.push(entry("Enter command")),
        _ if app.bulk_selection => lines.push(Line::from(Span::styled(
            format!(
                "Bulk Selection Mode - {} hosts selected (Space: toggle, c: command)",
                app.selected_hosts.len()
            ),
            Style::default().fg(palette.warning),
        ))),
        _ => {}
    }

    lines
}

fn draw_loading<B: Backend>(f: &mut Frame, app: &App, size: Rect) {
    let palette = &app.options.palette;
    let area = centered_rect(50, 5, size);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(format!(" {TITLE} "))
        .title_style(Style::default().fg(palette.primary).add_modifier(Modifier::BOLD))
        .border_style(Style::default().fg(palette.primary));

    let paragraph = Paragraph::new(vec![
        Line::from(Span::styled("Loading data...", Style::default().fg(palette.text))),
        Line::from(Span::styled("q: quit", Style::default().fg(palette.muted))),
    ])
    .block(block)
    .alignment(Alignment::Center);

    f.render_widget(Clear, area);
    f.render_widget(paragraph, area);
}

fn draw_error<B: Backend>(f: &mut Frame, app: &App, size: Rect) {
    let palette = &app.options.palette;
    let message = app.error.as_deref().unwrap_or_default();
    let area = centered_rect(70, 9, size);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(format!(" {TITLE} "))
        .title_style(Style::default().fg(palette.primary).add_modifier(Modifier::BOLD))
        .border_style(Style::default().fg(palette.error));

    let paragraph = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("⚠ {message}"),
            Style::default().fg(palette.error).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Press any key to retry, q to quit",
            Style::default().fg(palette.muted),
        )),
    ])
    .block(block)
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true });

    f.render_widget(Clear, area);
    f.render_widget(paragraph, area);
}

/// Rectangle `percent_x` wide and `height` rows tall, centered in `r`.
fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length((r.height.saturating_sub(height)) / 2),
                Constraint::Length(height),
                Constraint::Min(0),
            ]
            .as_ref(),
        )
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}
