use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
    Frame,
};

use crate::app::grid::row_count;
use crate::app::{App, ViewMode};
use crate::config::Palette;
use crate::models::{Group, Host};
use crate::ssh_service;

const DETAILS_PANEL_WIDTH: u16 = 40;
const GRID_GAP: u16 = 2;

pub fn draw_grid_view<B: Backend>(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Min(10),                      // Grid
                Constraint::Length(GRID_GAP),             // Gap
                Constraint::Length(DETAILS_PANEL_WIDTH), // Details panel
            ]
            .as_ref(),
        )
        .split(area);

    draw_grid::<B>(f, app, chunks[0]);
    draw_details::<B>(f, app, chunks[2]);
}

/// One label per item in the active list, in grid order.
fn item_labels(app: &App) -> Vec<String> {
    if app.view_mode == ViewMode::ByGroup {
        return app
            .visible_groups()
            .iter()
            .map(|g| format!("{} ({} hosts)", g.name, g.host_count()))
            .collect();
    }

    app.visible_hosts()
        .iter()
        .map(|host| {
            let mark = match (app.bulk_selection, app.is_selected(host)) {
                (false, _) => "",
                (true, true) => "[✓] ",
                (true, false) => "[ ] ",
            };
            format!("{mark}{} ({})", host.name, host.hostname)
        })
        .collect()
}

fn draw_grid<B: Backend>(f: &mut Frame, app: &App, area: Rect) {
    let palette = &app.options.palette;
    let labels = item_labels(app);

    if labels.is_empty() {
        let message = if app.filter_text.is_empty() {
            "No items available.".to_string()
        } else {
            format!("No matches for '{}'", app.filter_text)
        };
        f.render_widget(
            Paragraph::new(Span::styled(message, Style::default().fg(palette.muted))),
            area,
        );
        return;
    }

    let cols = app.columns();
    let rows = row_count(labels.len(), cols);
    let height = area.height.max(1) as usize;
    // Keep the cursor row on screen.
    let offset = app.cursor.row.saturating_sub(height - 1).min(rows.saturating_sub(1));

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(vec![Constraint::Ratio(1, cols as u32); cols])
        .split(area);

    for (col, column_area) in columns.iter().enumerate() {
        let lines: Vec<Line> = (offset..rows.min(offset + height))
            .filter_map(|row| {
                let index = row * cols + col;
                let label = labels.get(index)?;
                let is_cursor = row == app.cursor.row && col == app.cursor.col;
                Some(grid_line(label, is_cursor, palette))
            })
            .collect();
        f.render_widget(Paragraph::new(lines), *column_area);
    }
}

fn grid_line<'a>(label: &'a str, is_cursor: bool, palette: &Palette) -> Line<'a> {
    if is_cursor {
        Line::from(Span::styled(
            format!("► {label}"),
            Style::default()
                .fg(palette.highlight)
                .add_modifier(Modifier::BOLD | Modifier::REVERSED),
        ))
    } else {
        Line::from(vec![Span::raw("  "), Span::styled(label, Style::default().fg(palette.text))])
    }
}

fn draw_details<B: Backend>(f: &mut Frame, app: &App, area: Rect) {
    let palette = &app.options.palette;

    let (title, lines) = match (app.host_at_cursor(), app.group_at_cursor()) {
        (Some(host), _) => (" Connection Details ", host_details(host, app, palette)),
        (None, Some((_, group))) => (" Group Details ", group_details(group, palette)),
        (None, None) => (
            " Details ",
            vec![Line::from(Span::styled("No host selected", Style::default().fg(palette.muted)))],
        ),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(palette.secondary))
        .title(title)
        .title_style(Style::default().fg(palette.primary).add_modifier(Modifier::BOLD));

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn labelled<'a>(label: &'a str, value: String, palette: &Palette) -> Line<'a> {
    Line::from(vec![
        Span::styled(label, Style::default().fg(palette.muted)),
        Span::styled(value, Style::default().fg(palette.text)),
    ])
}

fn host_details<'a>(host: &Host, app: &App, palette: &Palette) -> Vec<Line<'a>> {
    let override_user = app.custom_username.as_deref();
    let user = match (override_user, host.user.as_deref().filter(|u| !u.is_empty())) {
        (Some(user), _) => user.to_string(),
        (None, Some(user)) => user.to_string(),
        (None, None) => match ssh_service::current_user() {
            Some(user) => format!("{user} (current user)"),
            None => "(current user)".to_string(),
        },
    };
    let resolved = ssh_service::resolve_user(host, override_user);

    vec![
        labelled("Name: ", host.name.clone(), palette),
        labelled("Hostname: ", host.hostname.clone(), palette),
        labelled("Port: ", host.port().to_string(), palette),
        labelled("User: ", user, palette),
        Line::from(""),
        Line::from(Span::styled("SSH Command:", Style::default().fg(palette.muted))),
        Line::from(Span::styled(
            host.ssh_command(resolved.as_deref()),
            Style::default().fg(palette.success),
        )),
    ]
}

fn group_details<'a>(group: &Group, palette: &Palette) -> Vec<Line<'a>> {
    let mut lines = vec![
        labelled("Name: ", group.name.clone(), palette),
        labelled("Hosts: ", group.host_count().to_string(), palette),
    ];
    if !group.subgroups.is_empty() {
        let names: Vec<&str> = group.subgroups.iter().map(|g| g.name.as_str()).collect();
        lines.push(labelled("Subgroups: ", names.join(", "), palette));
    }
    if let Some(description) = group.description.as_deref().filter(|d| !d.is_empty()) {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            description.to_string(),
            Style::default().fg(palette.text),
        )));
    }
    lines
}
