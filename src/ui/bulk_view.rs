use ratatui::{
    backend::Backend,
    layout::{Margin, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
    Frame,
};

use crate::app::{App, BulkRun};
use crate::config::Palette;

pub fn draw_bulk_view<B: Backend>(f: &mut Frame, app: &mut App, area: Rect) {
    let (done, total) = app.bulk_progress();
    let palette = app.options.palette;
    let Some(run) = app.bulk.as_ref() else {
        return;
    };
    let lines = result_lines(run, done, total, &palette);
    let line_count = lines.len();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(if done == total {
            palette.success
        } else {
            palette.warning
        }))
        .title(format!(" Results {done}/{total} "))
        .title_style(Style::default().fg(palette.primary).add_modifier(Modifier::BOLD));

    let inner_area = area.inner(&Margin {
        vertical: 1,
        horizontal: 1,
    });
    let max_scroll = line_count.saturating_sub(inner_area.height as usize) as u16;
    app.bulk_scroll = app.bulk_scroll.min(max_scroll);

    let paragraph = Paragraph::new(lines).block(block).scroll((app.bulk_scroll, 0));
    f.render_widget(paragraph, area);

    // Scrollbar only when the results overflow
    if line_count > inner_area.height as usize {
        let mut scrollbar_state = ScrollbarState::new(line_count).position(app.bulk_scroll as usize);
        f.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓")),
            inner_area,
            &mut scrollbar_state,
        );
    }
}

fn result_lines<'a>(run: &'a BulkRun, done: usize, total: usize, palette: &Palette) -> Vec<Line<'a>> {
    let mut lines = vec![
        Line::from(vec![
            Span::styled("Command: ", Style::default().fg(palette.muted)),
            Span::styled(run.command.as_str(), Style::default().fg(palette.text)),
        ]),
        Line::from(vec![
            Span::styled("Hosts: ", Style::default().fg(palette.muted)),
            Span::styled(run.hosts.len().to_string(), Style::default().fg(palette.text)),
        ]),
    ];
    if let Some(log) = &run.log {
        lines.push(Line::from(vec![
            Span::styled("Output: ", Style::default().fg(palette.muted)),
            Span::styled(log.path().display().to_string(), Style::default().fg(palette.secondary)),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        format!("Progress: {done}/{total} completed"),
        Style::default().fg(palette.primary),
    )));
    lines.push(Line::from(""));

    for host in &run.hosts {
        lines.push(Line::from(Span::styled(
            format!("=== {} ({}) ===", host.name, host.address()),
            Style::default().fg(palette.text).add_modifier(Modifier::BOLD),
        )));

        match run.results.get(&host.key()) {
            None => lines.push(Line::from(Span::styled("Initializing...", Style::default().fg(palette.muted)))),
            Some(result) if !result.done => {
                lines.push(Line::from(Span::styled("Running...", Style::default().fg(palette.warning))))
            }
            Some(result) => {
                if let Some(error) = &result.error {
                    lines.push(Line::from(Span::styled(
                        format!("Error: {error}"),
                        Style::default().fg(palette.error),
                    )));
                }
                lines.extend(
                    result
                        .output
                        .lines()
                        .filter(|line| !line.trim().is_empty())
                        .map(|line| Line::from(Span::styled(line, Style::default().fg(palette.text)))),
                );
            }
        }
        lines.push(Line::from(""));
    }

    lines
}
