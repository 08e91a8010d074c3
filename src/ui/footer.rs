use crate::app::{App, InputMode, ViewMode};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::Style,
    widgets::Paragraph,
    Frame,
};

pub fn draw_footer<B: Backend>(f: &mut Frame, app: &App, area: Rect) {
    let palette = &app.options.palette;
    let footer = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    let (nav_text, action_text) = help_text(app);

    let nav_help = Paragraph::new(nav_text).style(Style::default().fg(palette.muted));
    let action_help = Paragraph::new(action_text)
        .style(Style::default().fg(palette.muted))
        .alignment(Alignment::Right);

    f.render_widget(nav_help, footer[0]);
    f.render_widget(action_help, footer[1]);
}

fn help_text(app: &App) -> (String, String) {
    match app.input_mode {
        InputMode::Filter => ("Type to filter".into(), "[Enter] Apply  [Esc] Cancel".into()),
        InputMode::Username if app.bulk_selection => {
            ("Type a username for bulk commands".into(), "[Enter] Set  [Esc] Cancel".into())
        }
        InputMode::Username => ("Type a username".into(), "[Enter] Connect  [Esc] Cancel".into()),
        InputMode::BulkCommand => ("Type a command".into(), "[Enter] Run  [Esc] Cancel".into()),
        InputMode::Normal if app.view_mode == ViewMode::BulkRunning => {
            ("↑↓/jk: scroll".into(), "Tab: back to hosts, q: quit".into())
        }
        InputMode::Normal => {
            let mut nav = String::from("↑↓←→/hjkl: navigate");
            if app.bulk_selection {
                nav.push_str(", Space: toggle selection");
                if !app.selected_hosts.is_empty() {
                    nav.push_str(", c: enter command");
                }
            } else {
                nav.push_str(", Enter: select");
            }
            if app.view_mode != ViewMode::ByGroup {
                nav.push_str(", u: custom user, s: bulk mode, y: copy");
            }
            if app.view_mode == ViewMode::InGroup {
                nav.push_str(", Backspace: back");
            }

            let mut actions = String::from("Tab: switch view, /: filter");
            if !app.filter_text.is_empty() {
                actions.push_str(", Esc: clear filter");
            }
            actions.push_str(", q: quit");
            (nav, actions)
        }
    }
}
