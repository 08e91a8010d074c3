use std::time::Duration;

use ratatui::{
    backend::Backend,
    layout::{Alignment, Rect},
    style::Style,
    widgets::Paragraph,
    Frame,
};

use crate::app::App;

const STATUS_TTL: Duration = Duration::from_secs(5);

pub fn draw_status_bar<B: Backend>(f: &mut Frame, app: &mut App, area: Rect) {
    let Some((message, timestamp)) = &app.status_message else {
        return;
    };

    if timestamp.elapsed() >= STATUS_TTL {
        app.clear_status_message();
        return;
    }

    let palette = &app.options.palette;
    let lower = message.to_lowercase();
    let color = if lower.contains("error") || lower.contains("failed") {
        palette.error
    } else if lower.contains("copied") || lower.contains("finished") {
        palette.success
    } else {
        palette.warning
    };

    let paragraph = Paragraph::new(message.as_str())
        .style(Style::default().fg(color))
        .alignment(Alignment::Center);
    f.render_widget(paragraph, area);
}
