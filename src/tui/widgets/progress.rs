use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Borders, Gauge},
    Frame,
};

use crate::tui::state::AppState;

pub fn render_progress(f: &mut Frame, area: Rect, state: &AppState) {
    let Some(progress) = &state.progress else {
        return;
    };

    let color = if progress.percent >= 100 {
        Color::Green
    } else {
        Color::Cyan
    };

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Upload"))
        .gauge_style(Style::default().fg(color))
        .percent(progress.percent.min(100))
        .label(progress.label.clone());
    f.render_widget(gauge, area);
}
