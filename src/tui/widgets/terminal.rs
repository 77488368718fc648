use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::tui::state::{AppState, LineKind};

pub fn render_terminal(f: &mut Frame, area: Rect, state: &AppState) {
    let lines: Vec<Line> = state
        .terminal
        .lines()
        .map(|line| {
            let (prefix, color) = match line.kind {
                LineKind::Tx => ("→ TX: ", Color::Yellow),
                LineKind::Rx => ("← RX: ", Color::Green),
                LineKind::Info => ("", Color::Gray),
            };
            Line::from(vec![
                Span::styled(
                    format!("[{}] ", line.stamp),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(format!("{}{}", prefix, line.text), Style::default().fg(color)),
            ])
        })
        .collect();

    // Keep the newest lines in view
    let visible = area.height.saturating_sub(2) as usize;
    let scroll = lines.len().saturating_sub(visible) as u16;

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Terminal (t: hide, x: clear)"),
        )
        .scroll((scroll, 0));
    f.render_widget(paragraph, area);
}
