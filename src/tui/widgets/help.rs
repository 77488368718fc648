use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::Line,
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::tui::{state::AppState, ui::centered_rect};

pub fn render_help_popup(f: &mut Frame, area: Rect, _state: &AppState) {
    let popup_area = centered_rect(60, 70, area);

    // Clear the background
    f.render_widget(Clear, popup_area);

    let help_content = vec![
        Line::from("gnssconf - Help"),
        Line::from(""),
        Line::from("Configurations:"),
        Line::from("  ↑/↓ or k/j  - Select"),
        Line::from("  Enter       - Load selected configuration"),
        Line::from("  r           - Refresh list"),
        Line::from(""),
        Line::from("Receiver:"),
        Line::from("  c           - Connect"),
        Line::from("  d           - Disconnect"),
        Line::from("  u           - Upload loaded configuration"),
        Line::from("  s           - Send SAVECONFIG"),
        Line::from(""),
        Line::from("Terminal:"),
        Line::from("  t           - Show / hide"),
        Line::from("  x           - Clear"),
        Line::from(""),
        Line::from("  h           - Toggle help"),
        Line::from("  q / Esc     - Quit"),
    ];

    let help = Paragraph::new(help_content)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Help")
                .border_style(Style::default().fg(Color::Yellow)),
        )
        .wrap(ratatui::widgets::Wrap { trim: true });

    f.render_widget(help, popup_area);
}
