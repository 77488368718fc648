use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::core::session::ConnectionState;

use super::{
    state::AppState,
    widgets::{
        configs::render_config_list,
        description::render_description,
        help::render_help_popup,
        progress::render_progress,
        status::render_status_bar,
        terminal::render_terminal,
    },
};

pub fn draw_ui(f: &mut Frame, state: &mut AppState) {
    let size = f.size();
    state.terminal_size = (size.width, size.height);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Main content
            Constraint::Length(1), // Status bar
        ])
        .split(size);

    render_header(f, chunks[0], state);

    let body = if state.show_terminal {
        let split = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(chunks[1]);
        render_terminal(f, split[1], state);
        split[0]
    } else {
        chunks[1]
    };

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(body);

    render_config_list(f, columns[0], state);

    if state.progress.is_some() {
        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(3)])
            .split(columns[1]);
        render_description(f, right[0], state);
        render_progress(f, right[1], state);
    } else {
        render_description(f, columns[1], state);
    }

    render_status_bar(f, chunks[2], state);

    if state.show_help {
        render_help_popup(f, size, state);
    }
}

fn render_header(f: &mut Frame, area: Rect, state: &AppState) {
    let (label, color) = match state.connection {
        ConnectionState::Connected => ("● Connected", Color::Green),
        ConnectionState::Connecting => ("◌ Connecting", Color::Yellow),
        ConnectionState::Disconnecting => ("◌ Disconnecting", Color::Yellow),
        ConnectionState::Disconnected => ("○ Disconnected", Color::Red),
    };

    let mut spans = vec![Span::styled(
        label,
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )];
    if let Some(device) = &state.device {
        spans.push(Span::raw(format!("  {}", device)));
    }
    if state.sending {
        spans.push(Span::styled("  sending…", Style::default().fg(Color::Cyan)));
    }

    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .title("gnssconf")
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(header, area);
}

pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
