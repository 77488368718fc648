use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

use crate::tui::state::AppState;

pub fn render_config_list(f: &mut Frame, area: Rect, state: &AppState) {
    let loaded = state.loaded.as_ref().map(|l| l.label.as_str());

    let items: Vec<ListItem> = state
        .configs
        .iter()
        .map(|entry| {
            let marker = if Some(entry.label.as_str()) == loaded {
                Span::styled("● ", Style::default().fg(Color::Green))
            } else {
                Span::raw("  ")
            };
            ListItem::new(Line::from(vec![marker, Span::raw(entry.label.clone())]))
        })
        .collect();

    let title = match state.origin {
        Some(origin) => format!("Configurations ({})", origin),
        None => "Configurations".to_string(),
    };

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut list_state = ListState::default();
    if !state.configs.is_empty() {
        list_state.select(Some(state.selected));
    }
    f.render_stateful_widget(list, area, &mut list_state);
}
