use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::core::text::{segment_urls, TextSegment};
use crate::tui::state::AppState;

/// Spans of one description line with URLs underlined
pub fn linkified(line: &str) -> Line<'static> {
    let spans: Vec<Span<'static>> = segment_urls(line)
        .into_iter()
        .map(|segment| match segment {
            TextSegment::Plain(text) => Span::raw(text.to_string()),
            TextSegment::Url(url) => Span::styled(
                url.to_string(),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::UNDERLINED),
            ),
        })
        .collect();
    Line::from(spans)
}

pub fn render_description(f: &mut Frame, area: Rect, state: &AppState) {
    let mut lines = Vec::new();
    let title = match &state.loaded {
        None => {
            lines.push(Line::from("Select a configuration and press Enter to load it."));
            "Description".to_string()
        }
        Some(loaded) => {
            match &loaded.description {
                Some(description) => {
                    if let Some(title) = &description.title {
                        lines.push(Line::from(Span::styled(
                            title.clone(),
                            Style::default().add_modifier(Modifier::BOLD),
                        )));
                        lines.push(Line::from(""));
                    }
                    lines.extend(description.details.iter().map(|d| linkified(d)));
                }
                None => lines.push(Line::from(Span::styled(
                    "No description",
                    Style::default().fg(Color::DarkGray),
                ))),
            }
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                format!("{} command(s) ready, press 'u' to upload", loaded.batch.len()),
                Style::default().fg(Color::Gray),
            )));
            loaded.label.clone()
        }
    };

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}
