use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::core::session::ConnectionState;

use super::state::AppState;

/// Actions that need the session, the sender or the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    Quit,
    LoadSelected,
    Refresh,
    Connect,
    Disconnect,
    Upload,
    SaveConfig,
}

pub struct EventHandler;

impl EventHandler {
    pub fn new() -> Self {
        Self
    }

    /// Apply local key bindings to the state; anything else becomes an `AppEvent`
    pub fn handle_key_event(&self, key: KeyEvent, state: &mut AppState) -> Option<AppEvent> {
        if key.kind != KeyEventKind::Press {
            return None;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(AppEvent::Quit);
        }

        // Help popup swallows everything but its own toggles
        if state.show_help {
            if matches!(key.code, KeyCode::Char('h') | KeyCode::Char('?') | KeyCode::Esc) {
                state.toggle_help();
            }
            return None;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => Some(AppEvent::Quit),
            KeyCode::Char('h') | KeyCode::Char('?') => {
                state.toggle_help();
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                state.select_previous();
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                state.select_next();
                None
            }
            KeyCode::Enter => state.selected_entry().map(|_| AppEvent::LoadSelected),
            KeyCode::Char('r') => Some(AppEvent::Refresh),
            KeyCode::Char('c') => match state.connection {
                ConnectionState::Disconnected => Some(AppEvent::Connect),
                ConnectionState::Connected => {
                    state.set_status_message("Already connected");
                    None
                }
                ConnectionState::Connecting | ConnectionState::Disconnecting => {
                    state.set_status_message(format!("{}, please wait", state.connection));
                    None
                }
            },
            KeyCode::Char('d') => Some(AppEvent::Disconnect),
            KeyCode::Char('u') => {
                if state.sending {
                    state.set_status_message("A configuration is already being sent");
                    None
                } else if !state.connection.can_send() {
                    state.set_status_message("Connect first (c)");
                    None
                } else if state.loaded.as_ref().map_or(true, |l| l.batch.is_empty()) {
                    state.set_status_message("Load a configuration with commands first (Enter)");
                    None
                } else {
                    Some(AppEvent::Upload)
                }
            }
            KeyCode::Char('s') => {
                if state.sending {
                    state.set_status_message("Wait for the current upload to finish");
                    None
                } else if !state.connection.can_send() {
                    state.set_status_message("Connect first (c)");
                    None
                } else {
                    Some(AppEvent::SaveConfig)
                }
            }
            KeyCode::Char('t') => {
                state.toggle_terminal();
                None
            }
            KeyCode::Char('x') => {
                state.terminal.clear();
                None
            }
            _ => None,
        }
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}
