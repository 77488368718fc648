use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::Local;

use crate::{
    cli::output::clock_stamp,
    core::{
        batch::BatchEvent,
        session::ConnectionState,
        text::{escape_controls, CommandBatch, ConfigDescription},
    },
    domain::error::GnssConfError,
    infrastructure::discovery::{ConfigEntry, Discovered, DiscoveryOrigin},
};

/// Lines kept in the RX/TX terminal
pub const TERMINAL_CAPACITY: usize = 200;

/// How long the progress gauge stays up after a completed batch
pub const PROGRESS_LINGER: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Tx,
    Rx,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalLine {
    pub stamp: String,
    pub kind: LineKind,
    pub text: String,
}

/// Bounded, timestamped RX/TX log
#[derive(Debug, Default)]
pub struct TerminalLog {
    lines: VecDeque<TerminalLine>,
    partial_rx: String,
}

impl TerminalLog {
    pub fn push(&mut self, kind: LineKind, text: impl Into<String>) {
        if self.lines.len() == TERMINAL_CAPACITY {
            self.lines.pop_front();
        }
        self.lines.push_back(TerminalLine {
            stamp: clock_stamp(Local::now()),
            kind,
            text: text.into(),
        });
    }

    /// Sent data, with carriage returns and line feeds made visible
    pub fn push_tx(&mut self, wire: &str) {
        self.push(LineKind::Tx, escape_controls(wire));
    }

    /// Received text; complete lines are logged, the tail waits for more
    pub fn push_rx(&mut self, text: &str) {
        self.partial_rx.push_str(text);
        while let Some(end) = self.partial_rx.find('\n') {
            let line: String = self.partial_rx.drain(..=end).collect();
            let line = line.trim_end_matches(['\r', '\n']);
            if !line.is_empty() {
                self.push(LineKind::Rx, line);
            }
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.partial_rx.clear();
    }

    pub fn lines(&self) -> impl Iterator<Item = &TerminalLine> {
        self.lines.iter()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Progress gauge contents
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub percent: u16,
    pub label: String,
    pub hide_at: Option<Instant>,
}

/// Configuration currently loaded for upload
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub label: String,
    pub description: Option<ConfigDescription>,
    pub batch: CommandBatch,
}

#[derive(Debug)]
pub struct AppState {
    pub configs: Vec<ConfigEntry>,
    pub origin: Option<DiscoveryOrigin>,
    pub selected: usize,
    pub loaded: Option<LoadedConfig>,
    pub connection: ConnectionState,
    pub device: Option<String>,
    pub sending: bool,
    pub progress: Option<Progress>,
    pub terminal: TerminalLog,
    pub show_terminal: bool,
    pub show_help: bool,
    pub status_message: Option<String>,
    pub terminal_size: (u16, u16),
}

impl AppState {
    pub fn new() -> Self {
        Self {
            configs: Vec::new(),
            origin: None,
            selected: 0,
            loaded: None,
            connection: ConnectionState::Disconnected,
            device: None,
            sending: false,
            progress: None,
            terminal: TerminalLog::default(),
            show_terminal: false,
            show_help: false,
            status_message: Some("Press 'h' for help.".to_string()),
            terminal_size: (80, 24),
        }
    }

    pub fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn toggle_terminal(&mut self) {
        self.show_terminal = !self.show_terminal;
    }

    pub fn set_configs(&mut self, discovered: Discovered) {
        let previous = self.selected_entry().map(|e| e.file_name.clone());
        self.origin = Some(discovered.origin);
        self.configs = discovered.entries;
        self.selected = previous
            .and_then(|name| self.configs.iter().position(|e| e.file_name == name))
            .unwrap_or(0);
    }

    pub fn selected_entry(&self) -> Option<&ConfigEntry> {
        self.configs.get(self.selected)
    }

    pub fn select_next(&mut self) {
        if !self.configs.is_empty() {
            self.selected = (self.selected + 1) % self.configs.len();
        }
    }

    pub fn select_previous(&mut self) {
        if !self.configs.is_empty() {
            self.selected = self
                .selected
                .checked_sub(1)
                .unwrap_or(self.configs.len() - 1);
        }
    }

    pub fn set_loaded(&mut self, label: String, text: &str) {
        let loaded = LoadedConfig {
            label,
            description: ConfigDescription::extract(text),
            batch: CommandBatch::from_text(text),
        };
        self.set_status_message(format!(
            "Loaded {} ({} commands)",
            loaded.label,
            loaded.batch.len()
        ));
        self.loaded = Some(loaded);
    }

    /// A failed open leaves the connection as it was when a session already exists
    pub fn connect_failed(&mut self, error: &GnssConfError) {
        if matches!(error, GnssConfError::AlreadyConnected) {
            return;
        }
        self.connection = ConnectionState::Disconnected;
        if error.is_silent() {
            self.set_status_message("No matching device");
        } else {
            self.set_status_message(error.to_string());
        }
    }

    pub fn can_upload(&self) -> bool {
        self.connection.can_send()
            && !self.sending
            && self.loaded.as_ref().map_or(false, |l| !l.batch.is_empty())
    }

    /// Fold a batch report into the gauge, terminal and status line
    pub fn apply_batch_event(&mut self, event: &BatchEvent, now: Instant) {
        match event {
            BatchEvent::Started { total, .. } => {
                self.sending = true;
                self.terminal.clear();
                self.terminal
                    .push(LineKind::Info, format!("=== start ({} commands) ===", total));
                self.progress = Some(Progress {
                    percent: 0,
                    label: format!("Command 0/{}", total),
                    hide_at: None,
                });
            }
            BatchEvent::CommandSent {
                index,
                total,
                preview,
                wire,
            } => {
                self.terminal.push_tx(wire);
                self.progress = Some(Progress {
                    percent: event.percent().unwrap_or(0),
                    label: format!("Command {}/{}: {}", index, total, preview),
                    hide_at: None,
                });
            }
            BatchEvent::Completed { total } => {
                self.sending = false;
                self.terminal.push(LineKind::Info, "=== end ===");
                self.progress = Some(Progress {
                    percent: 100,
                    label: format!("{} commands sent", total),
                    hide_at: Some(now + PROGRESS_LINGER),
                });
                self.set_status_message("Configuration sent");
            }
            BatchEvent::Failed {
                index,
                total,
                error,
            } => {
                self.sending = false;
                self.progress = None;
                self.terminal
                    .push(LineKind::Info, format!("=== interrupted at {}/{} ===", index, total));
                self.set_status_message(format!("Send interrupted: {}", error));
            }
        }
    }

    /// Expire the progress gauge
    pub fn tick(&mut self, now: Instant) {
        if let Some(Progress {
            hide_at: Some(hide_at),
            ..
        }) = &self.progress
        {
            if now >= *hide_at {
                self.progress = None;
            }
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::fetch::ConfigLocation;

    fn entry(name: &str) -> ConfigEntry {
        ConfigEntry::new(name, None, ConfigLocation::parse(name).unwrap())
    }

    #[test]
    fn test_terminal_is_bounded() {
        let mut log = TerminalLog::default();
        for i in 0..(TERMINAL_CAPACITY + 10) {
            log.push(LineKind::Info, i.to_string());
        }
        assert_eq!(log.len(), TERMINAL_CAPACITY);
        assert_eq!(log.lines().next().unwrap().text, "10");
    }

    #[test]
    fn test_rx_lines_are_reassembled() {
        let mut log = TerminalLog::default();
        log.push_rx("$command,MODE RO");
        assert!(log.is_empty());
        log.push_rx("VER,response: OK\r\n\r\n$dev");
        let lines: Vec<_> = log.lines().map(|l| l.text.clone()).collect();
        assert_eq!(lines, vec!["$command,MODE ROVER,response: OK"]);
        assert_eq!(log.lines().next().unwrap().kind, LineKind::Rx);
    }

    #[test]
    fn test_tx_escapes_terminator() {
        let mut log = TerminalLog::default();
        log.push_tx("CONFIG\r\n");
        assert_eq!(log.lines().next().unwrap().text, "CONFIG\\r\\n");
    }

    #[test]
    fn test_selection_wraps_and_survives_refresh() {
        let mut state = AppState::new();
        state.select_next();
        state.set_configs(Discovered {
            origin: DiscoveryOrigin::Local,
            entries: vec![entry("a.txt"), entry("b.txt"), entry("c.txt")],
        });
        state.select_previous();
        assert_eq!(state.selected_entry().unwrap().file_name, "c.txt");
        state.select_next();
        assert_eq!(state.selected, 0);

        state.select_next();
        state.set_configs(Discovered {
            origin: DiscoveryOrigin::Manifest,
            entries: vec![entry("0.txt"), entry("a.txt"), entry("b.txt")],
        });
        assert_eq!(state.selected_entry().unwrap().file_name, "b.txt");
    }

    #[test]
    fn test_batch_progress_lifecycle() {
        let mut state = AppState::new();
        let now = Instant::now();
        state.apply_batch_event(&BatchEvent::Started { total: 2, delay_secs: 0.0 }, now);
        assert!(state.sending);
        state.apply_batch_event(
            &BatchEvent::CommandSent {
                index: 1,
                total: 2,
                preview: "MODE ROVER".into(),
                wire: "MODE ROVER\r\n".into(),
            },
            now,
        );
        let progress = state.progress.clone().unwrap();
        assert_eq!(progress.percent, 50);
        assert_eq!(progress.label, "Command 1/2: MODE ROVER");

        state.apply_batch_event(&BatchEvent::Completed { total: 2 }, now);
        assert!(!state.sending);
        state.tick(now + Duration::from_secs(1));
        assert!(state.progress.is_some());
        state.tick(now + PROGRESS_LINGER);
        assert!(state.progress.is_none());

        let texts: Vec<_> = state.terminal.lines().map(|l| l.text.clone()).collect();
        assert_eq!(texts, vec!["=== start (2 commands) ===", "MODE ROVER\\r\\n", "=== end ==="]);
    }

    #[test]
    fn test_upload_requires_connection_and_commands() {
        let mut state = AppState::new();
        state.set_loaded("rover".into(), "#title: Rover\nMODE ROVER\n");
        assert!(!state.can_upload());
        state.connection = ConnectionState::Connected;
        assert!(state.can_upload());
        state.set_loaded("empty".into(), "# nothing\n");
        assert!(!state.can_upload());
    }

    #[test]
    fn test_connect_failure_keeps_existing_session() {
        let mut state = AppState::new();
        state.connection = ConnectionState::Connected;
        state.connect_failed(&GnssConfError::AlreadyConnected);
        assert_eq!(state.connection, ConnectionState::Connected);

        state.connection = ConnectionState::Connecting;
        state.connect_failed(&GnssConfError::DeviceSelectionCancelled);
        assert_eq!(state.connection, ConnectionState::Disconnected);
        assert_eq!(state.status_message.as_deref(), Some("No matching device"));
    }
}
