use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    cli::{
        args::LinkArgs,
        commands::{build_discovery, resolve_link, Link},
    },
    core::{
        batch::{BatchEvent, BatchReport, BatchSender, SAVE_CONFIG_COMMAND},
        session::{ConnectionState, SerialEvent, SessionInfo, SessionManager},
        transport::{FirstMatchPicker, Transport},
    },
    domain::{
        config::{DiscoverySettings, GnssConfConfig},
        error::{GnssConfError, GnssConfResult},
    },
    infrastructure::{
        discovery::{load_config, ConfigDiscovery, Discovered},
        serial::SerialTransport,
    },
};

use super::{
    event::{AppEvent, EventHandler},
    state::AppState,
    ui::draw_ui,
};

/// Results of work spawned off the UI loop
#[derive(Debug)]
enum TaskOutcome {
    Discovered(GnssConfResult<Discovered>),
    Loaded {
        label: String,
        result: GnssConfResult<String>,
    },
    Connected(GnssConfResult<SessionInfo>),
    Uploaded(GnssConfResult<BatchReport>),
    Saved(GnssConfResult<()>),
    Closed,
}

pub struct App {
    state: AppState,
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    events: EventHandler,
    should_quit: bool,
    last_tick: Instant,
    tick_rate: Duration,
    session: Arc<SessionManager>,
    sender: Arc<BatchSender>,
    discovery: Arc<ConfigDiscovery>,
    link: Link,
    delay_secs: f64,
    serial_tx: mpsc::UnboundedSender<SerialEvent>,
    serial_rx: mpsc::UnboundedReceiver<SerialEvent>,
    batch_rx: mpsc::UnboundedReceiver<BatchEvent>,
    task_tx: mpsc::UnboundedSender<TaskOutcome>,
    task_rx: mpsc::UnboundedReceiver<TaskOutcome>,
}

impl App {
    pub fn new(config: GnssConfConfig, discovery: DiscoverySettings) -> GnssConfResult<Self> {
        let link = resolve_link(&config, &LinkArgs::default())?;
        let discovery = Arc::new(build_discovery(&discovery)?);

        // No prompt inside the alternate screen: the first matching device wins
        let transport: Arc<dyn Transport> = Arc::new(SerialTransport::new(
            config.serial.clone(),
            Arc::new(FirstMatchPicker),
        ));
        let session = Arc::new(SessionManager::new(transport));
        let (batch_tx, batch_rx) = mpsc::unbounded_channel();
        let sender = Arc::new(BatchSender::new(Arc::clone(&session)).with_events(batch_tx));
        let (serial_tx, serial_rx) = mpsc::unbounded_channel();
        let (task_tx, task_rx) = mpsc::unbounded_channel();

        // Setup terminal
        enable_raw_mode().map_err(|e| GnssConfError::Tui(e.to_string()))?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
            .map_err(|e| GnssConfError::Tui(e.to_string()))?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend).map_err(|e| GnssConfError::Tui(e.to_string()))?;

        Ok(Self {
            state: AppState::new(),
            terminal,
            events: EventHandler::new(),
            should_quit: false,
            last_tick: Instant::now(),
            tick_rate: Duration::from_millis(100),
            session,
            sender,
            discovery,
            link,
            delay_secs: config.batch.delay_secs,
            serial_tx,
            serial_rx,
            batch_rx,
            task_tx,
            task_rx,
        })
    }

    pub async fn run(&mut self) -> GnssConfResult<()> {
        self.dispatch(AppEvent::Refresh);

        loop {
            if let Ok(true) = event::poll(self.tick_rate) {
                if let Ok(event) = event::read() {
                    match event {
                        Event::Key(key) => {
                            if let Some(action) = self.events.handle_key_event(key, &mut self.state) {
                                self.dispatch(action);
                            }
                        }
                        Event::Resize(width, height) => {
                            self.state.terminal_size = (width, height);
                        }
                        _ => {}
                    }
                }
            }

            if self.last_tick.elapsed() >= self.tick_rate {
                self.tick();
                self.last_tick = Instant::now();
            }

            self.terminal
                .draw(|f| draw_ui(f, &mut self.state))
                .map_err(|e| GnssConfError::Tui(e.to_string()))?;

            if self.should_quit {
                break;
            }
        }

        self.session.close().await;
        info!("TUI closed");
        Ok(())
    }

    fn spawn_task<F>(&self, work: F)
    where
        F: std::future::Future<Output = TaskOutcome> + Send + 'static,
    {
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            // The receiver only goes away when the app is shutting down
            let _ = tx.send(work.await);
        });
    }

    fn dispatch(&mut self, action: AppEvent) {
        debug!("TUI action {:?}", action);
        match action {
            AppEvent::Quit => self.should_quit = true,
            AppEvent::Refresh => {
                self.state.set_status_message("Looking for configurations…");
                let discovery = Arc::clone(&self.discovery);
                self.spawn_task(async move { TaskOutcome::Discovered(discovery.discover().await) });
            }
            AppEvent::LoadSelected => {
                let Some(entry) = self.state.selected_entry().cloned() else {
                    return;
                };
                self.state.set_status_message(format!("Loading {}…", entry.label));
                let fetcher = Arc::clone(self.discovery.fetcher());
                self.spawn_task(async move {
                    let result = load_config(fetcher.as_ref(), &entry.location).await;
                    TaskOutcome::Loaded {
                        label: entry.label,
                        result,
                    }
                });
            }
            AppEvent::Connect => {
                self.state.connection = ConnectionState::Connecting;
                self.state.set_status_message("Connecting…");
                let session = Arc::clone(&self.session);
                let baud_rate = self.link.baud_rate;
                let filter = self.link.filter.clone();
                let events = self.serial_tx.clone();
                self.spawn_task(async move {
                    TaskOutcome::Connected(session.open(baud_rate, &filter, events).await)
                });
            }
            AppEvent::Disconnect => self.close_session(),
            AppEvent::Upload => {
                let Some(loaded) = &self.state.loaded else {
                    return;
                };
                let batch = loaded.batch.clone();
                let sender = Arc::clone(&self.sender);
                let delay = self.delay_secs;
                let terminator = self.link.terminator.clone();
                self.spawn_task(async move {
                    TaskOutcome::Uploaded(sender.send_batch(&batch, delay, &terminator).await)
                });
            }
            AppEvent::SaveConfig => {
                let sender = Arc::clone(&self.sender);
                let terminator = self.link.terminator.clone();
                self.spawn_task(async move {
                    TaskOutcome::Saved(sender.send_save_config(&terminator).await)
                });
            }
        }
    }

    fn close_session(&mut self) {
        if self.state.connection == ConnectionState::Disconnected {
            return;
        }
        self.state.connection = ConnectionState::Disconnecting;
        let session = Arc::clone(&self.session);
        self.spawn_task(async move {
            session.close().await;
            TaskOutcome::Closed
        });
    }

    fn tick(&mut self) {
        let now = Instant::now();

        while let Ok(event) = self.batch_rx.try_recv() {
            self.state.apply_batch_event(&event, now);
        }

        while let Ok(event) = self.serial_rx.try_recv() {
            match event {
                SerialEvent::Received { text, .. } => self.state.terminal.push_rx(&text),
                SerialEvent::ReadError(message) => {
                    warn!("Serial read failed: {}", message);
                    self.state.set_status_message(format!("Read error: {}", message));
                    self.close_session();
                }
                SerialEvent::ReadClosed => {
                    self.state.set_status_message("Device closed the stream");
                    self.close_session();
                }
            }
        }

        while let Ok(outcome) = self.task_rx.try_recv() {
            self.apply_outcome(outcome);
        }

        self.state.tick(now);
    }

    fn apply_outcome(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Discovered(Ok(discovered)) => {
                let message = format!(
                    "{} configuration(s) from {}",
                    discovered.entries.len(),
                    discovered.origin
                );
                self.state.set_configs(discovered);
                self.state.set_status_message(message);
            }
            TaskOutcome::Discovered(Err(e)) => {
                self.state.set_status_message(e.to_string());
            }
            TaskOutcome::Loaded { label, result } => match result {
                Ok(text) => self.state.set_loaded(label, &text),
                Err(e) => self.state.set_status_message(e.to_string()),
            },
            TaskOutcome::Connected(Ok(info)) => {
                info!("Connected to {} at {} baud", info.device, info.baud_rate);
                self.state.connection = ConnectionState::Connected;
                self.state.set_status_message(format!(
                    "Connected to {} at {} baud",
                    info.device, info.baud_rate
                ));
                self.state.device = Some(info.device.to_string());
            }
            TaskOutcome::Connected(Err(e)) => self.state.connect_failed(&e),
            TaskOutcome::Uploaded(Ok(report)) => {
                debug!("Batch of {} done in {:?}", report.sent, report.elapsed);
            }
            TaskOutcome::Uploaded(Err(e)) => {
                // Failures after the first command already arrived as a batch event
                let message = e.to_string();
                let reported = self
                    .state
                    .status_message
                    .as_deref()
                    .map_or(false, |m| m.ends_with(&message));
                if !reported {
                    self.state.set_status_message(message);
                }
            }
            TaskOutcome::Saved(Ok(())) => {
                self.state
                    .terminal
                    .push_tx(&self.link.terminator.terminate(SAVE_CONFIG_COMMAND));
                self.state.set_status_message("Configuration saved to receiver memory");
            }
            TaskOutcome::Saved(Err(e)) => self.state.set_status_message(e.to_string()),
            TaskOutcome::Closed => {
                self.state.connection = ConnectionState::Disconnected;
                self.state.device = None;
                if !self.state.sending {
                    self.state.set_status_message("Disconnected");
                }
            }
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        // Restore terminal
        let _ = disable_raw_mode();
        let _ = execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        );
        let _ = self.terminal.show_cursor();
    }
}
