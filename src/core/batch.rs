//! Paced transmission of a command batch
//!
//! Commands are written one after another with a fixed pause between them.
//! Only one batch may run at a time; a second request is rejected without
//! touching the device.

use crate::core::session::SessionManager;
use crate::core::text::{preview, CommandBatch, LineTerminator};
use crate::domain::error::{GnssConfError, GnssConfResult};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Command persisting the receiver configuration to flash
pub const SAVE_CONFIG_COMMAND: &str = "SAVECONFIG";

/// Progress reports of a running batch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BatchEvent {
    Started {
        total: usize,
        delay_secs: f64,
    },
    CommandSent {
        /// 1-based position
        index: usize,
        total: usize,
        preview: String,
        /// Exact text written, terminator included
        wire: String,
    },
    Completed {
        total: usize,
    },
    Failed {
        index: usize,
        total: usize,
        error: String,
    },
}

impl BatchEvent {
    /// Completion ratio in percent, when the event carries one
    pub fn percent(&self) -> Option<u16> {
        match self {
            BatchEvent::Started { .. } => Some(0),
            BatchEvent::CommandSent { index, total, .. } if *total > 0 => {
                Some((index * 100 / total) as u16)
            }
            BatchEvent::Completed { .. } => Some(100),
            _ => None,
        }
    }
}

/// Outcome of a completed batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub sent: usize,
    pub elapsed: Duration,
}

/// Shared "batch in flight" flag
#[derive(Debug, Clone, Default)]
pub struct TransmissionState {
    sending: Arc<AtomicBool>,
}

impl TransmissionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }

    /// Raise the flag unless it is already up. The flag drops with the guard.
    pub fn try_begin(&self) -> Option<TransmissionGuard> {
        self.sending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TransmissionGuard {
                sending: Arc::clone(&self.sending),
            })
    }
}

/// Clears the transmission flag when dropped
#[derive(Debug)]
pub struct TransmissionGuard {
    sending: Arc<AtomicBool>,
}

impl Drop for TransmissionGuard {
    fn drop(&mut self) {
        self.sending.store(false, Ordering::Release);
    }
}

/// Clamp a delay in seconds to a sleepable duration
pub fn pacing_delay(delay_secs: f64) -> Duration {
    if delay_secs.is_finite() && delay_secs > 0.0 {
        Duration::try_from_secs_f64(delay_secs).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}

pub struct BatchSender {
    session: Arc<SessionManager>,
    state: TransmissionState,
    events: Option<mpsc::UnboundedSender<BatchEvent>>,
}

impl BatchSender {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self {
            session,
            state: TransmissionState::new(),
            events: None,
        }
    }

    /// Report progress to the given channel
    pub fn with_events(mut self, events: mpsc::UnboundedSender<BatchEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn is_sending(&self) -> bool {
        self.state.is_sending()
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Send every command followed by `terminator`, pausing `delay_secs`
    /// between two commands.
    pub async fn send_batch(
        &self,
        batch: &CommandBatch,
        delay_secs: f64,
        terminator: &LineTerminator,
    ) -> GnssConfResult<BatchReport> {
        self.send_batch_until(batch, delay_secs, terminator, std::future::pending())
            .await
    }

    /// Like [`send_batch`](Self::send_batch), but stops with
    /// [`GnssConfError::Interrupted`] once `cancel` resolves. The command that
    /// did not go out is reported in a `Failed` event.
    pub async fn send_batch_until<C>(
        &self,
        batch: &CommandBatch,
        delay_secs: f64,
        terminator: &LineTerminator,
        cancel: C,
    ) -> GnssConfResult<BatchReport>
    where
        C: Future<Output = ()>,
    {
        if !self.session.is_connected().await {
            return Err(GnssConfError::NotConnected);
        }
        if batch.is_empty() {
            return Err(GnssConfError::EmptyBatch);
        }
        let _guard = self
            .state
            .try_begin()
            .ok_or(GnssConfError::ConcurrentSendRejected)?;

        let delay = pacing_delay(delay_secs);
        let total = batch.len();
        let started = Instant::now();

        info!("Sending {} command(s), delay {:?}", total, delay);
        self.emit(BatchEvent::Started {
            total,
            delay_secs: delay.as_secs_f64(),
        });

        tokio::pin!(cancel);

        for (i, command) in batch.iter().enumerate() {
            let index = i + 1;
            let wire = terminator.terminate(command);

            let written = tokio::select! {
                result = self.session.write_text(&wire) => result,
                _ = &mut cancel => Err(GnssConfError::Interrupted),
            };
            if let Err(e) = written {
                return Err(self.fail(index, total, e));
            }

            debug!("[{}/{}] {}", index, total, command);
            self.emit(BatchEvent::CommandSent {
                index,
                total,
                preview: preview(command),
                wire,
            });

            if index < total && !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = &mut cancel => {
                        return Err(self.fail(index + 1, total, GnssConfError::Interrupted));
                    }
                }
            }
        }

        info!("Batch completed");
        self.emit(BatchEvent::Completed { total });

        Ok(BatchReport {
            sent: total,
            elapsed: started.elapsed(),
        })
    }

    /// Ask the receiver to persist its configuration
    pub async fn send_save_config(&self, terminator: &LineTerminator) -> GnssConfResult<()> {
        self.session
            .write_text(&terminator.terminate(SAVE_CONFIG_COMMAND))
            .await?;
        info!("{} sent", SAVE_CONFIG_COMMAND);
        Ok(())
    }

    fn fail(&self, index: usize, total: usize, error: GnssConfError) -> GnssConfError {
        error!("Batch interrupted at {}/{}: {}", index, total, error);
        self.emit(BatchEvent::Failed {
            index,
            total,
            error: error.to_string(),
        });
        error
    }

    fn emit(&self, event: BatchEvent) {
        if let Some(events) = &self.events {
            // Nobody listening is fine
            let _ = events.send(event);
        }
    }
}
