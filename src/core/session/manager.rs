use crate::core::session::{
    pipe::ReadPipe,
    state::{ConnectionState, SerialEvent, SessionInfo},
};
use crate::core::transport::{ByteSink, DeviceFilter, OpenedPort, PortHandle, Transport};
use crate::domain::error::{GnssConfError, GnssConfResult};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};

struct ActiveSession {
    info: SessionInfo,
    read_pipe: ReadPipe,
    port: Box<dyn PortHandle>,
}

/// Owner of the single serial session.
///
/// The write half lives in its own slot so that a batch can hold it while
/// `close` tears the rest of the session down.
pub struct SessionManager {
    transport: Arc<dyn Transport>,
    state: RwLock<ConnectionState>,
    session: Mutex<Option<ActiveSession>>,
    writer: Mutex<Option<Box<dyn ByteSink>>>,
}

impl SessionManager {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            state: RwLock::new(ConnectionState::Disconnected),
            session: Mutex::new(None),
            writer: Mutex::new(None),
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Select a device, open it and start the read pipe
    pub async fn open(
        &self,
        baud_rate: u32,
        filter: &DeviceFilter,
        events: mpsc::UnboundedSender<SerialEvent>,
    ) -> GnssConfResult<SessionInfo> {
        if baud_rate == 0 {
            return Err(GnssConfError::InvalidInput("baud rate must be positive".to_string()));
        }
        if !self.transport.is_available() {
            return Err(GnssConfError::UnsupportedPlatform);
        }

        let mut slot = self.session.lock().await;
        if slot.is_some() {
            return Err(GnssConfError::AlreadyConnected);
        }

        self.set_state(ConnectionState::Connecting).await;

        let opened = match self.connect(baud_rate, filter).await {
            Ok(opened) => opened,
            Err(e) => {
                self.set_state(ConnectionState::Disconnected).await;
                return Err(e);
            }
        };

        let (info, OpenedPort { reader, writer, port }) = opened;
        let read_pipe = ReadPipe::spawn(reader, events);
        *self.writer.lock().await = Some(writer);
        *slot = Some(ActiveSession {
            info: info.clone(),
            read_pipe,
            port,
        });
        self.set_state(ConnectionState::Connected).await;

        info!("Connected to {} at {} baud (session {})", info.device, baud_rate, info.id);
        Ok(info)
    }

    async fn connect(
        &self,
        baud_rate: u32,
        filter: &DeviceFilter,
    ) -> GnssConfResult<(SessionInfo, OpenedPort)> {
        let device = self.transport.request_device(filter).await?;
        debug!("Opening {}", device);

        let opened = self
            .transport
            .open(&device, baud_rate)
            .await
            .map_err(|e| match e {
                GnssConfError::OpenFailure { .. }
                | GnssConfError::UnsupportedPlatform
                | GnssConfError::DeviceSelectionCancelled => e,
                other => GnssConfError::open_failure(other),
            })?;

        Ok((SessionInfo::new(device, baud_rate), opened))
    }

    /// Release the session. Safe to call at any time, any number of times.
    pub async fn close(&self) {
        let mut slot = self.session.lock().await;
        let Some(mut session) = slot.take() else {
            debug!("close() without session");
            return;
        };

        self.set_state(ConnectionState::Disconnecting).await;

        session.read_pipe.shutdown().await;

        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.close().await {
                warn!("Failed to close write half: {}", e);
            }
        }

        if let Err(e) = session.port.close().await {
            warn!("Failed to close port: {}", e);
        }

        self.set_state(ConnectionState::Disconnected).await;
        info!("Disconnected from {}", session.info.device);
    }

    /// Write UTF-8 text to the device as is
    pub async fn write_text(&self, text: &str) -> GnssConfResult<()> {
        if !self.state().await.can_send() {
            return Err(GnssConfError::NotConnected);
        }

        let mut writer = self.writer.lock().await;
        let sink = writer.as_mut().ok_or(GnssConfError::NotConnected)?;
        sink.write_all(text.as_bytes()).await.map_err(|e| match e {
            GnssConfError::WriteFailure { .. } => e,
            other => GnssConfError::write_failure(other),
        })?;

        debug!("Sent {} bytes", text.len());
        Ok(())
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub async fn is_connected(&self) -> bool {
        self.state().await.can_send()
    }

    pub async fn session_info(&self) -> Option<SessionInfo> {
        self.session.lock().await.as_ref().map(|s| s.info.clone())
    }

    async fn set_state(&self, next: ConnectionState) {
        let mut state = self.state.write().await;
        debug!("Connection state {} -> {}", *state, next);
        *state = next;
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Ok(slot) = self.session.try_lock() {
            if let Some(session) = slot.as_ref() {
                warn!(
                    "Session {} dropped without close; port released on drop",
                    session.info.id
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::mock::MockTransport;

    #[tokio::test]
    async fn test_open_and_close() {
        let transport = Arc::new(MockTransport::new());
        let device = transport.device();
        let manager = SessionManager::new(transport);
        let (tx, _rx) = mpsc::unbounded_channel();

        let info = manager.open(115_200, &DeviceFilter::default(), tx).await.unwrap();
        assert_eq!(info.device.name, "/dev/mock0");
        assert_eq!(manager.state().await, ConnectionState::Connected);
        assert!(manager.session_info().await.is_some());

        manager.close().await;
        assert_eq!(manager.state().await, ConnectionState::Disconnected);
        assert!(manager.session_info().await.is_none());
        assert!(device.writer_closed());
        assert!(device.port_closed());
    }

    #[tokio::test]
    async fn test_second_open_rejected() {
        let manager = SessionManager::new(Arc::new(MockTransport::new()));
        let (tx, _rx) = mpsc::unbounded_channel();
        manager.open(115_200, &DeviceFilter::default(), tx.clone()).await.unwrap();

        let result = manager.open(115_200, &DeviceFilter::default(), tx).await;
        assert!(matches!(result, Err(GnssConfError::AlreadyConnected)));
        assert_eq!(manager.state().await, ConnectionState::Connected);
        manager.close().await;
    }

    #[tokio::test]
    async fn test_zero_baud_rejected() {
        let manager = SessionManager::new(Arc::new(MockTransport::new()));
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = manager.open(0, &DeviceFilter::default(), tx).await;
        assert!(matches!(result, Err(GnssConfError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_write_without_session() {
        let manager = SessionManager::new(Arc::new(MockTransport::new()));
        let result = manager.write_text("GPGGA\r\n").await;
        assert!(matches!(result, Err(GnssConfError::NotConnected)));
    }
}
