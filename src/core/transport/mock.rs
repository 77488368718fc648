//! In-memory transport used by tests and dry runs.
//!
//! Writes are recorded, reads are fed through [`MockDevice::push_rx`], and
//! individual steps can be told to fail.

use super::{
    ByteSink, ByteSource, DeviceFilter, DeviceInfo, OpenedPort, PortHandle, Transport,
    CP210X_VENDOR_ID,
};
use crate::domain::error::{GnssConfError, GnssConfResult};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::time::Instant;

type RxItem = Result<Vec<u8>, String>;

#[derive(Default)]
struct MockState {
    writes: Vec<(Instant, Vec<u8>)>,
    rx: Option<mpsc::UnboundedSender<RxItem>>,
    open_count: usize,
    fail_open: Option<String>,
    fail_writes_after: Option<usize>,
    fail_writer_close: bool,
    fail_port_close: bool,
    writer_closed: bool,
    port_closed: bool,
    released: Vec<&'static str>,
}

/// Shared view on the simulated device
#[derive(Clone, Default)]
pub struct MockDevice {
    state: Arc<Mutex<MockState>>,
}

impl MockDevice {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Everything written so far, one entry per write call
    pub fn writes(&self) -> Vec<String> {
        self.lock()
            .writes
            .iter()
            .map(|(_, data)| String::from_utf8_lossy(data).into_owned())
            .collect()
    }

    pub fn write_times(&self) -> Vec<Instant> {
        self.lock().writes.iter().map(|(at, _)| *at).collect()
    }

    pub fn write_count(&self) -> usize {
        self.lock().writes.len()
    }

    /// Deliver bytes to the read pipe. Returns false when no port is open.
    pub fn push_rx(&self, data: &[u8]) -> bool {
        match &self.lock().rx {
            Some(rx) => rx.send(Ok(data.to_vec())).is_ok(),
            None => false,
        }
    }

    /// Make the next read fail
    pub fn fail_rx(&self, message: &str) -> bool {
        match &self.lock().rx {
            Some(rx) => rx.send(Err(message.to_string())).is_ok(),
            None => false,
        }
    }

    /// End the read stream
    pub fn end_rx(&self) {
        self.lock().rx = None;
    }

    pub fn open_count(&self) -> usize {
        self.lock().open_count
    }

    pub fn writer_closed(&self) -> bool {
        self.lock().writer_closed
    }

    pub fn port_closed(&self) -> bool {
        self.lock().port_closed
    }

    /// Order in which the reader, the writer and the port were released
    pub fn release_order(&self) -> Vec<&'static str> {
        self.lock().released.clone()
    }

    /// Fail every write once `count` writes succeeded
    pub fn fail_writes_after(&self, count: usize) {
        self.lock().fail_writes_after = Some(count);
    }
}

/// Transport backed by a [`MockDevice`]
pub struct MockTransport {
    available: bool,
    devices: Vec<DeviceInfo>,
    device: MockDevice,
}

impl MockTransport {
    /// One CP210x device at `/dev/mock0`
    pub fn new() -> Self {
        Self {
            available: true,
            devices: vec![DeviceInfo::named("/dev/mock0").with_usb_ids(CP210X_VENDOR_ID, 0xEA60)],
            device: MockDevice::default(),
        }
    }

    /// Platform without serial support
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub fn with_devices(mut self, devices: Vec<DeviceInfo>) -> Self {
        self.devices = devices;
        self
    }

    pub fn fail_open(self, message: &str) -> Self {
        self.device.lock().fail_open = Some(message.to_string());
        self
    }

    pub fn fail_writer_close(self) -> Self {
        self.device.lock().fail_writer_close = true;
        self
    }

    pub fn fail_port_close(self) -> Self {
        self.device.lock().fail_port_close = true;
        self
    }

    pub fn device(&self) -> MockDevice {
        self.device.clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn list_devices(&self, filter: &DeviceFilter) -> GnssConfResult<Vec<DeviceInfo>> {
        Ok(self
            .devices
            .iter()
            .filter(|device| filter.matches(device))
            .cloned()
            .collect())
    }

    async fn request_device(&self, filter: &DeviceFilter) -> GnssConfResult<DeviceInfo> {
        self.list_devices(filter)
            .await?
            .into_iter()
            .next()
            .ok_or(GnssConfError::DeviceSelectionCancelled)
    }

    async fn open(&self, _device: &DeviceInfo, _baud_rate: u32) -> GnssConfResult<OpenedPort> {
        let mut state = self.device.lock();
        if let Some(message) = &state.fail_open {
            return Err(GnssConfError::open_failure(message));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        state.rx = Some(tx);
        state.open_count += 1;
        state.writer_closed = false;
        state.port_closed = false;
        state.released.clear();
        drop(state);

        Ok(OpenedPort {
            reader: Box::new(MockReader {
                rx,
                device: self.device.clone(),
            }),
            writer: Box::new(MockWriter {
                device: self.device.clone(),
            }),
            port: Box::new(MockPort {
                device: self.device.clone(),
            }),
        })
    }
}

struct MockReader {
    rx: mpsc::UnboundedReceiver<RxItem>,
    device: MockDevice,
}

impl Drop for MockReader {
    fn drop(&mut self) {
        self.device.lock().released.push("reader");
    }
}

#[async_trait]
impl ByteSource for MockReader {
    async fn read(&mut self) -> GnssConfResult<Option<Vec<u8>>> {
        match self.rx.recv().await {
            Some(Ok(data)) => Ok(Some(data)),
            Some(Err(message)) => Err(GnssConfError::read_failure(message)),
            None => Ok(None),
        }
    }
}

struct MockWriter {
    device: MockDevice,
}

#[async_trait]
impl ByteSink for MockWriter {
    async fn write_all(&mut self, data: &[u8]) -> GnssConfResult<()> {
        let mut state = self.device.lock();
        if state.writer_closed || state.port_closed {
            return Err(GnssConfError::write_failure("stream closed"));
        }
        if let Some(limit) = state.fail_writes_after {
            if state.writes.len() >= limit {
                return Err(GnssConfError::write_failure("device unplugged"));
            }
        }
        state.writes.push((Instant::now(), data.to_vec()));
        Ok(())
    }

    async fn close(&mut self) -> GnssConfResult<()> {
        let mut state = self.device.lock();
        state.writer_closed = true;
        state.released.push("writer");
        if state.fail_writer_close {
            return Err(GnssConfError::write_failure("writer already errored"));
        }
        Ok(())
    }
}

struct MockPort {
    device: MockDevice,
}

#[async_trait]
impl PortHandle for MockPort {
    async fn close(&mut self) -> GnssConfResult<()> {
        let mut state = self.device.lock();
        state.rx = None;
        state.port_closed = true;
        state.released.push("port");
        if state.fail_port_close {
            return Err(GnssConfError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "port vanished",
            )));
        }
        Ok(())
    }
}
