//! Serial transport capability
//!
//! The session manager only sees these traits. A transport selects a device,
//! opens it and hands back three independently owned pieces: a byte source
//! for the read pipe, a byte sink for the write pipe and the port handle
//! that finally releases the device.

pub mod mock;

use crate::domain::error::GnssConfResult;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

/// FTDI USB-serial bridges
pub const FTDI_VENDOR_ID: u16 = 0x0403;
/// Silicon Labs CP210x bridges
pub const CP210X_VENDOR_ID: u16 = 0x10C4;
/// WCH CH340 bridges
pub const CH340_VENDOR_ID: u16 = 0x1A86;

/// Vendor IDs accepted when no filter is configured
pub const DEFAULT_VENDOR_IDS: [u16; 3] = [FTDI_VENDOR_ID, CP210X_VENDOR_ID, CH340_VENDOR_ID];

/// Serial device as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub name: String,
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
}

impl DeviceInfo {
    /// Device known only by its port path
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vendor_id: None,
            product_id: None,
            manufacturer: None,
            product: None,
            serial_number: None,
        }
    }

    pub fn with_usb_ids(mut self, vendor_id: u16, product_id: u16) -> Self {
        self.vendor_id = Some(vendor_id);
        self.product_id = Some(product_id);
        self
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let (Some(vid), Some(pid)) = (self.vendor_id, self.product_id) {
            write!(f, " [{:04x}:{:04x}]", vid, pid)?;
        }
        if let Some(product) = &self.product {
            write!(f, " {}", product)?;
        }
        Ok(())
    }
}

/// Which devices may be offered for selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceFilter {
    /// Accepted USB vendor IDs; empty accepts any device
    pub vendor_ids: Vec<u16>,
    /// Explicit port path, bypassing the vendor check
    pub port: Option<String>,
}

impl DeviceFilter {
    pub fn new(vendor_ids: Vec<u16>) -> Self {
        Self {
            vendor_ids,
            port: None,
        }
    }

    /// Accept every device
    pub fn any() -> Self {
        Self::new(Vec::new())
    }

    pub fn with_port(mut self, port: Option<String>) -> Self {
        self.port = port;
        self
    }

    pub fn matches(&self, device: &DeviceInfo) -> bool {
        if let Some(port) = &self.port {
            return &device.name == port;
        }
        if self.vendor_ids.is_empty() {
            return true;
        }
        device
            .vendor_id
            .map_or(false, |vid| self.vendor_ids.contains(&vid))
    }
}

impl Default for DeviceFilter {
    fn default() -> Self {
        Self::new(DEFAULT_VENDOR_IDS.to_vec())
    }
}

/// Read half of an open port.
///
/// `read` must be cancel-safe: the read loop races it against the
/// cancellation signal.
#[async_trait]
pub trait ByteSource: Send {
    /// Next chunk of bytes, `None` at end of stream.
    async fn read(&mut self) -> GnssConfResult<Option<Vec<u8>>>;
}

/// Write half of an open port
#[async_trait]
pub trait ByteSink: Send {
    async fn write_all(&mut self, data: &[u8]) -> GnssConfResult<()>;

    /// Flush and stop accepting writes.
    async fn close(&mut self) -> GnssConfResult<()>;
}

/// Ownership of the underlying device
#[async_trait]
pub trait PortHandle: Send {
    async fn close(&mut self) -> GnssConfResult<()>;
}

/// Pieces of a freshly opened port
pub struct OpenedPort {
    pub reader: Box<dyn ByteSource>,
    pub writer: Box<dyn ByteSink>,
    pub port: Box<dyn PortHandle>,
}

/// Chooses one device among the candidates matching a filter.
/// Returning `None` means the operator cancelled the choice.
pub trait DevicePicker: Send + Sync {
    fn pick(&self, candidates: &[DeviceInfo]) -> Option<DeviceInfo>;
}

/// Picks the first candidate without asking
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstMatchPicker;

impl DevicePicker for FirstMatchPicker {
    fn pick(&self, candidates: &[DeviceInfo]) -> Option<DeviceInfo> {
        candidates.first().cloned()
    }
}

/// Platform serial capability
#[async_trait]
pub trait Transport: Send + Sync {
    /// Whether serial access exists at all on this platform
    fn is_available(&self) -> bool;

    /// Devices currently present that match the filter
    async fn list_devices(&self, filter: &DeviceFilter) -> GnssConfResult<Vec<DeviceInfo>>;

    /// Let the operator choose a device matching the filter
    async fn request_device(&self, filter: &DeviceFilter) -> GnssConfResult<DeviceInfo>;

    /// Open the device at the given baud rate
    async fn open(&self, device: &DeviceInfo, baud_rate: u32) -> GnssConfResult<OpenedPort>;
}
