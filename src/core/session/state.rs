use crate::core::transport::DeviceInfo;
use chrono::{DateTime, Local};
use serde::Serialize;
use uuid::Uuid;

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    /// No session
    Disconnected,
    /// Device selection and open in progress
    Connecting,
    /// Session open, read pipe running
    Connected,
    /// Cleanup in progress
    Disconnecting,
}

impl ConnectionState {
    /// Sending is only permitted on an established session
    pub fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState::Disconnected
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Disconnecting => write!(f, "Disconnecting"),
        }
    }
}

/// Details of the open session
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub device: DeviceInfo,
    pub baud_rate: u32,
    pub opened_at: DateTime<Local>,
}

impl SessionInfo {
    pub fn new(device: DeviceInfo, baud_rate: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            device,
            baud_rate,
            opened_at: Local::now(),
        }
    }
}

/// What the read pipe reports to its sink
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SerialEvent {
    /// Decoded text along with the bytes it came from
    Received { text: String, raw: Vec<u8> },
    /// The read half failed; the pipe has stopped
    ReadError(String),
    /// The device ended the stream
    ReadClosed,
}
