use thiserror::Error;

/// gnssconf unified error type
#[derive(Error, Debug)]
pub enum GnssConfError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serial transport not supported on this platform")]
    UnsupportedPlatform,

    #[error("Device selection cancelled")]
    DeviceSelectionCancelled,

    #[error("Failed to open serial port: {message}")]
    OpenFailure { message: String },

    #[error("Write error: {message}")]
    WriteFailure { message: String },

    #[error("Read error: {message}")]
    ReadFailure { message: String },

    #[error("Not connected")]
    NotConnected,

    #[error("A device is already connected")]
    AlreadyConnected,

    #[error("Sending already in progress")]
    ConcurrentSendRejected,

    #[error("Interrupted")]
    Interrupted,

    #[error("No valid command in configuration")]
    EmptyBatch,

    #[error("Unknown line terminator: {0}")]
    InvalidTerminator(String),

    #[error("Unable to load {location}: {message}")]
    ConfigLoadFailure { location: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error("TUI error: {0}")]
    Tui(String),
}

impl GnssConfError {
    /// Errors the operator caused on purpose and that need no report.
    pub fn is_silent(&self) -> bool {
        matches!(self, GnssConfError::DeviceSelectionCancelled)
    }

    pub(crate) fn open_failure(err: impl std::fmt::Display) -> Self {
        Self::OpenFailure {
            message: err.to_string(),
        }
    }

    pub(crate) fn write_failure(err: impl std::fmt::Display) -> Self {
        Self::WriteFailure {
            message: err.to_string(),
        }
    }

    pub(crate) fn read_failure(err: impl std::fmt::Display) -> Self {
        Self::ReadFailure {
            message: err.to_string(),
        }
    }

    pub(crate) fn load_failure(location: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        Self::ConfigLoadFailure {
            location: location.to_string(),
            message: err.to_string(),
        }
    }
}

pub type GnssConfResult<T> = Result<T, GnssConfError>;
