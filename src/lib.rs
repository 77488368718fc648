//! gnssconf library
//!
//! Streams text configuration files to GNSS/RTK receivers over a serial
//! link: device selection, paced batch transmission, configuration
//! discovery and the echoed receiver output.

pub mod cli;
pub mod core;
pub mod domain;
pub mod infrastructure;
pub mod tui;

pub use core::batch::{BatchEvent, BatchSender};
pub use core::session::{ConnectionState, SerialEvent, SessionManager};
pub use core::text::{CommandBatch, LineTerminator};
pub use domain::config::GnssConfConfig;
pub use domain::error::{GnssConfError, GnssConfResult};
