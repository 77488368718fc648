// Session module - Serial session lifecycle
pub mod manager;
pub mod pipe;
pub mod state;

pub use manager::SessionManager;
pub use state::{ConnectionState, SerialEvent, SessionInfo};
