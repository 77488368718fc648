// Core module - Session, batch transmission and line protocol
pub mod batch;
pub mod session;
pub mod text;
pub mod transport;
