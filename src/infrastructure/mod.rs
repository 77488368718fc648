// Infrastructure module - External dependencies and adapters
pub mod config;
pub mod discovery;
pub mod fetch;
pub mod logging;
pub mod serial;
