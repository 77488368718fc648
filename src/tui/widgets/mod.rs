pub mod configs;
pub mod description;
pub mod help;
pub mod progress;
pub mod status;
pub mod terminal;
