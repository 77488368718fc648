// Serial module - Platform serial transport
pub mod picker;
pub mod port;

pub use picker::PromptPicker;
pub use port::SerialTransport;
