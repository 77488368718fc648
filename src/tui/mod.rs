// TUI module - Terminal User Interface

pub mod app;
pub mod event;
pub mod state;
pub mod ui;
pub mod widgets;

use crate::domain::config::{DiscoverySettings, GnssConfConfig};
use crate::domain::error::GnssConfResult;
use crate::infrastructure::logging::{init_file_logging, tui_log_path};

/// Run the interactive interface until the operator quits
pub async fn run(config: GnssConfConfig, discovery: DiscoverySettings) -> GnssConfResult<()> {
    // stderr belongs to the alternate screen; log to a file instead
    init_file_logging(&tui_log_path(), &config.global.log_level)?;

    let mut app = app::App::new(config, discovery)?;
    app.run().await
}
