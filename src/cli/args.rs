use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Command line arguments for gnssconf
#[derive(Parser, Debug)]
#[command(
    name = "gnssconf",
    version = env!("CARGO_PKG_VERSION"),
    about = "Stream configuration files to GNSS/RTK receivers over a serial link",
    long_about = "Pick or supply a text configuration (one receiver command per line), send it to a GNSS receiver at a controlled pace and watch the echoed responses."
)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Settings file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    pub output: OutputFormat,

    /// Command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List serial ports
    Ports {
        /// Include ports outside the USB vendor filter
        #[arg(short, long)]
        all: bool,
    },
    /// List available configuration files
    Configs(SourceArgs),
    /// Print a configuration with its description and commands
    Show {
        /// Configuration name, file path, URL, or `-` for stdin
        config: String,
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Send a configuration to the receiver
    Send(SendArgs),
    /// Send SAVECONFIG to the receiver
    Save(SaveArgs),
    /// Interactive TUI mode
    Tui(SourceArgs),
    /// Settings file management
    Settings(SettingsArgs),
    /// Display version information
    Version,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
    /// Table output
    Table,
    /// CSV output
    Csv,
}

/// Where configurations are discovered
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Base URL or directory holding the configuration folder
    #[arg(short, long)]
    pub base: Option<String>,

    /// Skip the GitHub fallback
    #[arg(long)]
    pub no_github: bool,
}

/// Serial link options
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct LinkArgs {
    /// Serial port path; bypasses the USB vendor filter
    #[arg(short, long)]
    pub port: Option<String>,

    /// Baud rate
    #[arg(short = 'B', long)]
    pub baud: Option<u32>,

    /// Accepted USB vendor ID in hex (repeatable)
    #[arg(long = "vendor-id", value_parser = parse_vendor_id)]
    pub vendor_ids: Vec<u16>,

    /// Line terminator: LF, CRLF, CR, NONE, or escapes like "\r\n"
    #[arg(short, long)]
    pub eol: Option<String>,
}

/// Arguments of `send`
#[derive(ClapArgs, Debug)]
pub struct SendArgs {
    /// Configuration name, file path, URL, or `-` for stdin
    pub config: String,

    #[command(flatten)]
    pub link: LinkArgs,

    #[command(flatten)]
    pub source: SourceArgs,

    /// Seconds to wait between two commands
    #[arg(short, long)]
    pub delay: Option<f64>,

    /// Send SAVECONFIG once the batch completed
    #[arg(short, long)]
    pub save: bool,

    /// Keep printing received data after the batch until Ctrl+C
    #[arg(short, long)]
    pub listen: bool,

    /// Show received bytes as hex
    #[arg(long)]
    pub hex: bool,
}

/// Arguments of `save`
#[derive(ClapArgs, Debug)]
pub struct SaveArgs {
    #[command(flatten)]
    pub link: LinkArgs,
}

/// Settings management arguments
#[derive(ClapArgs, Debug)]
pub struct SettingsArgs {
    /// Settings subcommand
    #[command(subcommand)]
    pub command: SettingsCommand,
}

/// Settings management subcommands
#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    /// Show effective settings
    Show,
    /// Create a default settings file
    Init {
        /// Output file path
        #[arg(short, long)]
        output: Option<String>,
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Validate a settings file
    Validate {
        /// Settings file path
        file: Option<String>,
    },
}

fn parse_vendor_id(raw: &str) -> Result<u16, String> {
    let digits = raw
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X");
    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid vendor ID '{}': {}", raw, e))
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Text
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}
