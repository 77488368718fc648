use crate::cli::args::OutputFormat;
use crate::core::batch::BatchEvent;
use crate::core::session::SerialEvent;
use crate::core::text::{escape_controls, ConfigDescription};
use crate::core::transport::DeviceInfo;
use crate::domain::config::GnssConfConfig;
use crate::infrastructure::discovery::{ConfigEntry, Discovered};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::io::{self, Write};
use tabled::{Table, Tabled};

/// Output writer trait for different formats
pub trait OutputWriter {
    fn write_devices(&self, devices: &[DeviceInfo]) -> Result<(), OutputError>;
    fn write_configs(&self, discovered: &Discovered) -> Result<(), OutputError>;
    fn write_config_detail(&self, detail: &ConfigDetail) -> Result<(), OutputError>;
    fn write_settings(&self, config: &GnssConfConfig) -> Result<(), OutputError>;
    fn write_batch_event(&self, event: &BatchEvent) -> Result<(), OutputError>;
    fn write_serial_event(&self, event: &SerialEvent) -> Result<(), OutputError>;
    fn write_message(&self, message: &str) -> Result<(), OutputError>;
    fn write_error(&self, error: &str) -> Result<(), OutputError>;
}

/// Output formatting errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("TOML serialization error: {0}")]
    TomlError(#[from] toml::ser::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl From<OutputError> for crate::domain::error::GnssConfError {
    fn from(err: OutputError) -> Self {
        Self::Output(err.to_string())
    }
}

/// A configuration as shown by `show`
#[derive(Debug, Clone, Serialize)]
pub struct ConfigDetail {
    pub name: String,
    pub location: String,
    pub description: Option<ConfigDescription>,
    pub commands: Vec<String>,
}

/// Wall-clock stamp used in terminal logs
pub fn clock_stamp(at: DateTime<Local>) -> String {
    at.format("%H:%M:%S%.3f").to_string()
}

/// One line of the batch log, without trailing newline
pub fn format_batch_event(event: &BatchEvent) -> String {
    match event {
        BatchEvent::Started { total, delay_secs } => {
            format!("▶️ Sending {} command(s), delay {}s…", total, delay_secs)
        }
        BatchEvent::CommandSent {
            index, total, wire, ..
        } => format!(
            "→ [{}/{}] {}",
            index,
            total,
            wire.trim_end_matches(['\r', '\n'])
        ),
        BatchEvent::Completed { .. } => "✅ Batch completed.".to_string(),
        BatchEvent::Failed { error, .. } => format!("✗ Send interrupted: {}", error),
    }
}

/// Console output writer
#[derive(Debug, Clone)]
pub struct ConsoleWriter {
    format: OutputFormat,
    quiet: bool,
    hex: bool,
}

impl ConsoleWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            quiet: false,
            hex: false,
        }
    }

    /// Drop informational messages; data and errors still go out
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Render received bytes as hex
    pub fn hex(mut self, hex: bool) -> Self {
        self.hex = hex;
        self
    }

    fn json_line<T: Serialize>(&self, value: &T) -> Result<(), OutputError> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", serde_json::to_string(value)?)?;
        stdout.flush()?;
        Ok(())
    }
}

impl OutputWriter for ConsoleWriter {
    fn write_devices(&self, devices: &[DeviceInfo]) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => {
                if devices.is_empty() {
                    println!("No serial device found");
                }
                for device in devices {
                    println!("{}", device);
                    if let Some(manufacturer) = &device.manufacturer {
                        println!("  Manufacturer: {}", manufacturer);
                    }
                    if let Some(serial) = &device.serial_number {
                        println!("  Serial: {}", serial);
                    }
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(devices)?);
            }
            OutputFormat::Table => {
                if !devices.is_empty() {
                    let rows: Vec<DeviceTableRow> = devices.iter().map(DeviceTableRow::from).collect();
                    println!("{}", Table::new(rows));
                }
            }
            OutputFormat::Csv => {
                println!("port,vendor_id,product_id,manufacturer,product");
                for device in devices.iter().map(DeviceTableRow::from) {
                    println!(
                        "{},{},{},{},{}",
                        device.port, device.vid, device.pid, device.manufacturer, device.product
                    );
                }
            }
        }
        Ok(())
    }

    fn write_configs(&self, discovered: &Discovered) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => {
                if !self.quiet {
                    println!("Configurations ({}):", discovered.origin);
                }
                for entry in &discovered.entries {
                    println!("  {:<32} {}", entry.label, entry.file_name);
                }
            }
            OutputFormat::Json => {
                let rows: Vec<ConfigRow> = discovered
                    .entries
                    .iter()
                    .map(|entry| ConfigRow::new(entry, &discovered.origin.to_string()))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            }
            OutputFormat::Table => {
                if !discovered.entries.is_empty() {
                    let rows: Vec<ConfigRow> = discovered
                        .entries
                        .iter()
                        .map(|entry| ConfigRow::new(entry, &discovered.origin.to_string()))
                        .collect();
                    println!("{}", Table::new(rows));
                }
            }
            OutputFormat::Csv => {
                println!("label,file,location,source");
                for entry in &discovered.entries {
                    println!(
                        "{},{},{},{}",
                        entry.label, entry.file_name, entry.location, discovered.origin
                    );
                }
            }
        }
        Ok(())
    }

    fn write_config_detail(&self, detail: &ConfigDetail) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text | OutputFormat::Table => {
                println!("{} ({})", detail.name, detail.location);
                if let Some(description) = &detail.description {
                    if let Some(title) = &description.title {
                        println!("  {}", title);
                    }
                    for line in &description.details {
                        println!("  {}", line);
                    }
                }
                println!("  {} command(s):", detail.commands.len());
                for (i, command) in detail.commands.iter().enumerate() {
                    println!("  {:>4}  {}", i + 1, command);
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(detail)?);
            }
            OutputFormat::Csv => {
                println!("index,command");
                for (i, command) in detail.commands.iter().enumerate() {
                    println!("{},\"{}\"", i + 1, command.replace('"', "\"\""));
                }
            }
        }
        Ok(())
    }

    fn write_settings(&self, config: &GnssConfConfig) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
            _ => print!("{}", toml::to_string_pretty(config)?),
        }
        Ok(())
    }

    fn write_batch_event(&self, event: &BatchEvent) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => self.json_line(event),
            _ => {
                if matches!(event, BatchEvent::Failed { .. }) {
                    eprintln!("{}", format_batch_event(event));
                } else if !self.quiet {
                    println!("{}", format_batch_event(event));
                }
                Ok(())
            }
        }
    }

    fn write_serial_event(&self, event: &SerialEvent) -> Result<(), OutputError> {
        if self.format == OutputFormat::Json {
            let stamped = serde_json::json!({
                "time": clock_stamp(Local::now()),
                "data": event,
            });
            return self.json_line(&stamped);
        }

        match event {
            SerialEvent::Received { text, raw } => {
                let mut stdout = io::stdout().lock();
                if self.hex {
                    writeln!(stdout, "← RX: {}", hex::encode_upper(raw))?;
                } else {
                    write!(stdout, "{}", text)?;
                }
                stdout.flush()?;
            }
            SerialEvent::ReadError(message) => eprintln!("Read error: {}", message),
            SerialEvent::ReadClosed => {
                if !self.quiet {
                    eprintln!("Device closed the stream");
                }
            }
        }
        Ok(())
    }

    fn write_message(&self, message: &str) -> Result<(), OutputError> {
        if self.quiet {
            return Ok(());
        }
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "message": message,
                    "level": "info"
                });
                println!("{}", serde_json::to_string(&output)?);
            }
            _ => {
                println!("{}", message);
            }
        }
        Ok(())
    }

    fn write_error(&self, error: &str) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "error": error,
                    "level": "error"
                });
                eprintln!("{}", serde_json::to_string(&output)?);
            }
            _ => {
                eprintln!("Error: {}", error);
            }
        }
        Ok(())
    }
}

/// Table row for a serial device
#[derive(Tabled)]
struct DeviceTableRow {
    port: String,
    vid: String,
    pid: String,
    manufacturer: String,
    product: String,
}

impl From<&DeviceInfo> for DeviceTableRow {
    fn from(device: &DeviceInfo) -> Self {
        Self {
            port: device.name.clone(),
            vid: device.vendor_id.map(|v| format!("{:04x}", v)).unwrap_or_default(),
            pid: device.product_id.map(|p| format!("{:04x}", p)).unwrap_or_default(),
            manufacturer: device.manufacturer.clone().unwrap_or_default(),
            product: device.product.clone().unwrap_or_default(),
        }
    }
}

/// Table row for a discovered configuration
#[derive(Tabled, Serialize)]
struct ConfigRow {
    label: String,
    file: String,
    location: String,
    source: String,
}

impl ConfigRow {
    fn new(entry: &ConfigEntry, source: &str) -> Self {
        Self {
            label: entry.label.clone(),
            file: entry.file_name.clone(),
            location: entry.location.to_string(),
            source: source.to_string(),
        }
    }
}

/// Sent command as shown in terminal logs, terminator made visible
pub fn format_tx(wire: &str) -> String {
    format!("→ TX: {}", escape_controls(wire))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_batch_log_lines() {
        assert_eq!(
            format_batch_event(&BatchEvent::Started {
                total: 3,
                delay_secs: 5.0
            }),
            "▶️ Sending 3 command(s), delay 5s…"
        );
        assert_eq!(
            format_batch_event(&BatchEvent::CommandSent {
                index: 2,
                total: 3,
                preview: "MODE ROVER".into(),
                wire: "MODE ROVER\r\n".into(),
            }),
            "→ [2/3] MODE ROVER"
        );
        assert_eq!(
            format_batch_event(&BatchEvent::Failed {
                index: 2,
                total: 3,
                error: "Not connected".into(),
            }),
            "✗ Send interrupted: Not connected"
        );
    }

    #[test]
    fn test_clock_stamp() {
        let at = Local.with_ymd_and_hms(2024, 5, 1, 9, 4, 7).unwrap();
        assert_eq!(clock_stamp(at), "09:04:07.000");
    }

    #[test]
    fn test_tx_shows_terminator() {
        assert_eq!(format_tx("GPGGA 1\r\n"), "→ TX: GPGGA 1\\r\\n");
    }

    #[test]
    fn test_device_row() {
        let device = DeviceInfo::named("/dev/ttyUSB0").with_usb_ids(0x1A86, 0x7523);
        let row = DeviceTableRow::from(&device);
        assert_eq!(row.vid, "1a86");
        assert_eq!(row.pid, "7523");
        assert_eq!(row.product, "");
    }
}
