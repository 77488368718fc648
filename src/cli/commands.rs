use crate::cli::args::{Args, Command, LinkArgs, SendArgs, SettingsCommand, SourceArgs};
use crate::cli::output::{ConfigDetail, ConsoleWriter, OutputWriter};
use crate::core::batch::{BatchEvent, BatchSender};
use crate::core::session::{SerialEvent, SessionManager};
use crate::core::text::{normalize_text, CommandBatch, ConfigDescription, LineTerminator};
use crate::core::transport::{DeviceFilter, Transport};
use crate::domain::config::{DiscoverySettings, GnssConfConfig};
use crate::domain::error::{GnssConfError, GnssConfResult};
use crate::infrastructure::config::ConfigManager;
use crate::infrastructure::discovery::{load_config, load_config_file, ConfigDiscovery};
use crate::infrastructure::fetch::{ConfigLocation, Fetcher, ResourceFetcher};
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::serial::{PromptPicker, SerialTransport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Execute CLI command
pub async fn execute_command(args: Args) -> GnssConfResult<()> {
    let writer = ConsoleWriter::new(args.output).quiet(args.quiet);

    let config_manager = ConfigManager::new()?;
    let config = load_settings(&config_manager, args.config.as_deref())?;

    // The TUI owns the terminal and sets up its own file logging
    if !matches!(args.command, Command::Tui(_)) {
        let level = if args.verbose {
            "debug"
        } else if args.quiet {
            "error"
        } else {
            config.global.log_level.as_str()
        };
        init_logging(level)?;
    }

    match args.command {
        Command::Ports { all } => {
            let transport = serial_transport(&config);
            let filter = if all {
                DeviceFilter::any()
            } else {
                DeviceFilter::new(config.serial.vendor_ids.clone())
            };
            let devices = transport.list_devices(&filter).await?;
            writer.write_devices(&devices)?;
            Ok(())
        }
        Command::Configs(source) => {
            let discovery = build_discovery(&apply_source(&config.discovery, &source))?;
            let discovered = discovery.discover().await?;
            writer.write_configs(&discovered)?;
            Ok(())
        }
        Command::Show { config: name, source } => {
            let loaded = resolve_config(&name, &apply_source(&config.discovery, &source)).await?;
            writer.write_config_detail(&ConfigDetail {
                name: loaded.name,
                location: loaded.location,
                description: ConfigDescription::extract(&loaded.text),
                commands: CommandBatch::from_text(&loaded.text).commands().to_vec(),
            })?;
            Ok(())
        }
        Command::Send(send) => execute_send(send, &writer, &config).await,
        Command::Save(save) => execute_save(save.link, &writer, &config).await,
        Command::Settings(settings) => {
            execute_settings_command(settings.command, &writer, &config, &config_manager)
        }
        Command::Tui(source) => {
            let discovery = apply_source(&config.discovery, &source);
            crate::tui::run(config, discovery).await
        }
        Command::Version => {
            writer.write_message(&format!("gnssconf {}", env!("CARGO_PKG_VERSION")))?;
            Ok(())
        }
    }
}

/// Settings from an explicit file, or merged global and project files
pub fn load_settings(manager: &ConfigManager, path: Option<&str>) -> GnssConfResult<GnssConfConfig> {
    match path {
        Some(path) => manager.load_config_from_path(Path::new(path)),
        None => manager.load_config(),
    }
}

fn apply_source(settings: &DiscoverySettings, source: &SourceArgs) -> DiscoverySettings {
    let mut settings = settings.clone();
    if let Some(base) = &source.base {
        settings.base = Some(base.clone());
    }
    if source.no_github {
        settings.github.enabled = false;
    }
    settings
}

pub fn build_discovery(settings: &DiscoverySettings) -> GnssConfResult<ConfigDiscovery> {
    let fetcher: Arc<dyn Fetcher> = Arc::new(ResourceFetcher::from_settings(settings)?);
    ConfigDiscovery::from_settings(settings, fetcher)
}

fn serial_transport(config: &GnssConfConfig) -> SerialTransport {
    SerialTransport::new(config.serial.clone(), Arc::new(PromptPicker))
}

/// A configuration text ready to send
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub name: String,
    pub location: String,
    pub text: String,
}

/// Resolve `-` (stdin), a URL, an existing file, or a discovered name
pub async fn resolve_config(
    reference: &str,
    settings: &DiscoverySettings,
) -> GnssConfResult<LoadedConfig> {
    if reference == "-" {
        let mut raw = String::new();
        tokio::io::stdin()
            .read_to_string(&mut raw)
            .await
            .map_err(|e| GnssConfError::load_failure("stdin", e))?;
        return Ok(LoadedConfig {
            name: "stdin".to_string(),
            location: "-".to_string(),
            text: normalize_text(&raw),
        });
    }

    let location = ConfigLocation::parse(reference)?;
    if location.is_remote() {
        let fetcher = ResourceFetcher::from_settings(settings)?;
        let text = load_config(&fetcher, &location).await?;
        return Ok(LoadedConfig {
            name: reference.rsplit('/').next().unwrap_or(reference).to_string(),
            location: location.to_string(),
            text,
        });
    }

    let path = PathBuf::from(reference);
    if path.is_file() {
        let text = load_config_file(&path).await?;
        return Ok(LoadedConfig {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| reference.to_string()),
            location: path.display().to_string(),
            text,
        });
    }

    let discovery = build_discovery(settings)?;
    let discovered = discovery.discover().await?;
    let entry = discovered
        .find(reference)
        .ok_or_else(|| GnssConfError::load_failure(reference, "no such configuration"))?;
    debug!("{} resolved to {} via {}", reference, entry.location, discovered.origin);

    let text = load_config(discovery.fetcher().as_ref(), &entry.location).await?;
    Ok(LoadedConfig {
        name: entry.file_name.clone(),
        location: entry.location.to_string(),
        text,
    })
}

/// Serial parameters after applying command line overrides
pub(crate) struct Link {
    pub(crate) baud_rate: u32,
    pub(crate) filter: DeviceFilter,
    pub(crate) terminator: LineTerminator,
}

pub(crate) fn resolve_link(config: &GnssConfConfig, link: &LinkArgs) -> GnssConfResult<Link> {
    let vendor_ids = if link.vendor_ids.is_empty() {
        config.serial.vendor_ids.clone()
    } else {
        link.vendor_ids.clone()
    };
    let port = link.port.clone().or_else(|| config.serial.port.clone());
    let terminator = link
        .eol
        .as_deref()
        .unwrap_or(&config.batch.terminator)
        .parse::<LineTerminator>()?;

    Ok(Link {
        baud_rate: link.baud.unwrap_or(config.serial.baud_rate),
        filter: DeviceFilter::new(vendor_ids).with_port(port),
        terminator,
    })
}

/// Print serial events until the read pipe stops
fn spawn_rx_printer(
    mut events: mpsc::UnboundedReceiver<SerialEvent>,
    writer: ConsoleWriter,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let done = !matches!(event, SerialEvent::Received { .. });
            if let Err(e) = writer.write_serial_event(&event) {
                debug!("Failed to print serial event: {}", e);
            }
            if done {
                break;
            }
        }
    })
}

fn spawn_batch_printer(
    mut events: mpsc::UnboundedReceiver<BatchEvent>,
    writer: ConsoleWriter,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let Err(e) = writer.write_batch_event(&event) {
                debug!("Failed to print batch event: {}", e);
            }
        }
    })
}

async fn open_session(
    config: &GnssConfConfig,
    link: &Link,
    writer: &ConsoleWriter,
) -> GnssConfResult<(Arc<SessionManager>, JoinHandle<()>)> {
    let transport: Arc<dyn Transport> = Arc::new(serial_transport(config));
    let session = Arc::new(SessionManager::new(transport));

    let (rx_tx, rx_rx) = mpsc::unbounded_channel();
    let info = session.open(link.baud_rate, &link.filter, rx_tx).await?;
    writer.write_message(&format!("Connected to {} at {} baud", info.device, info.baud_rate))?;

    Ok((session, spawn_rx_printer(rx_rx, writer.clone())))
}

/// Resolves on Ctrl+C, or never when the handler cannot be installed
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Keep reading for `settle`, or until Ctrl+C / end of stream when `listen`
async fn drain_rx(printer: &mut JoinHandle<()>, settle: Duration, listen: bool) {
    if listen {
        tokio::select! {
            _ = ctrl_c() => {}
            _ = &mut *printer => {}
        }
    } else {
        tokio::select! {
            _ = tokio::time::sleep(settle) => {}
            _ = &mut *printer => {}
        }
    }
}

async fn execute_send(
    args: SendArgs,
    writer: &ConsoleWriter,
    config: &GnssConfConfig,
) -> GnssConfResult<()> {
    let writer = writer.clone().hex(args.hex);
    let link = resolve_link(config, &args.link)?;
    let loaded = resolve_config(&args.config, &apply_source(&config.discovery, &args.source)).await?;

    let batch = CommandBatch::from_text(&loaded.text);
    if batch.is_empty() {
        return Err(GnssConfError::EmptyBatch);
    }
    let delay = args.delay.unwrap_or(config.batch.delay_secs);
    info!("Loaded {} ({} commands)", loaded.location, batch.len());

    let (session, mut rx_printer) = open_session(config, &link, &writer).await?;

    let (batch_tx, batch_rx) = mpsc::unbounded_channel();
    let batch_printer = spawn_batch_printer(batch_rx, writer.clone());
    let sender = BatchSender::new(Arc::clone(&session)).with_events(batch_tx);

    let outcome = sender
        .send_batch_until(&batch, delay, &link.terminator, ctrl_c())
        .await;

    let outcome = match outcome {
        Ok(report) if args.save => sender
            .send_save_config(&link.terminator)
            .await
            .map(|_| report),
        other => other,
    };

    if outcome.is_ok() {
        drain_rx(
            &mut rx_printer,
            Duration::from_millis(config.batch.settle_ms),
            args.listen,
        )
        .await;
    }

    session.close().await;
    drop(sender);
    let _ = batch_printer.await;
    rx_printer.abort();

    let report = outcome?;
    writer.write_message(&format!(
        "Sent {} command(s) in {:.1}s{}",
        report.sent,
        report.elapsed.as_secs_f64(),
        if args.save { ", configuration saved" } else { "" }
    ))?;
    Ok(())
}

async fn execute_save(
    link: LinkArgs,
    writer: &ConsoleWriter,
    config: &GnssConfConfig,
) -> GnssConfResult<()> {
    let link = resolve_link(config, &link)?;
    let (session, mut rx_printer) = open_session(config, &link, writer).await?;

    let result = BatchSender::new(Arc::clone(&session))
        .send_save_config(&link.terminator)
        .await;
    if result.is_ok() {
        drain_rx(&mut rx_printer, Duration::from_millis(config.batch.settle_ms), false).await;
    }

    session.close().await;
    rx_printer.abort();

    result?;
    writer.write_message("SAVECONFIG sent")?;
    Ok(())
}

fn execute_settings_command(
    command: SettingsCommand,
    writer: &ConsoleWriter,
    config: &GnssConfConfig,
    config_manager: &ConfigManager,
) -> GnssConfResult<()> {
    match command {
        SettingsCommand::Show => {
            writer.write_settings(config)?;
            Ok(())
        }
        SettingsCommand::Init { output, force } => {
            let path = match output {
                Some(output) => {
                    let path = PathBuf::from(output);
                    if path.exists() && !force {
                        return Err(GnssConfError::Config {
                            message: format!("Settings file already exists: {}", path.display()),
                        });
                    }
                    config_manager.save_config_to_path(&path, &GnssConfConfig::default())?;
                    path
                }
                None => config_manager.init_config(force)?,
            };
            writer.write_message(&format!("Settings written to {}", path.display()))?;
            Ok(())
        }
        SettingsCommand::Validate { file } => {
            let path = file
                .map(PathBuf::from)
                .unwrap_or_else(|| config_manager.get_global_config_path_ref().clone());
            let parsed = config_manager.load_config_from_path(&path)?;
            parsed.batch.terminator.parse::<LineTerminator>()?;
            if parsed.serial.baud_rate == 0 {
                return Err(GnssConfError::Config {
                    message: "serial.baud_rate must be positive".to_string(),
                });
            }
            writer.write_message(&format!("Settings file {} is valid", path.display()))?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_overrides() {
        let config = GnssConfConfig::default();
        let link = resolve_link(
            &config,
            &LinkArgs {
                port: Some("/dev/ttyACM0".to_string()),
                baud: Some(9600),
                vendor_ids: Vec::new(),
                eol: Some("lf".to_string()),
            },
        )
        .unwrap();

        assert_eq!(link.baud_rate, 9600);
        assert_eq!(link.filter.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(link.filter.vendor_ids, config.serial.vendor_ids);
        assert_eq!(link.terminator, LineTerminator::Lf);
    }

    #[test]
    fn test_link_defaults_and_bad_terminator() {
        let config = GnssConfConfig::default();
        let link = resolve_link(&config, &LinkArgs::default()).unwrap();
        assert_eq!(link.baud_rate, 115_200);
        assert_eq!(link.terminator, LineTerminator::CrLf);

        let bad = LinkArgs {
            eol: Some("eval()".to_string()),
            ..LinkArgs::default()
        };
        assert!(matches!(
            resolve_link(&config, &bad),
            Err(GnssConfError::InvalidTerminator(_))
        ));
    }

    #[test]
    fn test_apply_source() {
        let settings = apply_source(
            &DiscoverySettings::default(),
            &SourceArgs {
                base: Some("https://example.org/site".to_string()),
                no_github: true,
            },
        );
        assert_eq!(settings.base.as_deref(), Some("https://example.org/site"));
        assert!(!settings.github.enabled);
    }

    #[tokio::test]
    async fn test_resolve_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rover.txt");
        std::fs::write(&path, "#title: Rover\r\nMODE ROVER\r\n").unwrap();

        let loaded = resolve_config(path.to_str().unwrap(), &DiscoverySettings::default())
            .await
            .unwrap();
        assert_eq!(loaded.name, "rover.txt");
        assert_eq!(loaded.text, "#title: Rover\nMODE ROVER\n");
    }

    #[tokio::test]
    async fn test_resolve_by_name_in_local_folder() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("conf_files");
        std::fs::create_dir(&conf).unwrap();
        std::fs::write(conf.join("um980_base.cfg"), "MODE BASE\n").unwrap();

        let settings = DiscoverySettings {
            base: Some(dir.path().display().to_string()),
            github: crate::domain::config::GitHubSettings {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        };
        let loaded = resolve_config("um980 base", &settings).await.unwrap();
        assert_eq!(loaded.name, "um980_base.cfg");
        assert_eq!(loaded.text, "MODE BASE\n");
    }
}
