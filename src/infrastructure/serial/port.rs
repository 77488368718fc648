use crate::core::transport::{
    ByteSink, ByteSource, DeviceFilter, DeviceInfo, DevicePicker, OpenedPort, PortHandle, Transport,
};
use crate::domain::config::{FlowControlConfig, ParityConfig, SerialSettings};
use crate::domain::error::{GnssConfError, GnssConfResult};
use async_trait::async_trait;
use serialport::{SerialPort, SerialPortBuilder, SerialPortType};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

const READ_BUFFER_SIZE: usize = 1024;

type RxItem = Result<Vec<u8>, String>;

/// Transport over the platform serial ports
pub struct SerialTransport {
    settings: SerialSettings,
    picker: Arc<dyn DevicePicker>,
}

impl SerialTransport {
    pub fn new(settings: SerialSettings, picker: Arc<dyn DevicePicker>) -> Self {
        Self { settings, picker }
    }

    fn builder(&self, device: &DeviceInfo, baud_rate: u32) -> GnssConfResult<SerialPortBuilder> {
        let data_bits = match self.settings.data_bits {
            5 => serialport::DataBits::Five,
            6 => serialport::DataBits::Six,
            7 => serialport::DataBits::Seven,
            8 => serialport::DataBits::Eight,
            other => {
                return Err(GnssConfError::Config {
                    message: format!("Invalid data bits: {}", other),
                })
            }
        };

        let stop_bits = match self.settings.stop_bits {
            1 => serialport::StopBits::One,
            2 => serialport::StopBits::Two,
            other => {
                return Err(GnssConfError::Config {
                    message: format!("Invalid stop bits: {}", other),
                })
            }
        };

        let parity = match self.settings.parity {
            ParityConfig::None => serialport::Parity::None,
            ParityConfig::Even => serialport::Parity::Even,
            ParityConfig::Odd => serialport::Parity::Odd,
        };

        let flow_control = match self.settings.flow_control {
            FlowControlConfig::None => serialport::FlowControl::None,
            FlowControlConfig::Software => serialport::FlowControl::Software,
            FlowControlConfig::Hardware => serialport::FlowControl::Hardware,
        };

        Ok(serialport::new(&device.name, baud_rate)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(parity)
            .flow_control(flow_control)
            .timeout(Duration::from_millis(self.settings.read_timeout_ms.max(1))))
    }
}

fn device_info(port: serialport::SerialPortInfo) -> DeviceInfo {
    let mut device = DeviceInfo::named(port.port_name);
    if let SerialPortType::UsbPort(usb) = port.port_type {
        device = device.with_usb_ids(usb.vid, usb.pid);
        device.manufacturer = usb.manufacturer;
        device.product = usb.product;
        device.serial_number = usb.serial_number;
    }
    device
}

#[async_trait]
impl Transport for SerialTransport {
    fn is_available(&self) -> bool {
        cfg!(any(unix, windows))
    }

    async fn list_devices(&self, filter: &DeviceFilter) -> GnssConfResult<Vec<DeviceInfo>> {
        let enumerated = tokio::task::spawn_blocking(serialport::available_ports)
            .await
            .map_err(|e| GnssConfError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        let ports = match enumerated {
            Ok(ports) => ports,
            Err(e) if filter.port.is_some() => {
                warn!("Port enumeration failed: {}", e);
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        let mut devices: Vec<DeviceInfo> = ports
            .into_iter()
            .map(device_info)
            .filter(|device| filter.matches(device))
            .collect();

        // Explicit ports are accepted even when enumeration misses them
        if let Some(port) = &filter.port {
            if devices.is_empty() {
                devices.push(DeviceInfo::named(port.clone()));
            }
        }

        debug!("{} matching serial device(s)", devices.len());
        Ok(devices)
    }

    async fn request_device(&self, filter: &DeviceFilter) -> GnssConfResult<DeviceInfo> {
        let candidates = self.list_devices(filter).await?;
        if candidates.is_empty() {
            info!("No serial device matches the filter");
            return Err(GnssConfError::DeviceSelectionCancelled);
        }

        let picker = Arc::clone(&self.picker);
        tokio::task::spawn_blocking(move || picker.pick(&candidates))
            .await
            .map_err(|e| GnssConfError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
            .ok_or(GnssConfError::DeviceSelectionCancelled)
    }

    async fn open(&self, device: &DeviceInfo, baud_rate: u32) -> GnssConfResult<OpenedPort> {
        let builder = self.builder(device, baud_rate)?;
        let port = tokio::task::spawn_blocking(move || builder.open())
            .await
            .map_err(GnssConfError::open_failure)?
            .map_err(GnssConfError::open_failure)?;

        let read_port = port.try_clone().map_err(GnssConfError::open_failure)?;
        let write_port = port.try_clone().map_err(GnssConfError::open_failure)?;

        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::unbounded_channel();
        let thread = spawn_reader(read_port, Arc::clone(&stop), tx)?;

        info!("Serial port {} opened at {} baud", device.name, baud_rate);

        Ok(OpenedPort {
            reader: Box::new(SerialReader { rx }),
            writer: Box::new(SerialWriter {
                port: Some(write_port),
            }),
            port: Box::new(SerialPortHandle {
                port: Some(port),
                stop,
                thread: Some(thread),
            }),
        })
    }
}

fn spawn_reader(
    mut port: Box<dyn SerialPort>,
    stop: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<RxItem>,
) -> GnssConfResult<JoinHandle<()>> {
    let thread = std::thread::Builder::new()
        .name("gnssconf-serial-rx".to_string())
        .spawn(move || {
            let mut buffer = vec![0u8; READ_BUFFER_SIZE];
            while !stop.load(Ordering::Acquire) {
                match port.read(&mut buffer) {
                    Ok(0) => continue,
                    Ok(n) => {
                        if tx.send(Ok(buffer[..n].to_vec())).is_err() {
                            break;
                        }
                    }
                    Err(ref e)
                        if matches!(
                            e.kind(),
                            std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
                        ) =>
                    {
                        continue;
                    }
                    Err(e) => {
                        error!("Failed to read from serial port: {}", e);
                        let _ = tx.send(Err(e.to_string()));
                        break;
                    }
                }
            }
        })?;
    Ok(thread)
}

struct SerialReader {
    rx: mpsc::UnboundedReceiver<RxItem>,
}

#[async_trait]
impl ByteSource for SerialReader {
    async fn read(&mut self) -> GnssConfResult<Option<Vec<u8>>> {
        match self.rx.recv().await {
            Some(Ok(data)) => Ok(Some(data)),
            Some(Err(message)) => Err(GnssConfError::read_failure(message)),
            None => Ok(None),
        }
    }
}

struct SerialWriter {
    port: Option<Box<dyn SerialPort>>,
}

impl SerialWriter {
    /// Run `op` on the blocking pool and hand the port back afterwards
    async fn blocking<F>(&mut self, op: F) -> GnssConfResult<()>
    where
        F: FnOnce(&mut Box<dyn SerialPort>) -> std::io::Result<()> + Send + 'static,
    {
        let mut port = self
            .port
            .take()
            .ok_or_else(|| GnssConfError::write_failure("write half closed"))?;

        let (port, result) = tokio::task::spawn_blocking(move || {
            let result = op(&mut port);
            (port, result)
        })
        .await
        .map_err(GnssConfError::write_failure)?;

        self.port = Some(port);
        result.map_err(GnssConfError::write_failure)
    }
}

#[async_trait]
impl ByteSink for SerialWriter {
    async fn write_all(&mut self, data: &[u8]) -> GnssConfResult<()> {
        let data = data.to_vec();
        self.blocking(move |port| port.write_all(&data).and_then(|_| port.flush()))
            .await
    }

    async fn close(&mut self) -> GnssConfResult<()> {
        if self.port.is_none() {
            return Ok(());
        }
        let flushed = self.blocking(|port| port.flush()).await;
        self.port = None;
        flushed
    }
}

struct SerialPortHandle {
    port: Option<Box<dyn SerialPort>>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

#[async_trait]
impl PortHandle for SerialPortHandle {
    async fn close(&mut self) -> GnssConfResult<()> {
        self.stop.store(true, Ordering::Release);

        if let Some(thread) = self.thread.take() {
            let joined = tokio::task::spawn_blocking(move || thread.join()).await;
            if !matches!(joined, Ok(Ok(()))) {
                warn!("Serial receive thread did not exit cleanly");
            }
        }

        if let Some(port) = self.port.take() {
            debug!("Releasing {}", port.name().unwrap_or_default());
        }
        Ok(())
    }
}

impl Drop for SerialPortHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}
