//! Serial transport layer
//!
//! Provides the byte-stream seam between the session and the physical
//! serial port. The `SerialLink` trait is the unit-test boundary; the
//! `SerialPortLink` implementation talks to real hardware via the
//! `serialport` crate.
//!
//! Also provides port discovery: enumeration of candidate plotter ports
//! with USB metadata, returned as a result instead of being guessed.

use plotkit_core::{ConnectionError, Error, Result};
use plotkit_settings::ConnectionSettings;
use std::io::{Read, Write};
use std::time::{Duration, Instant};

/// Byte-stream abstraction over the serial link
///
/// The session exclusively owns one link; no operation may be issued
/// concurrently with another in-flight operation.
pub trait SerialLink: Send {
    /// Write raw bytes to the device
    fn write_bytes(&mut self, data: &[u8]) -> Result<()>;

    /// Block until one full line (terminated by `\n`) is available, or the
    /// deadline expires with `ConnectionError::ReadTimeout`.
    ///
    /// The returned line includes its terminator; the protocol codec
    /// strips it.
    fn read_line(&mut self, timeout: Duration) -> Result<String>;

    /// Discard any stale unread input
    fn discard_input(&mut self) -> Result<()>;

    /// Close the link. Further operations fail.
    fn close(&mut self) -> Result<()>;
}

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Serial Port")
    pub description: String,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,

    /// USB vendor ID if applicable
    pub vid: Option<u16>,

    /// USB product ID if applicable
    pub pid: Option<u16>,
}

/// List candidate plotter ports on the system
///
/// Filters enumerated ports to the patterns plotter boards show up as:
/// - Windows: COM* (e.g., COM1, COM3)
/// - Linux: /dev/ttyUSB*, /dev/ttyACM*
/// - macOS: /dev/cu.usbserial-*, /dev/cu.usbmodem*
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    match serialport::available_ports() {
        Ok(ports) => {
            let infos = ports
                .iter()
                .filter(|port| is_candidate_port(&port.port_name))
                .map(|port| {
                    let (manufacturer, vid, pid) = match &port.port_type {
                        serialport::SerialPortType::UsbPort(usb) => (
                            usb.manufacturer.clone(),
                            Some(usb.vid),
                            Some(usb.pid),
                        ),
                        _ => (None, None, None),
                    };
                    SerialPortInfo {
                        port_name: port.port_name.clone(),
                        description: port_description(port),
                        manufacturer,
                        vid,
                        pid,
                    }
                })
                .collect();
            Ok(infos)
        }
        Err(e) => {
            tracing::error!("Failed to enumerate serial ports: {}", e);
            Err(Error::other(format!("Failed to enumerate ports: {}", e)))
        }
    }
}

/// Check if a port name matches plotter board patterns
fn is_candidate_port(port_name: &str) -> bool {
    if port_name.starts_with("COM") && port_name[3..].chars().all(|c| c.is_ascii_digit()) {
        return true;
    }

    if port_name.starts_with("/dev/ttyUSB") || port_name.starts_with("/dev/ttyACM") {
        return true;
    }

    if port_name.starts_with("/dev/cu.usbserial-") || port_name.starts_with("/dev/cu.usbmodem") {
        return true;
    }

    false
}

/// Get a user-friendly description for a port
fn port_description(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb) => {
            format!(
                "USB {} {}",
                usb.manufacturer.as_deref().unwrap_or("Device"),
                usb.product.as_deref().unwrap_or("Serial Port")
            )
        }
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

/// Real serial link backed by the serialport crate
pub struct SerialPortLink {
    port: Option<Box<dyn serialport::SerialPort>>,
    port_name: String,
}

impl SerialPortLink {
    /// Open the port named in the settings
    ///
    /// The port itself is opened with a short timeout so `read_line` can
    /// poll against its own deadline; the blocking-wait timeout is the
    /// session's concern.
    pub fn open(settings: &ConnectionSettings) -> Result<Self> {
        if settings.port.is_empty() {
            return Err(Error::other(
                "No serial port configured; see list_ports() for candidates",
            ));
        }

        let port = serialport::new(&settings.port, settings.baud_rate)
            .timeout(Duration::from_millis(10))
            .open()
            .map_err(|e| {
                tracing::warn!("Failed to open serial port {}: {}", settings.port, e);
                ConnectionError::FailedToOpen {
                    port: settings.port.clone(),
                    reason: e.to_string(),
                }
            })?;

        tracing::info!(
            "Opened serial port {} at {} baud",
            settings.port,
            settings.baud_rate
        );

        Ok(Self {
            port: Some(port),
            port_name: settings.port.clone(),
        })
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| ConnectionError::SessionClosed.into())
    }
}

impl SerialLink for SerialPortLink {
    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port_mut()?;
        port.write_all(data).map_err(|e| ConnectionError::Io {
            reason: e.to_string(),
        })?;
        port.flush().map_err(|e| ConnectionError::Io {
            reason: e.to_string(),
        })?;
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<String> {
        let deadline = Instant::now() + timeout;
        let mut line = Vec::new();
        let mut byte = [0u8; 1];

        let port_name = self.port_name.clone();
        let port = self.port_mut()?;
        loop {
            match port.read(&mut byte) {
                Ok(0) => {
                    return Err(ConnectionError::ConnectionLost {
                        reason: "serial stream closed".to_string(),
                    }
                    .into());
                }
                Ok(_) => {
                    line.push(byte[0]);
                    if byte[0] == b'\n' {
                        let text = String::from_utf8_lossy(&line).into_owned();
                        tracing::trace!("Serial RX: {:?}", text);
                        return Ok(text);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    if Instant::now() >= deadline {
                        tracing::warn!(
                            "Read timed out after {}ms on {}",
                            timeout.as_millis(),
                            port_name
                        );
                        return Err(ConnectionError::ReadTimeout {
                            timeout_ms: timeout.as_millis() as u64,
                        }
                        .into());
                    }
                }
                Err(e) => {
                    return Err(ConnectionError::Io {
                        reason: e.to_string(),
                    }
                    .into());
                }
            }
        }
    }

    fn discard_input(&mut self) -> Result<()> {
        let port = self.port_mut()?;
        port.clear(serialport::ClearBuffer::Input)
            .map_err(|e| ConnectionError::Io {
                reason: e.to_string(),
            })?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            tracing::info!("Closed serial port {}", self.port_name);
        }
        Ok(())
    }
}
