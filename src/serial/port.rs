//! Serial port configuration and connection management
//!
//! Handles USB serial port discovery and the connection to the fire panel
//! controller.

use super::ByteSource;
use crate::error::{IngestError, Result};
use anyhow::Context;
use colored::Colorize;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, Read};
use std::time::Duration;

/// Baud rate used by the panel controller firmware
pub const PANEL_DEFAULT_BAUD: u32 = 9600;

/// Smallest read buffer when nothing is queued yet
const MIN_READ: usize = 256;

/// Configuration for serial port connection
#[derive(Debug, Clone)]
pub struct PortConfig {
    /// Serial port path (e.g., /dev/ttyUSB0, /dev/ttyACM0)
    pub port_path: String,
    /// Baud rate (default: 9600)
    pub baud_rate: u32,
    /// Data bits (default: 8)
    pub data_bits: DataBits,
    /// Parity (default: None)
    pub parity: Parity,
    /// Stop bits (default: 1)
    pub stop_bits: StopBits,
    /// Flow control (default: None)
    pub flow_control: FlowControl,
    /// Read timeout
    pub timeout: Duration,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            port_path: String::from("/dev/ttyUSB0"),
            baud_rate: PANEL_DEFAULT_BAUD,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            timeout: Duration::from_secs(1),
        }
    }
}

impl PortConfig {
    /// Create a new configuration with the panel's default settings
    pub fn new(port_path: &str) -> Self {
        Self {
            port_path: port_path.to_string(),
            ..Default::default()
        }
    }

    /// Set the baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the read timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Open serial port to the panel controller
pub struct SerialConnection {
    port: Box<dyn SerialPort>,
    config: PortConfig,
}

impl SerialConnection {
    /// Open a serial connection with the given configuration
    pub fn open(config: PortConfig) -> Result<Self> {
        let port = serialport::new(&config.port_path, config.baud_rate)
            .data_bits(config.data_bits)
            .parity(config.parity)
            .stop_bits(config.stop_bits)
            .flow_control(config.flow_control)
            .timeout(config.timeout)
            .open()
            .map_err(|e| IngestError::PortOpen {
                path: config.port_path.clone(),
                source: e.into(),
            })?;

        Ok(Self { port, config })
    }
}

impl ByteSource for SerialConnection {
    fn name(&self) -> &str {
        &self.config.port_path
    }

    fn read_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        let queued = self.port.bytes_to_read().map_err(io::Error::from)? as usize;
        let mut buffer = vec![0u8; queued.max(MIN_READ)];

        match self.port.read(&mut buffer) {
            Ok(0) => Ok(None),
            Ok(n) => {
                buffer.truncate(n);
                Ok(Some(buffer))
            }
            Err(ref e) if e.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        // The descriptor itself is released on drop
        self.port
            .clear(serialport::ClearBuffer::All)
            .map_err(io::Error::from)
    }
}

/// Information about a detected serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    pub path: String,
    pub port_type: PortType,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PortType {
    UsbSerial,
    PciSerial,
    Bluetooth,
    Unknown,
}

impl std::fmt::Display for PortType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortType::UsbSerial => write!(f, "USB Serial"),
            PortType::PciSerial => write!(f, "PCI Serial"),
            PortType::Bluetooth => write!(f, "Bluetooth"),
            PortType::Unknown => write!(f, "Unknown"),
        }
    }
}

/// List all available serial ports
pub fn list_ports() -> anyhow::Result<Vec<PortInfo>> {
    let ports = serialport::available_ports().with_context(|| "Failed to enumerate serial ports")?;

    let port_infos: Vec<PortInfo> = ports
        .into_iter()
        .map(|p| {
            let (port_type, manufacturer, product, serial_number, vid, pid) = match p.port_type {
                serialport::SerialPortType::UsbPort(info) => (
                    PortType::UsbSerial,
                    info.manufacturer,
                    info.product,
                    info.serial_number,
                    Some(info.vid),
                    Some(info.pid),
                ),
                serialport::SerialPortType::PciPort => {
                    (PortType::PciSerial, None, None, None, None, None)
                }
                serialport::SerialPortType::BluetoothPort => {
                    (PortType::Bluetooth, None, None, None, None, None)
                }
                serialport::SerialPortType::Unknown => {
                    (PortType::Unknown, None, None, None, None, None)
                }
            };

            PortInfo {
                path: p.port_name,
                port_type,
                manufacturer,
                product,
                serial_number,
                vid,
                pid,
            }
        })
        .collect();

    Ok(port_infos)
}

/// Print formatted list of available serial ports
pub fn print_ports() -> anyhow::Result<()> {
    let ports = list_ports()?;

    if ports.is_empty() {
        println!("{}", "No serial ports found".yellow());
        println!("\n{}", "Troubleshooting tips:".cyan().bold());
        println!("  1. Connect the panel controller's USB cable");
        println!("  2. Check if the device is recognized: ls -la /dev/ttyUSB* /dev/ttyACM*");
        println!("  3. Add your user to the 'dialout' group: sudo usermod -aG dialout $USER");
        return Ok(());
    }

    println!("{}", "Available Serial Ports:".green().bold());
    println!("{}", "=".repeat(60));

    for port in ports {
        println!("\n{}: {}", "Port".cyan(), port.path.white().bold());
        println!("  Type: {}", port.port_type);

        if let Some(ref mfg) = port.manufacturer {
            println!("  Manufacturer: {}", mfg);
        }
        if let Some(ref prod) = port.product {
            println!("  Product: {}", prod);
        }
        if let Some(ref sn) = port.serial_number {
            println!("  Serial: {}", sn);
        }
        if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
            println!("  VID:PID: {:04x}:{:04x}", vid, pid);
        }
    }

    println!("\n{}", "=".repeat(60));
    println!(
        "{}",
        "Use: fire-monitor monitor -p <PORT> to start monitoring".yellow()
    );

    Ok(())
}

/// Whether a port looks like a USB-to-serial bridge or an Arduino-class board
pub fn is_likely_controller(p: &PortInfo) -> bool {
    if p.port_type != PortType::UsbSerial {
        return false;
    }

    if let (Some(vid), Some(pid)) = (p.vid, p.pid) {
        // FTDI
        if vid == 0x0403 {
            return true;
        }
        // Arduino
        if vid == 0x2341 {
            return true;
        }
        // Silicon Labs CP210x
        if vid == 0x10c4 && (pid == 0xea60 || pid == 0xea70) {
            return true;
        }
        // WCH CH340/CH341
        if vid == 0x1a86 && (pid == 0x7523 || pid == 0x5523) {
            return true;
        }
        // Prolific PL2303
        if vid == 0x067b && pid == 0x2303 {
            return true;
        }
    }

    if let Some(ref prod) = p.product {
        let prod_lower = prod.to_lowercase();
        return prod_lower.contains("serial")
            || prod_lower.contains("uart")
            || prod_lower.contains("arduino")
            || prod_lower.contains("ch340");
    }

    false
}

/// Auto-detect likely controller ports
pub fn detect_controller_ports() -> anyhow::Result<Vec<PortInfo>> {
    Ok(list_ports()?.into_iter().filter(is_likely_controller).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usb(vid: u16, pid: u16, product: Option<&str>) -> PortInfo {
        PortInfo {
            path: "/dev/ttyUSB0".to_string(),
            port_type: PortType::UsbSerial,
            manufacturer: None,
            product: product.map(|s| s.to_string()),
            serial_number: None,
            vid: Some(vid),
            pid: Some(pid),
        }
    }

    #[test]
    fn test_default_config() {
        let config = PortConfig::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.port_path, "/dev/ttyUSB0");
        assert_eq!(config.timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_config_builder() {
        let config = PortConfig::new("/dev/ttyACM0")
            .with_baud_rate(115200)
            .with_timeout(Duration::from_millis(250));

        assert_eq!(config.port_path, "/dev/ttyACM0");
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_controller_detection() {
        assert!(is_likely_controller(&usb(0x1a86, 0x7523, None)));
        assert!(is_likely_controller(&usb(0x2341, 0x0043, None)));
        assert!(is_likely_controller(&usb(0x1234, 0x5678, Some("USB UART Bridge"))));
        assert!(!is_likely_controller(&usb(0x1234, 0x5678, Some("Keyboard"))));

        let mut pci = usb(0x0403, 0x6001, None);
        pci.port_type = PortType::PciSerial;
        assert!(!is_likely_controller(&pci));
    }

    #[test]
    fn test_open_missing_device() {
        let err = SerialConnection::open(PortConfig::new("/dev/does-not-exist-fire-monitor"))
            .err()
            .expect("opening a missing device must fail");
        assert!(matches!(err, IngestError::PortOpen { .. }));
    }
}
