//! Communication layer
//!
//! Serial transport, port discovery, line framing, the connection lifecycle and
//! the command dispatcher that serializes traffic onto the single link.

pub mod connection;
pub mod discovery;
pub mod dispatcher;
pub mod framer;
pub mod serial;

pub use connection::{ConnectionConfig, ConnectionHandle, ConnectionManager, LinkHandler};
pub use discovery::{detect_port, is_known_device};
pub use dispatcher::{CommandDispatcher, PendingCommand};
pub use framer::LineFramer;
pub use serial::{
    list_ports, RealSerialPort, SerialPort, SerialPortInfo, SerialPortProvider, SystemSerialPorts,
};

use serde::{Deserialize, Serialize};

/// Parity setting for serial connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerialParity {
    /// No parity bit
    #[default]
    None,
    /// Even parity
    Even,
    /// Odd parity
    Odd,
}

/// Parameters used to open the serial port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    /// Port name (e.g., "/dev/ttyACM0", "COM3")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits (5-8)
    pub data_bits: u8,
    /// Stop bits (1-2)
    pub stop_bits: u8,
    /// Parity
    pub parity: SerialParity,
    /// Hardware flow control
    pub flow_control: bool,
    /// Read timeout of the underlying port in milliseconds
    pub timeout_ms: u64,
}

impl ConnectionParams {
    /// 8N1 parameters for `port` at `baud_rate`, no flow control
    pub fn serial(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            ..Self::default()
        }
    }
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: 9600,
            data_bits: 8,
            stop_bits: 1,
            parity: SerialParity::None,
            flow_control: false,
            timeout_ms: 10,
        }
    }
}

/// Lifecycle state of the serial link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No link
    #[default]
    Disconnected,
    /// Opening the port or waiting for the firmware to boot
    Connecting,
    /// Link usable
    Connected,
    /// Explicit close in progress
    Closing,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Closing => write!(f, "Closing"),
        }
    }
}
