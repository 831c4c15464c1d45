//! # dipcoat Communication
//!
//! Serial transport and firmware implementation for the dip coater.
//! Covers port discovery, the connection lifecycle with automatic
//! reconnection, command dispatch and the firmware's line protocol.

pub mod communication;
pub mod firmware;

pub use communication::{
    detect_port, list_ports, CommandDispatcher, ConnectionConfig, ConnectionHandle,
    ConnectionManager, ConnectionParams, ConnectionState, LineFramer, LinkHandler, SerialParity,
    SerialPort, SerialPortInfo, SerialPortProvider, SystemSerialPorts,
};

pub use firmware::{ControllerConfig, DeviceCommand, DipCoaterController};
