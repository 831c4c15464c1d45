//! Firmware implementations
//!
//! Supported controllers:
//! - Dip coater: two-axis Arduino firmware with a Spanish line protocol

pub mod dipcoater;

pub use dipcoater::{ControllerConfig, DeviceCommand, DipCoaterController};
