//! Port discovery
//!
//! Picks the serial port most likely to be the dip coater's microcontroller.
//! This is a heuristic: boards are matched on manufacturer/description
//! substrings and on a small allow-list of USB identifiers, with fallbacks
//! so that a lone unknown port is still tried.

use super::serial::SerialPortInfo;

/// Case-insensitive substrings identifying common Arduino-class boards and
/// USB-serial bridges
const KNOWN_VENDOR_NAMES: &[&str] = &[
    "arduino",
    "ch340",
    "ftdi",
    "silicon labs",
    "mega",
    "uno",
    "nano",
];

/// Known (vendor id, product id) pairs
const KNOWN_USB_IDS: &[(u16, u16)] = &[
    (0x2341, 0x0043), // Arduino Uno
    (0x2341, 0x0001), // Arduino Uno (early)
    (0x2341, 0x0010), // Arduino Mega 2560
    (0x2341, 0x0042), // Arduino Mega 2560 R3
    (0x2341, 0x0243), // Arduino Uno R3 (DFU firmware)
    (0x2A03, 0x0043), // Arduino.org Uno
    (0x1A86, 0x7523), // CH340
    (0x1A86, 0x5523), // CH341
    (0x0403, 0x6001), // FTDI FT232R
    (0x0403, 0x6015), // FTDI FT231X
    (0x10C4, 0xEA60), // Silicon Labs CP210x
];

/// Whether a port looks like a supported board
pub fn is_known_device(port: &SerialPortInfo) -> bool {
    let name_matches = [port.manufacturer.as_deref(), Some(port.description.as_str())]
        .into_iter()
        .flatten()
        .map(str::to_lowercase)
        .any(|text| KNOWN_VENDOR_NAMES.iter().any(|known| text.contains(known)));

    let id_matches = match (port.vid, port.pid) {
        (Some(vid), Some(pid)) => KNOWN_USB_IDS.contains(&(vid, pid)),
        _ => false,
    };

    name_matches || id_matches
}

/// Pick a candidate port from `ports`
///
/// In order of preference:
/// 1. the first known board (see [`is_known_device`])
/// 2. the first port exposing any USB identifier
/// 3. the first port
///
/// Returns `None` only when `ports` is empty.
pub fn detect_port(ports: &[SerialPortInfo]) -> Option<&SerialPortInfo> {
    if let Some(port) = ports.iter().find(|p| is_known_device(p)) {
        tracing::debug!("Detected known device on {}", port.port_name);
        return Some(port);
    }

    if let Some(port) = ports.iter().find(|p| p.has_usb_ids()) {
        tracing::debug!("No known device, falling back to USB port {}", port.port_name);
        return Some(port);
    }

    let first = ports.first();
    if let Some(port) = first {
        tracing::debug!("No USB port, falling back to {}", port.port_name);
    }
    first
}
