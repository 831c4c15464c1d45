//! # dipcoat
//!
//! Serial controller for a two-axis dip-coating machine.
//!
//! ## Architecture
//!
//! dipcoat is organized as a workspace with multiple crates:
//!
//! 1. **dipcoat-core** - Device data model, errors, decoded events, event dispatcher
//! 2. **dipcoat-communication** - Serial transport, discovery, connection manager,
//!    command dispatcher and the dip coater firmware protocol
//! 3. **dipcoat-settings** - Configuration file loading and validation
//! 4. **dipcoat** - Library re-exports and the `dipcoat` command line tool
//!
//! ## Features
//!
//! - **Discovery**: picks the Arduino-class board among the available ports
//! - **Resilient link**: reconnects with a constant delay after unexpected drops
//! - **Safety checks**: moves are refused during an emergency stop or at a limit
//! - **Event stream**: decoded lines and state snapshots over a broadcast channel

pub use dipcoat_communication::{communication, firmware};
pub use dipcoat_core::data;

pub use dipcoat_core::{
    Axis, AxisState, ConnectionError, ControllerError, ControllerEvent, DeviceController,
    DeviceMode, DeviceState, DeviceStateSnapshot, Error, EventDispatcher, EventKind, HomeStatus,
    LimitSide, ParsedEvent, ProtocolError, RecipeParameters, Result, StatusSnapshot,
};

pub use dipcoat_communication::{
    detect_port, list_ports, CommandDispatcher, ConnectionConfig, ConnectionHandle,
    ConnectionManager, ConnectionState, ControllerConfig, DeviceCommand, DipCoaterController,
    LinkHandler, SerialPortInfo, SerialPortProvider, SystemSerialPorts,
};

pub use dipcoat_settings::{Config, SettingsError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging
///
/// Sets up structured logging with:
/// - RUST_LOG environment variable support (INFO by default)
/// - Pretty console output, or one JSON object per line when `json` is set
pub fn init_logging(json: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    if json {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .with_thread_names(true)
            .json();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_line_number(true)
            .pretty();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}
