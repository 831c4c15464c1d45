//! dipcoat Settings Crate
//!
//! Handles the controller configuration file: connection, command timeouts
//! and event channel settings.

pub mod config;
pub mod error;

pub use config::{CommandSettings, Config, ConnectionSettings, EventSettings};
pub use error::{SettingsError, SettingsResult};
