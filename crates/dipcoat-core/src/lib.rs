//! # dipcoat Core
//!
//! Core types, traits, and utilities for dipcoat.
//! Provides the device data model, the error taxonomy, the decoded wire
//! event type and the event dispatcher shared by every other crate.

pub mod core;
pub mod data;
pub mod error;

pub use core::{ControllerEvent, DeviceController, EventDispatcher, EventKind, ParsedEvent};

pub use data::{
    Axis, AxisState, DeviceMode, DeviceState, DeviceStateSnapshot, HomeStatus, LimitSide,
    RecipeParameters, StatusSnapshot,
};

pub use error::{ConnectionError, ControllerError, Error, ProtocolError, Result};
