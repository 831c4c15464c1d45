//! Dip coater firmware support
//!
//! - `command_creator`: operation to wire text
//! - `response_parser`: wire text to [`ParsedEvent`](dipcoat_core::ParsedEvent)
//! - `state_machine`: folding events into the mirrored state
//! - `controller`: the [`DeviceController`](dipcoat_core::DeviceController) implementation

pub mod command_creator;
pub mod controller;
pub mod response_parser;
pub mod state_machine;

pub use command_creator::{steps_from_f64, DeviceCommand};
pub use controller::{ControllerConfig, DipCoaterController};
pub use response_parser::{classify, decode, decode_at};
pub use state_machine::apply_event;
