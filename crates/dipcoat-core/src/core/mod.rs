//! Controller abstraction consumed by outer layers
//!
//! The HTTP and UI bridges only ever see this trait and the event stream; they
//! know nothing about serial ports or the wire protocol.

pub mod event;

pub use event::{ControllerEvent, EventDispatcher, EventKind, ParsedEvent};

use crate::data::{Axis, DeviceStateSnapshot, RecipeParameters};
use crate::error::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Operation API of a dip coater controller
#[async_trait]
pub trait DeviceController: Send + Sync {
    /// Open the link, discovering the port when `port` is `None`
    async fn connect(&self, port: Option<String>) -> Result<()>;

    /// Close the link and cancel any pending reconnection
    async fn disconnect(&self);

    /// Switch the firmware to manual mode
    async fn set_mode_manual(&self) -> Result<()>;

    /// Switch the firmware to automatic mode
    async fn set_mode_automatic(&self) -> Result<()>;

    /// Run the homing sequence on both axes
    async fn execute_home(&self) -> Result<()>;

    /// Jog an axis by a signed number of steps
    ///
    /// Takes `f64` because outer layers pass JSON numbers; non-integral values
    /// are rejected.
    async fn move_axis(&self, axis: Axis, steps: f64) -> Result<()>;

    /// Stop all motion immediately
    async fn emergency_stop(&self) -> Result<()>;

    /// Start the automatic dipping process
    async fn start_recipe(&self, params: RecipeParameters) -> Result<()>;

    /// Pause the automatic process
    async fn pause_process(&self) -> Result<()>;

    /// Resume the automatic process
    async fn resume_process(&self) -> Result<()>;

    /// Ask the firmware for a full status report
    async fn request_status(&self) -> Result<()>;

    /// Current mirrored state plus link information
    fn get_state(&self) -> DeviceStateSnapshot;

    /// Subscribe to parsed lines, state changes and link events
    fn subscribe(&self) -> broadcast::Receiver<ControllerEvent>;

    /// Jog the Y axis
    async fn move_axis_y(&self, steps: f64) -> Result<()> {
        self.move_axis(Axis::Y, steps).await
    }

    /// Jog the Z axis
    async fn move_axis_z(&self, steps: f64) -> Result<()> {
        self.move_axis(Axis::Z, steps).await
    }
}
