//! Dip coater command creator
//!
//! Encodes operations into the firmware's single-line commands. The menu
//! selections are bare digits, jogs are an axis letter followed by a signed
//! step count, and the remaining commands are upper-case keywords.

use dipcoat_core::{Axis, Error, RecipeParameters, Result};
use std::fmt;

/// A command understood by the dip coater firmware
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    /// Menu option 1
    ManualMode,
    /// Menu option 2
    AutomaticMode,
    /// Menu option 3
    Home,
    /// Relative jog in steps
    Move {
        /// Axis to jog
        axis: Axis,
        /// Signed step count
        steps: i64,
    },
    /// Start the automatic process with a recipe
    StartRecipe(RecipeParameters),
    /// Pause the automatic process
    Pause,
    /// Resume the automatic process
    Resume,
    /// Stop all motion
    Stop,
    /// Request a status report
    Status,
    /// Request the firmware version
    Version,
}

impl DeviceCommand {
    /// Wire text, without the line terminator
    pub fn encode(&self) -> Result<String> {
        Ok(match self {
            Self::ManualMode => "1".to_string(),
            Self::AutomaticMode => "2".to_string(),
            Self::Home => "3".to_string(),
            Self::Move { axis, steps } => format!("{}{}", axis.letter(), steps),
            Self::StartRecipe(params) => format!("START_RECIPE:{}", params.to_wire_json()?),
            Self::Pause => "PAUSE".to_string(),
            Self::Resume => "RESUME".to_string(),
            Self::Stop => "STOP".to_string(),
            Self::Status => "STATUS".to_string(),
            Self::Version => "VERSION".to_string(),
        })
    }
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ManualMode => write!(f, "manual mode"),
            Self::AutomaticMode => write!(f, "automatic mode"),
            Self::Home => write!(f, "home"),
            Self::Move { axis, steps } => write!(f, "move {} by {}", axis, steps),
            Self::StartRecipe(params) => write!(f, "start recipe ({} cycles)", params.cycles),
            Self::Pause => write!(f, "pause"),
            Self::Resume => write!(f, "resume"),
            Self::Stop => write!(f, "stop"),
            Self::Status => write!(f, "status"),
            Self::Version => write!(f, "version"),
        }
    }
}

/// Convert a caller-supplied step count to an integer
///
/// Rejects NaN, infinities, fractional values and values outside the range
/// of `i64`.
pub fn steps_from_f64(steps: f64) -> Result<i64> {
    if !steps.is_finite() {
        return Err(Error::invalid_argument(format!(
            "step count must be finite, got {}",
            steps
        )));
    }
    if steps.fract() != 0.0 {
        return Err(Error::invalid_argument(format!(
            "step count must be an integer, got {}",
            steps
        )));
    }
    // 2^63 is exactly representable; anything at or above it overflows.
    if steps >= 9_223_372_036_854_775_808.0 || steps < -9_223_372_036_854_775_808.0 {
        return Err(Error::invalid_argument(format!(
            "step count out of range: {}",
            steps
        )));
    }
    Ok(steps as i64)
}
