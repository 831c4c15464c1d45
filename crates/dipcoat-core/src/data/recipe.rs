//! Recipe parameters for the automatic dipping process
//!
//! The firmware receives these as a JSON object appended to `START_RECIPE:`.
//! Field order here is the order the firmware expects on the wire.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Parameter set of one automatic dip sequence
///
/// Missing keys in caller-supplied JSON take the documented defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecipeParameters {
    /// Number of full dip cycles
    pub cycles: u32,
    /// Wait in bath 0 (ms)
    pub dipping_wait0: u64,
    /// Wait in bath 1 (ms)
    pub dipping_wait1: u64,
    /// Wait in bath 2 (ms)
    pub dipping_wait2: u64,
    /// Wait in bath 3 (ms)
    pub dipping_wait3: u64,
    /// Wait between baths (ms)
    pub transfer_wait: u64,
    /// Skip dripping after bath 1
    pub except_dripping1: bool,
    /// Skip dripping after bath 2
    pub except_dripping2: bool,
    /// Skip dripping after bath 3
    pub except_dripping3: bool,
    /// Skip dripping after bath 4
    pub except_dripping4: bool,
    /// Z position where dipping starts (steps)
    pub dip_start_position: i64,
    /// Dip depth (steps)
    pub dipping_length: i64,
    /// Y transfer speed (steps/s)
    pub transfer_speed: u32,
    /// Z dip speed (steps/s)
    pub dip_speed: u32,
    /// Drying fan on
    pub fan: bool,
}

impl Default for RecipeParameters {
    fn default() -> Self {
        Self {
            cycles: 1,
            dipping_wait0: 5000,
            dipping_wait1: 5000,
            dipping_wait2: 5000,
            dipping_wait3: 5000,
            transfer_wait: 2000,
            except_dripping1: false,
            except_dripping2: false,
            except_dripping3: false,
            except_dripping4: false,
            dip_start_position: 0,
            dipping_length: 10000,
            transfer_speed: 1000,
            dip_speed: 1000,
            fan: false,
        }
    }
}

impl RecipeParameters {
    /// Merge a caller-supplied parameter bag over the defaults
    ///
    /// `null` is treated as "no overrides". Keys that are present but carry the
    /// wrong type are rejected with `InvalidArgument`; unknown keys are ignored.
    pub fn merged(overrides: &serde_json::Value) -> Result<Self> {
        match overrides {
            serde_json::Value::Null => Ok(Self::default()),
            serde_json::Value::Object(_) => serde_json::from_value(overrides.clone())
                .map_err(|e| Error::invalid_argument(format!("recipe parameters: {}", e))),
            other => Err(Error::invalid_argument(format!(
                "recipe parameters must be an object, got {}",
                other
            ))),
        }
    }

    /// Serialize to the compact JSON payload sent on the wire
    pub fn to_wire_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::other(format!("Failed to serialize recipe: {}", e)))
    }
}
