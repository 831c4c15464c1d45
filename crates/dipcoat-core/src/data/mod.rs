//! Data models for the mirrored dip coater state
//!
//! This module provides:
//! - Operating mode of the firmware
//! - Per-axis position, motion, home and limit flags
//! - The full device state and the snapshot handed to collaborators
//! - Partial status snapshots reported by the firmware
//! - Recipe parameters for the automatic dipping process

pub mod recipe;

pub use recipe::RecipeParameters;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating mode reported by the firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceMode {
    /// Not reported yet
    #[default]
    Unknown,
    /// Jogging and homing under operator control
    Manual,
    /// Running a recipe
    Automatic,
    /// Running the homing sequence
    Homing,
}

impl DeviceMode {
    /// Parse a mode name as used in firmware status objects
    ///
    /// Accepts the English names as well as the Spanish firmware spellings,
    /// case-insensitively. Returns `None` for anything else.
    pub fn from_firmware(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "manual" => Some(Self::Manual),
            "automatic" | "automatico" | "automático" | "auto" => Some(Self::Automatic),
            "homing" | "home" => Some(Self::Homing),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "UNKNOWN"),
            Self::Manual => write!(f, "MANUAL"),
            Self::Automatic => write!(f, "AUTOMATIC"),
            Self::Homing => write!(f, "HOMING"),
        }
    }
}

/// Stepper axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Horizontal transfer axis
    Y,
    /// Vertical dipping axis
    Z,
}

impl Axis {
    /// Both axes, in wire order
    pub const ALL: [Axis; 2] = [Axis::Y, Axis::Z];

    /// Letter used on the wire
    pub fn letter(&self) -> char {
        match self {
            Self::Y => 'Y',
            Self::Z => 'Z',
        }
    }

    /// Parse an axis letter (case-insensitive)
    pub fn from_letter(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'Y' => Some(Self::Y),
            'Z' => Some(Self::Z),
            _ => None,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// One of the two end-of-travel switches of an axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitSide {
    /// Switch at the negative end of travel
    Min,
    /// Switch at the positive end of travel
    Max,
}

impl fmt::Display for LimitSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Min => write!(f, "min"),
            Self::Max => write!(f, "max"),
        }
    }
}

/// Progress of the home search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HomeStatus {
    /// Axis is seeking its home switch
    Searching,
    /// Axis found its home switch
    Found,
    /// The whole homing sequence finished
    Complete,
}

/// Mirrored state of one stepper axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisState {
    /// Position in steps
    pub position: i64,
    /// Axis is believed to be moving
    pub moving: bool,
    /// Axis sits on its home switch
    pub at_home: bool,
    /// Either limit switch is active; always `limit_min || limit_max`
    pub at_limit: bool,
    /// Minimum limit switch active
    pub limit_min: bool,
    /// Maximum limit switch active
    pub limit_max: bool,
}

impl AxisState {
    /// Set one limit flag and re-derive `at_limit`
    pub fn set_limit(&mut self, side: LimitSide, active: bool) {
        match side {
            LimitSide::Min => self.limit_min = active,
            LimitSide::Max => self.limit_max = active,
        }
        self.derive_at_limit();
    }

    /// Recompute `at_limit` from the two limit flags
    pub fn derive_at_limit(&mut self) {
        self.at_limit = self.limit_min || self.limit_max;
    }

    /// Limit switch that blocks a move of `steps`, if any
    ///
    /// Positive moves are blocked by the max switch, negative ones by the min
    /// switch. A zero move is never blocked.
    pub fn blocking_limit(&self, steps: i64) -> Option<LimitSide> {
        if steps > 0 && self.limit_max {
            Some(LimitSide::Max)
        } else if steps < 0 && self.limit_min {
            Some(LimitSide::Min)
        } else {
            None
        }
    }
}

/// Mirrored state of the whole device
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceState {
    /// Operating mode
    pub mode: DeviceMode,
    /// Horizontal axis
    pub axis_y: AxisState,
    /// Vertical axis
    pub axis_z: AxisState,
    /// Emergency stop engaged
    pub emergency_stop: bool,
    /// Receipt time of the last applied event
    pub last_update: Option<DateTime<Utc>>,
}

impl DeviceState {
    /// Create a state with everything unknown/cleared
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow one axis
    pub fn axis(&self, axis: Axis) -> &AxisState {
        match axis {
            Axis::Y => &self.axis_y,
            Axis::Z => &self.axis_z,
        }
    }

    /// Mutably borrow one axis
    pub fn axis_mut(&mut self, axis: Axis) -> &mut AxisState {
        match axis {
            Axis::Y => &mut self.axis_y,
            Axis::Z => &mut self.axis_z,
        }
    }

    /// Whether any axis is believed to be moving
    pub fn is_moving(&self) -> bool {
        self.axis_y.moving || self.axis_z.moving
    }
}

/// Partial device state reported by the firmware in reply to `STATUS`
///
/// Every field is optional; absent fields leave the mirrored state untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Operating mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<DeviceMode>,
    /// Emergency stop flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency: Option<bool>,
    /// Y position in steps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_y: Option<i64>,
    /// Z position in steps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_z: Option<i64>,
    /// Y home switch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_y: Option<bool>,
    /// Z home switch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_z: Option<bool>,
    /// Y minimum limit switch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_y_min: Option<bool>,
    /// Y maximum limit switch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_y_max: Option<bool>,
    /// Z minimum limit switch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_z_min: Option<bool>,
    /// Z maximum limit switch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_z_max: Option<bool>,
}

impl StatusSnapshot {
    /// True when the snapshot carries no field at all
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// State handed to collaborators: the mirrored device plus link information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStateSnapshot {
    /// Mirrored device state
    #[serde(flatten)]
    pub device: DeviceState,
    /// Serial link is open
    pub connected: bool,
    /// Port the link is (or was last) open on
    pub port: Option<String>,
}
