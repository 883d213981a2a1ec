//! Control state and wire frames
//!
//! [`ControlState`] is the single authoritative record of what the operator is
//! asking the vehicle to do. It is owned by the dispatcher and only ever mutated
//! there. [`ControlFrame`] is what actually goes over the wire:
//!
//! ```text
//! "<throttle>,<steering>"      e.g. "120,90"
//! ```
//!
//! The steering offset is folded into the frame only for gamepad-driven
//! broadcasts; it is never written back into `steering`.

use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(test)]
use std::str::FromStr;

pub const THROTTLE_NEUTRAL: i32 = 90;
pub const STEERING_NEUTRAL: i32 = 90;
pub const STEERING_MIN: i32 = 0;
pub const STEERING_MAX: i32 = 180;

/// Operator intent as seen by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlState {
    /// Roughly [20,160], 90 is stopped
    pub throttle: i32,
    /// Always within [0,180]
    pub steering: i32,
    /// Trim accumulator, unbounded, applied at transmission time only
    pub steering_offset: f64,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            throttle: THROTTLE_NEUTRAL,
            steering: STEERING_NEUTRAL,
            steering_offset: 0.0,
        }
    }
}

impl ControlState {
    /// Sets steering, clamped into [0,180].
    pub fn set_steering(&mut self, steering: i32) {
        self.steering = steering.clamp(STEERING_MIN, STEERING_MAX);
    }
}

/// Errors when reading a frame back from its wire form
#[cfg(test)]
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameParseError {
    #[error("Frame is missing the ',' separator: {0:?}")]
    MissingSeparator(String),

    #[error("Frame field is not an integer: {0:?}")]
    InvalidNumber(String),
}

/// One server → client message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlFrame {
    pub throttle: i32,
    pub steering: i32,
}

impl ControlFrame {
    /// Frame for a keyboard event. The keyboard path knows nothing about trim,
    /// so the offset is left out.
    pub fn from_keyboard(state: &ControlState) -> Self {
        Self {
            throttle: state.throttle,
            steering: state.steering,
        }
    }

    /// Frame for a gamepad event: steering plus the accumulated offset,
    /// rounded half away from zero.
    pub fn from_gamepad(state: &ControlState) -> Self {
        let steering = (f64::from(state.steering) + state.steering_offset).round();
        Self {
            throttle: state.throttle,
            steering: steering as i32,
        }
    }
}

impl fmt::Display for ControlFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.throttle, self.steering)
    }
}

#[cfg(test)]
impl FromStr for ControlFrame {
    type Err = FrameParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (throttle, steering) = s
            .split_once(',')
            .ok_or_else(|| FrameParseError::MissingSeparator(s.to_string()))?;
        let parse = |field: &str| {
            field
                .parse::<i32>()
                .map_err(|_| FrameParseError::InvalidNumber(field.to_string()))
        };
        Ok(Self {
            throttle: parse(throttle)?,
            steering: parse(steering)?,
        })
    }
}
