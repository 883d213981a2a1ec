//! Gamepad path
//!
//! A [`GamepadFrame`] is one polled snapshot of every button and axis in the
//! standard gamepad layout. Together with a [`ButtonMapping`] it yields
//! throttle, steering and a trim step:
//!
//! ```text
//! throttle = round(throttle_btn * 70 - reverse_btn * 70 + 90)   -> [20,160]
//! steering = round(((-axis + 1) / 2) * 170)                      -> [0,170]
//! offset  += +0.5 (right held) | -0.5 (left held) | 0
//! ```
//!
//! Steering tops out at 170 while the keyboard can reach 180. The offset
//! keeps accumulating for as long as a trim button is held.

use crate::control::{ControlState, THROTTLE_NEUTRAL};
use crate::mapping::ButtonMapping;
use serde::{Deserialize, Serialize};

pub const THROTTLE_SPAN: f64 = 70.0;
pub const STEERING_SPAN: f64 = 170.0;
pub const OFFSET_STEP: f64 = 0.5;

/// Single button reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ButtonReading {
    /// 0.0..=1.0, analog for triggers
    pub value: f32,
    pub pressed: bool,
}

/// One polled gamepad snapshot, indexed like the standard gamepad layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GamepadFrame {
    pub buttons: Vec<ButtonReading>,
    /// -1.0..=1.0
    pub axes: Vec<f32>,
}

impl GamepadFrame {
    /// Button at `index`, idle if the pad does not report that many buttons.
    pub fn button(&self, index: usize) -> ButtonReading {
        self.buttons.get(index).copied().unwrap_or_default()
    }

    /// Axis at `index`, centered if the pad does not report that many axes.
    pub fn axis(&self, index: usize) -> f32 {
        self.axes.get(index).copied().unwrap_or(0.0)
    }
}

pub fn throttle_from_triggers(throttle: f32, reverse: f32) -> i32 {
    let value = f64::from(throttle) * THROTTLE_SPAN - f64::from(reverse) * THROTTLE_SPAN
        + f64::from(THROTTLE_NEUTRAL);
    value.round() as i32
}

pub fn steering_from_axis(axis: f32) -> i32 {
    (((-f64::from(axis) + 1.0) / 2.0) * STEERING_SPAN).round() as i32
}

/// Trim step for this frame. Left wins when both buttons are held.
pub fn offset_step(right_pressed: bool, left_pressed: bool) -> f64 {
    if left_pressed {
        -OFFSET_STEP
    } else if right_pressed {
        OFFSET_STEP
    } else {
        0.0
    }
}

/// Applies one frame to the state.
///
/// Steering is assigned directly; the formula never leaves [0,170] for axis
/// values in [-1,1], so no clamp is applied here.
pub fn apply_frame(state: &mut ControlState, frame: &GamepadFrame, mapping: &ButtonMapping) {
    state.throttle = throttle_from_triggers(
        frame.button(mapping.throttle_index).value,
        frame.button(mapping.reverse_index).value,
    );
    state.steering = steering_from_axis(frame.axis(mapping.steering_index));
    state.steering_offset += offset_step(
        frame.button(mapping.steer_offset_right_index).pressed,
        frame.button(mapping.steer_offset_left_index).pressed,
    );
}
