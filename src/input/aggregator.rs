use super::gamepad::{self, GamepadFrame};
use super::keyboard::{self, KeyCode, KeyEdge};
use crate::control::{ControlFrame, ControlState};
use crate::mapping::ButtonMapping;
use tracing::debug;

/// Merges keyboard edges and gamepad frames into one [`ControlState`].
///
/// The two sources are not blended, whichever event arrived last decides the
/// value. Every accepted event returns the frame that has to be broadcast.
#[derive(Debug, Default)]
pub struct InputAggregator {
    state: ControlState,
}

impl InputAggregator {
    pub fn new(state: ControlState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    /// Every key event produces a frame, even when the key is ignored.
    pub fn key(&mut self, key: &KeyCode, edge: KeyEdge) -> ControlFrame {
        keyboard::apply_key(&mut self.state, key, edge);
        debug!(
            "Key {:?} {} -> throttle {}, steering {}",
            edge, key, self.state.throttle, self.state.steering
        );
        ControlFrame::from_keyboard(&self.state)
    }

    /// Applies a polled frame. Without a mapping snapshot the frame is dropped.
    pub fn gamepad(
        &mut self,
        frame: &GamepadFrame,
        mapping: Option<&ButtonMapping>,
    ) -> Option<ControlFrame> {
        let Some(mapping) = mapping else {
            debug!("No gamepad mapping loaded yet, skipping frame");
            return None;
        };
        gamepad::apply_frame(&mut self.state, frame, mapping);
        Some(ControlFrame::from_gamepad(&self.state))
    }
}
