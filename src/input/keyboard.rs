//! Keyboard path
//!
//! Arrow keys are edge-triggered: throttle keys set a fixed value while held and
//! snap back to neutral on release, steering keys step by 20 per press and stay
//! where they are.

use crate::control::{ControlState, THROTTLE_NEUTRAL};
use std::fmt;
use tracing::debug;

pub const THROTTLE_FORWARD: i32 = 120;
pub const THROTTLE_REVERSE: i32 = 60;
pub const STEERING_STEP: i32 = 20;

/// Key identifier as delivered by the host window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyCode {
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    /// Any key the relay does not act on
    Other(String),
}

impl KeyCode {
    /// Maps a DOM-style key code ("ArrowUp", "KeyW", ...) to a [`KeyCode`].
    #[cfg(test)]
    pub fn from_code(code: &str) -> Self {
        match code {
            "ArrowUp" => KeyCode::ArrowUp,
            "ArrowDown" => KeyCode::ArrowDown,
            "ArrowLeft" => KeyCode::ArrowLeft,
            "ArrowRight" => KeyCode::ArrowRight,
            other => KeyCode::Other(other.to_string()),
        }
    }

    fn is_throttle(&self) -> bool {
        matches!(self, KeyCode::ArrowUp | KeyCode::ArrowDown)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyCode::ArrowUp => write!(f, "ArrowUp"),
            KeyCode::ArrowDown => write!(f, "ArrowDown"),
            KeyCode::ArrowLeft => write!(f, "ArrowLeft"),
            KeyCode::ArrowRight => write!(f, "ArrowRight"),
            KeyCode::Other(code) => write!(f, "{}", code),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEdge {
    Pressed,
    Released,
}

/// Applies one key edge to the state.
pub fn apply_key(state: &mut ControlState, key: &KeyCode, edge: KeyEdge) {
    match edge {
        KeyEdge::Pressed => match key {
            KeyCode::ArrowDown => state.throttle = THROTTLE_REVERSE,
            KeyCode::ArrowUp => state.throttle = THROTTLE_FORWARD,
            KeyCode::ArrowLeft => state.set_steering(state.steering + STEERING_STEP),
            KeyCode::ArrowRight => state.set_steering(state.steering - STEERING_STEP),
            KeyCode::Other(code) => debug!("Ignoring key press: {}", code),
        },
        KeyEdge::Released => {
            if key.is_throttle() {
                state.throttle = THROTTLE_NEUTRAL;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(sequence: &[(KeyCode, KeyEdge)]) -> ControlState {
        let mut state = ControlState::default();
        for (key, edge) in sequence {
            apply_key(&mut state, key, *edge);
            assert!([60, 90, 120].contains(&state.throttle));
            assert!((0..=180).contains(&state.steering));
        }
        state
    }

    #[test]
    fn throttle_follows_latest_press() {
        use KeyCode::*;
        use KeyEdge::*;

        assert_eq!(run(&[(ArrowUp, Pressed)]).throttle, 120);
        assert_eq!(run(&[(ArrowDown, Pressed)]).throttle, 60);
        assert_eq!(run(&[(ArrowUp, Pressed), (ArrowDown, Pressed)]).throttle, 60);
        assert_eq!(run(&[(ArrowUp, Pressed), (ArrowUp, Released)]).throttle, 90);
    }

    #[test]
    fn any_throttle_release_returns_to_neutral() {
        use KeyCode::*;
        use KeyEdge::*;

        // releasing the other throttle key still resets
        let state = run(&[(ArrowUp, Pressed), (ArrowDown, Pressed), (ArrowUp, Released)]);
        assert_eq!(state.throttle, 90);
    }

    #[test]
    fn auto_repeat_presses_are_idempotent_for_throttle() {
        let presses: Vec<_> = (0..25)
            .map(|_| (KeyCode::ArrowUp, KeyEdge::Pressed))
            .collect();
        assert_eq!(run(&presses).throttle, 120);
    }

    #[test]
    fn steering_steps_and_clamps() {
        use KeyCode::*;
        use KeyEdge::*;

        assert_eq!(run(&[(ArrowLeft, Pressed)]).steering, 110);
        assert_eq!(run(&[(ArrowRight, Pressed)]).steering, 70);

        let lefts: Vec<_> = (0..12).map(|_| (ArrowLeft, Pressed)).collect();
        assert_eq!(run(&lefts).steering, 180);

        let rights: Vec<_> = (0..12).map(|_| (ArrowRight, Pressed)).collect();
        assert_eq!(run(&rights).steering, 0);
    }

    #[test]
    fn steering_does_not_reset_on_release() {
        use KeyCode::*;
        use KeyEdge::*;

        let state = run(&[(ArrowLeft, Pressed), (ArrowLeft, Released)]);
        assert_eq!(state.steering, 110);
    }

    #[test]
    fn mixed_sequences_stay_in_bounds() {
        use KeyCode::*;
        use KeyEdge::*;

        let keys = [ArrowUp, ArrowDown, ArrowLeft, ArrowRight];
        let mut sequence = Vec::new();
        for i in 0..200usize {
            let key = keys[(i * 7 + i / 3) % keys.len()].clone();
            let edge = if i % 3 == 0 { Released } else { Pressed };
            sequence.push((key, edge));
        }
        run(&sequence);
    }

    #[test]
    fn unknown_keys_change_nothing() {
        let state = run(&[
            (KeyCode::from_code("KeyW"), KeyEdge::Pressed),
            (KeyCode::from_code("Space"), KeyEdge::Released),
        ]);
        assert_eq!(state, ControlState::default());
    }

    #[test]
    fn parses_dom_codes() {
        assert_eq!(KeyCode::from_code("ArrowLeft"), KeyCode::ArrowLeft);
        assert_eq!(
            KeyCode::from_code("Enter"),
            KeyCode::Other("Enter".to_string())
        );
        assert_eq!(KeyCode::ArrowRight.to_string(), "ArrowRight");
    }
}
