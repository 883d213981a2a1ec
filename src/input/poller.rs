//! Gamepad poller
//!
//! Reads the active gamepad at a fixed interval and turns each read into a
//! [`GamepadFrame`] in the standard gamepad layout. Every frame goes to the
//! dispatcher, whether anything changed or not, and the latest one is
//! published for the mapping editor's live view.
//!
//! The poller runs on its own OS thread; the gilrs context is created there and
//! never leaves it.

use super::gamepad::{ButtonReading, GamepadFrame};
use crate::relay::{Command, DispatcherHandle};
use gilrs::{Axis, Button, EventType, Gamepad, GamepadId, Gilrs};
use statum::{machine, state};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Standard layout order, index = position in the frame
pub const STANDARD_BUTTONS: [Button; 17] = [
    Button::South,
    Button::East,
    Button::West,
    Button::North,
    Button::LeftTrigger,
    Button::RightTrigger,
    Button::LeftTrigger2,
    Button::RightTrigger2,
    Button::Select,
    Button::Start,
    Button::LeftThumb,
    Button::RightThumb,
    Button::DPadUp,
    Button::DPadDown,
    Button::DPadLeft,
    Button::DPadRight,
    Button::Mode,
];

/// Standard layout axes; the bool flips gilrs' up-positive Y to down-positive
pub const STANDARD_AXES: [(Axis, bool); 4] = [
    (Axis::LeftStickX, false),
    (Axis::LeftStickY, true),
    (Axis::RightStickX, false),
    (Axis::RightStickY, true),
];

/// Latest polled frame, `None` while no gamepad is connected
pub type LiveFrame = Option<GamepadFrame>;

#[derive(Clone, Debug)]
pub struct PollerSettings {
    pub poll_interval: Duration,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(16),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PollerError {
    #[error("Failed to initialize gamepad backend: {0}")]
    InitializationError(String),

    #[error("Failed to spawn poller thread: {0}")]
    ThreadError(#[from] std::io::Error),
}

#[state]
#[derive(Debug, Clone)]
pub enum PollerState {
    Initializing,
    Polling,
}

#[machine]
#[derive(Debug)]
pub struct GamepadPoller<S: PollerState> {
    gilrs: Gilrs,
    active_gamepad: Option<GamepadId>,
    settings: PollerSettings,
    dispatcher: DispatcherHandle,
    live: watch::Sender<LiveFrame>,
    shutdown: CancellationToken,
}

impl GamepadPoller<Initializing> {
    pub fn create(
        settings: PollerSettings,
        dispatcher: DispatcherHandle,
        live: watch::Sender<LiveFrame>,
        shutdown: CancellationToken,
    ) -> Result<Self, PollerError> {
        info!("Initializing gilrs gamepad interface");
        let gilrs = Gilrs::new().map_err(|e| {
            error!("Failed to initialize gilrs: {}", e);
            PollerError::InitializationError(e.to_string())
        })?;
        Ok(Self::new(gilrs, None, settings, dispatcher, live, shutdown))
    }

    /// Picks the first connected gamepad, if any, and starts polling.
    pub fn initialize(mut self) -> GamepadPoller<Polling> {
        let gamepads: Vec<(GamepadId, Gamepad<'_>)> = self.gilrs.gamepads().collect();
        if gamepads.is_empty() {
            warn!("No gamepad connected, waiting for one");
        } else {
            info!("Found {} gamepads:", gamepads.len());
            for (idx, (id, gamepad)) in gamepads.iter().enumerate() {
                info!("  [{}] ID: {}, Name: {}", idx, id, gamepad.name());
            }
        }
        let first = gamepads.first().map(|(id, _)| *id);
        self.active_gamepad = first;
        if let Some(id) = self.active_gamepad {
            info!("Selected gamepad {}", id);
        }
        self.transition()
    }
}

impl GamepadPoller<Polling> {
    /// Polls until shutdown or until the dispatcher goes away.
    pub fn run(mut self) {
        info!(
            "Gamepad poller running every {}ms",
            self.settings.poll_interval.as_millis()
        );
        while !self.shutdown.is_cancelled() {
            self.drain_events();

            let frame = self.read_frame();
            self.live.send_replace(frame.clone());
            if let Some(frame) = frame {
                if let Err(e) = self.dispatcher.blocking_send(Command::GamepadFrame(frame)) {
                    error!("Gamepad poller stopping: {}", e);
                    break;
                }
            }

            std::thread::sleep(self.settings.poll_interval);
        }
        info!("Gamepad poller stopped");
    }

    /// Keeps gilrs' cached state current and follows hot-plugging.
    fn drain_events(&mut self) {
        while let Some(event) = self.gilrs.next_event() {
            match event.event {
                EventType::Connected => {
                    info!("Gamepad {} connected", event.id);
                    if self.active_gamepad.is_none() {
                        self.active_gamepad = Some(event.id);
                        info!("Selected gamepad {}", event.id);
                    }
                }
                EventType::Disconnected => {
                    warn!("Gamepad {} disconnected", event.id);
                    if self.active_gamepad == Some(event.id) {
                        self.active_gamepad = self
                            .gilrs
                            .gamepads()
                            .map(|(id, _)| id)
                            .find(|id| *id != event.id);
                        match self.active_gamepad {
                            Some(id) => info!("Selected gamepad {}", id),
                            None => warn!("No gamepad left, frames paused"),
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn read_frame(&self) -> Option<GamepadFrame> {
        let id = self.active_gamepad?;
        let gamepad = self.gilrs.connected_gamepad(id)?;
        let frame = frame_from_gamepad(&gamepad);
        debug!("Polled frame: {:?}", frame);
        Some(frame)
    }
}

fn frame_from_gamepad(gamepad: &Gamepad<'_>) -> GamepadFrame {
    let buttons = STANDARD_BUTTONS
        .iter()
        .map(|button| match gamepad.button_data(*button) {
            Some(data) => ButtonReading {
                value: data.value(),
                pressed: data.is_pressed(),
            },
            None => ButtonReading::default(),
        })
        .collect();
    let axes = STANDARD_AXES
        .iter()
        .map(|(axis, flip)| {
            let value = gamepad.value(*axis);
            if *flip {
                -value
            } else {
                value
            }
        })
        .collect();
    GamepadFrame { buttons, axes }
}

/// Public interface for spawning the poller thread.
pub struct PollerHandle {
    live: watch::Receiver<LiveFrame>,
}

impl PollerHandle {
    /// Starts the poller thread. A missing gamepad backend is logged on the
    /// thread and leaves the live view empty; keyboard control keeps working.
    pub fn spawn(
        settings: PollerSettings,
        dispatcher: DispatcherHandle,
        shutdown: CancellationToken,
    ) -> Result<Self, PollerError> {
        info!("Spawning gamepad poller with settings: {:?}", settings);
        let (live_tx, live) = watch::channel(None);
        std::thread::Builder::new()
            .name("gamepad-poller".to_string())
            .spawn(move || {
                match GamepadPoller::create(settings, dispatcher, live_tx, shutdown) {
                    Ok(poller) => poller.initialize().run(),
                    Err(e) => error!("Gamepad poller not started: {}", e),
                }
            })?;
        Ok(Self { live })
    }

    pub fn subscribe(&self) -> watch::Receiver<LiveFrame> {
        self.live.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::ButtonMapping;

    #[test]
    fn default_mapping_points_at_standard_controls() {
        let mapping = ButtonMapping::default();
        assert_eq!(STANDARD_BUTTONS[mapping.throttle_index], Button::RightTrigger2);
        assert_eq!(STANDARD_BUTTONS[mapping.reverse_index], Button::LeftTrigger2);
        assert_eq!(STANDARD_AXES[mapping.steering_index].0, Axis::LeftStickX);
        assert_eq!(STANDARD_BUTTONS[mapping.steer_offset_right_index], Button::DPadLeft);
        assert_eq!(STANDARD_BUTTONS[mapping.steer_offset_left_index], Button::DPadRight);
    }

    #[test]
    fn only_vertical_axes_are_flipped() {
        let flipped: Vec<Axis> = STANDARD_AXES
            .iter()
            .filter(|(_, flip)| *flip)
            .map(|(axis, _)| *axis)
            .collect();
        assert_eq!(flipped, vec![Axis::LeftStickY, Axis::RightStickY]);
    }
}
