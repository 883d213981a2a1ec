use egui::{RichText, Ui};
use tokio::sync::watch;

use super::common::{create_frame, range_indicator, status_color, UiColors};
use crate::control::{ControlFrame, ControlState, STEERING_MAX, STEERING_MIN};
use crate::input::keyboard::{THROTTLE_FORWARD, THROTTLE_REVERSE};

const THROTTLE_RANGE: (f64, f64) = (20.0, 160.0);
const OFFSET_RANGE: (f64, f64) = (-90.0, 90.0);

/// Connection status line plus live indicators for the control state.
pub struct ConsoleView {
    state: watch::Receiver<ControlState>,
    status: watch::Receiver<bool>,
}

impl ConsoleView {
    pub fn new(state: watch::Receiver<ControlState>, status: watch::Receiver<bool>) -> Self {
        Self { state, status }
    }

    pub fn is_connected(&self) -> bool {
        *self.status.borrow()
    }

    pub fn status_text(&self) -> &'static str {
        if self.is_connected() {
            "Connected"
        } else {
            "Disconnected"
        }
    }

    pub fn render(&mut self, ui: &mut Ui) {
        let state = *self.state.borrow();

        ui.horizontal(|ui| {
            ui.heading("Relay");
            ui.add_space(8.0);
            ui.label(
                RichText::new(self.status_text())
                    .strong()
                    .color(status_color(self.is_connected())),
            );
        });
        ui.add_space(6.0);

        create_frame(UiColors::INNER_BG, UiColors::BORDER).show(ui, |ui| {
            range_indicator(
                ui,
                "Throttle",
                f64::from(state.throttle),
                THROTTLE_RANGE.0,
                THROTTLE_RANGE.1,
            );
            range_indicator(
                ui,
                "Steering",
                f64::from(state.steering),
                f64::from(STEERING_MIN),
                f64::from(STEERING_MAX),
            );
            range_indicator(
                ui,
                "Offset",
                state.steering_offset,
                OFFSET_RANGE.0,
                OFFSET_RANGE.1,
            );
            ui.add_space(4.0);
            ui.label(
                RichText::new(format!(
                    "keyboard frame {}   gamepad frame {}",
                    ControlFrame::from_keyboard(&state),
                    ControlFrame::from_gamepad(&state)
                ))
                .monospace(),
            );
        });

        ui.add_space(6.0);
        ui.label(format!(
            "Up/Down: throttle {} / {}   Left/Right: steer in steps   release to center",
            THROTTLE_FORWARD, THROTTLE_REVERSE
        ));
    }
}
