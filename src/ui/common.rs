//! Shared pieces of the operator console: navigation state, colours and the
//! small drawing helpers both screens use.

use egui::{Color32, Frame, ProgressBar, RichText, Stroke};

/// Screen currently shown in the central panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
    /// Live control state and connection status
    Console,
    /// Button mapping editor with the live gamepad view
    Mapping,
}

/// Dark theme palette.
pub struct UiColors;

impl UiColors {
    pub const MAIN_BG: Color32 = Color32::from_rgb(30, 30, 30);
    pub const INNER_BG: Color32 = Color32::from_rgb(25, 25, 25);
    pub const BORDER: Color32 = Color32::from_rgb(60, 60, 60);

    /// Connected, pressed, saved
    pub const ACTIVE: Color32 = Color32::from_rgb(50, 200, 20);

    /// Disconnected, failed
    pub const INACTIVE: Color32 = Color32::from_rgb(200, 50, 20);
}

pub fn create_frame(bg_color: Color32, border_color: Color32) -> Frame {
    Frame::new()
        .stroke(Stroke::new(1.0, border_color))
        .fill(bg_color)
        .inner_margin(6)
        .outer_margin(2)
}

/// Where `value` sits between `min` and `max`, clamped to `0.0..=1.0`.
pub fn position_in_range(value: f64, min: f64, max: f64) -> f32 {
    if max <= min {
        return 0.0;
    }
    ((value - min) / (max - min)).clamp(0.0, 1.0) as f32
}

/// Labelled bar showing `value` within `[min, max]`.
pub fn range_indicator(ui: &mut egui::Ui, label: &str, value: f64, min: f64, max: f64) {
    ui.horizontal(|ui| {
        ui.label(RichText::new(format!("{label:<9}")).monospace());
        ui.add(
            ProgressBar::new(position_in_range(value, min, max))
                .desired_width(ui.available_width() - 10.0)
                .text(format!("{value:.1}  [{min} .. {max}]")),
        );
    });
}

pub fn status_color(active: bool) -> Color32 {
    if active {
        UiColors::ACTIVE
    } else {
        UiColors::INACTIVE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_is_clamped_to_the_bar() {
        assert_eq!(position_in_range(90.0, 20.0, 160.0), 0.5);
        assert_eq!(position_in_range(-500.0, -90.0, 90.0), 0.0);
        assert_eq!(position_in_range(190.0, 0.0, 180.0), 1.0);
        assert_eq!(position_in_range(1.0, 5.0, 5.0), 0.0);
    }

    #[test]
    fn status_colors() {
        assert_eq!(status_color(true), UiColors::ACTIVE);
        assert_eq!(status_color(false), UiColors::INACTIVE);
    }
}
