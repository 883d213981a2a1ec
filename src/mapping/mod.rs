//! Gamepad button mapping
//!
//! A [`ButtonMapping`] tells the gamepad path which physical button or axis
//! drives which logical control. It is persisted as JSON by [`MappingStore`]
//! and shared with the dispatcher through a [`MappingHandle`], which swaps whole
//! snapshots so a reader never sees a half-edited mapping.

pub mod error;
pub mod handle;
pub mod store;

pub use error::MappingError;
pub use handle::{MappingHandle, MappingSnapshot};
pub use store::MappingStore;

use serde::{Deserialize, Serialize};

/// Number of buttons offered by the mapping editor
pub const BUTTON_SLOTS: usize = 20;
/// Number of axes offered by the mapping editor
pub const AXIS_SLOTS: usize = 10;

/// Physical indices for each logical gamepad control.
///
/// Field names serialize in camelCase so the file stays compatible with
/// existing `gamepad-config.json` files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonMapping {
    /// Analog trigger pushing throttle towards 160
    pub throttle_index: usize,
    /// Analog trigger pushing throttle towards 20
    pub reverse_index: usize,
    /// Axis driving steering
    pub steering_index: usize,
    /// Button adding +0.5 trim per frame
    pub steer_offset_right_index: usize,
    /// Button adding -0.5 trim per frame
    pub steer_offset_left_index: usize,
}

impl Default for ButtonMapping {
    fn default() -> Self {
        Self {
            throttle_index: 7,
            reverse_index: 6,
            steering_index: 0,
            steer_offset_right_index: 14,
            steer_offset_left_index: 15,
        }
    }
}

impl ButtonMapping {
    /// Checks every index against the slots the editor exposes.
    pub fn validate(&self) -> Result<(), MappingError> {
        let buttons = [
            ("throttle", self.throttle_index),
            ("reverse", self.reverse_index),
            ("steer offset right", self.steer_offset_right_index),
            ("steer offset left", self.steer_offset_left_index),
        ];
        for (field, index) in buttons {
            if index >= BUTTON_SLOTS {
                return Err(MappingError::OutOfRange {
                    field,
                    index,
                    limit: BUTTON_SLOTS,
                });
            }
        }
        if self.steering_index >= AXIS_SLOTS {
            return Err(MappingError::OutOfRange {
                field: "steering",
                index: self.steering_index,
                limit: AXIS_SLOTS,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mapping_matches_stock_layout() {
        let mapping = ButtonMapping::default();
        assert_eq!(
            (
                mapping.throttle_index,
                mapping.reverse_index,
                mapping.steering_index,
                mapping.steer_offset_right_index,
                mapping.steer_offset_left_index
            ),
            (7, 6, 0, 14, 15)
        );
        assert!(mapping.validate().is_ok());
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let json = serde_json::to_value(ButtonMapping::default()).unwrap();
        assert_eq!(json["throttleIndex"], 7);
        assert_eq!(json["steerOffsetLeftIndex"], 15);
    }

    #[test]
    fn rejects_axis_beyond_editor_range() {
        let mapping = ButtonMapping {
            steering_index: AXIS_SLOTS,
            ..ButtonMapping::default()
        };
        assert!(matches!(
            mapping.validate(),
            Err(MappingError::OutOfRange {
                field: "steering",
                ..
            })
        ));
    }
}
