//! Input sources and how they change the control state
//!
//! - [`keyboard`] - arrow keys as absolute throttle/steering values
//! - [`gamepad`] - analog frames read through a button mapping
//! - [`aggregator`] - the single place both sources write to
//! - [`poller`] - gilrs thread that produces gamepad frames

pub mod aggregator;
pub mod gamepad;
pub mod keyboard;
pub mod poller;

pub use aggregator::InputAggregator;
pub use gamepad::{ButtonReading, GamepadFrame};
pub use keyboard::{KeyCode, KeyEdge};
pub use poller::{LiveFrame, PollerError, PollerHandle, PollerSettings};
