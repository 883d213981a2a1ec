//! rc-relay: keyboard and gamepad input fanned out to RC vehicles over
//! WebSocket as `"<throttle>,<steering>"` frames.

pub mod config;
pub mod control;
pub mod input;
pub mod mapping;
pub mod relay;
pub mod status;
pub mod ui;
