//! # Fleet Tracker
//!
//! Live vehicle tracking for the fleet dashboard. A detail view mounts a
//! track controller on either a push stream or a socket channel, seeds it
//! from the vehicle's recorded history and projects every snapshot onto the
//! map.
//!
//! All external capabilities (HTTP, configuration, live channels) are
//! supplied by the host through the [`realtime`] provider traits.

mod config;
mod render;
mod view;

pub use {fleet_api, live_track, realtime};

pub use self::config::*;
pub use self::render::*;
pub use self::view::*;
