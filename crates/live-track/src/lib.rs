//! # Live Track
//!
//! Keeps a vehicle's location track ordered and free of duplicates while
//! records arrive out of order, repeated, and over either a push stream or a
//! socket channel.

mod adapter;
mod controller;
mod model;
mod push;
mod reconcile;
mod retry;
mod socket;

pub use self::adapter::*;
pub use self::controller::*;
pub use self::model::*;
pub use self::push::*;
pub use self::reconcile::*;
pub use self::retry::*;
pub use self::socket::*;
