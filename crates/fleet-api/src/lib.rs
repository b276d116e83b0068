//! # Fleet API
//!
//! Requests against the fleet backend: the vehicle registry and each
//! vehicle's recorded locations. Base URLs are resolved through the
//! [`realtime::Config`] provider at request time.

mod cache;
mod locations;
mod query;
mod vehicles;

pub use self::cache::*;
pub use self::locations::*;
pub use self::query::*;
pub use self::vehicles::*;
