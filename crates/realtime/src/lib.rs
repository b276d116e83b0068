//! # Realtime Core
//!
//! Shared error type and the provider interfaces through which the host
//! supplies HTTP, configuration and live channels.

mod error;
mod provider;

pub use crate::error::*;
pub use crate::provider::*;
