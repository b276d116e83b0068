//! Fleet tracking errors

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result returned by validation and conversion helpers.
pub type Result<T> = anyhow::Result<T, Error>;

/// Domain level error type returned by the tracking crates.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Error {
    /// A vehicle or location payload failed validation.
    #[error("code: 400, description: {0}")]
    BadRequest(String),

    /// The vehicle is unknown to the backend.
    #[error("code: 404, description: {0}")]
    NotFound(String),

    /// Anything not covered by another variant.
    #[error("code: 500, description: {0}")]
    Internal(String),

    /// The fleet backend answered with a failure status.
    #[error("code: 502, description: {0}")]
    BadGateway(String),

    /// A payload could not be decoded.
    #[error("code: 500, description: invalid_format {0}")]
    InvalidFormat(String),

    /// A coordinate is not a valid latitude or longitude.
    #[error("code: 500, description: invalid_coordinate {0}")]
    InvalidCoordinate(String),

    /// A live channel could not be opened or failed.
    #[error("code: 503, description: transport {0}")]
    Transport(String),
}

impl Error {
    /// HTTP status matching the variant.
    #[must_use]
    pub const fn code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::Transport(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Display form, including the code.
    #[must_use]
    pub fn description(&self) -> String {
        self.to_string()
    }
}

impl Error {
    // Same variant with a new description.
    fn with_description(&self, description: String) -> Self {
        match self {
            Self::BadRequest(_) => Self::BadRequest(description),
            Self::NotFound(_) => Self::NotFound(description),
            Self::Internal(_) => Self::Internal(description),
            Self::BadGateway(_) => Self::BadGateway(description),
            Self::InvalidFormat(_) => Self::InvalidFormat(description),
            Self::InvalidCoordinate(_) => Self::InvalidCoordinate(description),
            Self::Transport(_) => Self::Transport(description),
        }
    }
}

/// Keeps the variant of a wrapped [`Error`] and folds the context chain into
/// its description. Anything else becomes [`Error::Internal`].
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        let chain = err.chain().map(ToString::to_string).collect::<Vec<_>>().join(" -> ");
        let Some(inner) = err.downcast_ref::<Self>() else {
            return Self::Internal(chain);
        };
        tracing::debug!(error = %err, cause = %inner, "converting error");

        match inner {
            Self::InvalidFormat(e) | Self::InvalidCoordinate(e) | Self::Transport(e) => {
                inner.with_description(format!("{err}: {e}"))
            }
            _ => inner.with_description(chain),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidFormat(err.to_string())
    }
}

/// `Error::BadRequest` from a format string.
#[macro_export]
macro_rules! bad_request {
    ($($arg:tt)+) => {
        $crate::Error::BadRequest(format!($($arg)+))
    };
}

/// `Error::NotFound` from a format string.
#[macro_export]
macro_rules! not_found {
    ($($arg:tt)+) => {
        $crate::Error::NotFound(format!($($arg)+))
    };
}

/// `Error::BadGateway` from a format string.
#[macro_export]
macro_rules! bad_gateway {
    ($($arg:tt)+) => {
        $crate::Error::BadGateway(format!($($arg)+))
    };
}
