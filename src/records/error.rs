//! Outcome taxonomy for record operations

use crate::core::DatabaseError;
use thiserror::Error;

/// Result type alias for record operations
pub type RecordResult<T> = std::result::Result<T, RecordError>;

/// Why a record operation did not produce its result
///
/// Only `NotFound` and `BadInput` carry a message meant for the caller; a
/// `StoreFailure` is logged and reported without detail.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The addressed student is absent, or a mark references one that is
    #[error("{0}")]
    NotFound(String),

    /// A path identifier could not be read as an integer
    #[error("{0}")]
    BadInput(String),

    /// Any failure inside the data-access layer
    #[error("Store failure: {0}")]
    StoreFailure(#[from] DatabaseError),
}

impl RecordError {
    /// Create a not-found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        RecordError::NotFound(msg.into())
    }

    /// Create a bad-input error
    pub fn bad_input<S: Into<String>>(msg: S) -> Self {
        RecordError::BadInput(msg.into())
    }
}
