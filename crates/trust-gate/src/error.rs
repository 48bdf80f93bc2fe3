//! Trust gate error types.

use courier_database::DatabaseError;
use thiserror::Error;

/// Errors raised while deciding whether to serve a sender.
#[derive(Error, Debug)]
pub enum TrustGateError {
    /// The caller supplied no sender identity.
    #[error("Empty sender identity")]
    EmptyIdentity,

    /// The backing store failed.
    #[error("Trust store error: {0}")]
    Store(String),
}

impl From<DatabaseError> for TrustGateError {
    fn from(e: DatabaseError) -> Self {
        Self::Store(e.to_string())
    }
}

/// Result type alias using TrustGateError.
pub type TrustGateResult<T> = Result<T, TrustGateError>;
