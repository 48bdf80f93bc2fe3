//! Classifier error types.

use thiserror::Error;

/// Errors raised while building a classifier.
#[derive(Error, Debug)]
pub enum ClassifierError {
    /// A pre-processing pattern failed to compile.
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

/// Result type alias using ClassifierError.
pub type ClassifierResult<T> = Result<T, ClassifierError>;
