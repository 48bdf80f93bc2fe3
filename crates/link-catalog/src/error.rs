//! Catalog error types.

use thiserror::Error;

/// Errors raised by catalog lookups and publishing operations.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The requested operating system is not in the supported set.
    #[error("Unsupported operating system: {0}")]
    UnsupportedOs(String),

    /// The requested locale is not supported and the policy rejects it.
    #[error("Unsupported locale: {0}")]
    UnsupportedLocale(String),

    /// A catalog file is missing or cannot be used.
    #[error("Link file error: {0}")]
    LinkFile(String),

    /// A link or catalog line does not have the expected shape.
    #[error("Link format error: {0}")]
    LinkFormat(String),

    /// Catalog inconsistency that signals a configuration bug.
    #[error("Internal catalog error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using CatalogError.
pub type CatalogResult<T> = Result<T, CatalogError>;
