//! Dispatcher error types.

use request_classifier::ClassifierError;
use thiserror::Error;

/// Errors raised by a channel adapter.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The raw message could not be read.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The reply could not be handed to the transport.
    #[error("Send error: {0}")]
    Send(String),
}

/// Errors on the dispatcher's request path.
///
/// None of these reach a requester; each one maps to a usage status.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The sender identity is malformed or is our own address.
    #[error("Address error: {0}")]
    Address(String),

    /// The channel adapter failed.
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// A reply could not be delivered.
    #[error("Send error: {0}")]
    Send(String),

    /// The dispatcher could not be assembled.
    #[error("Classifier setup error: {0}")]
    Classifier(#[from] ClassifierError),
}

/// Result type alias using DispatchError.
pub type DispatchResult<T> = Result<T, DispatchError>;
