//! Channel adapter contract.

use crate::ChannelError;
use async_trait::async_trait;
use courier_config_and_utils::ChannelKind;

/// A message as read by a channel adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Sender as the transport reports it, before normalization.
    pub sender: String,
    /// Address the message was sent to, when the transport has one.
    pub recipient: Option<String>,
    pub body: String,
    /// Verified authenticity signal (DKIM pass on email).
    pub authenticated: bool,
}

/// A reply handed back to the channel adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Transport-specific reading and sending.
///
/// Implementations do raw I/O only; every decision is made by the
/// dispatcher.
#[async_trait]
pub trait Channel: Send + Sync {
    fn kind(&self) -> ChannelKind;

    /// Extract sender, recipient, body, and authenticity from a raw message.
    fn receive(&self, raw: &str) -> Result<InboundMessage, ChannelError>;

    /// Deliver one reply. Called at most once per reply; never retried.
    async fn send(&self, message: &OutboundMessage) -> Result<(), ChannelError>;
}
