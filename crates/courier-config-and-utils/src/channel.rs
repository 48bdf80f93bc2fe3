//! Vocabulary shared by every layer of the request path.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Communication channel a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Email. The only channel with an authenticity signal (DKIM).
    Email,
    /// Instant messaging (XMPP).
    Xmpp,
    /// Social-media direct message.
    Social,
}

impl ChannelKind {
    /// All channels, in a stable order.
    pub const ALL: [ChannelKind; 3] = [Self::Email, Self::Xmpp, Self::Social];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Xmpp => "xmpp",
            Self::Social => "social",
        }
    }

    /// Parse a channel name; `None` for anything unknown.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "email" => Some(Self::Email),
            "xmpp" | "im" => Some(Self::Xmpp),
            "social" | "twitter" => Some(Self::Social),
            _ => None,
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do when a request names a locale the catalog does not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalePolicy {
    /// Answer in the default locale.
    Fallback,
    /// Answer with an unsupported-locale notice.
    Reject,
}

impl Default for LocalePolicy {
    fn default() -> Self {
        Self::Fallback
    }
}

/// How a channel's messages carry the requested locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocaleStrategy {
    /// A dedicated `Lang: <code>` line (email).
    LineMarker,
    /// Any token of the message body matching a supported locale.
    InlineToken,
}

/// Kind of reply a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Help,
    Links,
    Mirrors,
}

impl Default for RequestType {
    fn default() -> Self {
        Self::Help
    }
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Help => "help",
            Self::Links => "links",
            Self::Mirrors => "mirrors",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "links" => Self::Links,
            "mirrors" => Self::Mirrors,
            _ => Self::Help,
        }
    }
}
