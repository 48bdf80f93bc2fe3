//! Database model types.

use chrono::{DateTime, Utc};
use courier_config_and_utils::{ChannelKind, RequestType};
use serde::{Deserialize, Serialize};

/// Per-sender abuse state for one service (channel).
///
/// Created on the first request of a `(user_hash, service)` pair and never
/// deleted automatically. `blocked` only changes through administrative
/// calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbuseRecord {
    pub user_hash: String,
    pub service: String,
    pub request_count: u32,
    pub blocked: bool,
    /// Stored as epoch seconds; sub-second precision is dropped.
    pub last_request_at: DateTime<Utc>,
}

impl AbuseRecord {
    /// A first-request record.
    pub fn first(user_hash: &str, service: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_hash: user_hash.to_string(),
            service: service.to_string(),
            request_count: 1,
            blocked: false,
            last_request_at: now,
        }
    }
}

/// Outcome category of a handled message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageStatus {
    Ok,
    Malformed,
    Unauthenticated,
    Blacklisted,
    TooManyRequests,
    UnsupportedOs,
    UnsupportedLocale,
    CoreError,
    SendFailed,
}

impl UsageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Malformed => "malformed",
            Self::Unauthenticated => "unauthenticated",
            Self::Blacklisted => "blacklisted",
            Self::TooManyRequests => "too_many_requests",
            Self::UnsupportedOs => "unsupported_os",
            Self::UnsupportedLocale => "unsupported_locale",
            Self::CoreError => "core_error",
            Self::SendFailed => "send_failed",
        }
    }

    /// Parse a stored status. Unknown values map to `CoreError` so a
    /// report never silently counts them as successes.
    pub fn from_str(s: &str) -> Self {
        match s {
            "ok" => Self::Ok,
            "malformed" => Self::Malformed,
            "unauthenticated" => Self::Unauthenticated,
            "blacklisted" => Self::Blacklisted,
            "too_many_requests" => Self::TooManyRequests,
            "unsupported_os" => Self::UnsupportedOs,
            "unsupported_locale" => Self::UnsupportedLocale,
            "send_failed" => Self::SendFailed,
            _ => Self::CoreError,
        }
    }
}

/// One row of operational reporting, written once per handled message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub timestamp: DateTime<Utc>,
    pub channel: ChannelKind,
    /// `None` when the message never reached classification.
    pub request_type: Option<RequestType>,
    pub os: Option<String>,
    pub locale: Option<String>,
    pub status: UsageStatus,
    /// Correlates the record with log lines and an archived message.
    pub diagnostic_ref: Option<String>,
}

impl UsageRecord {
    /// A record for a message that never reached classification.
    pub fn unclassified(channel: ChannelKind, status: UsageStatus, now: DateTime<Utc>) -> Self {
        Self {
            timestamp: now,
            channel,
            request_type: None,
            os: None,
            locale: None,
            status,
            diagnostic_ref: None,
        }
    }
}
