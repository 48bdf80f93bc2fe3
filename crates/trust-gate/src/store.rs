//! Store capabilities behind the trust gate.
//!
//! Both traits are keyed by [`StoreKey`]. Implementations must make
//! [`AbuseStore::upsert_with`] and [`WarningStore::mark_warned`] atomic per
//! key, including across processes when the backing state is shared.

use crate::TrustGateResult;
use async_trait::async_trait;
use courier_database::AbuseRecord;
use std::fmt;

/// Identifies one sender on one service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreKey {
    pub user_hash: String,
    pub service: String,
}

impl StoreKey {
    pub fn new(user_hash: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            user_hash: user_hash.into(),
            service: service.into(),
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.user_hash)
    }
}

/// Transformation applied to an abuse record under the store's lock.
pub type AbuseUpdate = Box<dyn FnOnce(Option<AbuseRecord>) -> AbuseRecord + Send + 'static>;

/// Result of an atomic update: the record before and after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbuseTransition {
    pub previous: Option<AbuseRecord>,
    pub current: AbuseRecord,
}

/// Per-sender request counters and block flags.
#[async_trait]
pub trait AbuseStore: Send + Sync {
    /// Current record, if the sender was ever seen.
    async fn get(&self, key: &StoreKey) -> TrustGateResult<Option<AbuseRecord>>;

    /// Read, transform, and write one record without interleaving with any
    /// other update of the same key.
    async fn upsert_with(&self, key: &StoreKey, update: AbuseUpdate)
        -> TrustGateResult<AbuseTransition>;

    /// Set or clear the block flag, creating the record when absent.
    async fn set_blocked(&self, key: &StoreKey, blocked: bool) -> TrustGateResult<()>;

    /// Forget a sender entirely, warned marker included. Returns whether an
    /// abuse record existed.
    async fn clear(&self, key: &StoreKey) -> TrustGateResult<bool>;
}

/// "Already warned" markers of the authentication tier.
#[async_trait]
pub trait WarningStore: Send + Sync {
    /// Insert the marker if absent. Returns `true` only for the call that
    /// inserted it.
    async fn mark_warned(&self, key: &StoreKey) -> TrustGateResult<bool>;

    async fn is_warned(&self, key: &StoreKey) -> TrustGateResult<bool>;
}
