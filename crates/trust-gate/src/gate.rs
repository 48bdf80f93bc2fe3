//! Two-tier admission decision.
//!
//! Tier 1 (authentication) runs only where the channel policy asks for it
//! and decides whether an unverified sender is answered at all. Tier 2
//! (throughput) limits how often one sender is answered per window.

use crate::store::{AbuseStore, AbuseUpdate, StoreKey, WarningStore};
use crate::{TrustGateError, TrustGateResult};
use chrono::{DateTime, Duration, Utc};
use courier_config_and_utils::ChannelPolicy;
use courier_database::AbuseRecord;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Domains whose senders always pass the authentication tier.
const TRUSTED_DOMAINS: &[&str] = &["torproject.org"];

/// Outcome of the authentication tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    /// Sender is trusted; continue to the throughput tier.
    Bypass,
    /// First unverified message: send the explanation once, then stop.
    WarnOnce,
    /// Unverified and already warned: drop silently.
    Ignore,
}

/// Outcome of the throughput tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThroughputDecision {
    Allowed,
    /// Administratively blocked.
    Blocked,
    /// Too many requests in the current window.
    RateLimited,
}

impl ThroughputDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Combined outcome of both tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Serve,
    Warn,
    Ignore,
    Blocked,
    RateLimited,
}

/// What the gate knows about one inbound message.
#[derive(Debug, Clone, Copy)]
pub struct Sender<'a> {
    /// Normalized identity. Compared, never stored or logged.
    pub identity: &'a str,
    /// sha256 hex of `identity`.
    pub user_hash: &'a str,
    /// Channel name used as the store's service key.
    pub service: &'a str,
    /// Verified authenticity signal supplied by the channel.
    pub authenticated: bool,
}

/// Next abuse record and decision for one request.
///
/// Pure: the same inputs always give the same result, so the decision can
/// be recomputed from the record an atomic update saw.
pub fn next_abuse_record(
    previous: Option<&AbuseRecord>,
    key: &StoreKey,
    max_requests: u32,
    wait_minutes: u32,
    now: DateTime<Utc>,
) -> (AbuseRecord, ThroughputDecision) {
    let Some(record) = previous else {
        return (
            AbuseRecord::first(&key.user_hash, &key.service, now),
            ThroughputDecision::Allowed,
        );
    };

    let mut next = record.clone();
    next.request_count = record.request_count.saturating_add(1);

    if record.blocked {
        return (next, ThroughputDecision::Blocked);
    }

    if record.request_count >= max_requests {
        let window_end = record.last_request_at + Duration::minutes(i64::from(wait_minutes));
        if now < window_end {
            return (next, ThroughputDecision::RateLimited);
        }
        return (
            AbuseRecord::first(&key.user_hash, &key.service, now),
            ThroughputDecision::Allowed,
        );
    }

    next.last_request_at = now;
    (next, ThroughputDecision::Allowed)
}

/// Whether a normalized identity belongs to a trusted domain or one of its
/// subdomains.
pub fn is_trusted_domain(identity: &str) -> bool {
    let Some((_, domain)) = identity.rsplit_once('@') else {
        return false;
    };
    let domain = domain.to_ascii_lowercase();
    TRUSTED_DOMAINS.iter().any(|trusted| {
        domain == *trusted
            || domain
                .strip_suffix(trusted)
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

/// Sender admission over swappable stores.
#[derive(Clone)]
pub struct TrustGate {
    abuse: Arc<dyn AbuseStore>,
    warnings: Arc<dyn WarningStore>,
    allowlist: HashSet<String>,
}

impl TrustGate {
    pub fn new(abuse: Arc<dyn AbuseStore>, warnings: Arc<dyn WarningStore>) -> Self {
        Self {
            abuse,
            warnings,
            allowlist: HashSet::new(),
        }
    }

    /// Gate over a store implementing both capabilities.
    pub fn with_store<S>(store: S) -> Self
    where
        S: AbuseStore + WarningStore + 'static,
    {
        let store = Arc::new(store);
        Self::new(store.clone(), store)
    }

    /// Identities that always pass the authentication tier. Entries are
    /// compared lowercase.
    pub fn with_allowlist<I, S>(mut self, identities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowlist = identities
            .into_iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    /// Run both tiers in order under a channel policy.
    pub async fn admit(&self, sender: &Sender<'_>, policy: &ChannelPolicy) -> TrustGateResult<Admission> {
        if policy.require_authentication {
            match self.authenticate(sender).await? {
                AuthDecision::Bypass => {}
                AuthDecision::WarnOnce => return Ok(Admission::Warn),
                AuthDecision::Ignore => return Ok(Admission::Ignore),
            }
        }

        let decision = self
            .check(
                sender.user_hash,
                sender.service,
                policy.max_requests,
                policy.wait_minutes,
            )
            .await?;
        Ok(match decision {
            ThroughputDecision::Allowed => Admission::Serve,
            ThroughputDecision::Blocked => Admission::Blocked,
            ThroughputDecision::RateLimited => Admission::RateLimited,
        })
    }

    /// Authentication tier.
    pub async fn authenticate(&self, sender: &Sender<'_>) -> TrustGateResult<AuthDecision> {
        let key = key_for(sender.user_hash, sender.service)?;

        if sender.authenticated {
            debug!(user_hash = %key.user_hash, "Authenticity signal present");
            return Ok(AuthDecision::Bypass);
        }
        let identity = sender.identity.trim().to_lowercase();
        if self.allowlist.contains(&identity) {
            debug!(user_hash = %key.user_hash, "Sender allow-listed");
            return Ok(AuthDecision::Bypass);
        }
        if is_trusted_domain(&identity) {
            debug!(user_hash = %key.user_hash, "Sender in trusted domain");
            return Ok(AuthDecision::Bypass);
        }

        if self.warnings.mark_warned(&key).await? {
            info!(user_hash = %key.user_hash, service = %key.service, "Unauthenticated sender warned");
            Ok(AuthDecision::WarnOnce)
        } else {
            debug!(user_hash = %key.user_hash, service = %key.service, "Unauthenticated sender ignored");
            Ok(AuthDecision::Ignore)
        }
    }

    /// Throughput tier at the current time.
    pub async fn check(
        &self,
        user_hash: &str,
        service: &str,
        max_requests: u32,
        wait_minutes: u32,
    ) -> TrustGateResult<ThroughputDecision> {
        self.check_at(user_hash, service, max_requests, wait_minutes, Utc::now())
            .await
    }

    /// Throughput tier, allowed or not.
    pub async fn allow(
        &self,
        user_hash: &str,
        service: &str,
        max_requests: u32,
        wait_minutes: u32,
    ) -> TrustGateResult<bool> {
        Ok(self
            .check(user_hash, service, max_requests, wait_minutes)
            .await?
            .is_allowed())
    }

    /// Throughput tier at an explicit time.
    pub async fn check_at(
        &self,
        user_hash: &str,
        service: &str,
        max_requests: u32,
        wait_minutes: u32,
        now: DateTime<Utc>,
    ) -> TrustGateResult<ThroughputDecision> {
        let key = key_for(user_hash, service)?;

        let update_key = key.clone();
        let update: AbuseUpdate = Box::new(move |previous: Option<AbuseRecord>| {
            next_abuse_record(previous.as_ref(), &update_key, max_requests, wait_minutes, now).0
        });
        let transition = self.abuse.upsert_with(&key, update).await?;

        let (_, decision) = next_abuse_record(
            transition.previous.as_ref(),
            &key,
            max_requests,
            wait_minutes,
            now,
        );

        match decision {
            ThroughputDecision::Allowed => debug!(
                user_hash = %key.user_hash,
                service = %key.service,
                request_count = transition.current.request_count,
                "Request allowed"
            ),
            ThroughputDecision::Blocked => warn!(
                user_hash = %key.user_hash,
                service = %key.service,
                request_count = transition.current.request_count,
                "Blocked sender denied"
            ),
            ThroughputDecision::RateLimited => info!(
                user_hash = %key.user_hash,
                service = %key.service,
                request_count = transition.current.request_count,
                "Sender rate limited"
            ),
        }
        Ok(decision)
    }

    /// Permanently deny a sender until [`TrustGate::unblock`] or
    /// [`TrustGate::reset`].
    pub async fn block(&self, user_hash: &str, service: &str) -> TrustGateResult<()> {
        let key = key_for(user_hash, service)?;
        self.abuse.set_blocked(&key, true).await?;
        info!(user_hash = %key.user_hash, service = %key.service, "Sender blocked");
        Ok(())
    }

    /// Lift a block, keeping the request count.
    pub async fn unblock(&self, user_hash: &str, service: &str) -> TrustGateResult<()> {
        let key = key_for(user_hash, service)?;
        self.abuse.set_blocked(&key, false).await?;
        info!(user_hash = %key.user_hash, service = %key.service, "Sender unblocked");
        Ok(())
    }

    /// Purge every trace of a sender. Returns whether an abuse record
    /// existed.
    pub async fn reset(&self, user_hash: &str, service: &str) -> TrustGateResult<bool> {
        let key = key_for(user_hash, service)?;
        let existed = self.abuse.clear(&key).await?;
        info!(user_hash = %key.user_hash, service = %key.service, existed, "Sender reset");
        Ok(existed)
    }

    /// Current abuse record, for operators.
    pub async fn record(&self, user_hash: &str, service: &str) -> TrustGateResult<Option<AbuseRecord>> {
        let key = key_for(user_hash, service)?;
        self.abuse.get(&key).await
    }
}

fn key_for(user_hash: &str, service: &str) -> TrustGateResult<StoreKey> {
    let user_hash = user_hash.trim();
    if user_hash.is_empty() {
        return Err(TrustGateError::EmptyIdentity);
    }
    Ok(StoreKey::new(user_hash, service))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::minutes(minutes)
    }

    fn key() -> StoreKey {
        StoreKey::new("h", "email")
    }

    #[test]
    fn first_request_creates_record() {
        let (record, decision) = next_abuse_record(None, &key(), 3, 60, at(0));
        assert_eq!(decision, ThroughputDecision::Allowed);
        assert_eq!(record.request_count, 1);
        assert_eq!(record.last_request_at, at(0));
    }

    #[test]
    fn under_limit_increments_and_moves_last() {
        let previous = AbuseRecord::first("h", "email", at(0));
        let (record, decision) = next_abuse_record(Some(&previous), &key(), 3, 60, at(5));
        assert_eq!(decision, ThroughputDecision::Allowed);
        assert_eq!(record.request_count, 2);
        assert_eq!(record.last_request_at, at(5));
    }

    #[test]
    fn at_limit_inside_window_denies_without_moving_last() {
        let previous = AbuseRecord {
            request_count: 3,
            ..AbuseRecord::first("h", "email", at(0))
        };
        let (record, decision) = next_abuse_record(Some(&previous), &key(), 3, 60, at(59));
        assert_eq!(decision, ThroughputDecision::RateLimited);
        assert_eq!(record.request_count, 4);
        assert_eq!(record.last_request_at, at(0));
    }

    #[test]
    fn at_limit_after_window_resets() {
        let previous = AbuseRecord {
            request_count: 7,
            ..AbuseRecord::first("h", "email", at(0))
        };
        let (record, decision) = next_abuse_record(Some(&previous), &key(), 3, 60, at(60));
        assert_eq!(decision, ThroughputDecision::Allowed);
        assert_eq!(record.request_count, 1);
        assert_eq!(record.last_request_at, at(60));
    }

    #[test]
    fn blocked_always_denies_and_counts() {
        let previous = AbuseRecord {
            blocked: true,
            request_count: 10,
            ..AbuseRecord::first("h", "email", at(0))
        };
        let (record, decision) =
            next_abuse_record(Some(&previous), &key(), 3, 60, at(60 * 24 * 365));
        assert_eq!(decision, ThroughputDecision::Blocked);
        assert_eq!(record.request_count, 11);
        assert!(record.blocked);
    }

    #[test]
    fn trusted_domain_matching() {
        assert!(is_trusted_domain("alice@torproject.org"));
        assert!(is_trusted_domain("bob@lists.torproject.org"));
        assert!(!is_trusted_domain("mallory@nottorproject.org"));
        assert!(!is_trusted_domain("mallory@torproject.org.evil.com"));
        assert!(!is_trusted_domain("no-domain"));
    }

    #[test]
    fn empty_identity_rejected() {
        assert!(matches!(key_for("  ", "email"), Err(TrustGateError::EmptyIdentity)));
    }
}
