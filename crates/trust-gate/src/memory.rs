//! In-process trust store.

use crate::store::{AbuseStore, AbuseTransition, AbuseUpdate, StoreKey, WarningStore};
use crate::TrustGateResult;
use async_trait::async_trait;
use chrono::Utc;
use courier_database::AbuseRecord;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Trust state held in memory, shared by clones.
///
/// Suitable for tests and single-process deployments; state is lost on
/// exit.
#[derive(Clone, Default)]
pub struct MemoryTrustStore {
    records: Arc<Mutex<HashMap<StoreKey, AbuseRecord>>>,
    warned: Arc<Mutex<HashSet<StoreKey>>>,
}

impl MemoryTrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of senders with an abuse record.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl AbuseStore for MemoryTrustStore {
    async fn get(&self, key: &StoreKey) -> TrustGateResult<Option<AbuseRecord>> {
        Ok(self.records.lock().await.get(key).cloned())
    }

    async fn upsert_with(
        &self,
        key: &StoreKey,
        update: AbuseUpdate,
    ) -> TrustGateResult<AbuseTransition> {
        let mut records = self.records.lock().await;
        let previous = records.get(key).cloned();
        let current = update(previous.clone());
        records.insert(key.clone(), current.clone());
        Ok(AbuseTransition { previous, current })
    }

    async fn set_blocked(&self, key: &StoreKey, blocked: bool) -> TrustGateResult<()> {
        let mut records = self.records.lock().await;
        records
            .entry(key.clone())
            .and_modify(|record| record.blocked = blocked)
            .or_insert_with(|| AbuseRecord {
                user_hash: key.user_hash.clone(),
                service: key.service.clone(),
                request_count: 0,
                blocked,
                last_request_at: Utc::now(),
            });
        Ok(())
    }

    async fn clear(&self, key: &StoreKey) -> TrustGateResult<bool> {
        let existed = self.records.lock().await.remove(key).is_some();
        self.warned.lock().await.remove(key);
        Ok(existed)
    }
}

#[async_trait]
impl WarningStore for MemoryTrustStore {
    async fn mark_warned(&self, key: &StoreKey) -> TrustGateResult<bool> {
        Ok(self.warned.lock().await.insert(key.clone()))
    }

    async fn is_warned(&self, key: &StoreKey) -> TrustGateResult<bool> {
        Ok(self.warned.lock().await.contains(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_reports_previous_record() {
        let store = MemoryTrustStore::new();
        let key = StoreKey::new("h", "email");
        let now = Utc::now();

        let first = store
            .upsert_with(&key, Box::new(move |_| AbuseRecord::first("h", "email", now)))
            .await
            .unwrap();
        assert!(first.previous.is_none());

        let second = store
            .upsert_with(
                &key,
                Box::new(|prev: Option<AbuseRecord>| {
                    let mut record = prev.unwrap();
                    record.request_count += 1;
                    record
                }),
            )
            .await
            .unwrap();
        assert_eq!(second.previous.unwrap().request_count, 1);
        assert_eq!(second.current.request_count, 2);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn set_blocked_and_clear() {
        let store = MemoryTrustStore::new();
        let key = StoreKey::new("h", "xmpp");

        store.set_blocked(&key, true).await.unwrap();
        store.mark_warned(&key).await.unwrap();
        let record = store.get(&key).await.unwrap().unwrap();
        assert!(record.blocked);
        assert_eq!(record.request_count, 0);

        assert!(store.clear(&key).await.unwrap());
        assert!(!store.is_warned(&key).await.unwrap());
        assert!(!store.clear(&key).await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn warned_marker_inserted_once() {
        let store = MemoryTrustStore::new();
        let key = StoreKey::new("h", "email");

        assert!(!store.is_warned(&key).await.unwrap());
        assert!(store.mark_warned(&key).await.unwrap());
        assert!(!store.mark_warned(&key).await.unwrap());
        assert!(store.is_warned(&key).await.unwrap());
    }
}
