//! SQLite-backed trust store.

use crate::store::{AbuseStore, AbuseTransition, AbuseUpdate, StoreKey, WarningStore};
use crate::TrustGateResult;
use async_trait::async_trait;
use chrono::Utc;
use courier_database::{queries, AbuseRecord, AsyncDatabase};

/// Trust state in the shared SQLite database.
///
/// Every operation runs on the database's executor thread; updates take an
/// immediate transaction so other processes on the same file wait.
#[derive(Clone)]
pub struct SqliteTrustStore {
    db: AsyncDatabase,
}

impl SqliteTrustStore {
    pub fn new(db: AsyncDatabase) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &AsyncDatabase {
        &self.db
    }
}

#[async_trait]
impl AbuseStore for SqliteTrustStore {
    async fn get(&self, key: &StoreKey) -> TrustGateResult<Option<AbuseRecord>> {
        let key = key.clone();
        let record = self
            .db
            .call(move |conn| queries::get_abuse_record(conn, &key.user_hash, &key.service))
            .await?;
        Ok(record)
    }

    async fn upsert_with(
        &self,
        key: &StoreKey,
        update: AbuseUpdate,
    ) -> TrustGateResult<AbuseTransition> {
        let key = key.clone();
        let (previous, current) = self
            .db
            .call_mut(move |conn| {
                queries::update_abuse_record_with(conn, &key.user_hash, &key.service, update)
            })
            .await?;
        Ok(AbuseTransition { previous, current })
    }

    async fn set_blocked(&self, key: &StoreKey, blocked: bool) -> TrustGateResult<()> {
        let key = key.clone();
        let now = Utc::now();
        self.db
            .call(move |conn| {
                queries::set_abuse_blocked(conn, &key.user_hash, &key.service, blocked, now)
            })
            .await?;
        Ok(())
    }

    async fn clear(&self, key: &StoreKey) -> TrustGateResult<bool> {
        let key = key.clone();
        let existed = self
            .db
            .call(move |conn| {
                let existed = queries::delete_abuse_record(conn, &key.user_hash, &key.service)?;
                queries::clear_warned(conn, &key.user_hash, &key.service)?;
                Ok(existed)
            })
            .await?;
        Ok(existed)
    }
}

#[async_trait]
impl WarningStore for SqliteTrustStore {
    async fn mark_warned(&self, key: &StoreKey) -> TrustGateResult<bool> {
        let key = key.clone();
        let now = Utc::now();
        let inserted = self
            .db
            .call(move |conn| queries::mark_warned(conn, &key.user_hash, &key.service, now))
            .await?;
        Ok(inserted)
    }

    async fn is_warned(&self, key: &StoreKey) -> TrustGateResult<bool> {
        let key = key.clone();
        let warned = self
            .db
            .call(move |conn| queries::is_warned(conn, &key.user_hash, &key.service))
            .await?;
        Ok(warned)
    }
}
