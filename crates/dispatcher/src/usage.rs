//! Usage record sinks.

use async_trait::async_trait;
use courier_database::{queries, AsyncDatabase, DatabaseResult, UsageRecord};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Append-only destination for usage records.
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn record(&self, record: &UsageRecord) -> DatabaseResult<()>;
}

/// Usage records in the shared SQLite database.
#[derive(Clone)]
pub struct SqliteUsageSink {
    db: AsyncDatabase,
}

impl SqliteUsageSink {
    pub fn new(db: AsyncDatabase) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UsageSink for SqliteUsageSink {
    async fn record(&self, record: &UsageRecord) -> DatabaseResult<()> {
        let record = record.clone();
        self.db
            .call(move |conn| queries::insert_usage_record(conn, &record))
            .await?;
        Ok(())
    }
}

/// Usage records kept in memory, shared by clones.
#[derive(Clone, Default)]
pub struct MemoryUsageSink {
    records: Arc<Mutex<Vec<UsageRecord>>>,
}

impl MemoryUsageSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records in insertion order.
    pub async fn records(&self) -> Vec<UsageRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl UsageSink for MemoryUsageSink {
    async fn record(&self, record: &UsageRecord) -> DatabaseResult<()> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }
}
