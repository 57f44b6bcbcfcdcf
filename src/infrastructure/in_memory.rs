use crate::domain::card_range::CardRangeRecord;
use crate::domain::ports::CardRangeStore;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for card range rows.
///
/// Uses `Arc<RwLock<HashMap<u64, CardRangeRecord>>>` keyed by row id.
/// Used when no persistent database is configured and in tests.
#[derive(Default, Clone)]
pub struct InMemoryCardRangeStore {
    records: Arc<RwLock<HashMap<u64, CardRangeRecord>>>,
}

impl InMemoryCardRangeStore {
    /// Creates a new, empty in-memory card range store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CardRangeStore for InMemoryCardRangeStore {
    async fn put(&self, record: CardRangeRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(record.id, record);
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<CardRangeRecord>> {
        let records = self.records.read().await;
        Ok(records.values().cloned().collect())
    }
}
