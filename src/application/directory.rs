use crate::domain::card_range::{
    AccountNumber, ActionIndicator, CardRange, CardRangeRecord, CardRangeWrite, RangeKey,
};
use crate::domain::ports::CardRangeStoreBox;
use crate::error::{Result, ThreeDsError};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// An immutable view of every directory row at one serial.
#[derive(Debug, Clone, Default)]
struct DirectorySnapshot {
    rows: BTreeMap<u64, CardRangeRecord>,
    high_watermark: u64,
}

impl DirectorySnapshot {
    fn active(&self) -> impl Iterator<Item = &CardRangeRecord> {
        self.rows.values().filter(|r| r.active)
    }

    fn find_overlap(&self, range: &CardRange, skip_id: Option<u64>) -> Option<&CardRangeRecord> {
        self.active().find(|r| {
            Some(r.id) != skip_id && r.range.acs_id == range.acs_id && r.range.overlaps(range)
        })
    }

    fn find_active(&self, key: &RangeKey) -> Result<&CardRangeRecord> {
        self.active().find(|r| key.matches(&r.range)).ok_or_else(|| {
            ThreeDsError::Validation(format!(
                "no active range {}-{} for {}",
                key.start_range, key.end_range, key.acs_id
            ))
        })
    }
}

/// The versioned table of issuer card ranges.
///
/// Writes are serialized behind a single writer lock, persisted through the
/// store port, and then published as a fresh snapshot. Readers clone the
/// current snapshot pointer, so a query never observes a half-applied write.
pub struct CardRangeDirectory {
    store: CardRangeStoreBox,
    snapshot: RwLock<Arc<DirectorySnapshot>>,
    writer: Mutex<()>,
}

impl CardRangeDirectory {
    /// Opens the directory, rebuilding its rows and serial counter from `store`.
    pub async fn open(store: CardRangeStoreBox) -> Result<Self> {
        let mut snapshot = DirectorySnapshot::default();
        for record in store.load_all().await? {
            snapshot.high_watermark = snapshot.high_watermark.max(record.serial);
            snapshot.rows.insert(record.id, record);
        }
        info!(
            rows = snapshot.rows.len(),
            serial = snapshot.high_watermark,
            "card range directory opened"
        );
        Ok(Self {
            store,
            snapshot: RwLock::new(Arc::new(snapshot)),
            writer: Mutex::new(()),
        })
    }

    async fn current(&self) -> Arc<DirectorySnapshot> {
        self.snapshot.read().await.clone()
    }

    /// Persists `record` and publishes a snapshot containing it. Must be
    /// called with the writer lock held.
    async fn commit(&self, base: &DirectorySnapshot, record: CardRangeRecord) -> Result<()> {
        self.store.put(record.clone()).await?;
        let mut next = base.clone();
        next.high_watermark = record.serial;
        next.rows.insert(record.id, record);
        *self.snapshot.write().await = Arc::new(next);
        Ok(())
    }

    /// Adds a range, assigning it the next serial.
    ///
    /// Fails with `Overlap` if the range intersects an active range of the
    /// same issuer service; the directory is left unchanged.
    pub async fn add_range(&self, mut range: CardRange) -> Result<CardRangeRecord> {
        range.validate()?;
        let _guard = self.writer.lock().await;
        let current = self.current().await;

        if let Some(conflict) = current.find_overlap(&range, None) {
            return Err(ThreeDsError::Overlap {
                acs_id: range.acs_id,
                start: range.start_range.as_str().to_string(),
                end: range.end_range.as_str().to_string(),
                serial: conflict.serial,
            });
        }

        let serial = current.high_watermark + 1;
        range.action_ind = Some(ActionIndicator::Add);
        range.previous_range = None;
        let record = CardRangeRecord {
            id: serial,
            serial,
            active: true,
            range,
        };
        self.commit(&current, record.clone()).await?;
        info!(serial, acs_id = %record.range.acs_id, "card range added");
        Ok(record)
    }

    /// Replaces the boundaries and attributes of the active range matching
    /// `original`.
    pub async fn modify_range(
        &self,
        original: &RangeKey,
        mut replacement: CardRange,
    ) -> Result<CardRangeRecord> {
        replacement.validate()?;
        let _guard = self.writer.lock().await;
        let current = self.current().await;
        let existing = current.find_active(original)?;

        if let Some(conflict) = current.find_overlap(&replacement, Some(existing.id)) {
            return Err(ThreeDsError::Overlap {
                acs_id: replacement.acs_id,
                start: replacement.start_range.as_str().to_string(),
                end: replacement.end_range.as_str().to_string(),
                serial: conflict.serial,
            });
        }

        let serial = current.high_watermark + 1;
        replacement.action_ind = Some(ActionIndicator::Modify);
        replacement.previous_range = Some(existing.range.key());
        let record = CardRangeRecord {
            id: existing.id,
            serial,
            active: true,
            range: replacement,
        };
        self.commit(&current, record.clone()).await?;
        info!(serial, id = record.id, "card range modified");
        Ok(record)
    }

    /// Tombstones the active range matching `key`. The row stays visible to
    /// incremental queries.
    pub async fn delete_range(&self, key: &RangeKey) -> Result<CardRangeRecord> {
        let _guard = self.writer.lock().await;
        let current = self.current().await;
        let existing = current.find_active(key)?;

        let mut range = existing.range.clone();
        range.action_ind = Some(ActionIndicator::Delete);
        range.previous_range = None;
        let record = CardRangeRecord {
            id: existing.id,
            serial: current.high_watermark + 1,
            active: false,
            range,
        };
        self.commit(&current, record.clone()).await?;
        info!(serial = record.serial, id = record.id, "card range deleted");
        Ok(record)
    }

    pub async fn apply(&self, write: CardRangeWrite) -> Result<CardRangeRecord> {
        match write {
            CardRangeWrite::Add(range) => self.add_range(range).await,
            CardRangeWrite::Modify {
                original,
                replacement,
            } => self.modify_range(&original, replacement).await,
            CardRangeWrite::Delete(key) => self.delete_range(&key).await,
        }
    }

    /// Without a watermark: every active row. With one: every row, active or
    /// tombstoned, written after it. Both in serial order.
    pub async fn query(&self, watermark: Option<u64>) -> Vec<CardRangeRecord> {
        self.query_with_serial(watermark).await.0
    }

    /// Like [`query`](Self::query), also returning the high watermark of the
    /// snapshot the rows were read from.
    pub async fn query_with_serial(&self, watermark: Option<u64>) -> (Vec<CardRangeRecord>, u64) {
        let snapshot = self.current().await;
        let mut rows: Vec<CardRangeRecord> = match watermark {
            None => snapshot.active().cloned().collect(),
            Some(watermark) => snapshot
                .rows
                .values()
                .filter(|r| r.serial > watermark)
                .cloned()
                .collect(),
        };
        rows.sort_by_key(|r| r.serial);
        debug!(?watermark, rows = rows.len(), "card range query");
        (rows, snapshot.high_watermark)
    }

    /// The most specific active range containing `number`; the newest wins
    /// between ranges of equal width.
    pub async fn resolve(&self, number: &AccountNumber) -> Option<CardRange> {
        let snapshot = self.current().await;
        snapshot
            .active()
            .filter(|r| r.range.contains(number))
            .min_by_key(|r| (r.range.width(), Reverse(r.serial)))
            .map(|r| r.range.clone())
    }

    /// Serial of the latest successful write, zero for an empty directory.
    pub async fn high_watermark(&self) -> u64 {
        self.current().await.high_watermark
    }
}
