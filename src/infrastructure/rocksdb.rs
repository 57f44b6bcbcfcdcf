use crate::domain::card_range::CardRangeRecord;
use crate::domain::ports::CardRangeStore;
use crate::error::{Result, ThreeDsError};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options};
use std::path::Path;
use std::sync::Arc;

/// Column Family for storing card range rows.
pub const CF_CARD_RANGES: &str = "card_ranges";

/// A persistent card range store using RocksDB.
///
/// Rows are keyed by their big-endian id and stored as JSON, so every
/// `CardRangeRecord` field (serial and active flag included) survives a
/// restart.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the "card_ranges" column family exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_ranges = ColumnFamilyDescriptor::new(CF_CARD_RANGES, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_ranges])?;

        Ok(Self { db: Arc::new(db) })
    }

    fn column_family(&self) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(CF_CARD_RANGES).ok_or_else(|| {
            ThreeDsError::Storage(Box::new(std::io::Error::other(
                "Card ranges column family not found",
            )))
        })
    }
}

#[async_trait]
impl CardRangeStore for RocksDBStore {
    async fn put(&self, record: CardRangeRecord) -> Result<()> {
        let cf = self.column_family()?;
        let key = record.id.to_be_bytes();
        let value = serde_json::to_vec(&record)?;
        self.db.put_cf(cf, key, value)?;
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<CardRangeRecord>> {
        let cf = self.column_family()?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }
}
