//! Record Store Adapter: owner-scoped persistence of tracked people plus the
//! scan watermark used by the scheduler.

pub mod sqlite;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::StoreError;
use crate::models::record::{NewRecord, OwnerKey, Record, RecordId};

pub use sqlite::SqliteRecordStore;

/// Carried in `AppState` as `Arc<dyn RecordStore>`.
///
/// Implementations bound every call with a timeout; a timeout surfaces as
/// `StoreError::Timeout`. Writes may interleave with a running scan: a record
/// removed mid-scan may or may not appear in that scan.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every owner with at least one record, ascending.
    async fn list_owners(&self) -> Result<Vec<OwnerKey>, StoreError>;

    /// The owner's records ordered by identifier.
    async fn list_records(&self, owner: OwnerKey) -> Result<Vec<Record>, StoreError>;

    async fn add_record(&self, owner: OwnerKey, record: NewRecord) -> Result<RecordId, StoreError>;

    /// True iff a row was deleted.
    async fn remove_record(&self, owner: OwnerKey, id: RecordId) -> Result<bool, StoreError>;

    /// Date of the last scan that completed; `None` before the first one.
    async fn last_scan_date(&self) -> Result<Option<NaiveDate>, StoreError>;

    async fn mark_scanned(&self, date: NaiveDate) -> Result<(), StoreError>;
}
