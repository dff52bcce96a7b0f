use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;

use crate::errors::StoreError;
use crate::models::record::{NewRecord, OwnerKey, Record, RecordId};
use crate::store::RecordStore;

#[derive(Default)]
struct Inner {
    next_id: RecordId,
    records: BTreeMap<RecordId, Record>,
    last_scan: Option<NaiveDate>,
    fail_owner: Option<OwnerKey>,
}

/// In-process store for scan and scheduler tests.
#[derive(Default)]
pub struct MemoryRecordStore {
    inner: Mutex<Inner>,
}

impl MemoryRecordStore {
    /// Makes `list_records` fail for `owner` with a timeout.
    pub async fn fail_listing_for(&self, owner: OwnerKey) {
        self.inner.lock().await.fail_owner = Some(owner);
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn list_owners(&self) -> Result<Vec<OwnerKey>, StoreError> {
        let inner = self.inner.lock().await;
        let mut owners: Vec<_> = inner.records.values().map(|r| r.owner).collect();
        owners.sort_unstable();
        owners.dedup();
        Ok(owners)
    }

    async fn list_records(&self, owner: OwnerKey) -> Result<Vec<Record>, StoreError> {
        let inner = self.inner.lock().await;
        if inner.fail_owner == Some(owner) {
            return Err(StoreError::Timeout("list_records"));
        }
        Ok(inner
            .records
            .values()
            .filter(|r| r.owner == owner)
            .cloned()
            .collect())
    }

    async fn add_record(&self, owner: OwnerKey, record: NewRecord) -> Result<RecordId, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.next_id += 1;
        let id = inner.next_id;
        inner.records.insert(
            id,
            Record {
                id,
                owner,
                full_name: record.full_name.trim().to_string(),
                birth: record.birth,
                death: record.death,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn remove_record(&self, owner: OwnerKey, id: RecordId) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.records.get(&id) {
            Some(r) if r.owner == owner => Ok(inner.records.remove(&id).is_some()),
            _ => Ok(false),
        }
    }

    async fn last_scan_date(&self) -> Result<Option<NaiveDate>, StoreError> {
        Ok(self.inner.lock().await.last_scan)
    }

    async fn mark_scanned(&self, date: NaiveDate) -> Result<(), StoreError> {
        self.inner.lock().await.last_scan = Some(date);
        Ok(())
    }
}
