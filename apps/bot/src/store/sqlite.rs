use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::errors::StoreError;
use crate::models::record::{NewRecord, OwnerKey, Record, RecordId};
use crate::store::RecordStore;

/// `RecordStore` over the `persons` and `scan_watermark` tables.
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
    timeout: Duration,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(StoreError::Timeout(op)),
        }
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn list_owners(&self) -> Result<Vec<OwnerKey>, StoreError> {
        self.bounded(
            "list_owners",
            sqlx::query_scalar::<_, OwnerKey>(
                "SELECT DISTINCT chat_id FROM persons ORDER BY chat_id",
            )
            .fetch_all(&self.pool),
        )
        .await
    }

    async fn list_records(&self, owner: OwnerKey) -> Result<Vec<Record>, StoreError> {
        self.bounded(
            "list_records",
            sqlx::query_as::<_, Record>(
                r#"
                SELECT id, chat_id, full_name, birth, death, created_at
                FROM persons
                WHERE chat_id = ?
                ORDER BY id
                "#,
            )
            .bind(owner)
            .fetch_all(&self.pool),
        )
        .await
    }

    async fn add_record(&self, owner: OwnerKey, record: NewRecord) -> Result<RecordId, StoreError> {
        let result = self
            .bounded(
                "add_record",
                sqlx::query(
                    r#"
                    INSERT INTO persons (chat_id, full_name, birth, death, created_at)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(owner)
                .bind(record.full_name.trim())
                .bind(record.birth)
                .bind(record.death)
                .bind(Utc::now())
                .execute(&self.pool),
            )
            .await?;

        let id = result.last_insert_rowid();
        debug!("Inserted record {id} for owner {owner}");
        Ok(id)
    }

    async fn remove_record(&self, owner: OwnerKey, id: RecordId) -> Result<bool, StoreError> {
        let result = self
            .bounded(
                "remove_record",
                sqlx::query("DELETE FROM persons WHERE chat_id = ? AND id = ?")
                    .bind(owner)
                    .bind(id)
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn last_scan_date(&self) -> Result<Option<NaiveDate>, StoreError> {
        self.bounded(
            "last_scan_date",
            sqlx::query_scalar::<_, NaiveDate>(
                "SELECT last_scan_date FROM scan_watermark WHERE id = 1",
            )
            .fetch_optional(&self.pool),
        )
        .await
    }

    async fn mark_scanned(&self, date: NaiveDate) -> Result<(), StoreError> {
        self.bounded(
            "mark_scanned",
            sqlx::query(
                r#"
                INSERT INTO scan_watermark (id, last_scan_date) VALUES (1, ?)
                ON CONFLICT(id) DO UPDATE SET last_scan_date = excluded.last_scan_date
                "#,
            )
            .bind(date)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }
}
