use std::time::Duration;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS persons (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        chat_id INTEGER NOT NULL,
        full_name TEXT NOT NULL,
        birth TEXT,
        death TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_chat_id ON persons(chat_id)",
    r#"
    CREATE TABLE IF NOT EXISTS scan_watermark (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        last_scan_date TEXT NOT NULL
    )
    "#,
];

/// Opens (creating if missing) the SQLite database at `path` and applies the schema.
pub async fn create_pool(path: &str, acquire_timeout: Duration) -> Result<SqlitePool> {
    info!("Opening SQLite database at {path}...");

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(acquire_timeout)
        .connect_with(options)
        .await?;

    apply_schema(&pool).await?;

    info!("SQLite pool established");
    Ok(pool)
}

/// A private in-memory database. One connection only: every SQLite memory
/// connection is its own database.
#[cfg(test)]
pub async fn create_memory_pool() -> Result<SqlitePool> {
    use std::str::FromStr;

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?)
        .await?;
    apply_schema(&pool).await?;
    Ok(pool)
}

async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
