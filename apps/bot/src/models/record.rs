use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

/// The chat a record belongs to; partition key for every store call.
pub type OwnerKey = i64;

/// Longest display name accepted, in characters. Escaped for HTML this stays
/// well inside one Telegram message, so a reminder line is never split.
pub const MAX_NAME_CHARS: usize = 200;

/// Store-assigned identifier, unique per owner and never reused.
pub type RecordId = i64;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Record {
    pub id: RecordId,
    #[sqlx(rename = "chat_id")]
    pub owner: OwnerKey,
    pub full_name: String,
    pub birth: Option<NaiveDate>,
    pub death: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// A record as submitted by the add command, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub full_name: String,
    pub birth: Option<NaiveDate>,
    pub death: Option<NaiveDate>,
}
