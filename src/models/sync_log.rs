use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum SyncAction {
    Create,
    Update,
    /// Stored listing id was gone on the storefront; a new listing replaced it.
    Recreate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SyncLog {
    pub id: i64,
    pub course_id: i64,
    pub action: SyncAction,
    pub status: SyncStatus,
    pub external_id: Option<String>,
    pub request_payload: String,
    pub response_payload: Option<String>,
    pub error_message: Option<String>,
    pub duration_ms: i64,
    pub retry_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSyncLog {
    pub course_id: i64,
    pub action: SyncAction,
    pub status: SyncStatus,
    pub external_id: Option<String>,
    pub request_payload: String,
    pub response_payload: Option<String>,
    pub error_message: Option<String>,
    pub duration_ms: i64,
    pub retry_count: i64,
}
