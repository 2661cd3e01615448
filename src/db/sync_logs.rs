use chrono::Utc;
use sqlx::{Executor, Sqlite};

use crate::models::{NewSyncLog, SyncLog};

pub async fn insert_sync_log<'e, E>(db: E, log: &NewSyncLog) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO sync_logs
            (course_id, action, status, external_id, request_payload, response_payload,
            error_message, duration_ms, retry_count, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(log.course_id)
    .bind(log.action)
    .bind(log.status)
    .bind(&log.external_id)
    .bind(&log.request_payload)
    .bind(&log.response_payload)
    .bind(&log.error_message)
    .bind(log.duration_ms)
    .bind(log.retry_count)
    .bind(Utc::now())
    .execute(db)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn fetch_for_course<'e, E>(db: E, course_id: i64) -> Result<Vec<SyncLog>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, SyncLog>("SELECT * FROM sync_logs WHERE course_id = ? ORDER BY id")
        .bind(course_id)
        .fetch_all(db)
        .await
}
