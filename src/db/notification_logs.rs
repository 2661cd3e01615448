use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite};

use crate::models::{NotificationChannel, NotificationLog, NotificationStatus};

pub async fn insert_log<'e, E>(
    db: E,
    channel: NotificationChannel,
    kind: &str,
    recipient: &str,
    status: NotificationStatus,
    error_message: Option<&str>,
    enrolment_id: Option<i64>,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO notification_logs
            (channel, kind, recipient, status, error_message, enrolment_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(channel)
    .bind(kind)
    .bind(recipient)
    .bind(status)
    .bind(error_message)
    .bind(enrolment_id)
    .bind(Utc::now())
    .execute(db)
    .await?;
    Ok(())
}

/// Messages actually delivered on `channel` since `since`.
pub async fn count_sent_since<'e, E>(
    db: E,
    channel: NotificationChannel,
    since: DateTime<Utc>,
) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM notification_logs WHERE channel = ? AND status = 'sent' AND created_at >= ?",
    )
    .bind(channel)
    .bind(since)
    .fetch_one(db)
    .await
}

pub async fn fetch_for_enrolment<'e, E>(
    db: E,
    enrolment_id: i64,
) -> Result<Vec<NotificationLog>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, NotificationLog>(
        "SELECT * FROM notification_logs WHERE enrolment_id = ? ORDER BY id",
    )
    .bind(enrolment_id)
    .fetch_all(db)
    .await
}
