use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Executor, Sqlite};

use crate::models::{Enrolment, EnrolmentStatus, NewEnrolment, SubmissionRecord};

fn encode_submission(submission: &SubmissionRecord) -> Result<String, sqlx::Error> {
    serde_json::to_string(submission).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

pub async fn insert_enrolment<'e, E>(
    db: E,
    enrolment: &NewEnrolment,
    now: DateTime<Utc>,
) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let submission = encode_submission(&enrolment.submission)?;
    let result = sqlx::query(
        r#"
        INSERT INTO enrolments
            (student_id, course_id, class_id, status, registration_status, source_channel,
            course_fee, registration_fee, is_early_bird, original_price, student_match,
            submission, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(enrolment.student_id)
    .bind(enrolment.course_id)
    .bind(enrolment.class_id)
    .bind(EnrolmentStatus::Pending)
    .bind(enrolment.registration_status)
    .bind(enrolment.source_channel)
    .bind(enrolment.course_fee.to_string())
    .bind(enrolment.registration_fee.to_string())
    .bind(enrolment.is_early_bird)
    .bind(enrolment.original_price.map(|p| p.to_string()))
    .bind(enrolment.student_match)
    .bind(submission)
    .bind(now)
    .bind(now)
    .execute(db)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn fetch_enrolment<'e, E>(db: E, id: i64) -> Result<Option<Enrolment>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Enrolment>("SELECT * FROM enrolments WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Id of a non-cancelled enrolment with the same student, course and class
/// (a missing class only matches a missing class).
pub async fn find_active<'e, E>(
    db: E,
    student_id: i64,
    course_id: i64,
    class_id: Option<i64>,
) -> Result<Option<i64>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar(
        r#"
        SELECT id FROM enrolments
        WHERE student_id = ? AND course_id = ? AND class_id IS ?
          AND status != 'cancelled'
        LIMIT 1
        "#,
    )
    .bind(student_id)
    .bind(course_id)
    .bind(class_id)
    .fetch_optional(db)
    .await
}

/// Whether the student holds any non-cancelled enrolment.
pub async fn has_active<'e, E>(db: E, student_id: i64) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM enrolments WHERE student_id = ? AND status != 'cancelled')",
    )
    .bind(student_id)
    .fetch_one(db)
    .await
}

pub async fn count_confirmed<'e, E>(db: E, course_id: i64) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar("SELECT COUNT(*) FROM enrolments WHERE course_id = ? AND status = 'confirmed'")
        .bind(course_id)
        .fetch_one(db)
        .await
}

pub async fn fetch_for_course<'e, E>(db: E, course_id: i64) -> Result<Vec<Enrolment>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Enrolment>("SELECT * FROM enrolments WHERE course_id = ? ORDER BY id")
        .bind(course_id)
        .fetch_all(db)
        .await
}

/// Moves the enrolment to `to` only if it is currently `from`.
/// Returns false when another writer got there first.
pub async fn transition<'e, E>(
    db: E,
    id: i64,
    from: EnrolmentStatus,
    to: EnrolmentStatus,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE enrolments SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
    )
    .bind(to)
    .bind(now)
    .bind(id)
    .bind(from)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn update_course_fee<'e, E>(
    db: E,
    id: i64,
    course_fee: Decimal,
    submission: &SubmissionRecord,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let submission = encode_submission(submission)?;
    sqlx::query("UPDATE enrolments SET course_fee = ?, submission = ?, updated_at = ? WHERE id = ?")
        .bind(course_fee.to_string())
        .bind(submission)
        .bind(now)
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}
