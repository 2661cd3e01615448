use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{Executor, Sqlite};

use crate::models::{Capability, Class, ClassPlacement};

/// Inserts a class unless one already exists at the same date and time.
/// Returns the new id, or `None` when the slot was taken.
pub async fn insert_class<'e, E>(
    db: E,
    course_id: i64,
    date: NaiveDate,
    start_time: NaiveTime,
    duration_minutes: i64,
    placement: ClassPlacement,
    now: DateTime<Utc>,
) -> Result<Option<i64>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO classes
            (course_id, date, start_time, duration_minutes,
            teacher_id, facility_id, classroom_id, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
        ON CONFLICT(course_id, date, start_time) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(course_id)
    .bind(date)
    .bind(start_time)
    .bind(duration_minutes)
    .bind(placement.teacher_id)
    .bind(placement.facility_id)
    .bind(placement.classroom_id)
    .bind(now)
    .bind(now)
    .fetch_optional(db)
    .await
}

pub async fn fetch_class<'e, E>(db: E, id: i64) -> Result<Option<Class>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Class>("SELECT * FROM classes WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn fetch_for_course<'e, E>(db: E, course_id: i64) -> Result<Vec<Class>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Class>(
        "SELECT * FROM classes WHERE course_id = ? ORDER BY date, start_time, id",
    )
    .bind(course_id)
    .fetch_all(db)
    .await
}

pub async fn count_for_course<'e, E>(db: E, course_id: i64) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar("SELECT COUNT(*) FROM classes WHERE course_id = ?")
        .bind(course_id)
        .fetch_one(db)
        .await
}

/// Active classes of a course dated on or after `from`.
pub async fn fetch_upcoming<'e, E>(
    db: E,
    course_id: i64,
    from: NaiveDate,
) -> Result<Vec<Class>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Class>(
        r#"
        SELECT * FROM classes
        WHERE course_id = ? AND is_active = 1 AND date >= ?
        ORDER BY date, start_time, id
        "#,
    )
    .bind(course_id)
    .bind(from)
    .fetch_all(db)
    .await
}

pub async fn update_schedule<'e, E>(
    db: E,
    class: &Class,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        UPDATE classes SET
            date = ?, start_time = ?, duration_minutes = ?,
            teacher_id = ?, facility_id = ?, classroom_id = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(class.date)
    .bind(class.start_time)
    .bind(class.duration_minutes)
    .bind(class.teacher_id)
    .bind(class.facility_id)
    .bind(class.classroom_id)
    .bind(now)
    .bind(class.id)
    .execute(db)
    .await?;
    Ok(())
}

/// Classes dated on or after `from` that `capability` may see.
pub async fn fetch_visible<'e, E>(
    db: E,
    capability: Capability,
    from: NaiveDate,
) -> Result<Vec<Class>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    match capability {
        Capability::Admin => {
            sqlx::query_as::<_, Class>(
                "SELECT * FROM classes WHERE date >= ? ORDER BY date, start_time, id",
            )
            .bind(from)
            .fetch_all(db)
            .await
        }
        Capability::Teacher { staff_id } => {
            sqlx::query_as::<_, Class>(
                r#"
                SELECT * FROM classes
                WHERE date >= ? AND teacher_id = ?
                ORDER BY date, start_time, id
                "#,
            )
            .bind(from)
            .bind(staff_id)
            .fetch_all(db)
            .await
        }
    }
}
