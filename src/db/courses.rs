use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Executor, Sqlite};

use crate::models::course::weekday_index;
use crate::models::{Course, CourseStatus};

pub async fn fetch_courses<'e, E>(db: E) -> Result<Vec<Course>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Course>("SELECT * FROM courses ORDER BY start_date, id")
        .fetch_all(db)
        .await
}

pub async fn fetch_course<'e, E>(db: E, id: i64) -> Result<Option<Course>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Inserts `course` as a new row; its `id` and `external_id` are ignored.
pub async fn insert_course<'e, E>(
    db: E,
    course: &Course,
    now: DateTime<Utc>,
) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO courses
            (name, description, short_description, course_type, status,
            price, early_bird_price, early_bird_deadline, registration_fee,
            start_date, end_date, repeat_pattern, weekday, start_time,
            duration_minutes, vacancy, is_online_bookable, enrolment_deadline,
            teacher_id, facility_id, classroom_id, external_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, ?)
        "#,
    )
    .bind(&course.name)
    .bind(&course.description)
    .bind(&course.short_description)
    .bind(course.course_type)
    .bind(course.status)
    .bind(course.price.to_string())
    .bind(course.early_bird_price.map(|p| p.to_string()))
    .bind(course.early_bird_deadline)
    .bind(course.registration_fee.map(|p| p.to_string()))
    .bind(course.start_date)
    .bind(course.end_date)
    .bind(course.repeat_pattern)
    .bind(course.weekday.map(weekday_index))
    .bind(course.start_time)
    .bind(course.duration_minutes)
    .bind(course.vacancy)
    .bind(course.is_online_bookable)
    .bind(course.enrolment_deadline)
    .bind(course.teacher_id)
    .bind(course.facility_id)
    .bind(course.classroom_id)
    .bind(now)
    .bind(now)
    .execute(db)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Writes every editable column of `course`.
pub async fn update_course<'e, E>(
    db: E,
    course: &Course,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE courses SET
            name = ?, description = ?, short_description = ?, course_type = ?, status = ?,
            price = ?, early_bird_price = ?, early_bird_deadline = ?, registration_fee = ?,
            start_date = ?, end_date = ?, repeat_pattern = ?, weekday = ?, start_time = ?,
            duration_minutes = ?, vacancy = ?, is_online_bookable = ?, enrolment_deadline = ?,
            teacher_id = ?, facility_id = ?, classroom_id = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&course.name)
    .bind(&course.description)
    .bind(&course.short_description)
    .bind(course.course_type)
    .bind(course.status)
    .bind(course.price.to_string())
    .bind(course.early_bird_price.map(|p| p.to_string()))
    .bind(course.early_bird_deadline)
    .bind(course.registration_fee.map(|p| p.to_string()))
    .bind(course.start_date)
    .bind(course.end_date)
    .bind(course.repeat_pattern)
    .bind(course.weekday.map(weekday_index))
    .bind(course.start_time)
    .bind(course.duration_minutes)
    .bind(course.vacancy)
    .bind(course.is_online_bookable)
    .bind(course.enrolment_deadline)
    .bind(course.teacher_id)
    .bind(course.facility_id)
    .bind(course.classroom_id)
    .bind(now)
    .bind(course.id)
    .execute(db)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn set_external_id<'e, E>(
    db: E,
    id: i64,
    external_id: &str,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE courses SET external_id = ? WHERE id = ?")
        .bind(external_id)
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

/// Published courses whose last day is before `today`.
pub async fn fetch_finished_published<'e, E>(
    db: E,
    today: NaiveDate,
) -> Result<Vec<Course>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Course>(
        r#"
        SELECT * FROM courses
        WHERE status = ? AND COALESCE(end_date, start_date) < ?
        ORDER BY id
        "#,
    )
    .bind(CourseStatus::Published)
    .bind(today)
    .fetch_all(db)
    .await
}

pub async fn set_status<'e, E>(
    db: E,
    id: i64,
    status: CourseStatus,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE courses SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status)
        .bind(now)
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Courses the storefront is behind on: the latest sync attempt failed, or
/// the course is published but was never listed.
pub async fn fetch_unsynced<'e, E>(db: E) -> Result<Vec<Course>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Course>(
        r#"
        SELECT c.* FROM courses c
        WHERE (c.status = 'published' AND c.external_id IS NULL)
           OR (
                SELECT s.status FROM sync_logs s
                WHERE s.course_id = c.id
                ORDER BY s.id DESC
                LIMIT 1
              ) = 'failed'
        ORDER BY c.id
        "#,
    )
    .fetch_all(db)
    .await
}
