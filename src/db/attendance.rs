use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite};

use crate::models::Attendance;

// Every insert below is `ON CONFLICT DO NOTHING` against
// UNIQUE(student_id, class_id), so rows_affected is the number created.
// attendance_time is the class's own start, written as RFC 3339 text from
// the stored date and start_time columns.

/// Absent rows for one confirmed enrolment across every active class of its course.
pub async fn materialise_for_enrolment<'e, E>(
    db: E,
    enrolment_id: i64,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO attendances (student_id, class_id, status, attendance_time, created_at, updated_at)
        SELECT e.student_id, c.id, 'absent', c.date || 'T' || c.start_time || '+00:00', ?, ?
        FROM enrolments e
        JOIN classes c ON c.course_id = e.course_id
        WHERE e.id = ?
          AND e.status = 'confirmed'
          AND c.is_active = 1
        ON CONFLICT(student_id, class_id) DO NOTHING
        "#,
    )
    .bind(now)
    .bind(now)
    .bind(enrolment_id)
    .execute(db)
    .await?;
    Ok(result.rows_affected())
}

/// Absent rows for every confirmed enrolment of the class's course.
pub async fn materialise_for_class<'e, E>(
    db: E,
    class_id: i64,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO attendances (student_id, class_id, status, attendance_time, created_at, updated_at)
        SELECT e.student_id, c.id, 'absent', c.date || 'T' || c.start_time || '+00:00', ?, ?
        FROM classes c
        JOIN enrolments e ON e.course_id = c.course_id
        WHERE c.id = ?
          AND c.is_active = 1
          AND e.status = 'confirmed'
        ON CONFLICT(student_id, class_id) DO NOTHING
        "#,
    )
    .bind(now)
    .bind(now)
    .bind(class_id)
    .execute(db)
    .await?;
    Ok(result.rows_affected())
}

/// Fills every missing (confirmed enrolment, active class) pair of a course.
pub async fn materialise_for_course<'e, E>(
    db: E,
    course_id: i64,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO attendances (student_id, class_id, status, attendance_time, created_at, updated_at)
        SELECT e.student_id, c.id, 'absent', c.date || 'T' || c.start_time || '+00:00', ?, ?
        FROM enrolments e
        JOIN classes c ON c.course_id = e.course_id
        WHERE e.course_id = ?
          AND e.status = 'confirmed'
          AND c.is_active = 1
        ON CONFLICT(student_id, class_id) DO NOTHING
        "#,
    )
    .bind(now)
    .bind(now)
    .bind(course_id)
    .execute(db)
    .await?;
    Ok(result.rows_affected())
}

pub async fn fetch_for_student<'e, E>(
    db: E,
    student_id: i64,
) -> Result<Vec<Attendance>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Attendance>(
        "SELECT * FROM attendances WHERE student_id = ? ORDER BY class_id",
    )
    .bind(student_id)
    .fetch_all(db)
    .await
}

pub async fn count_for_course<'e, E>(db: E, course_id: i64) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM attendances a
        JOIN classes c ON c.id = a.class_id
        WHERE c.course_id = ?
        "#,
    )
    .bind(course_id)
    .fetch_one(db)
    .await
}

/// Moves the unmarked rows of a rescheduled class to its new start.
pub async fn retime_for_class<'e, E>(
    db: E,
    class_id: i64,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE attendances
        SET attendance_time = (
                SELECT c.date || 'T' || c.start_time || '+00:00' FROM classes c WHERE c.id = attendances.class_id
            ),
            updated_at = ?
        WHERE class_id = ? AND status = 'absent'
        "#,
    )
    .bind(now)
    .bind(class_id)
    .execute(db)
    .await?;
    Ok(result.rows_affected())
}
