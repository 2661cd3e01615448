use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite};

use crate::models::{NewActivity, StudentActivity};

pub async fn insert_activity<'e, E>(
    db: E,
    activity: &NewActivity,
    now: DateTime<Utc>,
) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO student_activities
            (student_id, enrolment_id, course_id, activity_type, title,
            description, performed_by, metadata, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(activity.student_id)
    .bind(activity.enrolment_id)
    .bind(activity.course_id)
    .bind(activity.activity_type)
    .bind(&activity.title)
    .bind(&activity.description)
    .bind(&activity.performed_by)
    .bind(activity.metadata.to_string())
    .bind(now)
    .execute(db)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn fetch_for_enrolment<'e, E>(
    db: E,
    enrolment_id: i64,
) -> Result<Vec<StudentActivity>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, StudentActivity>(
        "SELECT * FROM student_activities WHERE enrolment_id = ? ORDER BY id",
    )
    .bind(enrolment_id)
    .fetch_all(db)
    .await
}
