use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite};

use crate::models::{NewStudent, Student};

pub async fn fetch_student<'e, E>(db: E, id: i64) -> Result<Option<Student>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Active students with the given name, compared case-insensitively.
pub async fn find_by_name<'e, E>(
    db: E,
    first_name: &str,
    last_name: &str,
) -> Result<Vec<Student>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Student>(
        r#"
        SELECT * FROM students
        WHERE first_name = ? COLLATE NOCASE
          AND last_name = ? COLLATE NOCASE
          AND is_active = 1
        ORDER BY id
        "#,
    )
    .bind(first_name)
    .bind(last_name)
    .fetch_all(db)
    .await
}

pub async fn insert_student<'e, E>(
    db: E,
    student: &NewStudent,
    now: DateTime<Utc>,
) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO students
            (first_name, last_name, birth_date, contact_email, contact_phone,
            contact_owner, guardian_name, address, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
        "#,
    )
    .bind(&student.first_name)
    .bind(&student.last_name)
    .bind(student.birth_date)
    .bind(&student.contact_email)
    .bind(&student.contact_phone)
    .bind(student.contact_owner)
    .bind(&student.guardian_name)
    .bind(&student.address)
    .bind(now)
    .bind(now)
    .execute(db)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Replaces the contact details with the ones from the latest submission.
pub async fn update_contact<'e, E>(
    db: E,
    id: i64,
    student: &NewStudent,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        UPDATE students SET
            contact_email = ?, contact_phone = ?, contact_owner = ?,
            guardian_name = COALESCE(?, guardian_name),
            address = COALESCE(?, address),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&student.contact_email)
    .bind(&student.contact_phone)
    .bind(student.contact_owner)
    .bind(&student.guardian_name)
    .bind(&student.address)
    .bind(now)
    .bind(id)
    .execute(db)
    .await?;
    Ok(())
}
