use sqlx::{Executor, Sqlite};

use crate::models::{Classroom, Facility, Staff, StaffRole};

pub async fn fetch_staff<'e, E>(db: E, id: i64) -> Result<Option<Staff>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Staff>("SELECT * FROM staff WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn insert_staff<'e, E>(
    db: E,
    first_name: &str,
    last_name: &str,
    email: &str,
    role: StaffRole,
) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "INSERT INTO staff (first_name, last_name, email, role) VALUES (?, ?, ?, ?)",
    )
    .bind(first_name)
    .bind(last_name)
    .bind(email)
    .bind(role)
    .execute(db)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn fetch_facility<'e, E>(db: E, id: i64) -> Result<Option<Facility>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Facility>("SELECT * FROM facilities WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn insert_facility<'e, E>(db: E, name: &str, address: &str) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("INSERT INTO facilities (name, address) VALUES (?, ?)")
        .bind(name)
        .bind(address)
        .execute(db)
        .await?;
    Ok(result.last_insert_rowid())
}

pub async fn fetch_classroom<'e, E>(db: E, id: i64) -> Result<Option<Classroom>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Classroom>("SELECT * FROM classrooms WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn insert_classroom<'e, E>(
    db: E,
    facility_id: i64,
    name: &str,
) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("INSERT INTO classrooms (facility_id, name) VALUES (?, ?)")
        .bind(facility_id)
        .bind(name)
        .execute(db)
        .await?;
    Ok(result.last_insert_rowid())
}
