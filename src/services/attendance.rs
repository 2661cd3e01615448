use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::db;
use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct ResyncReport {
    pub course_id: i64,
    pub created: u64,
    pub total: i64,
}

/// Adds any attendance row missing for a confirmed enrolment on an active
/// class of the course. Existing rows are left alone and nothing is removed.
pub async fn resync_course_attendance(
    db: &SqlitePool,
    course_id: i64,
) -> Result<ResyncReport, AppError> {
    let mut tx = db.begin().await?;
    if db::courses::fetch_course(&mut *tx, course_id).await?.is_none() {
        return Err(AppError::NotFound);
    }

    let created = db::attendance::materialise_for_course(&mut *tx, course_id, Utc::now()).await?;
    let total = db::attendance::count_for_course(&mut *tx, course_id).await?;
    tx.commit().await?;

    info!(course_id, created, total, "attendance resynced");
    Ok(ResyncReport {
        course_id,
        created,
        total,
    })
}
