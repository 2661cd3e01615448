use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::db;
use crate::error::AppError;
use crate::models::{BookableState, Course, CourseStatus};

/// Stored status, except a published course past its last day reads as expired.
pub fn effective_status(course: &Course, today: NaiveDate) -> CourseStatus {
    if course.status == CourseStatus::Published && course.last_day() < today {
        CourseStatus::Expired
    } else {
        course.status
    }
}

pub fn bookable_state(course: &Course, confirmed_count: i64, today: NaiveDate) -> BookableState {
    if effective_status(course, today) != CourseStatus::Published || !course.is_online_bookable {
        return BookableState::Closed;
    }
    if course.enrolment_deadline.is_some_and(|deadline| deadline < today) {
        return BookableState::Closed;
    }
    if confirmed_count >= course.vacancy {
        return BookableState::FullyBooked;
    }
    BookableState::Bookable
}

pub fn remaining_vacancy(course: &Course, confirmed_count: i64) -> i64 {
    (course.vacancy - confirmed_count).max(0)
}

#[derive(Debug, Clone, Serialize)]
pub struct Availability {
    pub course_id: i64,
    pub status: CourseStatus,
    pub state: BookableState,
    pub vacancy: i64,
    pub confirmed: i64,
    pub remaining: i64,
}

impl Availability {
    pub fn of(course: &Course, confirmed: i64, today: NaiveDate) -> Self {
        Self {
            course_id: course.id,
            status: effective_status(course, today),
            state: bookable_state(course, confirmed, today),
            vacancy: course.vacancy,
            confirmed,
            remaining: remaining_vacancy(course, confirmed),
        }
    }
}

pub async fn course_availability(
    db: &SqlitePool,
    course: &Course,
    today: NaiveDate,
) -> Result<Availability, AppError> {
    let confirmed = db::enrolments::count_confirmed(db, course.id).await?;
    Ok(Availability::of(course, confirmed, today))
}

/// Flips finished published courses to expired and returns their ids.
/// The caller pushes each one to the storefront after this commits.
pub async fn expire_courses(db: &SqlitePool, today: NaiveDate) -> Result<Vec<i64>, AppError> {
    let mut tx = db.begin().await?;
    let now = Utc::now();

    let finished = db::courses::fetch_finished_published(&mut *tx, today).await?;
    let mut expired = Vec::with_capacity(finished.len());
    for course in finished {
        if db::courses::set_status(&mut *tx, course.id, CourseStatus::Expired, now).await? {
            expired.push(course.id);
        }
    }
    tx.commit().await?;

    info!(count = expired.len(), "expired finished courses");
    Ok(expired)
}
