use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One scheduled session of a course.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Class {
    pub id: i64,
    pub course_id: i64,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i64,
    pub teacher_id: Option<i64>,
    pub facility_id: Option<i64>,
    pub classroom_id: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Class {
    pub fn starts_at(&self) -> DateTime<Utc> {
        NaiveDateTime::new(self.date, self.start_time).and_utc()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewClassRequest {
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub duration_minutes: Option<i64>,
    pub teacher_id: Option<i64>,
    pub facility_id: Option<i64>,
    pub classroom_id: Option<i64>,
}

/// Who teaches a class and where.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassPlacement {
    pub teacher_id: Option<i64>,
    pub facility_id: Option<i64>,
    pub classroom_id: Option<i64>,
}
