use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Entry in a student's history.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StudentActivity {
    pub id: i64,
    pub student_id: i64,
    pub enrolment_id: Option<i64>,
    pub course_id: Option<i64>,
    pub activity_type: String,
    pub title: String,
    pub description: String,
    pub performed_by: String,
    pub metadata: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewActivity {
    pub student_id: i64,
    pub enrolment_id: Option<i64>,
    pub course_id: Option<i64>,
    pub activity_type: &'static str,
    pub title: String,
    pub description: String,
    pub performed_by: String,
    pub metadata: serde_json::Value,
}
