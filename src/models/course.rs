use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

use super::{decimal_column, nullable, optional_decimal_column};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum CourseStatus {
    Draft,
    Published,
    Expired,
}

impl CourseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseStatus::Draft => "draft",
            CourseStatus::Published => "published",
            CourseStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum CourseType {
    #[default]
    Group,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RepeatPattern {
    #[default]
    Once,
    Daily,
    Weekly,
    Monthly,
}

/// Public availability of a course, derived on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BookableState {
    Bookable,
    FullyBooked,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub short_description: String,
    pub course_type: CourseType,
    pub status: CourseStatus,
    pub price: Decimal,
    pub early_bird_price: Option<Decimal>,
    pub early_bird_deadline: Option<NaiveDate>,
    pub registration_fee: Option<Decimal>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub repeat_pattern: RepeatPattern,
    pub weekday: Option<Weekday>,
    pub start_time: NaiveTime,
    pub duration_minutes: i64,
    pub vacancy: i64,
    pub is_online_bookable: bool,
    pub enrolment_deadline: Option<NaiveDate>,
    pub teacher_id: Option<i64>,
    pub facility_id: Option<i64>,
    pub classroom_id: Option<i64>,
    pub external_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Course {
    /// Last day a class can fall on.
    pub fn last_day(&self) -> NaiveDate {
        self.end_date.unwrap_or(self.start_date)
    }

    pub fn has_early_bird(&self) -> bool {
        matches!(
            (self.early_bird_price, self.early_bird_deadline),
            (Some(price), Some(_)) if price < self.price
        )
    }

    pub fn is_early_bird_available(&self, on: NaiveDate) -> bool {
        self.has_early_bird() && self.early_bird_deadline.is_some_and(|deadline| on <= deadline)
    }

    /// Course fee a submission made on `on` is quoted.
    pub fn applicable_price(&self, on: NaiveDate) -> Decimal {
        match self.early_bird_price {
            Some(early) if self.is_early_bird_available(on) => early,
            _ => self.price,
        }
    }

    pub fn registration_fee_or_zero(&self) -> Decimal {
        self.registration_fee.unwrap_or(Decimal::ZERO)
    }
}

pub(crate) fn weekday_from_index(index: i64) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Mon),
        1 => Some(Weekday::Tue),
        2 => Some(Weekday::Wed),
        3 => Some(Weekday::Thu),
        4 => Some(Weekday::Fri),
        5 => Some(Weekday::Sat),
        6 => Some(Weekday::Sun),
        _ => None,
    }
}

pub(crate) fn weekday_index(weekday: Weekday) -> i64 {
    i64::from(weekday.num_days_from_monday())
}

impl<'r> FromRow<'r, SqliteRow> for Course {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let weekday = match row.try_get::<Option<i64>, _>("weekday")? {
            Some(index) => Some(weekday_from_index(index).ok_or_else(|| {
                sqlx::Error::ColumnDecode {
                    index: "weekday".to_string(),
                    source: format!("weekday out of range: {}", index).into(),
                }
            })?),
            None => None,
        };

        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            short_description: row.try_get("short_description")?,
            course_type: row.try_get("course_type")?,
            status: row.try_get("status")?,
            price: decimal_column(row, "price")?,
            early_bird_price: optional_decimal_column(row, "early_bird_price")?,
            early_bird_deadline: row.try_get("early_bird_deadline")?,
            registration_fee: optional_decimal_column(row, "registration_fee")?,
            start_date: row.try_get("start_date")?,
            end_date: row.try_get("end_date")?,
            repeat_pattern: row.try_get("repeat_pattern")?,
            weekday,
            start_time: row.try_get("start_time")?,
            duration_minutes: row.try_get("duration_minutes")?,
            vacancy: row.try_get("vacancy")?,
            is_online_bookable: row.try_get("is_online_bookable")?,
            enrolment_deadline: row.try_get("enrolment_deadline")?,
            teacher_id: row.try_get("teacher_id")?,
            facility_id: row.try_get("facility_id")?,
            classroom_id: row.try_get("classroom_id")?,
            external_id: row.try_get("external_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

fn default_duration() -> i64 {
    60
}

fn default_vacancy() -> i64 {
    1
}

fn default_true() -> bool {
    true
}

fn default_status() -> CourseStatus {
    CourseStatus::Draft
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCourseRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub course_type: CourseType,
    #[serde(default = "default_status")]
    pub status: CourseStatus,
    pub price: Decimal,
    pub early_bird_price: Option<Decimal>,
    pub early_bird_deadline: Option<NaiveDate>,
    pub registration_fee: Option<Decimal>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub repeat_pattern: RepeatPattern,
    pub weekday: Option<Weekday>,
    pub start_time: NaiveTime,
    #[serde(default = "default_duration")]
    pub duration_minutes: i64,
    #[serde(default = "default_vacancy")]
    pub vacancy: i64,
    #[serde(default = "default_true")]
    pub is_online_bookable: bool,
    pub enrolment_deadline: Option<NaiveDate>,
    pub teacher_id: Option<i64>,
    pub facility_id: Option<i64>,
    pub classroom_id: Option<i64>,
}

/// Partial course edit. Absent fields are left unchanged; an explicit
/// `null` clears a nullable field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCourseRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub course_type: Option<CourseType>,
    pub status: Option<CourseStatus>,
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub early_bird_price: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub early_bird_deadline: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub registration_fee: Option<Option<Decimal>>,
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<Option<NaiveDate>>,
    pub repeat_pattern: Option<RepeatPattern>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub weekday: Option<Option<Weekday>>,
    pub start_time: Option<NaiveTime>,
    pub duration_minutes: Option<i64>,
    pub vacancy: Option<i64>,
    pub is_online_bookable: Option<bool>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub enrolment_deadline: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub facility_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub classroom_id: Option<Option<i64>>,
}

impl NewCourseRequest {
    /// Unsaved course row built from the request (`id` is 0).
    pub fn into_course(self, now: DateTime<Utc>) -> Course {
        let end_date = match self.repeat_pattern {
            RepeatPattern::Once => Some(self.start_date),
            _ => self.end_date,
        };
        Course {
            id: 0,
            name: self.name.trim().to_string(),
            description: self.description,
            short_description: self.short_description,
            course_type: self.course_type,
            status: self.status,
            price: self.price,
            early_bird_price: self.early_bird_price,
            early_bird_deadline: self.early_bird_deadline,
            registration_fee: self.registration_fee,
            start_date: self.start_date,
            end_date,
            repeat_pattern: self.repeat_pattern,
            weekday: self.weekday,
            start_time: self.start_time,
            duration_minutes: self.duration_minutes,
            vacancy: self.vacancy,
            is_online_bookable: self.is_online_bookable,
            enrolment_deadline: self.enrolment_deadline,
            teacher_id: self.teacher_id,
            facility_id: self.facility_id,
            classroom_id: self.classroom_id,
            external_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl UpdateCourseRequest {
    /// Fields that may not change once the course has classes, when this
    /// request would actually change them.
    pub fn frozen_changes(&self, course: &Course) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.repeat_pattern.is_some_and(|v| v != course.repeat_pattern) {
            changed.push("repeat_pattern");
        }
        if self.course_type.is_some_and(|v| v != course.course_type) {
            changed.push("course_type");
        }
        if self.start_date.is_some_and(|v| v != course.start_date) {
            changed.push("start_date");
        }
        if self.end_date.is_some_and(|v| v != course.end_date) {
            changed.push("end_date");
        }
        changed
    }

    pub fn apply(self, course: &mut Course) {
        if let Some(name) = self.name {
            course.name = name.trim().to_string();
        }
        if let Some(description) = self.description {
            course.description = description;
        }
        if let Some(short_description) = self.short_description {
            course.short_description = short_description;
        }
        if let Some(course_type) = self.course_type {
            course.course_type = course_type;
        }
        if let Some(status) = self.status {
            course.status = status;
        }
        if let Some(price) = self.price {
            course.price = price;
        }
        if let Some(early_bird_price) = self.early_bird_price {
            course.early_bird_price = early_bird_price;
        }
        if let Some(early_bird_deadline) = self.early_bird_deadline {
            course.early_bird_deadline = early_bird_deadline;
        }
        if let Some(registration_fee) = self.registration_fee {
            course.registration_fee = registration_fee;
        }
        if let Some(start_date) = self.start_date {
            course.start_date = start_date;
        }
        if let Some(end_date) = self.end_date {
            course.end_date = end_date;
        }
        if let Some(repeat_pattern) = self.repeat_pattern {
            course.repeat_pattern = repeat_pattern;
        }
        if let Some(weekday) = self.weekday {
            course.weekday = weekday;
        }
        if let Some(start_time) = self.start_time {
            course.start_time = start_time;
        }
        if let Some(duration_minutes) = self.duration_minutes {
            course.duration_minutes = duration_minutes;
        }
        if let Some(vacancy) = self.vacancy {
            course.vacancy = vacancy;
        }
        if let Some(is_online_bookable) = self.is_online_bookable {
            course.is_online_bookable = is_online_bookable;
        }
        if let Some(enrolment_deadline) = self.enrolment_deadline {
            course.enrolment_deadline = enrolment_deadline;
        }
        if let Some(teacher_id) = self.teacher_id {
            course.teacher_id = teacher_id;
        }
        if let Some(facility_id) = self.facility_id {
            course.facility_id = facility_id;
        }
        if let Some(classroom_id) = self.classroom_id {
            course.classroom_id = classroom_id;
        }
        if course.repeat_pattern == RepeatPattern::Once {
            course.end_date = Some(course.start_date);
        }
    }
}
