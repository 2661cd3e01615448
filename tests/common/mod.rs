#![allow(dead_code)]

use std::sync::Arc;

use academy::db;
use academy::models::{Course, EnrolmentForm, NewCourseRequest, Staff, StaffRole};
use academy::services::courses::create_course;
use academy::services::{EnrolmentService, Notifier};
use chrono::NaiveDate;
use serde_json::json;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

/// In-memory database with migrations applied. One connection, kept open,
/// so every query sees the same database.
pub async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create database");

    db::migrate(&pool).await.expect("Failed to run migrations");
    pool
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Day the tests pretend it is.
pub fn today() -> NaiveDate {
    date(2026, 3, 2)
}

pub async fn insert_staff(pool: &SqlitePool, first_name: &str, role: StaffRole) -> Staff {
    let id = db::staff::insert_staff(pool, first_name, "Tester", "staff@school.example", role)
        .await
        .expect("Failed to insert staff");
    db::staff::fetch_staff(pool, id).await.unwrap().unwrap()
}

pub async fn admin(pool: &SqlitePool) -> Staff {
    insert_staff(pool, "Ada", StaffRole::Admin).await
}

/// Published weekly course on Mondays through April 2026.
pub fn course_request(overrides: serde_json::Value) -> NewCourseRequest {
    let mut base = json!({
        "name": "Watercolour Basics",
        "description": "Paint with water.",
        "status": "published",
        "price": "100",
        "start_date": "2026-04-06",
        "end_date": "2026-04-27",
        "repeat_pattern": "weekly",
        "start_time": "18:00:00",
        "duration_minutes": 90,
        "vacancy": 10,
    });
    if let (Some(base), Some(extra)) = (base.as_object_mut(), overrides.as_object()) {
        for (key, value) in extra {
            base.insert(key.clone(), value.clone());
        }
    }
    serde_json::from_value(base).expect("invalid course request")
}

pub async fn create_test_course(pool: &SqlitePool, overrides: serde_json::Value) -> Course {
    create_course(pool, course_request(overrides))
        .await
        .expect("Failed to create course")
}

pub fn adult_form(course_id: i64, first_name: &str) -> EnrolmentForm {
    EnrolmentForm {
        course_id,
        first_name: first_name.to_string(),
        last_name: "Nguyen".to_string(),
        date_of_birth: Some(date(1990, 5, 17)),
        email: format!("{}@mail.example", first_name.to_lowercase()),
        phone: "0400 111 222".to_string(),
        ..Default::default()
    }
}

pub fn enrolments(pool: &SqlitePool) -> EnrolmentService {
    EnrolmentService::new(pool.clone(), Arc::new(Notifier::disabled(pool.clone())))
}
