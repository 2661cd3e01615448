use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use tracing::info;

use crate::db;
use crate::error::{AppError, FieldError};
use crate::models::{Course, NewCourseRequest, UpdateCourseRequest};
use crate::services::schedule::{self, ScheduleEdit};

pub fn validate_course(course: &Course) -> Result<(), AppError> {
    let mut errors = Vec::new();

    if course.name.is_empty() {
        errors.push(FieldError::new("name", "Course name is required"));
    }
    if course.price < Decimal::ZERO {
        errors.push(FieldError::new("price", "Price cannot be negative"));
    }
    if let Some(early) = course.early_bird_price {
        if early < Decimal::ZERO || early >= course.price {
            errors.push(FieldError::new(
                "early_bird_price",
                "Early bird price must be below the regular price",
            ));
        }
        if course.early_bird_deadline.is_none() {
            errors.push(FieldError::new(
                "early_bird_deadline",
                "An early bird price needs a deadline",
            ));
        }
    }
    if course.registration_fee.is_some_and(|fee| fee < Decimal::ZERO) {
        errors.push(FieldError::new("registration_fee", "Registration fee cannot be negative"));
    }
    if course.end_date.is_some_and(|end| end < course.start_date) {
        errors.push(FieldError::new("end_date", "End date cannot be before the start date"));
    }
    if course.duration_minutes <= 0 {
        errors.push(FieldError::new("duration_minutes", "Duration must be positive"));
    }
    if course.vacancy < 1 {
        errors.push(FieldError::new("vacancy", "Vacancy must be at least 1"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

pub async fn create_course(db: &SqlitePool, req: NewCourseRequest) -> Result<Course, AppError> {
    let now = Utc::now();
    let course = req.into_course(now);
    validate_course(&course)?;

    let id = db::courses::insert_course(db, &course, now).await?;
    info!(course_id = id, name = %course.name, "course created");

    db::courses::fetch_course(db, id)
        .await?
        .ok_or(AppError::InternalServerError)
}

/// Schedule fields of a PATCH that differ from the stored course, as an
/// edit covering every upcoming class.
fn schedule_changes(req: &UpdateCourseRequest, course: &Course) -> Option<ScheduleEdit> {
    let edit = ScheduleEdit {
        teacher_id: req.teacher_id.filter(|v| *v != course.teacher_id),
        start_time: req.start_time.filter(|v| *v != course.start_time),
        duration_minutes: req.duration_minutes.filter(|v| *v != course.duration_minutes),
        facility_id: req.facility_id.filter(|v| *v != course.facility_id),
        classroom_id: req.classroom_id.filter(|v| *v != course.classroom_id),
        weekday: req.weekday.flatten().filter(|v| Some(*v) != course.weekday),
        class_ids: None,
    };
    (!edit.is_empty()).then_some(edit)
}

/// Applies a partial edit. Once any class exists the recurrence and date
/// range are frozen, and schedule fields carry over to every upcoming class.
pub async fn update_course(
    db: &SqlitePool,
    id: i64,
    req: UpdateCourseRequest,
    today: NaiveDate,
) -> Result<Course, AppError> {
    let mut tx = db.begin().await?;
    let mut course = db::courses::fetch_course(&mut *tx, id)
        .await?
        .ok_or(AppError::NotFound)?;

    let has_classes = db::classes::count_for_course(&mut *tx, id).await? > 0;
    let frozen = req.frozen_changes(&course);
    if has_classes && !frozen.is_empty() {
        return Err(AppError::FrozenFields(frozen));
    }
    let carried = if has_classes {
        schedule_changes(&req, &course)
    } else {
        None
    };

    req.apply(&mut course);
    validate_course(&course)?;

    let now = Utc::now();
    if let Some(edit) = carried {
        let propagation = schedule::apply_to_upcoming(&mut *tx, &mut course, &edit, today, now).await?;
        info!(
            course_id = id,
            classes_updated = propagation.updated.len(),
            "course edit carried to upcoming classes"
        );
    }
    db::courses::update_course(&mut *tx, &course, now).await?;
    tx.commit().await?;
    info!(course_id = id, status = %course.status, "course updated");

    course.updated_at = now;
    Ok(course)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CourseStatus, RepeatPattern};
    use chrono::NaiveTime;

    fn request() -> NewCourseRequest {
        serde_json::from_value(serde_json::json!({
            "name": "Clay",
            "price": "80",
            "start_date": "2026-02-02",
            "start_time": "18:00:00",
        }))
        .unwrap()
    }

    #[test]
    fn test_request_defaults() {
        let course = request().into_course(Utc::now());
        assert_eq!(course.status, CourseStatus::Draft);
        assert_eq!(course.repeat_pattern, RepeatPattern::Once);
        assert_eq!(course.end_date, NaiveDate::from_ymd_opt(2026, 2, 2));
        assert_eq!(course.start_time, NaiveTime::from_hms_opt(18, 0, 0).unwrap());
        assert!(validate_course(&course).is_ok());
    }

    #[test]
    fn test_schedule_changes_skip_unchanged_fields() {
        let mut course = request().into_course(Utc::now());
        course.teacher_id = Some(3);

        let same: UpdateCourseRequest = serde_json::from_value(serde_json::json!({
            "teacher_id": 3,
            "start_time": "18:00:00",
            "name": "Clay II",
        }))
        .unwrap();
        assert!(schedule_changes(&same, &course).is_none());

        let cleared: UpdateCourseRequest =
            serde_json::from_value(serde_json::json!({ "teacher_id": null, "duration_minutes": 90 })).unwrap();
        let edit = schedule_changes(&cleared, &course).unwrap();
        assert_eq!(edit.teacher_id, Some(None));
        assert_eq!(edit.duration_minutes, Some(90));
        assert!(edit.class_ids.is_none());
    }

    #[test]
    fn test_validation_reports_each_field() {
        let mut course = request().into_course(Utc::now());
        course.early_bird_price = Some(Decimal::new(90, 0));
        course.vacancy = 0;

        match validate_course(&course) {
            Err(AppError::Validation(errors)) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["early_bird_price", "early_bird_deadline", "vacancy"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
