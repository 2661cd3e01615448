use std::collections::HashSet;

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};

use crate::db;
use crate::error::AppError;
use crate::models::{Class, ClassPlacement, Course, NewClassRequest, RepeatPattern};

/// Dates a course's recurrence expands to, in order.
pub fn class_dates(course: &Course) -> Vec<NaiveDate> {
    let first = course.start_date;
    let last = course.last_day();

    match course.repeat_pattern {
        RepeatPattern::Once => vec![first],
        RepeatPattern::Daily => first.iter_days().take_while(|d| *d <= last).collect(),
        RepeatPattern::Weekly => {
            let target = course.weekday.unwrap_or_else(|| first.weekday());
            let start = next_on_weekday(first, target);
            start.iter_weeks().take_while(|d| *d <= last).collect()
        }
        RepeatPattern::Monthly => (0..)
            // Offsets are taken from the start date so a clamped month
            // (31st -> 30th) does not drift the following ones.
            .map_while(|k| first.checked_add_months(Months::new(k)))
            .take_while(|d| *d <= last)
            .collect(),
    }
}

/// First date on or after `from` falling on `weekday`.
pub fn next_on_weekday(from: NaiveDate, weekday: Weekday) -> NaiveDate {
    let ahead = (7 + weekday.num_days_from_monday() - from.weekday().num_days_from_monday()) % 7;
    from.checked_add_days(Days::new(u64::from(ahead))).unwrap_or(from)
}

fn course_placement(course: &Course) -> ClassPlacement {
    ClassPlacement {
        teacher_id: course.teacher_id,
        facility_id: course.facility_id,
        classroom_id: course.classroom_id,
    }
}

#[derive(Debug, Serialize)]
pub struct GenerationReport {
    pub created: Vec<Class>,
    pub existing: usize,
    pub attendance_created: u64,
}

/// Persists the recurrence, skipping dates that already have a class, and
/// gives every confirmed enrolment an attendance row on each new class.
pub async fn generate_classes(db: &SqlitePool, course_id: i64) -> Result<GenerationReport, AppError> {
    let mut tx = db.begin().await?;
    let course = db::courses::fetch_course(&mut *tx, course_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let now = Utc::now();
    let placement = course_placement(&course);
    let mut created_ids = Vec::new();
    let mut existing = 0;
    let mut attendance_created = 0;

    for date in class_dates(&course) {
        let inserted = db::classes::insert_class(
            &mut *tx,
            course.id,
            date,
            course.start_time,
            course.duration_minutes,
            placement,
            now,
        )
        .await?;

        match inserted {
            Some(class_id) => {
                attendance_created +=
                    db::attendance::materialise_for_class(&mut *tx, class_id, now).await?;
                created_ids.push(class_id);
            }
            None => existing += 1,
        }
    }

    let mut created = Vec::with_capacity(created_ids.len());
    for id in created_ids {
        if let Some(class) = db::classes::fetch_class(&mut *tx, id).await? {
            created.push(class);
        }
    }
    tx.commit().await?;

    info!(
        course_id,
        created = created.len(),
        existing,
        attendance_created,
        "generated classes"
    );
    Ok(GenerationReport {
        created,
        existing,
        attendance_created,
    })
}

#[derive(Debug, Serialize)]
pub struct AddedClass {
    pub class: Class,
    pub attendance_created: u64,
}

/// One extra class outside the recurrence. Confirmed enrolments get an
/// attendance row straight away; cancelled ones never do.
pub async fn add_class(
    db: &SqlitePool,
    course_id: i64,
    req: NewClassRequest,
) -> Result<AddedClass, AppError> {
    let mut tx = db.begin().await?;
    let course = db::courses::fetch_course(&mut *tx, course_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let duration = req.duration_minutes.unwrap_or(course.duration_minutes);
    if duration <= 0 {
        return Err(AppError::invalid("duration_minutes", "Duration must be positive"));
    }

    let defaults = course_placement(&course);
    let placement = ClassPlacement {
        teacher_id: req.teacher_id.or(defaults.teacher_id),
        facility_id: req.facility_id.or(defaults.facility_id),
        classroom_id: req.classroom_id.or(defaults.classroom_id),
    };

    let now = Utc::now();
    let class_id = db::classes::insert_class(
        &mut *tx,
        course.id,
        req.date,
        req.start_time.unwrap_or(course.start_time),
        duration,
        placement,
        now,
    )
    .await?
    .ok_or_else(|| AppError::Conflict("A class already exists at that date and time".to_string()))?;

    let attendance_created = db::attendance::materialise_for_class(&mut *tx, class_id, now).await?;
    let class = db::classes::fetch_class(&mut *tx, class_id)
        .await?
        .ok_or(AppError::InternalServerError)?;
    tx.commit().await?;

    info!(course_id, class_id, attendance_created, "class added");
    Ok(AddedClass {
        class,
        attendance_created,
    })
}

/// Schedule change applied to the course and to a selection of its upcoming
/// classes. Absent fields stay as they are; `null` clears a placement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleEdit {
    #[serde(default, deserialize_with = "crate::models::nullable", skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<Option<i64>>,
    pub start_time: Option<NaiveTime>,
    pub duration_minutes: Option<i64>,
    #[serde(default, deserialize_with = "crate::models::nullable", skip_serializing_if = "Option::is_none")]
    pub facility_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "crate::models::nullable", skip_serializing_if = "Option::is_none")]
    pub classroom_id: Option<Option<i64>>,
    /// Weekly courses only.
    pub weekday: Option<Weekday>,
    /// Classes to change; all upcoming classes when omitted.
    pub class_ids: Option<Vec<i64>>,
}

impl ScheduleEdit {
    pub fn is_empty(&self) -> bool {
        self.teacher_id.is_none()
            && self.start_time.is_none()
            && self.duration_minutes.is_none()
            && self.facility_id.is_none()
            && self.classroom_id.is_none()
            && self.weekday.is_none()
    }

    fn apply_to_course(&self, course: &mut Course) {
        if let Some(teacher_id) = self.teacher_id {
            course.teacher_id = teacher_id;
        }
        if let Some(start_time) = self.start_time {
            course.start_time = start_time;
        }
        if let Some(duration) = self.duration_minutes {
            course.duration_minutes = duration;
        }
        if let Some(facility_id) = self.facility_id {
            course.facility_id = facility_id;
        }
        if let Some(classroom_id) = self.classroom_id {
            course.classroom_id = classroom_id;
        }
        if let Some(weekday) = self.weekday {
            course.weekday = Some(weekday);
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScheduleReport {
    pub course: Course,
    pub updated: Vec<Class>,
    pub untouched: usize,
    pub warnings: Vec<String>,
}

pub(crate) struct Propagation {
    pub updated: Vec<Class>,
    pub untouched: usize,
    pub warnings: Vec<String>,
}

/// Writes `edit` onto the selected upcoming classes and onto `course` in
/// memory. The caller persists the course row and owns the transaction.
pub(crate) async fn apply_to_upcoming(
    conn: &mut SqliteConnection,
    course: &mut Course,
    edit: &ScheduleEdit,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Propagation, AppError> {
    if edit.duration_minutes.is_some_and(|d| d <= 0) {
        return Err(AppError::invalid("duration_minutes", "Duration must be positive"));
    }
    if edit.weekday.is_some() && course.repeat_pattern != RepeatPattern::Weekly {
        return Err(AppError::invalid(
            "weekday",
            "Only weekly courses can move their classes to another weekday",
        ));
    }

    let course_id = course.id;
    let upcoming = db::classes::fetch_upcoming(&mut *conn, course_id, today).await?;

    let selected: HashSet<i64> = match &edit.class_ids {
        Some(ids) => {
            let known: HashSet<i64> = upcoming.iter().map(|c| c.id).collect();
            if let Some(unknown) = ids.iter().find(|id| !known.contains(id)) {
                return Err(AppError::invalid(
                    "class_ids",
                    format!("Class {} is not an upcoming class of this course", unknown),
                ));
            }
            ids.iter().copied().collect()
        }
        None => upcoming.iter().map(|c| c.id).collect(),
    };

    let mut updated = Vec::new();
    let mut warnings = Vec::new();
    let mut untouched = 0;

    for mut class in upcoming {
        if !selected.contains(&class.id) {
            untouched += 1;
            continue;
        }
        let starts_at = class.starts_at();

        if let Some(teacher_id) = edit.teacher_id {
            class.teacher_id = teacher_id;
        }
        if let Some(start_time) = edit.start_time {
            class.start_time = start_time;
        }
        if let Some(duration) = edit.duration_minutes {
            class.duration_minutes = duration;
        }
        if let Some(facility_id) = edit.facility_id {
            class.facility_id = facility_id;
        }
        if let Some(classroom_id) = edit.classroom_id {
            class.classroom_id = classroom_id;
        }
        if let Some(weekday) = edit.weekday {
            class.date = next_on_weekday(class.date, weekday);
            if course.end_date.is_some_and(|end| class.date > end) {
                warn!(course_id, class_id = class.id, date = %class.date, "class moved past course end");
                warnings.push(format!(
                    "Class {} moved to {}, after the course end date",
                    class.id, class.date
                ));
            }
        }

        db::classes::update_schedule(&mut *conn, &class, now)
            .await
            .map_err(|e| {
                if db::is_unique_violation(&e) {
                    AppError::Conflict(format!(
                        "Another class already exists on {} at {}",
                        class.date, class.start_time
                    ))
                } else {
                    AppError::Database(e)
                }
            })?;
        if class.starts_at() != starts_at {
            db::attendance::retime_for_class(&mut *conn, class.id, now).await?;
        }
        class.updated_at = now;
        updated.push(class);
    }

    edit.apply_to_course(course);
    Ok(Propagation {
        updated,
        untouched,
        warnings,
    })
}

pub async fn propagate_schedule(
    db: &SqlitePool,
    course_id: i64,
    edit: ScheduleEdit,
    today: NaiveDate,
) -> Result<ScheduleReport, AppError> {
    let mut tx = db.begin().await?;
    let mut course = db::courses::fetch_course(&mut *tx, course_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let now = Utc::now();
    let Propagation {
        updated,
        untouched,
        warnings,
    } = apply_to_upcoming(&mut *tx, &mut course, &edit, today, now).await?;

    db::courses::update_course(&mut *tx, &course, now).await?;
    course.updated_at = now;
    tx.commit().await?;

    info!(
        course_id,
        updated = updated.len(),
        untouched,
        warnings = warnings.len(),
        "schedule propagated"
    );
    Ok(ScheduleReport {
        course,
        updated,
        untouched,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CourseStatus, CourseType};
    use rust_decimal::Decimal;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn course(pattern: RepeatPattern, start: NaiveDate, end: Option<NaiveDate>) -> Course {
        Course {
            id: 1,
            name: "Drawing".to_string(),
            description: String::new(),
            short_description: String::new(),
            course_type: CourseType::Group,
            status: CourseStatus::Published,
            price: Decimal::new(60, 0),
            early_bird_price: None,
            early_bird_deadline: None,
            registration_fee: None,
            start_date: start,
            end_date: end,
            repeat_pattern: pattern,
            weekday: None,
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            duration_minutes: 60,
            vacancy: 10,
            is_online_bookable: true,
            enrolment_deadline: None,
            teacher_id: None,
            facility_id: None,
            classroom_id: None,
            external_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_once_is_exactly_one_class() {
        let c = course(RepeatPattern::Once, date(2026, 7, 4), Some(date(2026, 7, 30)));
        assert_eq!(class_dates(&c), vec![date(2026, 7, 4)]);
    }

    #[test]
    fn test_daily_is_inclusive() {
        let c = course(RepeatPattern::Daily, date(2026, 7, 1), Some(date(2026, 7, 3)));
        assert_eq!(
            class_dates(&c),
            vec![date(2026, 7, 1), date(2026, 7, 2), date(2026, 7, 3)]
        );
    }

    #[test]
    fn test_weekly_starts_on_target_weekday() {
        // 2026-07-01 is a Wednesday.
        let mut c = course(RepeatPattern::Weekly, date(2026, 7, 1), Some(date(2026, 7, 20)));
        c.weekday = Some(Weekday::Fri);
        assert_eq!(
            class_dates(&c),
            vec![date(2026, 7, 3), date(2026, 7, 10), date(2026, 7, 17)]
        );
    }

    #[test]
    fn test_weekly_defaults_to_start_weekday() {
        let c = course(RepeatPattern::Weekly, date(2026, 7, 1), Some(date(2026, 7, 15)));
        assert_eq!(
            class_dates(&c),
            vec![date(2026, 7, 1), date(2026, 7, 8), date(2026, 7, 15)]
        );
    }

    #[test]
    fn test_monthly_clamps_to_month_end() {
        let c = course(RepeatPattern::Monthly, date(2026, 1, 31), Some(date(2026, 4, 30)));
        assert_eq!(
            class_dates(&c),
            vec![
                date(2026, 1, 31),
                date(2026, 2, 28),
                date(2026, 3, 31),
                date(2026, 4, 30)
            ]
        );
    }

    #[test]
    fn test_next_on_weekday_keeps_same_day() {
        assert_eq!(next_on_weekday(date(2026, 7, 1), Weekday::Wed), date(2026, 7, 1));
        assert_eq!(next_on_weekday(date(2026, 7, 1), Weekday::Tue), date(2026, 7, 7));
    }
}
