use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db;
use crate::error::{AppError, DuplicateScope};
use crate::models::{
    BookableState, CourseStatus, Enrolment, EnrolmentForm, EnrolmentStatus, NewActivity,
    NewEnrolment, PriceAdjustmentRecord, PriceChoice, RegistrationStatus, SourceChannel, Staff,
    StudentActivity, StudentMatch, SubmissionRecord, SUBMISSION_SCHEMA_VERSION,
};
use crate::services::availability::{bookable_state, effective_status};
use crate::services::notifications::Notifier;
use crate::services::pricing::{self, PriceCheck};
use crate::services::students::{resolve_student, validate_form};

pub const ACTIVITY_SUBMITTED: &str = "enrolment_submitted";
pub const ACTIVITY_CONFIRMED: &str = "enrolment_confirmed";
pub const ACTIVITY_CANCELLED: &str = "enrolment_cancelled";
pub const ACTIVITY_PRICE_ADJUSTMENT: &str = "price_adjustment";

/// Who is submitting an enrolment.
#[derive(Debug, Clone, Copy)]
pub enum Submitter<'a> {
    /// Public form; capacity and bookability are enforced.
    Public(SourceChannel),
    /// Staff entry; may exceed capacity but not enrol into an expired course.
    Staff(&'a Staff),
}

impl Submitter<'_> {
    fn channel(&self) -> SourceChannel {
        match self {
            Submitter::Public(SourceChannel::Staff) => SourceChannel::Website,
            Submitter::Public(channel) => *channel,
            Submitter::Staff(_) => SourceChannel::Staff,
        }
    }

    fn performed_by(&self) -> String {
        match self {
            Submitter::Public(_) => "public".to_string(),
            Submitter::Staff(staff) => staff.display_name(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmissionOutcome {
    pub enrolment: Enrolment,
    pub reference: String,
    pub student_match: StudentMatch,
    pub registration_status: RegistrationStatus,
}

#[derive(Debug, Serialize)]
pub struct ConfirmOutcome {
    pub enrolment: Enrolment,
    pub reference: String,
    pub attendance_created: u64,
    pub price_adjustment: Option<PriceAdjustmentRecord>,
}

#[derive(Debug, Serialize)]
pub struct EnrolmentDetail {
    pub enrolment: Enrolment,
    pub reference: String,
    pub total_fee: Decimal,
    pub activities: Vec<StudentActivity>,
}

pub struct EnrolmentService {
    db: SqlitePool,
    notifier: Arc<Notifier>,
}

impl EnrolmentService {
    pub fn new(db: SqlitePool, notifier: Arc<Notifier>) -> Self {
        Self { db, notifier }
    }

    pub async fn submit(
        &self,
        form: EnrolmentForm,
        submitter: Submitter<'_>,
        today: NaiveDate,
    ) -> Result<SubmissionOutcome, AppError> {
        let valid = validate_form(&form, today)?;
        let channel = submitter.channel();
        let now = Utc::now();

        let mut tx = self.db.begin().await?;
        let course = db::courses::fetch_course(&mut *tx, form.course_id)
            .await?
            .ok_or(AppError::NotFound)?;

        match submitter {
            Submitter::Public(_) => {
                let confirmed = db::enrolments::count_confirmed(&mut *tx, course.id).await?;
                let state = bookable_state(&course, confirmed, today);
                if state != BookableState::Bookable {
                    return Err(AppError::CourseNotBookable { state });
                }
            }
            Submitter::Staff(_) => {
                if effective_status(&course, today) == CourseStatus::Expired {
                    return Err(AppError::CourseNotBookable {
                        state: BookableState::Closed,
                    });
                }
            }
        }

        if let Some(class_id) = form.class_id {
            let class = db::classes::fetch_class(&mut *tx, class_id).await?;
            if !class.is_some_and(|c| c.course_id == course.id && c.is_active) {
                return Err(AppError::invalid(
                    "class_id",
                    "Class does not belong to this course",
                ));
            }
        }

        let resolved = resolve_student(&mut *tx, &valid, now).await?;
        let student = resolved.student;
        let scope = match form.class_id {
            Some(_) => DuplicateScope::Class,
            None => DuplicateScope::Course,
        };

        if db::enrolments::find_active(&mut *tx, student.id, course.id, form.class_id)
            .await?
            .is_some()
        {
            return Err(AppError::DuplicateEnrolment { scope });
        }

        let is_new = !db::enrolments::has_active(&mut *tx, student.id).await?;
        let registration_status = if is_new {
            RegistrationStatus::New
        } else {
            RegistrationStatus::Returning
        };
        let quote = pricing::quote(&course, is_new, today);

        let submission = SubmissionRecord {
            schema_version: SUBMISSION_SCHEMA_VERSION,
            submission_id: Uuid::new_v4(),
            submitted_at: now,
            channel,
            course_id: course.id,
            class_id: form.class_id,
            first_name: valid.first_name.clone(),
            last_name: valid.last_name.clone(),
            date_of_birth: valid.date_of_birth,
            email: valid.email.clone(),
            phone: valid.phone.clone(),
            contact_owner: valid.contact_owner,
            guardian_name: valid.guardian_name.clone(),
            address: valid.address.clone(),
            student_match: resolved.outcome,
            match_candidates: resolved.candidates,
            price_adjustment: None,
        };

        let new = NewEnrolment {
            student_id: student.id,
            course_id: course.id,
            class_id: form.class_id,
            registration_status,
            source_channel: channel,
            course_fee: quote.course_fee,
            registration_fee: quote.registration_fee,
            is_early_bird: quote.is_early_bird,
            original_price: quote.original_price,
            student_match: resolved.outcome,
            submission,
        };

        let id = db::enrolments::insert_enrolment(&mut *tx, &new, now)
            .await
            .map_err(|e| {
                if db::is_unique_violation(&e) {
                    AppError::DuplicateEnrolment { scope }
                } else {
                    AppError::Database(e)
                }
            })?;

        db::activities::insert_activity(
            &mut *tx,
            &NewActivity {
                student_id: student.id,
                enrolment_id: Some(id),
                course_id: Some(course.id),
                activity_type: ACTIVITY_SUBMITTED,
                title: format!("Enrolment submitted for {}", course.name),
                description: format!("Submitted via {}", channel.as_str()),
                performed_by: submitter.performed_by(),
                metadata: json!({
                    "reference": crate::models::reference_id(course.id, id),
                    "student_match": resolved.outcome,
                    "course_fee": quote.course_fee,
                    "is_early_bird": quote.is_early_bird,
                }),
            },
            now,
        )
        .await?;

        let enrolment = db::enrolments::fetch_enrolment(&mut *tx, id)
            .await?
            .ok_or(AppError::InternalServerError)?;
        tx.commit().await?;

        info!(
            enrolment_id = id,
            course_id = course.id,
            student_id = student.id,
            channel = ?channel,
            student_match = ?resolved.outcome,
            "enrolment submitted"
        );

        self.notifier
            .enrolment_pending(&enrolment, &student, &course)
            .await;

        Ok(SubmissionOutcome {
            reference: enrolment.reference(),
            student_match: resolved.outcome,
            registration_status,
            enrolment,
        })
    }

    /// Pending to confirmed. When an early bird quote has lapsed the caller
    /// must say which price to charge.
    pub async fn confirm(
        &self,
        enrolment_id: i64,
        actor: &Staff,
        choice: Option<PriceChoice>,
        today: NaiveDate,
    ) -> Result<ConfirmOutcome, AppError> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let enrolment = db::enrolments::fetch_enrolment(&mut *tx, enrolment_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if enrolment.status != EnrolmentStatus::Pending {
            return Err(AppError::InvalidStateTransition {
                from: enrolment.status,
                to: EnrolmentStatus::Confirmed,
            });
        }

        let course = db::courses::fetch_course(&mut *tx, enrolment.course_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut price_adjustment = None;
        if pricing::needs_price_decision(&enrolment, &course, today) {
            let choice = choice.ok_or(AppError::PriceDecisionRequired {
                quoted: enrolment.course_fee,
                regular: course.price,
            })?;
            let new_price = match choice {
                PriceChoice::KeepQuoted => enrolment.course_fee,
                PriceChoice::ApplyRegular => course.price,
            };
            let record = PriceAdjustmentRecord {
                choice,
                previous_price: enrolment.course_fee,
                new_price,
                performed_by: actor.display_name(),
                performed_at: now,
            };

            let mut submission = enrolment.submission.clone();
            submission.price_adjustment = Some(record.clone());
            db::enrolments::update_course_fee(&mut *tx, enrolment.id, new_price, &submission, now)
                .await?;

            db::activities::insert_activity(
                &mut *tx,
                &NewActivity {
                    student_id: enrolment.student_id,
                    enrolment_id: Some(enrolment.id),
                    course_id: Some(course.id),
                    activity_type: ACTIVITY_PRICE_ADJUSTMENT,
                    title: "Early bird price reviewed".to_string(),
                    description: format!(
                        "Course fee {} -> {} after the early bird deadline",
                        record.previous_price, record.new_price
                    ),
                    performed_by: actor.display_name(),
                    metadata: json!({
                        "choice": choice,
                        "previous_price": record.previous_price,
                        "new_price": record.new_price,
                        "early_bird_deadline": course.early_bird_deadline,
                    }),
                },
                now,
            )
            .await?;
            price_adjustment = Some(record);
        }

        let moved = db::enrolments::transition(
            &mut *tx,
            enrolment.id,
            EnrolmentStatus::Pending,
            EnrolmentStatus::Confirmed,
            now,
        )
        .await?;
        if !moved {
            return Err(AppError::InvalidStateTransition {
                from: enrolment.status,
                to: EnrolmentStatus::Confirmed,
            });
        }

        let attendance_created =
            db::attendance::materialise_for_enrolment(&mut *tx, enrolment.id, now).await?;

        db::activities::insert_activity(
            &mut *tx,
            &NewActivity {
                student_id: enrolment.student_id,
                enrolment_id: Some(enrolment.id),
                course_id: Some(course.id),
                activity_type: ACTIVITY_CONFIRMED,
                title: format!("Enrolment confirmed for {}", course.name),
                description: String::new(),
                performed_by: actor.display_name(),
                metadata: json!({ "attendance_created": attendance_created }),
            },
            now,
        )
        .await?;

        let confirmed = db::enrolments::fetch_enrolment(&mut *tx, enrolment.id)
            .await?
            .ok_or(AppError::InternalServerError)?;
        let student = db::students::fetch_student(&mut *tx, confirmed.student_id).await?;
        tx.commit().await?;

        info!(
            enrolment_id,
            actor = actor.id,
            attendance_created,
            adjusted = price_adjustment.is_some(),
            "enrolment confirmed"
        );

        match student {
            Some(student) => {
                self.notifier
                    .enrolment_confirmed(&confirmed, &student, &course)
                    .await
            }
            None => warn!(enrolment_id, "student missing; confirmation not sent"),
        }

        Ok(ConfirmOutcome {
            reference: confirmed.reference(),
            enrolment: confirmed,
            attendance_created,
            price_adjustment,
        })
    }

    /// Pending or confirmed to cancelled. Attendance history is kept.
    pub async fn cancel(&self, enrolment_id: i64, actor: &Staff) -> Result<Enrolment, AppError> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let enrolment = db::enrolments::fetch_enrolment(&mut *tx, enrolment_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let invalid = AppError::InvalidStateTransition {
            from: enrolment.status,
            to: EnrolmentStatus::Cancelled,
        };
        if enrolment.status == EnrolmentStatus::Cancelled {
            return Err(invalid);
        }
        if !db::enrolments::transition(
            &mut *tx,
            enrolment.id,
            enrolment.status,
            EnrolmentStatus::Cancelled,
            now,
        )
        .await?
        {
            return Err(invalid);
        }

        db::activities::insert_activity(
            &mut *tx,
            &NewActivity {
                student_id: enrolment.student_id,
                enrolment_id: Some(enrolment.id),
                course_id: Some(enrolment.course_id),
                activity_type: ACTIVITY_CANCELLED,
                title: "Enrolment cancelled".to_string(),
                description: format!("Cancelled from {}", enrolment.status),
                performed_by: actor.display_name(),
                metadata: json!({ "previous_status": enrolment.status }),
            },
            now,
        )
        .await?;

        let cancelled = db::enrolments::fetch_enrolment(&mut *tx, enrolment.id)
            .await?
            .ok_or(AppError::InternalServerError)?;
        tx.commit().await?;

        info!(enrolment_id, actor = actor.id, from = %enrolment.status, "enrolment cancelled");
        Ok(cancelled)
    }

    pub async fn price_check(
        &self,
        enrolment_id: i64,
        today: NaiveDate,
    ) -> Result<PriceCheck, AppError> {
        let enrolment = db::enrolments::fetch_enrolment(&self.db, enrolment_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let course = db::courses::fetch_course(&self.db, enrolment.course_id)
            .await?
            .ok_or(AppError::NotFound)?;
        Ok(pricing::price_check(&enrolment, &course, today))
    }

    pub async fn detail(&self, enrolment_id: i64) -> Result<EnrolmentDetail, AppError> {
        let enrolment = db::enrolments::fetch_enrolment(&self.db, enrolment_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let activities = db::activities::fetch_for_enrolment(&self.db, enrolment_id).await?;
        Ok(EnrolmentDetail {
            reference: enrolment.reference(),
            total_fee: enrolment.total_fee(),
            enrolment,
            activities,
        })
    }
}
