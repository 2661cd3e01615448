use axum::extract::{FromRequestParts, Path, Query};
use axum::http::request::Parts;
use axum::routing::post;
use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::db;
use crate::error::AppError;
use crate::models::*;
use crate::services::attendance::{ResyncReport, resync_course_attendance};
use crate::services::availability::{Availability, course_availability, expire_courses};
use crate::services::courses;
use crate::services::enrolment::{ConfirmOutcome, EnrolmentDetail, SubmissionOutcome, Submitter};
use crate::services::pricing::PriceCheck;
use crate::services::schedule::{
    AddedClass, GenerationReport, ScheduleEdit, ScheduleReport, add_class, generate_classes,
    propagate_schedule,
};
use crate::services::sync_service::SyncBatchReport;
use crate::services::SyncReport;
use crate::state::AppState;

pub const STAFF_HEADER: &str = "x-staff-id";

/// Staff member named by the `x-staff-id` header.
pub struct StaffActor(pub Staff);

impl FromRequestParts<AppState> for StaffActor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(STAFF_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
            .ok_or_else(|| AppError::Forbidden("staff identity required".to_string()))?;

        let staff = db::staff::fetch_staff(&state.db, id)
            .await?
            .ok_or_else(|| AppError::Forbidden("unknown staff member".to_string()))?;
        Ok(StaffActor(staff))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/courses", get(list_courses).post(create_course))
        .route("/courses/expire", post(expire_finished_courses))
        .route("/courses/{id}", get(get_course).patch(update_course))
        .route("/courses/{id}/availability", get(get_availability))
        .route("/courses/{id}/classes/generate", post(generate_course_classes))
        .route("/courses/{id}/classes", post(add_course_class))
        .route("/courses/{id}/schedule", post(update_schedule))
        .route("/courses/{id}/attendance/resync", post(resync_attendance))
        .route("/courses/{id}/sync", post(sync_course))
        .route("/courses/{id}/sync-logs", get(list_sync_logs))
        .route("/classes", get(list_classes))
        .route("/enrol", post(public_enrol))
        .route("/enrolments", post(staff_enrol))
        .route("/enrolments/{id}", get(get_enrolment))
        .route("/enrolments/{id}/price-check", get(price_check))
        .route("/enrolments/{id}/confirm", post(confirm_enrolment))
        .route("/enrolments/{id}/cancel", post(cancel_enrolment))
        .route("/sync/pending", get(list_unsynced))
        .route("/sync/retry", post(retry_unsynced))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

#[derive(Serialize)]
struct CourseView {
    #[serde(flatten)]
    course: Course,
    availability: Availability,
}

#[derive(Serialize)]
struct CourseWrite {
    course: Course,
    sync: Option<SyncReport>,
}

/// Pushes a course after its local write has committed. The write already
/// succeeded, so a failure here is logged and reported, never raised.
async fn sync_after_write(state: &AppState, course_id: i64) -> Option<SyncReport> {
    match state.catalogue_sync().sync_course(course_id, state.today()).await {
        Ok(report) => Some(report),
        Err(e) => {
            warn!(course_id, error = %e, "catalogue sync could not run");
            None
        }
    }
}

async fn list_courses(State(state): State<AppState>) -> Result<Json<Vec<CourseView>>, AppError> {
    let today = state.today();
    let mut views = Vec::new();
    for course in db::courses::fetch_courses(&state.db).await? {
        let availability = course_availability(&state.db, &course, today).await?;
        views.push(CourseView {
            course,
            availability,
        });
    }
    Ok(Json(views))
}

async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<CourseView>, AppError> {
    let course = db::courses::fetch_course(&state.db, id)
        .await?
        .ok_or(AppError::NotFound)?;
    let availability = course_availability(&state.db, &course, state.today()).await?;
    Ok(Json(CourseView {
        course,
        availability,
    }))
}

async fn create_course(
    State(state): State<AppState>,
    _actor: StaffActor,
    Json(req): Json<NewCourseRequest>,
) -> Result<(StatusCode, Json<CourseWrite>), AppError> {
    let course = courses::create_course(&state.db, req).await?;
    let sync = sync_after_write(&state, course.id).await;
    let course = db::courses::fetch_course(&state.db, course.id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok((StatusCode::CREATED, Json(CourseWrite { course, sync })))
}

async fn update_course(
    State(state): State<AppState>,
    _actor: StaffActor,
    Path(id): Path<i64>,
    Json(req): Json<UpdateCourseRequest>,
) -> Result<Json<CourseWrite>, AppError> {
    courses::update_course(&state.db, id, req, state.today()).await?;
    let sync = sync_after_write(&state, id).await;
    let course = db::courses::fetch_course(&state.db, id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(CourseWrite { course, sync }))
}

async fn get_availability(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Availability>, AppError> {
    let course = db::courses::fetch_course(&state.db, id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(course_availability(&state.db, &course, state.today()).await?))
}

#[derive(Serialize)]
struct ExpiryReport {
    expired: Vec<i64>,
    sync: Vec<SyncReport>,
}

async fn expire_finished_courses(
    State(state): State<AppState>,
    _actor: StaffActor,
) -> Result<Json<ExpiryReport>, AppError> {
    let expired = expire_courses(&state.db, state.today()).await?;
    let mut sync = Vec::with_capacity(expired.len());
    for id in &expired {
        if let Some(report) = sync_after_write(&state, *id).await {
            sync.push(report);
        }
    }
    Ok(Json(ExpiryReport { expired, sync }))
}

async fn generate_course_classes(
    State(state): State<AppState>,
    _actor: StaffActor,
    Path(id): Path<i64>,
) -> Result<Json<GenerationReport>, AppError> {
    Ok(Json(generate_classes(&state.db, id).await?))
}

async fn add_course_class(
    State(state): State<AppState>,
    _actor: StaffActor,
    Path(id): Path<i64>,
    Json(req): Json<NewClassRequest>,
) -> Result<(StatusCode, Json<AddedClass>), AppError> {
    let added = add_class(&state.db, id, req).await?;
    Ok((StatusCode::CREATED, Json(added)))
}

#[derive(Serialize)]
struct ScheduleWrite {
    #[serde(flatten)]
    report: ScheduleReport,
    sync: Option<SyncReport>,
}

async fn update_schedule(
    State(state): State<AppState>,
    _actor: StaffActor,
    Path(id): Path<i64>,
    Json(edit): Json<ScheduleEdit>,
) -> Result<Json<ScheduleWrite>, AppError> {
    let mut report = propagate_schedule(&state.db, id, edit, state.today()).await?;
    let sync = sync_after_write(&state, id).await;
    report.course = db::courses::fetch_course(&state.db, id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(ScheduleWrite { report, sync }))
}

async fn resync_attendance(
    State(state): State<AppState>,
    _actor: StaffActor,
    Path(id): Path<i64>,
) -> Result<Json<ResyncReport>, AppError> {
    Ok(Json(resync_course_attendance(&state.db, id).await?))
}

async fn sync_course(
    State(state): State<AppState>,
    _actor: StaffActor,
    Path(id): Path<i64>,
) -> Result<Json<SyncReport>, AppError> {
    let report = state.catalogue_sync().sync_course(id, state.today()).await?;
    Ok(Json(report))
}

async fn list_sync_logs(
    State(state): State<AppState>,
    _actor: StaffActor,
    Path(id): Path<i64>,
) -> Result<Json<Vec<SyncLog>>, AppError> {
    Ok(Json(db::sync_logs::fetch_for_course(&state.db, id).await?))
}

#[derive(Deserialize)]
struct ClassQueryParams {
    from: Option<NaiveDate>,
}

async fn list_classes(
    State(state): State<AppState>,
    StaffActor(staff): StaffActor,
    Query(params): Query<ClassQueryParams>,
) -> Result<Json<Vec<Class>>, AppError> {
    let from = params.from.unwrap_or_else(|| state.today());
    let classes = db::classes::fetch_visible(&state.db, staff.capability(), from).await?;
    Ok(Json(classes))
}

#[derive(Deserialize)]
struct PublicEnrolment {
    #[serde(flatten)]
    form: EnrolmentForm,
    #[serde(default)]
    channel: Option<SourceChannel>,
}

async fn public_enrol(
    State(state): State<AppState>,
    Json(req): Json<PublicEnrolment>,
) -> Result<(StatusCode, Json<SubmissionOutcome>), AppError> {
    let channel = req.channel.unwrap_or(SourceChannel::Website);
    let outcome = state
        .enrolments()
        .submit(req.form, Submitter::Public(channel), state.today())
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn staff_enrol(
    State(state): State<AppState>,
    StaffActor(staff): StaffActor,
    Json(form): Json<EnrolmentForm>,
) -> Result<(StatusCode, Json<SubmissionOutcome>), AppError> {
    let outcome = state
        .enrolments()
        .submit(form, Submitter::Staff(&staff), state.today())
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn get_enrolment(
    State(state): State<AppState>,
    _actor: StaffActor,
    Path(id): Path<i64>,
) -> Result<Json<EnrolmentDetail>, AppError> {
    Ok(Json(state.enrolments().detail(id).await?))
}

async fn price_check(
    State(state): State<AppState>,
    _actor: StaffActor,
    Path(id): Path<i64>,
) -> Result<Json<PriceCheck>, AppError> {
    Ok(Json(state.enrolments().price_check(id, state.today()).await?))
}

#[derive(Deserialize, Default)]
struct ConfirmRequest {
    #[serde(default)]
    price_choice: Option<PriceChoice>,
}

async fn confirm_enrolment(
    State(state): State<AppState>,
    StaffActor(staff): StaffActor,
    Path(id): Path<i64>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<ConfirmOutcome>, AppError> {
    let outcome = state
        .enrolments()
        .confirm(id, &staff, req.price_choice, state.today())
        .await?;
    Ok(Json(outcome))
}

async fn cancel_enrolment(
    State(state): State<AppState>,
    StaffActor(staff): StaffActor,
    Path(id): Path<i64>,
) -> Result<Json<Enrolment>, AppError> {
    Ok(Json(state.enrolments().cancel(id, &staff).await?))
}

async fn list_unsynced(
    State(state): State<AppState>,
    _actor: StaffActor,
) -> Result<Json<Vec<Course>>, AppError> {
    Ok(Json(state.catalogue_sync().unsynced_courses().await?))
}

async fn retry_unsynced(
    State(state): State<AppState>,
    _actor: StaffActor,
) -> Result<Json<SyncBatchReport>, AppError> {
    Ok(Json(state.catalogue_sync().retry_unsynced(state.today()).await?))
}
