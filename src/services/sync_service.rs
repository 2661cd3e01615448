use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::catalogue::description::{ListingContext, build_payload};
use crate::catalogue::dto::{ProductPayload, ProductResponse};
use crate::catalogue::{CatalogueClient, CatalogueError};
use crate::config::PricingConfig;
use crate::db;
use crate::error::AppError;
use crate::models::{Course, CourseStatus, NewSyncLog, SyncAction, SyncStatus};
use crate::services::availability::{effective_status, remaining_vacancy};

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub public_base_url: String,
    pub max_attempts: u32,
    pub pricing: PricingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Created,
    Updated,
    /// The stored listing was gone; a new one replaced it.
    Recreated,
    /// Never listed and not published, so nothing to push.
    Skipped,
    /// No storefront configured.
    Disabled,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub course_id: i64,
    pub outcome: SyncOutcome,
    pub external_id: Option<String>,
    pub attempts: u32,
    pub error: Option<String>,
}

impl SyncReport {
    fn without_call(course: &Course, outcome: SyncOutcome) -> Self {
        Self {
            course_id: course.id,
            outcome,
            external_id: course.external_id.clone(),
            attempts: 0,
            error: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SyncBatchReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub reports: Vec<SyncReport>,
}

enum Call<'a> {
    Create,
    Update(&'a str),
}

/// Pushes courses to the storefront. One-way: nothing is read back, and
/// listings are never deleted.
pub struct CatalogueSync {
    db: SqlitePool,
    client: Arc<dyn CatalogueClient>,
    settings: SyncSettings,
}

impl CatalogueSync {
    pub fn new(db: SqlitePool, client: Arc<dyn CatalogueClient>, settings: SyncSettings) -> Self {
        Self {
            db,
            client,
            settings,
        }
    }

    /// Brings the storefront listing in line with the course. Storefront
    /// failures come back as a `Failed` report; only local database errors
    /// are returned as `Err`.
    pub async fn sync_course(&self, course_id: i64, today: NaiveDate) -> Result<SyncReport, AppError> {
        let course = db::courses::fetch_course(&self.db, course_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if !self.client.is_enabled() {
            return Ok(SyncReport::without_call(&course, SyncOutcome::Disabled));
        }

        let payload = self.payload_for(&course, today).await?;
        let request_json = serde_json::to_string(&payload).unwrap_or_default();

        let report = match course.external_id.as_deref() {
            None if effective_status(&course, today) != CourseStatus::Published => {
                info!(course_id, status = %course.status, "not published; listing skipped");
                SyncReport::without_call(&course, SyncOutcome::Skipped)
            }
            None => {
                let (result, attempts) = self
                    .call_with_retry(&course, SyncAction::Create, Call::Create, &payload, &request_json)
                    .await?;
                self.finish(&course, result, attempts, SyncOutcome::Created).await?
            }
            Some(external_id) => {
                let (result, attempts) = self
                    .call_with_retry(
                        &course,
                        SyncAction::Update,
                        Call::Update(external_id),
                        &payload,
                        &request_json,
                    )
                    .await?;

                match result {
                    Err(CatalogueError::NotFound(_)) => {
                        warn!(course_id, external_id, "listing missing on storefront; recreating");
                        let (created, more) = self
                            .call_with_retry(
                                &course,
                                SyncAction::Recreate,
                                Call::Create,
                                &payload,
                                &request_json,
                            )
                            .await?;
                        self.finish(&course, created, attempts + more, SyncOutcome::Recreated)
                            .await?
                    }
                    other => self.finish(&course, other, attempts, SyncOutcome::Updated).await?,
                }
            }
        };

        Ok(report)
    }

    async fn payload_for(&self, course: &Course, today: NaiveDate) -> Result<ProductPayload, AppError> {
        let confirmed = db::enrolments::count_confirmed(&self.db, course.id).await?;
        let facility = match course.facility_id {
            Some(id) => db::staff::fetch_facility(&self.db, id).await?,
            None => None,
        };
        let ctx = ListingContext {
            facility: facility.as_ref(),
            remaining_vacancy: remaining_vacancy(course, confirmed),
            public_base_url: &self.settings.public_base_url,
            pricing: &self.settings.pricing,
            today,
        };
        Ok(build_payload(course, &ctx))
    }

    /// Runs one storefront call, retrying transport and server errors up to
    /// the configured attempt count. Every attempt is written to `sync_logs`.
    async fn call_with_retry(
        &self,
        course: &Course,
        action: SyncAction,
        call: Call<'_>,
        payload: &ProductPayload,
        request_json: &str,
    ) -> Result<(Result<ProductResponse, CatalogueError>, u32), AppError> {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            let started = Instant::now();
            let result = match &call {
                Call::Create => self.client.create_product(payload).await,
                Call::Update(id) => self.client.update_product(id, payload).await,
            };
            let duration_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

            let (status, external_id, response_payload, error_message) = match &result {
                Ok(response) => (
                    SyncStatus::Success,
                    Some(response.id.clone()),
                    Some(response.body.clone()),
                    None,
                ),
                Err(e) => (
                    SyncStatus::Failed,
                    match &call {
                        Call::Update(id) => Some(id.to_string()),
                        Call::Create => None,
                    },
                    None,
                    Some(e.to_string()),
                ),
            };

            db::sync_logs::insert_sync_log(
                &self.db,
                &NewSyncLog {
                    course_id: course.id,
                    action,
                    status,
                    external_id,
                    request_payload: request_json.to_string(),
                    response_payload,
                    error_message,
                    duration_ms,
                    retry_count: i64::from(attempt),
                },
            )
            .await?;

            attempt += 1;
            match result {
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    warn!(course_id = course.id, ?action, attempt, error = %e, "storefront call failed; retrying");
                }
                other => return Ok((other, attempt)),
            }
        }
    }

    async fn finish(
        &self,
        course: &Course,
        result: Result<ProductResponse, CatalogueError>,
        attempts: u32,
        outcome: SyncOutcome,
    ) -> Result<SyncReport, AppError> {
        match result {
            Ok(response) => {
                if course.external_id.as_deref() != Some(response.id.as_str()) {
                    db::courses::set_external_id(&self.db, course.id, &response.id).await?;
                }
                info!(course_id = course.id, external_id = %response.id, ?outcome, "course synced");
                Ok(SyncReport {
                    course_id: course.id,
                    outcome,
                    external_id: Some(response.id),
                    attempts,
                    error: None,
                })
            }
            Err(e) => {
                warn!(course_id = course.id, error = %e, attempts, "course sync failed");
                Ok(SyncReport {
                    course_id: course.id,
                    outcome: SyncOutcome::Failed,
                    external_id: course.external_id.clone(),
                    attempts,
                    error: Some(e.to_string()),
                })
            }
        }
    }

    /// Courses whose latest sync failed, or published courses never listed.
    pub async fn unsynced_courses(&self) -> Result<Vec<Course>, AppError> {
        Ok(db::courses::fetch_unsynced(&self.db).await?)
    }

    pub async fn retry_unsynced(&self, today: NaiveDate) -> Result<SyncBatchReport, AppError> {
        let pending = self.unsynced_courses().await?;
        info!(count = pending.len(), "retrying unsynced courses");

        let mut reports = Vec::with_capacity(pending.len());
        for course in pending {
            reports.push(self.sync_course(course.id, today).await?);
        }

        let failed = reports
            .iter()
            .filter(|r| r.outcome == SyncOutcome::Failed)
            .count();
        Ok(SyncBatchReport {
            attempted: reports.len(),
            succeeded: reports.len() - failed,
            failed,
            reports,
        })
    }
}
