use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enrolment::{PriceChoice, SourceChannel, StudentMatch};
use super::student::ContactOwner;

pub const SUBMISSION_SCHEMA_VERSION: u32 = 1;

/// Snapshot of what was submitted, kept with the enrolment for audit.
///
/// Bump [`SUBMISSION_SCHEMA_VERSION`] when fields change meaning; readers
/// branch on `schema_version` instead of probing for keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub schema_version: u32,
    pub submission_id: Uuid,
    pub submitted_at: DateTime<Utc>,
    pub channel: SourceChannel,
    pub course_id: i64,
    pub class_id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub email: String,
    pub phone: String,
    pub contact_owner: ContactOwner,
    pub guardian_name: Option<String>,
    pub address: Option<String>,
    pub student_match: StudentMatch,
    /// Students sharing the submitted name when the match was ambiguous.
    #[serde(default)]
    pub match_candidates: Vec<i64>,
    #[serde(default)]
    pub price_adjustment: Option<PriceAdjustmentRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAdjustmentRecord {
    pub choice: PriceChoice,
    pub previous_price: Decimal,
    pub new_price: Decimal,
    pub performed_by: String,
    pub performed_at: DateTime<Utc>,
}
