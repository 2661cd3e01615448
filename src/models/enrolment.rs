use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

use super::submission::SubmissionRecord;
use super::{decimal_column, optional_decimal_column};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum EnrolmentStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl fmt::Display for EnrolmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EnrolmentStatus::Pending => "pending",
            EnrolmentStatus::Confirmed => "confirmed",
            EnrolmentStatus::Cancelled => "cancelled",
        })
    }
}

/// Per-enrolment: the same student is `new` once and `returning` afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RegistrationStatus {
    New,
    Returning,
    Transferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum SourceChannel {
    Website,
    Form,
    Staff,
}

impl SourceChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceChannel::Website => "website",
            SourceChannel::Form => "form",
            SourceChannel::Staff => "staff",
        }
    }

    pub fn is_public(&self) -> bool {
        !matches!(self, SourceChannel::Staff)
    }
}

/// How the submitted identity was resolved against existing students.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum StudentMatch {
    /// First name, last name and date of birth all matched.
    Exact,
    /// No existing student shared the name.
    Created,
    /// Name matched one or more students without a date of birth match;
    /// a new record was created and left for an operator to review.
    Ambiguous,
}

/// Decision taken when confirming after an early bird deadline lapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceChoice {
    KeepQuoted,
    ApplyRegular,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrolment {
    pub id: i64,
    pub student_id: i64,
    pub course_id: i64,
    pub class_id: Option<i64>,
    pub status: EnrolmentStatus,
    pub registration_status: RegistrationStatus,
    pub source_channel: SourceChannel,
    pub course_fee: Decimal,
    pub registration_fee: Decimal,
    pub is_early_bird: bool,
    pub original_price: Option<Decimal>,
    pub student_match: StudentMatch,
    pub submission: SubmissionRecord,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Enrolment {
    pub fn reference(&self) -> String {
        reference_id(self.course_id, self.id)
    }

    pub fn total_fee(&self) -> Decimal {
        self.course_fee + self.registration_fee
    }
}

/// Human-facing enrolment reference, e.g. `PAS-007-023`.
pub fn reference_id(course_id: i64, enrolment_id: i64) -> String {
    format!("PAS-{:03}-{:03}", course_id, enrolment_id)
}

impl<'r> FromRow<'r, SqliteRow> for Enrolment {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let raw_submission: String = row.try_get("submission")?;
        let submission = serde_json::from_str(&raw_submission).map_err(|e| {
            sqlx::Error::ColumnDecode {
                index: "submission".to_string(),
                source: Box::new(e),
            }
        })?;

        Ok(Self {
            id: row.try_get("id")?,
            student_id: row.try_get("student_id")?,
            course_id: row.try_get("course_id")?,
            class_id: row.try_get("class_id")?,
            status: row.try_get("status")?,
            registration_status: row.try_get("registration_status")?,
            source_channel: row.try_get("source_channel")?,
            course_fee: decimal_column(row, "course_fee")?,
            registration_fee: decimal_column(row, "registration_fee")?,
            is_early_bird: row.try_get("is_early_bird")?,
            original_price: optional_decimal_column(row, "original_price")?,
            student_match: row.try_get("student_match")?,
            submission,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Row written when a submission is accepted.
#[derive(Debug, Clone)]
pub struct NewEnrolment {
    pub student_id: i64,
    pub course_id: i64,
    pub class_id: Option<i64>,
    pub registration_status: RegistrationStatus,
    pub source_channel: SourceChannel,
    pub course_fee: Decimal,
    pub registration_fee: Decimal,
    pub is_early_bird: bool,
    pub original_price: Option<Decimal>,
    pub student_match: StudentMatch,
    pub submission: SubmissionRecord,
}

/// Raw enrolment form as posted by the public page or a staff member.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrolmentForm {
    pub course_id: i64,
    pub class_id: Option<i64>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub guardian_name: Option<String>,
    pub address: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_is_zero_padded() {
        assert_eq!(reference_id(7, 23), "PAS-007-023");
        assert_eq!(reference_id(42, 156), "PAS-042-156");
    }

    #[test]
    fn test_reference_keeps_wide_ids_intact() {
        assert_eq!(reference_id(1234, 5), "PAS-1234-005");
    }
}
