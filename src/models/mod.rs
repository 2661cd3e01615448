pub mod activity;
pub mod attendance;
pub mod class;
pub mod course;
pub mod enrolment;
pub mod notification;
pub mod staff;
pub mod student;
pub mod submission;
pub mod sync_log;

pub use activity::{NewActivity, StudentActivity};
pub use attendance::{Attendance, AttendanceStatus};
pub use class::{Class, ClassPlacement, NewClassRequest};
pub use course::{
    BookableState, Course, CourseStatus, CourseType, NewCourseRequest, RepeatPattern,
    UpdateCourseRequest,
};
pub use enrolment::{
    Enrolment, EnrolmentForm, EnrolmentStatus, NewEnrolment, PriceChoice, RegistrationStatus, SourceChannel,
    StudentMatch, reference_id,
};
pub use notification::{NotificationChannel, NotificationLog, NotificationStatus};
pub use staff::{Capability, Classroom, Facility, Staff, StaffRole};
pub use student::{ContactOwner, NewStudent, Student};
pub use submission::{PriceAdjustmentRecord, SUBMISSION_SCHEMA_VERSION, SubmissionRecord};
pub use sync_log::{NewSyncLog, SyncAction, SyncLog, SyncStatus};

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

/// Patch field that tells `null` apart from absent: absent stays `None`
/// through `#[serde(default)]`, `null` becomes `Some(None)`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub(crate) fn decimal_column(row: &SqliteRow, column: &str) -> Result<Decimal, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    parse_decimal(column, &raw)
}

pub(crate) fn optional_decimal_column(
    row: &SqliteRow,
    column: &str,
) -> Result<Option<Decimal>, sqlx::Error> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|value| parse_decimal(column, &value)).transpose()
}

fn parse_decimal(column: &str, raw: &str) -> Result<Decimal, sqlx::Error> {
    raw.parse::<Decimal>().map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}
