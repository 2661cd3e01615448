pub mod attendance;
pub mod availability;
pub mod courses;
pub mod enrolment;
pub mod notifications;
pub mod pricing;
pub mod schedule;
pub mod students;
pub mod sync_service;

pub use enrolment::{EnrolmentService, Submitter};
pub use notifications::Notifier;
pub use sync_service::{CatalogueSync, SyncReport, SyncSettings};
