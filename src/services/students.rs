use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::db;
use crate::error::{AppError, FieldError};
use crate::models::student::age_on;
use crate::models::{ContactOwner, EnrolmentForm, NewStudent, Student, StudentMatch};

/// An enrolment form that passed field validation.
#[derive(Debug, Clone)]
pub struct ValidatedForm {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub age: u32,
    pub email: String,
    pub phone: String,
    pub contact_owner: ContactOwner,
    pub guardian_name: Option<String>,
    pub address: Option<String>,
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Checks every field and reports all problems at once.
pub fn validate_form(form: &EnrolmentForm, today: NaiveDate) -> Result<ValidatedForm, AppError> {
    let mut errors = Vec::new();

    let first_name = form.first_name.trim().to_string();
    if first_name.is_empty() {
        errors.push(FieldError::new("first_name", "First name is required"));
    }
    let last_name = form.last_name.trim().to_string();
    if last_name.is_empty() {
        errors.push(FieldError::new("last_name", "Last name is required"));
    }

    let email = form.email.trim().to_string();
    if email.is_empty() {
        errors.push(FieldError::new("email", "Email is required"));
    } else if !email.contains('@') {
        errors.push(FieldError::new("email", "Email address is not valid"));
    }

    let phone = form.phone.trim().to_string();
    if phone.is_empty() {
        errors.push(FieldError::new("phone", "Phone number is required"));
    }

    let guardian_name = non_empty(form.guardian_name.as_ref());
    let mut age = 0;
    match form.date_of_birth {
        None => errors.push(FieldError::new("date_of_birth", "Date of birth is required")),
        Some(dob) if dob > today => {
            errors.push(FieldError::new("date_of_birth", "Date of birth cannot be in the future"))
        }
        Some(dob) => {
            age = age_on(dob, today);
            if ContactOwner::for_age(age) == ContactOwner::Guardian && guardian_name.is_none() {
                errors.push(FieldError::new(
                    "guardian_name",
                    "Guardian name is required for students under 18",
                ));
            }
        }
    }

    match (errors.is_empty(), form.date_of_birth) {
        (true, Some(date_of_birth)) => Ok(ValidatedForm {
            first_name,
            last_name,
            date_of_birth,
            age,
            email,
            phone,
            contact_owner: ContactOwner::for_age(age),
            guardian_name,
            address: non_empty(form.address.as_ref()),
        }),
        _ => Err(AppError::Validation(errors)),
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedStudent {
    pub student: Student,
    pub outcome: StudentMatch,
    /// Existing students that shared the name when the outcome is ambiguous.
    pub candidates: Vec<i64>,
}

impl ValidatedForm {
    fn to_new_student(&self) -> NewStudent {
        NewStudent {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            birth_date: Some(self.date_of_birth),
            contact_email: self.email.clone(),
            contact_phone: self.phone.clone(),
            contact_owner: self.contact_owner,
            guardian_name: match self.contact_owner {
                ContactOwner::Guardian => self.guardian_name.clone(),
                ContactOwner::Student => None,
            },
            address: self.address.clone(),
        }
    }
}

/// Finds the student a submission belongs to, creating one when needed.
///
/// Only a name plus date of birth match reuses a record. A name-only match
/// never merges: a new student is created and the candidates are returned
/// for an operator to review.
pub async fn resolve_student(
    conn: &mut SqliteConnection,
    form: &ValidatedForm,
    now: DateTime<Utc>,
) -> Result<ResolvedStudent, AppError> {
    let same_name = db::students::find_by_name(&mut *conn, &form.first_name, &form.last_name).await?;
    let details = form.to_new_student();

    if let Some(existing) = same_name
        .iter()
        .find(|s| s.birth_date == Some(form.date_of_birth))
    {
        db::students::update_contact(&mut *conn, existing.id, &details, now).await?;
        let student = db::students::fetch_student(&mut *conn, existing.id)
            .await?
            .ok_or(AppError::InternalServerError)?;
        debug!(student_id = student.id, "matched existing student");
        return Ok(ResolvedStudent {
            student,
            outcome: StudentMatch::Exact,
            candidates: Vec::new(),
        });
    }

    let id = db::students::insert_student(&mut *conn, &details, now).await?;
    let student = db::students::fetch_student(&mut *conn, id)
        .await?
        .ok_or(AppError::InternalServerError)?;

    if same_name.is_empty() {
        debug!(student_id = id, "created student");
        Ok(ResolvedStudent {
            student,
            outcome: StudentMatch::Created,
            candidates: Vec::new(),
        })
    } else {
        let candidates: Vec<i64> = same_name.iter().map(|s| s.id).collect();
        info!(student_id = id, ?candidates, "name matched without date of birth; flagged for review");
        Ok(ResolvedStudent {
            student,
            outcome: StudentMatch::Ambiguous,
            candidates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> EnrolmentForm {
        EnrolmentForm {
            course_id: 1,
            class_id: None,
            first_name: " Mia ".to_string(),
            last_name: "Chen".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2014, 5, 1),
            email: "parent@example.com".to_string(),
            phone: "0400111222".to_string(),
            guardian_name: Some("Li Chen".to_string()),
            address: Some("  ".to_string()),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn test_minor_contact_belongs_to_guardian() {
        let valid = validate_form(&form(), today()).unwrap();
        assert_eq!(valid.first_name, "Mia");
        assert_eq!(valid.age, 12);
        assert_eq!(valid.contact_owner, ContactOwner::Guardian);
        assert_eq!(valid.address, None);
    }

    #[test]
    fn test_minor_without_guardian_is_rejected() {
        let mut f = form();
        f.guardian_name = None;
        match validate_form(&f, today()) {
            Err(AppError::Validation(errors)) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "guardian_name");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_every_bad_field_is_reported() {
        let f = EnrolmentForm {
            course_id: 1,
            email: "not-an-email".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2030, 1, 1),
            ..Default::default()
        };
        match validate_form(&f, today()) {
            Err(AppError::Validation(errors)) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["first_name", "last_name", "email", "phone", "date_of_birth"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_adult_owns_contact_details() {
        let mut f = form();
        f.date_of_birth = NaiveDate::from_ymd_opt(1990, 1, 1);
        f.guardian_name = None;
        let valid = validate_form(&f, today()).unwrap();
        assert_eq!(valid.contact_owner, ContactOwner::Student);
        assert!(valid.to_new_student().guardian_name.is_none());
    }
}
