use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const ADULT_AGE: u32 = 18;

/// Whose details the single contact email/phone pair belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ContactOwner {
    Student,
    Guardian,
}

impl ContactOwner {
    pub fn for_age(age: u32) -> Self {
        if age >= ADULT_AGE {
            ContactOwner::Student
        } else {
            ContactOwner::Guardian
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    pub contact_email: String,
    pub contact_phone: String,
    pub contact_owner: ContactOwner,
    pub guardian_name: Option<String>,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Name used to greet the contact person in messages.
    pub fn contact_name(&self) -> String {
        match (&self.contact_owner, &self.guardian_name) {
            (ContactOwner::Guardian, Some(guardian)) if !guardian.is_empty() => guardian.clone(),
            _ => self.first_name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    pub contact_email: String,
    pub contact_phone: String,
    pub contact_owner: ContactOwner,
    pub guardian_name: Option<String>,
    pub address: Option<String>,
}

/// Completed years between `birth_date` and `today`.
pub fn age_on(birth_date: NaiveDate, today: NaiveDate) -> u32 {
    let mut age = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    age.max(0) as u32
}
