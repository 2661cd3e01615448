use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum StaffRole {
    Admin,
    Teacher,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Staff {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: StaffRole,
}

impl Staff {
    pub fn capability(&self) -> Capability {
        match self.role {
            StaffRole::Admin => Capability::Admin,
            StaffRole::Teacher => Capability::Teacher { staff_id: self.id },
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// What the acting staff member may see, resolved at the request boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Admin,
    Teacher { staff_id: i64 },
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Facility {
    pub id: i64,
    pub name: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Classroom {
    pub id: i64,
    pub facility_id: i64,
    pub name: String,
}
