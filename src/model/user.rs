//! Users and their role specializations
//!
//! A user row carries authentication data and a role; the role's extra
//! attributes live in exactly one specialization table sharing the user's id.

use crate::policy::Table;
use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// The three roles a user may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Patient,
    Doctor,
    #[serde(rename = "Hospital Admin")]
    HospitalAdmin,
}

impl Role {
    /// The literal stored in `users.role`
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "Patient",
            Role::Doctor => "Doctor",
            Role::HospitalAdmin => "Hospital Admin",
        }
    }

    /// Specialization table holding this role's profile
    pub fn profile_table(&self) -> Table {
        match self {
            Role::Patient => Table::PatientProfiles,
            Role::Doctor => Table::Doctors,
            Role::HospitalAdmin => Table::HospitalAdmins,
        }
    }

    pub fn all() -> &'static [Role] {
        &[Role::Patient, Role::Doctor, Role::HospitalAdmin]
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Patient" => Ok(Role::Patient),
            "Doctor" => Ok(Role::Doctor),
            "Hospital Admin" => Ok(Role::HospitalAdmin),
            _ => Err(Error::CheckViolation(format!(
                "role '{}' is not one of Patient, Doctor, Hospital Admin",
                s
            ))),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    /// Refreshed by the schema on every update of the row
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    /// Generated when absent
    pub id: Option<Uuid>,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

impl NewUser {
    pub fn new(email: impl Into<String>, password_hash: impl Into<String>, role: Role) -> Self {
        Self {
            id: None,
            email: email.into(),
            password_hash: password_hash.into(),
            role,
        }
    }
}

/// Partial update of a user. An empty update still refreshes `updated_at`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub blood_type: Option<String>,
    pub contact_number: Option<String>,
    pub address: Option<String>,
}

impl PatientProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPatientProfile {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub blood_type: Option<String>,
    pub contact_number: Option<String>,
    pub address: Option<String>,
}

impl NewPatientProfile {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub user_id: Uuid,
    pub hospital_id: i64,
    pub specialty: String,
    /// Globally unique
    pub license_number: String,
    pub contact_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDoctor {
    pub hospital_id: i64,
    pub specialty: String,
    pub license_number: String,
    pub contact_number: Option<String>,
}

impl NewDoctor {
    pub fn new(hospital_id: i64, specialty: impl Into<String>, license_number: impl Into<String>) -> Self {
        Self {
            hospital_id,
            specialty: specialty.into(),
            license_number: license_number.into(),
            contact_number: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HospitalAdmin {
    pub user_id: Uuid,
    pub hospital_id: i64,
    pub job_title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHospitalAdmin {
    pub hospital_id: i64,
    pub job_title: Option<String>,
}

impl NewHospitalAdmin {
    pub fn new(hospital_id: i64) -> Self {
        Self { hospital_id, job_title: None }
    }
}
