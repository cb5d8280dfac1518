//! Referential ruleset - the delete behavior of every relationship
//!
//! The DDL in [`crate::storage::schema`] is the enforcing copy of these rules;
//! this module is the queryable copy used by the impact planner and checked
//! against the live schema in tests.

use crate::{Error, Result};
use rusqlite::types::{ToSql, ToSqlOutput};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// The nine tables of the record store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Hospitals,
    Users,
    PatientProfiles,
    Doctors,
    HospitalAdmins,
    MedicalRecords,
    LabTests,
    TreatmentProcedures,
    HealthReports,
}

impl Table {
    /// SQL table name
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Hospitals => "hospitals",
            Table::Users => "users",
            Table::PatientProfiles => "patient_profiles",
            Table::Doctors => "doctors",
            Table::HospitalAdmins => "hospital_admins",
            Table::MedicalRecords => "medical_records",
            Table::LabTests => "lab_tests",
            Table::TreatmentProcedures => "treatments_procedures",
            Table::HealthReports => "health_reports",
        }
    }

    /// Primary key column
    pub fn key_column(&self) -> &'static str {
        match self {
            Table::PatientProfiles | Table::Doctors | Table::HospitalAdmins => "user_id",
            _ => "id",
        }
    }

    /// Whether the primary key is a user UUID (as opposed to an integer id)
    pub fn has_uuid_key(&self) -> bool {
        matches!(
            self,
            Table::Users | Table::PatientProfiles | Table::Doctors | Table::HospitalAdmins
        )
    }

    /// Parse a key for this table from its textual form
    pub fn parse_key(&self, raw: &str) -> Result<RowKey> {
        if self.has_uuid_key() {
            Uuid::parse_str(raw.trim())
                .map(RowKey::Uuid)
                .map_err(|e| Error::InvalidKey(format!("{} key '{}': {}", self, raw, e)))
        } else {
            raw.trim()
                .parse::<i64>()
                .map(RowKey::Id)
                .map_err(|e| Error::InvalidKey(format!("{} key '{}': {}", self, raw, e)))
        }
    }

    pub fn all() -> &'static [Table] {
        &[
            Table::Hospitals,
            Table::Users,
            Table::PatientProfiles,
            Table::Doctors,
            Table::HospitalAdmins,
            Table::MedicalRecords,
            Table::LabTests,
            Table::TreatmentProcedures,
            Table::HealthReports,
        ]
    }
}

impl FromStr for Table {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "hospitals" | "hospital" => Ok(Table::Hospitals),
            "users" | "user" => Ok(Table::Users),
            "patient_profiles" | "patient_profile" | "patient" | "patients" => Ok(Table::PatientProfiles),
            "doctors" | "doctor" => Ok(Table::Doctors),
            "hospital_admins" | "hospital_admin" | "admin" | "admins" => Ok(Table::HospitalAdmins),
            "medical_records" | "medical_record" | "record" | "records" => Ok(Table::MedicalRecords),
            "lab_tests" | "lab_test" | "lab" | "labs" => Ok(Table::LabTests),
            "treatments_procedures" | "treatment_procedures" | "procedure" | "procedures" => {
                Ok(Table::TreatmentProcedures)
            }
            "health_reports" | "health_report" | "report" | "reports" => Ok(Table::HealthReports),
            _ => Err(Error::InvalidKey(format!("Unknown table: {}", s))),
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What happens to a child row when its parent is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Child rows are deleted with the parent
    Cascade,
    /// The parent delete is rejected while child rows exist
    Restrict,
    /// The child's reference column is cleared
    SetNull,
}

impl DeletePolicy {
    /// Spelling used in `ON DELETE` clauses and by `PRAGMA foreign_key_list`
    pub fn as_sql(&self) -> &'static str {
        match self {
            DeletePolicy::Cascade => "CASCADE",
            DeletePolicy::Restrict => "RESTRICT",
            DeletePolicy::SetNull => "SET NULL",
        }
    }
}

impl FromStr for DeletePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "CASCADE" => Ok(DeletePolicy::Cascade),
            "RESTRICT" => Ok(DeletePolicy::Restrict),
            "SET NULL" => Ok(DeletePolicy::SetNull),
            _ => Err(Error::InvalidKey(format!("Unknown delete policy: {}", s))),
        }
    }
}

impl std::fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DeletePolicy::Cascade => "cascade",
            DeletePolicy::Restrict => "restrict",
            DeletePolicy::SetNull => "set null",
        };
        write!(f, "{}", label)
    }
}

/// A foreign key: `child.column` references the primary key of `parent`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ForeignKey {
    pub child: Table,
    pub column: &'static str,
    pub parent: Table,
    pub on_delete: DeletePolicy,
}

const fn fk(child: Table, column: &'static str, parent: Table, on_delete: DeletePolicy) -> ForeignKey {
    ForeignKey { child, column, parent, on_delete }
}

/// Every relationship in the store with its delete policy
pub const FOREIGN_KEYS: &[ForeignKey] = &[
    fk(Table::PatientProfiles, "user_id", Table::Users, DeletePolicy::Cascade),
    fk(Table::Doctors, "user_id", Table::Users, DeletePolicy::Cascade),
    fk(Table::HospitalAdmins, "user_id", Table::Users, DeletePolicy::Cascade),
    fk(Table::Doctors, "hospital_id", Table::Hospitals, DeletePolicy::Restrict),
    fk(Table::HospitalAdmins, "hospital_id", Table::Hospitals, DeletePolicy::Restrict),
    fk(Table::MedicalRecords, "patient_id", Table::PatientProfiles, DeletePolicy::Restrict),
    fk(Table::MedicalRecords, "doctor_id", Table::Doctors, DeletePolicy::Restrict),
    fk(Table::MedicalRecords, "hospital_id", Table::Hospitals, DeletePolicy::Restrict),
    fk(Table::LabTests, "medical_record_id", Table::MedicalRecords, DeletePolicy::Cascade),
    fk(Table::LabTests, "patient_id", Table::PatientProfiles, DeletePolicy::Restrict),
    fk(Table::TreatmentProcedures, "patient_id", Table::PatientProfiles, DeletePolicy::Restrict),
    fk(Table::TreatmentProcedures, "doctor_id", Table::Doctors, DeletePolicy::SetNull),
    fk(Table::TreatmentProcedures, "hospital_id", Table::Hospitals, DeletePolicy::Restrict),
    fk(Table::TreatmentProcedures, "originating_record_id", Table::MedicalRecords, DeletePolicy::SetNull),
    fk(Table::HealthReports, "patient_id", Table::PatientProfiles, DeletePolicy::Cascade),
];

/// Relationships whose parent is `table`
pub fn children_of(table: Table) -> impl Iterator<Item = &'static ForeignKey> {
    FOREIGN_KEYS.iter().filter(move |fk| fk.parent == table)
}

/// Primary key value of a row in any table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowKey {
    Uuid(Uuid),
    Id(i64),
}

impl ToSql for RowKey {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            RowKey::Uuid(id) => Ok(ToSqlOutput::from(id.to_string())),
            RowKey::Id(id) => Ok(ToSqlOutput::from(*id)),
        }
    }
}

impl From<Uuid> for RowKey {
    fn from(id: Uuid) -> Self {
        RowKey::Uuid(id)
    }
}

impl From<i64> for RowKey {
    fn from(id: i64) -> Self {
        RowKey::Id(id)
    }
}

impl std::fmt::Display for RowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowKey::Uuid(id) => write!(f, "{}", id),
            RowKey::Id(id) => write!(f, "{}", id),
        }
    }
}
