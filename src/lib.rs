//! # Patient Records - Referential store for a hospital patient-record platform
//!
//! Nine tables (hospitals, users and their role profiles, visits, lab tests,
//! procedures, health reports) held in SQLite, with every relationship's
//! delete behavior declared in the schema itself.
//!
//! Patient Records provides:
//! - Typed rows and inputs for each entity
//! - SQLite-backed storage with declarative cascade / restrict / set-null rules
//! - Distinct, classified constraint-violation errors
//! - A read-only deletion impact planner over the referential ruleset
//! - A role-consistency audit for the user specialization tables

pub mod model;
pub mod policy;
pub mod storage;
pub mod impact;
pub mod consistency;
pub mod seed;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use model::Role;
pub use policy::{DeletePolicy, ForeignKey, RowKey, Table, FOREIGN_KEYS};
pub use impact::{DeletionPlan, ImpactPlanner};
pub use storage::SqliteStore;

use rusqlite::ffi;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for store operations
///
/// Constraint failures reported by SQLite are classified into their own
/// variants so callers can tell a duplicate apart from a blocked delete.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Uniqueness violation: {0}")]
    UniqueViolation(String),

    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("Not-null violation: {0}")]
    NotNullViolation(String),

    #[error("Check violation: {0}")]
    CheckViolation(String),

    #[error("Role mismatch: {0}")]
    RoleMismatch(String),

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Storage error: {0}")]
    Storage(rusqlite::Error),

    #[error("Document error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid timestamp: {0}")]
    Timestamp(String),
}

impl Error {
    /// True for any of the four constraint classes plus the role guard
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Error::UniqueViolation(_)
                | Error::ForeignKeyViolation(_)
                | Error::NotNullViolation(_)
                | Error::CheckViolation(_)
                | Error::RoleMismatch(_)
        )
    }

    pub(crate) fn not_found(entity: &'static str, key: impl std::fmt::Display) -> Self {
        Error::NotFound { entity, key: key.to_string() }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        let constraint = match &err {
            rusqlite::Error::SqliteFailure(e, msg) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
                Some((e.extended_code, msg.clone().unwrap_or_default()))
            }
            _ => None,
        };

        let Some((code, message)) = constraint else {
            return Error::Storage(err);
        };

        // "UNIQUE constraint failed: users.email" -> "users.email"
        let subject = message
            .split_once(": ")
            .map(|(_, s)| s.to_string())
            .unwrap_or_else(|| message.clone());

        match code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => Error::UniqueViolation(subject),
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Error::ForeignKeyViolation(message),
            ffi::SQLITE_CONSTRAINT_NOTNULL => Error::NotNullViolation(subject),
            ffi::SQLITE_CONSTRAINT_CHECK => Error::CheckViolation(subject),
            ffi::SQLITE_CONSTRAINT_TRIGGER => Error::RoleMismatch(message),
            _ => Error::Storage(err),
        }
    }
}
