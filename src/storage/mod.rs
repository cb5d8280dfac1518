//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with tables:
//! - hospitals(id, name, address, contact_info, is_active)
//! - users(id, email, password_hash, role, created_at, updated_at)
//! - patient_profiles / doctors / hospital_admins (keyed by users.id)
//! - medical_records, lab_tests, treatments_procedures, health_reports
//!
//! Referential rules live in the DDL; the store never re-checks them.

pub mod schema;
pub mod sqlite;
mod clinical;
pub(crate) mod rows;

pub use sqlite::{DbStats, SqliteStore};
