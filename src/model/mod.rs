//! Record types for the nine tables
//!
//! Each table has a row type (what the store returns) and, where rows are
//! created by a workflow, a `New*` input type. Columns the schema declares
//! `NOT NULL` but which callers may legitimately leave out of a draft are
//! `Option` on the input side, so the store reports the omission as a
//! not-null violation instead of the caller failing to build the value.

pub mod clinical;
pub mod hospital;
pub mod user;

pub use clinical::{
    HealthReport, LabTest, MedicalRecord, Medication, NewHealthReport, NewLabTest, NewMedicalRecord,
    NewTreatmentProcedure, TreatmentProcedure,
};
pub use hospital::{Hospital, HospitalUpdate, NewHospital};
pub use user::{
    Doctor, HospitalAdmin, NewDoctor, NewHospitalAdmin, NewPatientProfile, NewUser, PatientProfile,
    Role, User, UserUpdate,
};

use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// Open-ended key/value document (vitals, test data, analytics, one medication)
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Render a timestamp the way the schema's `strftime('%Y-%m-%dT%H:%M:%fZ')` does
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| Error::Timestamp(format!("'{}': {}", raw, e)))
}

pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| Error::Timestamp(format!("'{}': {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_matches_sqlite_format() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(format_timestamp(&ts), "2024-03-09T14:05:07.000Z");
        assert_eq!(parse_timestamp("2024-03-09T14:05:07.000Z").unwrap(), ts);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_timestamp("yesterday"), Err(Error::Timestamp(_))));
        assert!(matches!(parse_date("2024-13-40"), Err(Error::Timestamp(_))));
        assert_eq!(parse_date("2024-02-29").unwrap(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }
}
