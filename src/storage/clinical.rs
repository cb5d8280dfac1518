//! Visits, lab tests, procedures and health reports

use super::rows;
use super::sqlite::SqliteStore;
use crate::model::{
    format_timestamp, HealthReport, LabTest, MedicalRecord, NewHealthReport, NewLabTest, NewMedicalRecord,
    NewTreatmentProcedure, TreatmentProcedure,
};
use crate::policy::{RowKey, Table};
use crate::{Error, Result};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

const RECORD_COLUMNS: &str = "id, patient_id, doctor_id, hospital_id, date_of_visit, chief_complaint, \
                              diagnosis, treatment_summary, medications, notes";
const LAB_COLUMNS: &str = "id, medical_record_id, patient_id, test_name, test_date, result_value, units, \
                           reference_range, is_abnormal, test_data, performed_by_lab, result_file_url";
const PROCEDURE_COLUMNS: &str = "id, patient_id, doctor_id, hospital_id, procedure_name, procedure_date, \
                                 procedure_code, outcome, complications, notes, originating_record_id";
const REPORT_COLUMNS: &str = "id, patient_id, report_date, report_type, vitals, summary, analytics_data";

impl SqliteStore {
    // ========== Medical Record Operations ==========

    pub fn insert_medical_record(&self, record: &NewMedicalRecord) -> Result<MedicalRecord> {
        self.connection().execute(
            r#"
            INSERT INTO medical_records
                (patient_id, doctor_id, hospital_id, date_of_visit, chief_complaint,
                 diagnosis, treatment_summary, medications, notes)
            VALUES (?1, ?2, ?3, COALESCE(?4, strftime('%Y-%m-%dT%H:%M:%fZ', 'now')), ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                record.patient_id.to_string(),
                record.doctor_id.to_string(),
                record.hospital_id,
                record.date_of_visit.as_ref().map(format_timestamp),
                record.chief_complaint,
                record.diagnosis,
                record.treatment_summary,
                rows::to_json(&record.medications)?,
                record.notes,
            ],
        )?;
        let id = self.connection().last_insert_rowid();
        tracing::debug!("Inserted medical record {} for patient {}", id, record.patient_id);
        self.get_medical_record(id)?
            .ok_or_else(|| Error::not_found("medical record", id))
    }

    pub fn get_medical_record(&self, id: i64) -> Result<Option<MedicalRecord>> {
        self.connection()
            .query_row(
                &format!("SELECT {} FROM medical_records WHERE id = ?1", RECORD_COLUMNS),
                [id],
                row_to_record,
            )
            .optional()
            .map_err(Into::into)
    }

    /// A patient's visits, newest first, paged
    pub fn patient_records(&self, patient_id: Uuid, skip: usize, limit: usize) -> Result<Vec<MedicalRecord>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {} FROM medical_records WHERE patient_id = ?1 \
             ORDER BY date_of_visit DESC, id DESC LIMIT ?2 OFFSET ?3",
            RECORD_COLUMNS
        ))?;
        let records = stmt
            .query_map(params![patient_id.to_string(), limit as i64, skip as i64], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Cascades to the visit's lab tests and clears procedure back-links
    pub fn delete_medical_record(&self, id: i64) -> Result<()> {
        self.delete_row(Table::MedicalRecords, RowKey::Id(id))
    }

    pub fn count_medical_records(&self, patient_id: Uuid) -> Result<usize> {
        let count: i64 = self.connection().query_row(
            "SELECT COUNT(*) FROM medical_records WHERE patient_id = ?1",
            [patient_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    // ========== Lab Test Operations ==========

    pub fn insert_lab_test(&self, test: &NewLabTest) -> Result<LabTest> {
        self.connection().execute(
            r#"
            INSERT INTO lab_tests
                (medical_record_id, patient_id, test_name, test_date, result_value, units,
                 reference_range, is_abnormal, test_data, performed_by_lab, result_file_url)
            VALUES (?1, ?2, ?3, COALESCE(?4, date('now')), ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                test.medical_record_id,
                test.patient_id.to_string(),
                test.test_name,
                test.test_date.map(|d| d.to_string()),
                test.result_value,
                test.units,
                test.reference_range,
                test.is_abnormal,
                rows::to_json(&test.test_data)?,
                test.performed_by_lab,
                test.result_file_url,
            ],
        )?;
        let id = self.connection().last_insert_rowid();
        self.get_lab_test(id)?.ok_or_else(|| Error::not_found("lab test", id))
    }

    pub fn get_lab_test(&self, id: i64) -> Result<Option<LabTest>> {
        self.connection()
            .query_row(
                &format!("SELECT {} FROM lab_tests WHERE id = ?1", LAB_COLUMNS),
                [id],
                row_to_lab_test,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Newest first
    pub fn lab_tests_for_patient(&self, patient_id: Uuid) -> Result<Vec<LabTest>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {} FROM lab_tests WHERE patient_id = ?1 ORDER BY test_date DESC, id DESC",
            LAB_COLUMNS
        ))?;
        let tests = stmt
            .query_map([patient_id.to_string()], row_to_lab_test)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tests)
    }

    pub fn lab_tests_for_record(&self, medical_record_id: i64) -> Result<Vec<LabTest>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {} FROM lab_tests WHERE medical_record_id = ?1 ORDER BY id",
            LAB_COLUMNS
        ))?;
        let tests = stmt
            .query_map([medical_record_id], row_to_lab_test)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tests)
    }

    pub fn delete_lab_test(&self, id: i64) -> Result<()> {
        self.delete_row(Table::LabTests, RowKey::Id(id))
    }

    // ========== Procedure Operations ==========

    pub fn insert_procedure(&self, procedure: &NewTreatmentProcedure) -> Result<TreatmentProcedure> {
        self.connection().execute(
            r#"
            INSERT INTO treatments_procedures
                (patient_id, doctor_id, hospital_id, procedure_name, procedure_date, procedure_code,
                 outcome, complications, notes, originating_record_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                procedure.patient_id.to_string(),
                procedure.doctor_id.map(|id| id.to_string()),
                procedure.hospital_id,
                procedure.procedure_name,
                procedure.procedure_date.as_ref().map(format_timestamp),
                procedure.procedure_code,
                procedure.outcome,
                procedure.complications,
                procedure.notes,
                procedure.originating_record_id,
            ],
        )?;
        let id = self.connection().last_insert_rowid();
        self.get_procedure(id)?.ok_or_else(|| Error::not_found("procedure", id))
    }

    pub fn get_procedure(&self, id: i64) -> Result<Option<TreatmentProcedure>> {
        self.connection()
            .query_row(
                &format!("SELECT {} FROM treatments_procedures WHERE id = ?1", PROCEDURE_COLUMNS),
                [id],
                row_to_procedure,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Newest first
    pub fn procedures_for_patient(&self, patient_id: Uuid) -> Result<Vec<TreatmentProcedure>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {} FROM treatments_procedures WHERE patient_id = ?1 ORDER BY procedure_date DESC, id DESC",
            PROCEDURE_COLUMNS
        ))?;
        let procedures = stmt
            .query_map([patient_id.to_string()], row_to_procedure)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(procedures)
    }

    pub fn delete_procedure(&self, id: i64) -> Result<()> {
        self.delete_row(Table::TreatmentProcedures, RowKey::Id(id))
    }

    // ========== Health Report Operations ==========

    pub fn insert_health_report(&self, report: &NewHealthReport) -> Result<HealthReport> {
        self.connection().execute(
            r#"
            INSERT INTO health_reports (patient_id, report_date, report_type, vitals, summary, analytics_data)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                report.patient_id.to_string(),
                report.report_date.map(|d| d.to_string()),
                report.report_type,
                rows::to_json(&report.vitals)?,
                report.summary,
                rows::to_json(&report.analytics_data)?,
            ],
        )?;
        let id = self.connection().last_insert_rowid();
        self.get_health_report(id)?
            .ok_or_else(|| Error::not_found("health report", id))
    }

    pub fn get_health_report(&self, id: i64) -> Result<Option<HealthReport>> {
        self.connection()
            .query_row(
                &format!("SELECT {} FROM health_reports WHERE id = ?1", REPORT_COLUMNS),
                [id],
                row_to_report,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Newest first
    pub fn health_reports_for_patient(&self, patient_id: Uuid) -> Result<Vec<HealthReport>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {} FROM health_reports WHERE patient_id = ?1 ORDER BY report_date DESC, id DESC",
            REPORT_COLUMNS
        ))?;
        let reports = stmt
            .query_map([patient_id.to_string()], row_to_report)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(reports)
    }

    pub fn delete_health_report(&self, id: i64) -> Result<()> {
        self.delete_row(Table::HealthReports, RowKey::Id(id))
    }
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<MedicalRecord> {
    Ok(MedicalRecord {
        id: row.get(0)?,
        patient_id: rows::uuid(row, 1)?,
        doctor_id: rows::uuid(row, 2)?,
        hospital_id: row.get(3)?,
        date_of_visit: rows::timestamp(row, 4)?,
        chief_complaint: row.get(5)?,
        diagnosis: row.get(6)?,
        treatment_summary: row.get(7)?,
        medications: rows::documents(row, 8)?,
        notes: row.get(9)?,
    })
}

fn row_to_lab_test(row: &rusqlite::Row) -> rusqlite::Result<LabTest> {
    Ok(LabTest {
        id: row.get(0)?,
        medical_record_id: row.get(1)?,
        patient_id: rows::uuid(row, 2)?,
        test_name: row.get(3)?,
        test_date: rows::date(row, 4)?,
        result_value: row.get(5)?,
        units: row.get(6)?,
        reference_range: row.get(7)?,
        is_abnormal: row.get(8)?,
        test_data: rows::document(row, 9)?,
        performed_by_lab: row.get(10)?,
        result_file_url: row.get(11)?,
    })
}

fn row_to_procedure(row: &rusqlite::Row) -> rusqlite::Result<TreatmentProcedure> {
    Ok(TreatmentProcedure {
        id: row.get(0)?,
        patient_id: rows::uuid(row, 1)?,
        doctor_id: rows::opt_uuid(row, 2)?,
        hospital_id: row.get(3)?,
        procedure_name: row.get(4)?,
        procedure_date: rows::timestamp(row, 5)?,
        procedure_code: row.get(6)?,
        outcome: row.get(7)?,
        complications: row.get(8)?,
        notes: row.get(9)?,
        originating_record_id: row.get(10)?,
    })
}

fn row_to_report(row: &rusqlite::Row) -> rusqlite::Result<HealthReport> {
    Ok(HealthReport {
        id: row.get(0)?,
        patient_id: rows::uuid(row, 1)?,
        report_date: rows::date(row, 2)?,
        report_type: row.get(3)?,
        vitals: rows::document(row, 4)?,
        summary: row.get(5)?,
        analytics_data: rows::document(row, 6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Medication, NewDoctor, NewHospital, NewPatientProfile, NewUser, Role};
    use chrono::{Duration, NaiveDate, Utc};
    use serde_json::json;

    struct Fixture {
        store: SqliteStore,
        hospital_id: i64,
        patient_id: Uuid,
        doctor_id: Uuid,
    }

    fn fixture() -> Fixture {
        let store = SqliteStore::open_in_memory().unwrap();
        let hospital_id = store.insert_hospital(&NewHospital::new("General", "1 Main St")).unwrap().id;
        let (patient, _) = store
            .register_patient(
                &NewUser::new("p@example.com", "hash", Role::Patient),
                &NewPatientProfile::new("Ada", "Lovelace"),
            )
            .unwrap();
        let (doctor, _) = store
            .register_doctor(
                &NewUser::new("d@example.com", "hash", Role::Doctor),
                &NewDoctor::new(hospital_id, "Cardiology", "LIC-1"),
            )
            .unwrap();
        Fixture { store, hospital_id, patient_id: patient.id, doctor_id: doctor.id }
    }

    impl Fixture {
        fn visit(&self, diagnosis: &str) -> MedicalRecord {
            self.store
                .insert_medical_record(&NewMedicalRecord::new(
                    self.patient_id,
                    self.doctor_id,
                    self.hospital_id,
                    diagnosis,
                ))
                .unwrap()
        }
    }

    fn document(value: serde_json::Value) -> crate::model::Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_record_defaults_and_documents() {
        let f = fixture();
        let record = f
            .store
            .insert_medical_record(
                &NewMedicalRecord::new(f.patient_id, f.doctor_id, f.hospital_id, "Hypertension")
                    .with_medication(Medication::new("Lisinopril", "10mg").with_frequency("Daily")),
            )
            .unwrap();
        assert!(Utc::now() - record.date_of_visit < Duration::minutes(1));
        let meds = record.medications.unwrap();
        assert_eq!(meds[0]["name"], "Lisinopril");
    }

    #[test]
    fn test_missing_diagnosis_is_not_null_violation() {
        let f = fixture();
        let record = NewMedicalRecord {
            patient_id: f.patient_id,
            doctor_id: f.doctor_id,
            hospital_id: f.hospital_id,
            ..Default::default()
        };
        let err = f.store.insert_medical_record(&record).unwrap_err();
        assert!(matches!(err, Error::NotNullViolation(ref s) if s == "medical_records.diagnosis"), "{err}");
    }

    #[test]
    fn test_record_for_unknown_hospital_is_foreign_key_violation() {
        let f = fixture();
        let err = f
            .store
            .insert_medical_record(&NewMedicalRecord::new(f.patient_id, f.doctor_id, 999, "Flu"))
            .unwrap_err();
        assert!(matches!(err, Error::ForeignKeyViolation(_)), "{err}");
    }

    #[test]
    fn test_patient_records_newest_first() {
        let f = fixture();
        let now = Utc::now();
        for days in [3, 1, 2] {
            f.store
                .insert_medical_record(&NewMedicalRecord {
                    date_of_visit: Some(now - Duration::days(days)),
                    ..NewMedicalRecord::new(f.patient_id, f.doctor_id, f.hospital_id, format!("day {}", days))
                })
                .unwrap();
        }
        let records = f.store.patient_records(f.patient_id, 0, 10).unwrap();
        let diagnoses: Vec<_> = records.iter().map(|r| r.diagnosis.as_str()).collect();
        assert_eq!(diagnoses, vec!["day 1", "day 2", "day 3"]);

        let page = f.store.patient_records(f.patient_id, 1, 1).unwrap();
        assert_eq!(page[0].diagnosis, "day 2");
        assert_eq!(f.store.count_medical_records(f.patient_id).unwrap(), 3);
    }

    #[test]
    fn test_delete_record_cascades_labs_and_clears_procedures() {
        let f = fixture();
        let record = f.visit("Fracture");
        let linked = f
            .store
            .insert_lab_test(&NewLabTest::new(f.patient_id, "X-Ray").for_record(record.id))
            .unwrap();
        let standalone = f.store.insert_lab_test(&NewLabTest::new(f.patient_id, "CBC")).unwrap();
        let procedure = f
            .store
            .insert_procedure(
                &NewTreatmentProcedure::new(f.patient_id, "Cast", Utc::now())
                    .performed_by(f.doctor_id, f.hospital_id)
                    .originating_from(record.id),
            )
            .unwrap();

        f.store.delete_medical_record(record.id).unwrap();

        assert!(f.store.get_lab_test(linked.id).unwrap().is_none());
        assert!(f.store.get_lab_test(standalone.id).unwrap().is_some());
        let procedure = f.store.get_procedure(procedure.id).unwrap().unwrap();
        assert_eq!(procedure.originating_record_id, None);
        assert_eq!(procedure.doctor_id, Some(f.doctor_id));
    }

    #[test]
    fn test_lab_test_defaults_to_today() {
        let f = fixture();
        let test = f.store.insert_lab_test(&NewLabTest::new(f.patient_id, "CBC")).unwrap();
        assert_eq!(test.test_date, Utc::now().date_naive());
        assert_eq!(test.medical_record_id, None);
        assert_eq!(f.store.lab_tests_for_patient(f.patient_id).unwrap().len(), 1);
    }

    #[test]
    fn test_lab_test_document_must_be_object() {
        let f = fixture();
        f.store
            .connection()
            .execute(
                "INSERT INTO lab_tests (patient_id, test_name, test_data) VALUES (?1, 'CBC', ?2)",
                params![f.patient_id.to_string(), r#"{"wbc": 6.1}"#],
            )
            .unwrap();

        for bad in ["[1, 2]", "not json"] {
            let err: Error = f
                .store
                .connection()
                .execute(
                    "INSERT INTO lab_tests (patient_id, test_name, test_data) VALUES (?1, 'CBC', ?2)",
                    params![f.patient_id.to_string(), bad],
                )
                .unwrap_err()
                .into();
            assert!(matches!(err, Error::CheckViolation(ref s) if s.contains("ck_lab_tests_test_data")), "{err}");
        }
    }

    #[test]
    fn test_delete_doctor_clears_procedures_but_not_visits() {
        let f = fixture();
        let procedure = f
            .store
            .insert_procedure(
                &NewTreatmentProcedure::new(f.patient_id, "Angioplasty", Utc::now())
                    .performed_by(f.doctor_id, f.hospital_id),
            )
            .unwrap();

        f.store.delete_doctor(f.doctor_id).unwrap();
        let procedure = f.store.get_procedure(procedure.id).unwrap().unwrap();
        assert_eq!(procedure.doctor_id, None);
        assert_eq!(procedure.hospital_id, Some(f.hospital_id));

        // A doctor with visits on file cannot be removed
        let (other, _) = f
            .store
            .register_doctor(
                &NewUser::new("d2@example.com", "hash", Role::Doctor),
                &NewDoctor::new(f.hospital_id, "Oncology", "LIC-2"),
            )
            .unwrap();
        f.store
            .insert_medical_record(&NewMedicalRecord::new(f.patient_id, other.id, f.hospital_id, "Checkup"))
            .unwrap();
        let err = f.store.delete_doctor(other.id).unwrap_err();
        assert!(matches!(err, Error::ForeignKeyViolation(_)), "{err}");
        assert!(f.store.get_doctor(other.id).unwrap().is_some());
    }

    #[test]
    fn test_procedure_requires_name_and_date() {
        let f = fixture();
        let err = f
            .store
            .insert_procedure(&NewTreatmentProcedure {
                patient_id: f.patient_id,
                procedure_name: Some("Biopsy".into()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(
            matches!(err, Error::NotNullViolation(ref s) if s == "treatments_procedures.procedure_date"),
            "{err}"
        );
    }

    #[test]
    fn test_patient_delete_restricted_by_clinical_history() {
        let f = fixture();
        f.visit("Flu");
        let err = f.store.delete_patient_profile(f.patient_id).unwrap_err();
        assert!(matches!(err, Error::ForeignKeyViolation(_)), "{err}");
        let err = f.store.delete_user(f.patient_id).unwrap_err();
        assert!(matches!(err, Error::ForeignKeyViolation(_)), "{err}");
        assert!(f.store.get_user(f.patient_id).unwrap().is_some());
    }

    #[test]
    fn test_patient_delete_cascades_health_reports() {
        let f = fixture();
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let report = f
            .store
            .insert_health_report(&NewHealthReport {
                vitals: Some(document(json!({"bp": "120/80", "hr": 64}))),
                ..NewHealthReport::new(f.patient_id, date, "Annual")
            })
            .unwrap();
        assert_eq!(report.vitals.as_ref().unwrap()["hr"], 64);

        f.store.delete_user(f.patient_id).unwrap();
        assert!(f.store.get_health_report(report.id).unwrap().is_none());
        assert!(f.store.get_patient_profile(f.patient_id).unwrap().is_none());
    }

    #[test]
    fn test_health_report_unique_per_patient_date_type() {
        let f = fixture();
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        f.store
            .insert_health_report(&NewHealthReport::new(f.patient_id, date, "Annual"))
            .unwrap();
        f.store
            .insert_health_report(&NewHealthReport::new(f.patient_id, date, "Cardiac"))
            .unwrap();
        let err = f
            .store
            .insert_health_report(&NewHealthReport::new(f.patient_id, date, "Annual"))
            .unwrap_err();
        assert!(matches!(err, Error::UniqueViolation(_)), "{err}");

        // An untyped report still counts once per date
        let untyped = NewHealthReport { patient_id: f.patient_id, report_date: Some(date), ..Default::default() };
        f.store.insert_health_report(&untyped).unwrap();
        assert!(matches!(f.store.insert_health_report(&untyped), Err(Error::UniqueViolation(_))));
        assert_eq!(f.store.health_reports_for_patient(f.patient_id).unwrap().len(), 3);
    }

    #[test]
    fn test_hospital_delete_restricted_by_procedure() {
        let f = fixture();
        let other = f.store.insert_hospital(&NewHospital::new("Mercy", "2 Side St")).unwrap();
        let mut procedure = NewTreatmentProcedure::new(f.patient_id, "Dialysis", Utc::now());
        procedure.hospital_id = Some(other.id);
        f.store.insert_procedure(&procedure).unwrap();

        let err = f.store.delete_hospital(other.id).unwrap_err();
        assert!(matches!(err, Error::ForeignKeyViolation(_)), "{err}");
    }
}
