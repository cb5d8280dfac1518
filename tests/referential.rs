//! End-to-end referential behavior against a file-backed store

use chrono::{NaiveDate, Utc};
use patient_records::model::{
    NewDoctor, NewHealthReport, NewHospital, NewHospitalAdmin, NewLabTest, NewMedicalRecord, NewPatientProfile,
    NewTreatmentProcedure, NewUser, Role,
};
use patient_records::{Error, ImpactPlanner, RowKey, SqliteStore, Table};
use uuid::Uuid;

struct Clinic {
    _dir: tempfile::TempDir,
    store: SqliteStore,
    hospital: i64,
    patient: Uuid,
    doctor: Uuid,
}

fn clinic() -> Clinic {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(&dir.path().join("records.db")).unwrap();
    let hospital = store.insert_hospital(&NewHospital::new("General", "1 Main St")).unwrap().id;
    let patient = store
        .register_patient(
            &NewUser::new("ada@example.com", "h", Role::Patient),
            &NewPatientProfile::new("Ada", "Lovelace"),
        )
        .unwrap()
        .0
        .id;
    let doctor = store
        .register_doctor(
            &NewUser::new("dr@example.com", "h", Role::Doctor),
            &NewDoctor::new(hospital, "Cardiology", "LIC-1"),
        )
        .unwrap()
        .0
        .id;
    Clinic { _dir: dir, store, hospital, patient, doctor }
}

#[test]
fn schema_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.db");
    {
        let store = SqliteStore::open(&path).unwrap();
        store.insert_hospital(&NewHospital::new("General", "1 Main St")).unwrap();
    }
    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.stats().unwrap().hospitals, 1);

    // Foreign keys are enforced on the reopened connection too
    let err = store
        .insert_doctor(Uuid::new_v4(), &NewDoctor::new(1, "ENT", "LIC-2"))
        .unwrap_err();
    assert!(matches!(err, Error::ForeignKeyViolation(_)), "{err}");
}

#[test]
fn deleting_a_doctor_user_cascades_profile_and_clears_procedures() {
    let c = clinic();
    let procedure = c
        .store
        .insert_procedure(
            &NewTreatmentProcedure::new(c.patient, "Stent", Utc::now()).performed_by(c.doctor, c.hospital),
        )
        .unwrap();

    c.store.delete_user(c.doctor).unwrap();

    assert!(c.store.get_doctor(c.doctor).unwrap().is_none());
    let procedure = c.store.get_procedure(procedure.id).unwrap().unwrap();
    assert_eq!(procedure.doctor_id, None);
    assert_eq!(procedure.patient_id, c.patient);
}

#[test]
fn hospital_delete_succeeds_once_nothing_references_it() {
    let c = clinic();
    let mercy = c.store.insert_hospital(&NewHospital::new("Mercy", "2 Side St")).unwrap();
    let (admin, _) = c
        .store
        .register_admin(
            &NewUser::new("admin@example.com", "h", Role::HospitalAdmin),
            &NewHospitalAdmin::new(c.hospital),
        )
        .unwrap();

    assert!(matches!(c.store.delete_hospital(c.hospital), Err(Error::ForeignKeyViolation(_))));

    c.store
        .transaction(|store| {
            store.reassign_doctor(c.doctor, mercy.id)?;
            store.reassign_admin(admin.id, mercy.id)?;
            store.delete_hospital(c.hospital)
        })
        .unwrap();

    assert!(c.store.get_hospital(c.hospital).unwrap().is_none());
    assert_eq!(c.store.get_doctor(c.doctor).unwrap().unwrap().hospital_id, mercy.id);
}

#[test]
fn failed_transaction_leaves_no_trace() {
    let c = clinic();
    let mercy = c.store.insert_hospital(&NewHospital::new("Mercy", "2 Side St")).unwrap();
    c.store
        .insert_medical_record(&NewMedicalRecord::new(c.patient, c.doctor, c.hospital, "Flu"))
        .unwrap();

    // The visit still pins the hospital, so the whole unit rolls back
    let err = c
        .store
        .transaction(|store| {
            store.reassign_doctor(c.doctor, mercy.id)?;
            store.delete_hospital(c.hospital)
        })
        .unwrap_err();
    assert!(matches!(err, Error::ForeignKeyViolation(_)), "{err}");
    assert_eq!(c.store.get_doctor(c.doctor).unwrap().unwrap().hospital_id, c.hospital);
}

#[test]
fn patient_with_history_cannot_be_removed() {
    let c = clinic();
    let record = c
        .store
        .insert_medical_record(&NewMedicalRecord::new(c.patient, c.doctor, c.hospital, "Flu"))
        .unwrap();
    c.store
        .insert_lab_test(&NewLabTest::new(c.patient, "CBC").for_record(record.id))
        .unwrap();

    let plan = ImpactPlanner::new(&c.store).plan(Table::Users, RowKey::Uuid(c.patient)).unwrap();
    assert!(plan.is_blocked());
    let blocking: Vec<_> = plan.blockers().map(|e| e.table).collect();
    assert!(blocking.contains(&Table::MedicalRecords));
    assert!(blocking.contains(&Table::LabTests));

    let err = c.store.delete_user(c.patient).unwrap_err();
    assert!(err.is_constraint_violation());
    assert!(c.store.get_patient_profile(c.patient).unwrap().is_some());
}

#[test]
fn lab_tests_alone_block_patient_removal() {
    let c = clinic();
    c.store.insert_lab_test(&NewLabTest::new(c.patient, "Lipid Panel")).unwrap();

    let plan = ImpactPlanner::new(&c.store).plan(Table::Users, RowKey::Uuid(c.patient)).unwrap();
    let blocking: Vec<_> = plan.blockers().map(|e| e.table).collect();
    assert_eq!(blocking, vec![Table::LabTests]);

    let err = c.store.delete_patient_profile(c.patient).unwrap_err();
    assert!(matches!(err, Error::ForeignKeyViolation(_)), "{err}");
    assert!(c.store.get_patient_profile(c.patient).unwrap().is_some());
}

#[test]
fn procedures_alone_block_patient_removal() {
    let c = clinic();
    c.store
        .insert_procedure(&NewTreatmentProcedure::new(c.patient, "Appendectomy", Utc::now()))
        .unwrap();

    let plan = ImpactPlanner::new(&c.store).plan(Table::Users, RowKey::Uuid(c.patient)).unwrap();
    let blocking: Vec<_> = plan.blockers().map(|e| e.table).collect();
    assert_eq!(blocking, vec![Table::TreatmentProcedures]);

    let err = c.store.delete_user(c.patient).unwrap_err();
    assert!(matches!(err, Error::ForeignKeyViolation(_)), "{err}");
    assert!(c.store.get_user(c.patient).unwrap().is_some());
}

#[test]
fn record_delete_matches_its_plan() {
    let c = clinic();
    let record = c
        .store
        .insert_medical_record(&NewMedicalRecord::new(c.patient, c.doctor, c.hospital, "Fracture"))
        .unwrap();
    for name in ["X-Ray", "CBC"] {
        c.store
            .insert_lab_test(&NewLabTest::new(c.patient, name).for_record(record.id))
            .unwrap();
    }
    c.store
        .insert_procedure(
            &NewTreatmentProcedure::new(c.patient, "Cast", Utc::now()).originating_from(record.id),
        )
        .unwrap();

    let plan = ImpactPlanner::new(&c.store)
        .plan(Table::MedicalRecords, RowKey::Id(record.id))
        .unwrap();
    let before = c.store.stats().unwrap();
    c.store.delete_medical_record(record.id).unwrap();
    let after = c.store.stats().unwrap();

    assert_eq!(before.lab_tests - after.lab_tests, plan.cascaded_rows());
    assert_eq!(plan.nulled_rows(), 1);
    assert_eq!(after.procedures, before.procedures);
}

#[test]
fn health_reports_are_unique_per_day_and_type() {
    let c = clinic();
    let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    c.store
        .insert_health_report(&NewHealthReport::new(c.patient, date, "Annual Physical"))
        .unwrap();
    let err = c
        .store
        .insert_health_report(&NewHealthReport::new(c.patient, date, "Annual Physical"))
        .unwrap_err();
    assert!(matches!(err, Error::UniqueViolation(_)), "{err}");

    let next_day = date.succ_opt().unwrap();
    c.store
        .insert_health_report(&NewHealthReport::new(c.patient, next_day, "Annual Physical"))
        .unwrap();
}

#[test]
fn unknown_keys_are_reported_as_not_found() {
    let c = clinic();
    assert!(matches!(c.store.delete_row(Table::LabTests, RowKey::Id(77)), Err(Error::NotFound { .. })));
    assert!(matches!(c.store.delete_user(Uuid::new_v4()), Err(Error::NotFound { .. })));
    assert!(matches!(c.store.reassign_doctor(c.patient, c.hospital), Err(Error::NotFound { .. })));
}
