//! Demo dataset
//!
//! Fills an empty store with hospitals, staff, patients and a clinical
//! history for each patient. Values are drawn by index from fixed lists,
//! so two runs against empty stores produce the same rows apart from ids
//! and the clock-relative dates.

use crate::model::{
    Document, Medication, NewDoctor, NewHealthReport, NewHospital, NewHospitalAdmin, NewLabTest, NewMedicalRecord,
    NewPatientProfile, NewTreatmentProcedure, NewUser, Role,
};
use crate::storage::{DbStats, SqliteStore};
use crate::Result;
use chrono::{Datelike, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

const SPECIALTIES: &[&str] = &["Cardiology", "Neurology", "Pediatrics", "Oncology", "Orthopedics", "General Practice"];
const BLOOD_TYPES: &[&str] = &["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-"];
const GENDERS: &[&str] = &["Female", "Male", "Other"];
const JOB_TITLES: &[&str] = &["Manager", "Director", "IT Head"];
const CITIES: &[&str] = &["Springfield", "Riverside", "Fairview", "Greenville", "Madison", "Franklin"];
const HOSPITAL_KINDS: &[&str] = &["General", "Regional", "St. Jude"];
const FIRST_NAMES: &[&str] = &[
    "Amara", "Bilal", "Chen", "Dana", "Emeka", "Farah", "Goran", "Hana", "Ines", "Jonah", "Kemi", "Luis",
];
const LAST_NAMES: &[&str] = &[
    "Okafor", "Lindqvist", "Haddad", "Moreau", "Tanaka", "Novak", "Mensah", "Rossi", "Kowalski", "Silva",
];
const COMPLAINTS: &[&str] = &["Chest pain", "Persistent headache", "Fever and cough", "Knee swelling", "Fatigue"];
const DIAGNOSES: &[&str] = &["Hypertension", "Migraine", "Influenza", "Ligament strain", "Iron deficiency"];
const DRUGS: &[&str] = &["Lisinopril", "Sumatriptan", "Oseltamivir", "Ibuprofen", "Ferrous sulfate"];
const LAB_TESTS: &[&str] = &["CBC", "CMP", "Lipid Panel", "Glucose"];
const UNITS: &[&str] = &["mg/dL", "k/uL", "%"];
const PROCEDURES: &[&str] = &["Minor Sutures", "Flu Vaccine", "Casting"];
const REPORT_TYPES: &[&str] = &["Annual Physical", "Specialty Review"];
const RISK_LEVELS: &[&str] = &["Low", "Medium", "High"];

/// Placeholder credential stored for every seeded user
pub const SEED_PASSWORD_HASH: &str = "seeded-demo-credential";

fn pick<'a>(list: &[&'a str], i: usize) -> &'a str {
    list[i % list.len()]
}

/// How much data to generate
#[derive(Debug, Clone, Serialize)]
pub struct SeedOptions {
    pub hospitals: usize,
    pub admins: usize,
    pub doctors: usize,
    pub patients: usize,
    /// Upper bound on visits per patient (each patient gets at least one)
    pub records_per_patient: usize,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            hospitals: 3,
            admins: 3,
            doctors: 15,
            patients: 50,
            records_per_patient: 5,
        }
    }
}

/// Outcome of a seeding run
#[derive(Debug, Clone, Serialize)]
pub struct SeedReport {
    /// True when the store already held data and nothing was written
    pub skipped: bool,
    pub stats: DbStats,
}

/// Populate `store` in a single transaction
pub fn seed(store: &SqliteStore, options: &SeedOptions) -> Result<SeedReport> {
    let existing = store.stats()?;
    // Generated names are fixed, so any prior row would collide
    if existing.hospitals > 0 || existing.users > 0 {
        tracing::info!(
            "Store already holds {} hospitals and {} users, skipping seed",
            existing.hospitals,
            existing.users
        );
        return Ok(SeedReport { skipped: true, stats: existing });
    }

    store.transaction(|store| {
        let hospitals = seed_hospitals(store, options.hospitals.max(1))?;
        seed_admins(store, &hospitals, options.admins)?;
        let doctors = seed_doctors(store, &hospitals, options.doctors.max(1))?;
        let patients = seed_patients(store, options.patients)?;

        tracing::info!("Creating clinical history for {} patients", patients.len());
        let visits = options.records_per_patient.max(1);
        for (i, patient) in patients.iter().enumerate() {
            for v in 0..(1 + i % visits) {
                let (doctor, hospital) = doctors[(i + v) % doctors.len()];
                seed_visit(store, *patient, doctor, hospital, i * visits + v)?;
            }
            seed_health_report(store, *patient, i)?;
        }
        Ok(())
    })?;

    let stats = store.stats()?;
    tracing::info!(
        "Seeded {} hospitals, {} users, {} medical records",
        stats.hospitals,
        stats.users,
        stats.medical_records
    );
    Ok(SeedReport { skipped: false, stats })
}

fn seed_hospitals(store: &SqliteStore, count: usize) -> Result<Vec<i64>> {
    tracing::info!("Creating {} hospitals", count);
    (0..count)
        .map(|i| {
            let name = format!("{} {} Hospital", pick(CITIES, i), pick(HOSPITAL_KINDS, i / CITIES.len()));
            let address = format!("{} Hospital Way, {}", 100 + i, pick(CITIES, i));
            let hospital = store.insert_hospital(&NewHospital::new(name, address).with_contact(phone(i)))?;
            Ok(hospital.id)
        })
        .collect()
}

fn seed_admins(store: &SqliteStore, hospitals: &[i64], count: usize) -> Result<()> {
    tracing::info!("Creating {} hospital admins", count);
    for i in 0..count {
        let admin = NewHospitalAdmin {
            job_title: Some(pick(JOB_TITLES, i).to_string()),
            ..NewHospitalAdmin::new(hospitals[i % hospitals.len()])
        };
        store.register_admin(&seed_user("admin", i, Role::HospitalAdmin), &admin)?;
    }
    Ok(())
}

/// Returns (doctor id, affiliated hospital) pairs
fn seed_doctors(store: &SqliteStore, hospitals: &[i64], count: usize) -> Result<Vec<(Uuid, i64)>> {
    tracing::info!("Creating {} doctors", count);
    (0..count)
        .map(|i| {
            let hospital_id = hospitals[i % hospitals.len()];
            let doctor = NewDoctor {
                contact_number: Some(phone(1000 + i)),
                ..NewDoctor::new(hospital_id, pick(SPECIALTIES, i), format!("LIC-{:06}", 100_000 + i))
            };
            let (user, _) = store.register_doctor(&seed_user("dr", i, Role::Doctor), &doctor)?;
            Ok((user.id, hospital_id))
        })
        .collect()
}

fn seed_patients(store: &SqliteStore, count: usize) -> Result<Vec<Uuid>> {
    tracing::info!("Creating {} patients", count);
    let today = Utc::now().date_naive();
    (0..count)
        .map(|i| {
            let profile = NewPatientProfile {
                date_of_birth: Some(today - Duration::days(365 * (18 + (i as i64 * 7) % 72))),
                gender: Some(pick(GENDERS, i).to_string()),
                blood_type: Some(pick(BLOOD_TYPES, i).to_string()),
                contact_number: Some(phone(5000 + i)),
                address: Some(format!("{} Elm Street, {}", 10 + i, pick(CITIES, i + 2))),
                ..NewPatientProfile::new(pick(FIRST_NAMES, i), pick(LAST_NAMES, i / FIRST_NAMES.len() + i))
            };
            let (user, _) = store.register_patient(&seed_user("patient", i, Role::Patient), &profile)?;
            Ok(user.id)
        })
        .collect()
}

/// One visit with a lab test, and a procedure on every third visit
fn seed_visit(store: &SqliteStore, patient: Uuid, doctor: Uuid, hospital: i64, n: usize) -> Result<()> {
    let visited_at = Utc::now() - Duration::days((n as i64 * 13) % 730) - Duration::hours((n % 24) as i64);
    let record = store.insert_medical_record(&NewMedicalRecord {
        date_of_visit: Some(visited_at),
        chief_complaint: Some(pick(COMPLAINTS, n).to_string()),
        treatment_summary: Some(format!("Treated for {}", pick(DIAGNOSES, n).to_lowercase())),
        notes: Some("Follow up in four weeks.".to_string()),
        ..NewMedicalRecord::new(patient, doctor, hospital, pick(DIAGNOSES, n))
            .with_medication(
                Medication::new(pick(DRUGS, n), format!("{}mg", 10 + (n * 37) % 490))
                    .with_frequency(if n % 2 == 0 { "Daily" } else { "Twice Daily" }),
            )
            .with_medication(Medication::new("Saline", format!("{}ml", 1 + n % 5)).with_frequency("As Needed"))
    })?;

    store.insert_lab_test(&NewLabTest {
        test_date: Some(visited_at.date_naive()),
        result_value: Some(format!("{}", 50 + (n * 29) % 150)),
        units: Some(pick(UNITS, n).to_string()),
        reference_range: Some("Normal".to_string()),
        is_abnormal: Some(n % 5 == 0),
        performed_by_lab: Some(format!("{} Diagnostics", pick(LAST_NAMES, n))),
        ..NewLabTest::new(patient, pick(LAB_TESTS, n)).for_record(record.id)
    })?;

    if n % 3 == 0 {
        store.insert_procedure(&NewTreatmentProcedure {
            outcome: Some("Completed without complications".to_string()),
            ..NewTreatmentProcedure::new(
                patient,
                pick(PROCEDURES, n),
                visited_at + Duration::hours(1 + (n % 24) as i64),
            )
            .performed_by(doctor, hospital)
            .originating_from(record.id)
        })?;
    }
    Ok(())
}

fn seed_health_report(store: &SqliteStore, patient: Uuid, i: usize) -> Result<()> {
    let today = Utc::now().date_naive();
    let report_date = today
        .with_ordinal(1)
        .map(|start| start + Duration::days((i as i64 * 11) % i64::from(today.ordinal())))
        .unwrap_or(today);

    let mut vitals = Document::new();
    vitals.insert("BP".into(), format!("{}/{}", 110 + i % 50, 70 + i % 30).into());
    vitals.insert("HR".into(), (60 + i % 40).into());
    vitals.insert("Temp".into(), (97.5 + (i % 20) as f64 / 10.0).into());

    let mut analytics = Document::new();
    analytics.insert("bmi".into(), (18.5 + (i % 165) as f64 / 10.0).into());
    analytics.insert("risk_level".into(), pick(RISK_LEVELS, i).into());

    store.insert_health_report(&NewHealthReport {
        vitals: Some(vitals),
        summary: Some("Stable. Continue current care plan.".to_string()),
        analytics_data: Some(analytics),
        ..NewHealthReport::new(patient, report_date, pick(REPORT_TYPES, i))
    })?;
    Ok(())
}

fn seed_user(prefix: &str, i: usize, role: Role) -> NewUser {
    NewUser::new(format!("{}{:03}@example.org", prefix, i), SEED_PASSWORD_HASH, role)
}

fn phone(i: usize) -> String {
    format!("555-{:04}", i % 10_000)
}
