//! SQLite storage implementation

use super::{rows, schema};
use crate::model::{
    Doctor, Hospital, HospitalAdmin, HospitalUpdate, NewDoctor, NewHospital, NewHospitalAdmin,
    NewPatientProfile, NewUser, PatientProfile, User, UserUpdate,
};
use crate::policy::{RowKey, Table};
use crate::{Error, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use uuid::Uuid;

const HOSPITAL_COLUMNS: &str = "id, name, address, contact_info, is_active, created_at";
const USER_COLUMNS: &str = "id, email, password_hash, role, created_at, updated_at";
const PATIENT_COLUMNS: &str =
    "user_id, first_name, last_name, date_of_birth, gender, blood_type, contact_number, address";
const DOCTOR_COLUMNS: &str = "user_id, hospital_id, specialty, license_number, contact_number";
const ADMIN_COLUMNS: &str = "user_id, hospital_id, job_title";

/// SQLite-backed record store
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        tracing::debug!("Opening record store at {}", path.display());
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Enable foreign keys and apply the schema; safe to run repeatedly
    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch(schema::PRAGMAS)?;
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` inside a transaction; any error rolls the whole unit back.
    ///
    /// Calls made while a transaction is already open run under a savepoint,
    /// so a failed inner unit is undone without aborting the outer one.
    pub fn transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        if !self.conn.is_autocommit() {
            return self.savepoint(f);
        }
        let tx = self.conn.unchecked_transaction()?;
        let value = f(self)?;
        tx.commit()?;
        Ok(value)
    }

    fn savepoint<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        self.conn.execute_batch("SAVEPOINT nested_unit")?;
        match f(self) {
            Ok(value) => {
                self.conn.execute_batch("RELEASE nested_unit")?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK TO nested_unit; RELEASE nested_unit") {
                    tracing::warn!("Failed to roll back savepoint: {}", rollback);
                }
                Err(err)
            }
        }
    }

    // ========== Hospital Operations ==========

    pub fn insert_hospital(&self, hospital: &NewHospital) -> Result<Hospital> {
        self.conn.execute(
            "INSERT INTO hospitals (name, address, contact_info) VALUES (?1, ?2, ?3)",
            params![hospital.name, hospital.address, hospital.contact_info],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!("Inserted hospital {} ({})", id, hospital.name);
        self.get_hospital(id)?.ok_or_else(|| Error::not_found("hospital", id))
    }

    pub fn get_hospital(&self, id: i64) -> Result<Option<Hospital>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM hospitals WHERE id = ?1", HOSPITAL_COLUMNS),
                [id],
                row_to_hospital,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Hospitals ordered by id, paged
    pub fn list_hospitals(&self, skip: usize, limit: usize) -> Result<Vec<Hospital>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM hospitals ORDER BY id LIMIT ?1 OFFSET ?2",
            HOSPITAL_COLUMNS
        ))?;
        let hospitals = stmt
            .query_map(params![limit as i64, skip as i64], row_to_hospital)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(hospitals)
    }

    /// Apply the fields present in `update`
    pub fn update_hospital(&self, id: i64, update: &HospitalUpdate) -> Result<Hospital> {
        if update.is_empty() {
            return self.get_hospital(id)?.ok_or_else(|| Error::not_found("hospital", id));
        }
        let changed = self.conn.execute(
            r#"
            UPDATE hospitals
            SET name = COALESCE(?2, name),
                address = COALESCE(?3, address),
                contact_info = CASE WHEN ?4 THEN ?5 ELSE contact_info END,
                is_active = COALESCE(?6, is_active)
            WHERE id = ?1
            "#,
            params![
                id,
                update.name,
                update.address,
                update.contact_info.is_some(),
                update.contact_info.clone().flatten(),
                update.is_active
            ],
        )?;
        if changed == 0 {
            return Err(Error::not_found("hospital", id));
        }
        self.get_hospital(id)?.ok_or_else(|| Error::not_found("hospital", id))
    }

    /// Rejected while doctors, admins, visits or procedures reference it
    pub fn delete_hospital(&self, id: i64) -> Result<()> {
        self.delete_row(Table::Hospitals, RowKey::Id(id))
    }

    pub fn count_hospital_doctors(&self, hospital_id: i64) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM doctors WHERE hospital_id = ?1",
            [hospital_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    // ========== User Operations ==========

    pub fn insert_user(&self, user: &NewUser) -> Result<User> {
        let id = user.id.unwrap_or_else(Uuid::new_v4);
        self.conn.execute(
            "INSERT INTO users (id, email, password_hash, role) VALUES (?1, ?2, ?3, ?4)",
            params![id.to_string(), user.email, user.password_hash, user.role.as_str()],
        )?;
        tracing::debug!("Inserted user {} with role {}", id, user.role);
        self.get_user(id)?.ok_or_else(|| Error::not_found("user", id))
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                [id.to_string()],
                row_to_user,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
                [email],
                row_to_user,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Apply the fields present in `update`; `updated_at` is always refreshed
    pub fn update_user(&self, id: Uuid, update: &UserUpdate) -> Result<User> {
        let changed = self.conn.execute(
            r#"
            UPDATE users
            SET email = COALESCE(?2, email),
                password_hash = COALESCE(?3, password_hash),
                role = COALESCE(?4, role)
            WHERE id = ?1
            "#,
            params![
                id.to_string(),
                update.email,
                update.password_hash,
                update.role.map(|r| r.as_str()),
            ],
        )?;
        if changed == 0 {
            return Err(Error::not_found("user", id));
        }
        self.get_user(id)?.ok_or_else(|| Error::not_found("user", id))
    }

    /// Write only `updated_at`; the schema still replaces it with a later value
    pub fn touch_user(&self, id: Uuid) -> Result<User> {
        let changed = self
            .conn
            .execute("UPDATE users SET updated_at = updated_at WHERE id = ?1", [id.to_string()])?;
        if changed == 0 {
            return Err(Error::not_found("user", id));
        }
        self.get_user(id)?.ok_or_else(|| Error::not_found("user", id))
    }

    /// Cascades to the user's profile; rejected if that profile is still referenced
    pub fn delete_user(&self, id: Uuid) -> Result<()> {
        self.delete_row(Table::Users, RowKey::Uuid(id))
    }

    // ========== Profile Operations ==========

    pub fn insert_patient_profile(&self, user_id: Uuid, profile: &NewPatientProfile) -> Result<PatientProfile> {
        self.conn.execute(
            r#"
            INSERT INTO patient_profiles
                (user_id, first_name, last_name, date_of_birth, gender, blood_type, contact_number, address)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                user_id.to_string(),
                profile.first_name,
                profile.last_name,
                profile.date_of_birth.map(|d| d.to_string()),
                profile.gender,
                profile.blood_type,
                profile.contact_number,
                profile.address,
            ],
        )?;
        self.get_patient_profile(user_id)?
            .ok_or_else(|| Error::not_found("patient profile", user_id))
    }

    pub fn insert_doctor(&self, user_id: Uuid, doctor: &NewDoctor) -> Result<Doctor> {
        self.conn.execute(
            r#"
            INSERT INTO doctors (user_id, hospital_id, specialty, license_number, contact_number)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                user_id.to_string(),
                doctor.hospital_id,
                doctor.specialty,
                doctor.license_number,
                doctor.contact_number,
            ],
        )?;
        self.get_doctor(user_id)?.ok_or_else(|| Error::not_found("doctor", user_id))
    }

    pub fn insert_hospital_admin(&self, user_id: Uuid, admin: &NewHospitalAdmin) -> Result<HospitalAdmin> {
        self.conn.execute(
            "INSERT INTO hospital_admins (user_id, hospital_id, job_title) VALUES (?1, ?2, ?3)",
            params![user_id.to_string(), admin.hospital_id, admin.job_title],
        )?;
        self.get_hospital_admin(user_id)?
            .ok_or_else(|| Error::not_found("hospital admin", user_id))
    }

    /// Create a patient user and its profile as one unit
    pub fn register_patient(&self, user: &NewUser, profile: &NewPatientProfile) -> Result<(User, PatientProfile)> {
        self.transaction(|store| {
            let user = store.insert_user(user)?;
            let profile = store.insert_patient_profile(user.id, profile)?;
            Ok((user, profile))
        })
    }

    /// Create a doctor user and its profile as one unit
    pub fn register_doctor(&self, user: &NewUser, doctor: &NewDoctor) -> Result<(User, Doctor)> {
        self.transaction(|store| {
            let user = store.insert_user(user)?;
            let doctor = store.insert_doctor(user.id, doctor)?;
            Ok((user, doctor))
        })
    }

    /// Create a hospital admin user and its profile as one unit
    pub fn register_admin(&self, user: &NewUser, admin: &NewHospitalAdmin) -> Result<(User, HospitalAdmin)> {
        self.transaction(|store| {
            let user = store.insert_user(user)?;
            let admin = store.insert_hospital_admin(user.id, admin)?;
            Ok((user, admin))
        })
    }

    pub fn get_patient_profile(&self, user_id: Uuid) -> Result<Option<PatientProfile>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM patient_profiles WHERE user_id = ?1", PATIENT_COLUMNS),
                [user_id.to_string()],
                row_to_patient,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn get_doctor(&self, user_id: Uuid) -> Result<Option<Doctor>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM doctors WHERE user_id = ?1", DOCTOR_COLUMNS),
                [user_id.to_string()],
                row_to_doctor,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn get_hospital_admin(&self, user_id: Uuid) -> Result<Option<HospitalAdmin>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM hospital_admins WHERE user_id = ?1", ADMIN_COLUMNS),
                [user_id.to_string()],
                row_to_admin,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Move a doctor to another hospital
    pub fn reassign_doctor(&self, user_id: Uuid, hospital_id: i64) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE doctors SET hospital_id = ?2 WHERE user_id = ?1",
            params![user_id.to_string(), hospital_id],
        )?;
        if changed == 0 {
            return Err(Error::not_found("doctor", user_id));
        }
        Ok(())
    }

    /// Move a hospital admin to another hospital
    pub fn reassign_admin(&self, user_id: Uuid, hospital_id: i64) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE hospital_admins SET hospital_id = ?2 WHERE user_id = ?1",
            params![user_id.to_string(), hospital_id],
        )?;
        if changed == 0 {
            return Err(Error::not_found("hospital admin", user_id));
        }
        Ok(())
    }

    /// Cascades to health reports; rejected while visits, labs or procedures exist
    pub fn delete_patient_profile(&self, user_id: Uuid) -> Result<()> {
        self.delete_row(Table::PatientProfiles, RowKey::Uuid(user_id))
    }

    /// Clears the doctor on procedures; rejected while visits reference the doctor
    pub fn delete_doctor(&self, user_id: Uuid) -> Result<()> {
        self.delete_row(Table::Doctors, RowKey::Uuid(user_id))
    }

    pub fn delete_hospital_admin(&self, user_id: Uuid) -> Result<()> {
        self.delete_row(Table::HospitalAdmins, RowKey::Uuid(user_id))
    }

    /// Case-insensitive match on first name, last name, or the patient's email.
    ///
    /// Case folding is SQLite's `LIKE`, which only folds ASCII letters.
    pub fn search_patients(&self, query: &str) -> Result<Vec<PatientProfile>> {
        let pattern = rows::like_pattern(query);
        let mut stmt = self.conn.prepare(
            r#"
            SELECT p.user_id, p.first_name, p.last_name, p.date_of_birth, p.gender,
                   p.blood_type, p.contact_number, p.address
            FROM patient_profiles p
            JOIN users u ON u.id = p.user_id
            WHERE p.first_name LIKE ?1 ESCAPE '\'
               OR p.last_name LIKE ?1 ESCAPE '\'
               OR u.email LIKE ?1 ESCAPE '\'
            ORDER BY p.last_name, p.first_name
            "#,
        )?;
        let profiles = stmt
            .query_map([pattern], row_to_patient)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(profiles)
    }

    /// Users holding the Patient role
    pub fn count_patients(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM users WHERE role = 'Patient'", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // ========== Generic Operations ==========

    /// Delete one row by primary key; the schema applies the delete policies
    pub fn delete_row(&self, table: Table, key: RowKey) -> Result<()> {
        let changed = self.conn.execute(
            &format!("DELETE FROM {} WHERE {} = ?1", table.as_str(), table.key_column()),
            [key],
        )?;
        if changed == 0 {
            return Err(Error::not_found(table.as_str(), key));
        }
        tracing::debug!("Deleted {} {}", table, key);
        Ok(())
    }

    pub fn row_exists(&self, table: Table, key: RowKey) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                &format!("SELECT 1 FROM {} WHERE {} = ?1", table.as_str(), table.key_column()),
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn count_rows(&self, table: Table) -> Result<usize> {
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table.as_str()), [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        Ok(DbStats {
            hospitals: self.count_rows(Table::Hospitals)?,
            users: self.count_rows(Table::Users)?,
            patients: self.count_rows(Table::PatientProfiles)?,
            doctors: self.count_rows(Table::Doctors)?,
            hospital_admins: self.count_rows(Table::HospitalAdmins)?,
            medical_records: self.count_rows(Table::MedicalRecords)?,
            lab_tests: self.count_rows(Table::LabTests)?,
            procedures: self.count_rows(Table::TreatmentProcedures)?,
            health_reports: self.count_rows(Table::HealthReports)?,
        })
    }
}

fn row_to_hospital(row: &rusqlite::Row) -> rusqlite::Result<Hospital> {
    Ok(Hospital {
        id: row.get(0)?,
        name: row.get(1)?,
        address: row.get(2)?,
        contact_info: row.get(3)?,
        is_active: row.get(4)?,
        created_at: rows::timestamp(row, 5)?,
    })
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    let role_str: String = row.get(3)?;
    let role = role_str.parse().map_err(|e: Error| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(User {
        id: rows::uuid(row, 0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        role,
        created_at: rows::timestamp(row, 4)?,
        updated_at: rows::timestamp(row, 5)?,
    })
}

fn row_to_patient(row: &rusqlite::Row) -> rusqlite::Result<PatientProfile> {
    Ok(PatientProfile {
        user_id: rows::uuid(row, 0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        date_of_birth: rows::opt_date(row, 3)?,
        gender: row.get(4)?,
        blood_type: row.get(5)?,
        contact_number: row.get(6)?,
        address: row.get(7)?,
    })
}

fn row_to_doctor(row: &rusqlite::Row) -> rusqlite::Result<Doctor> {
    Ok(Doctor {
        user_id: rows::uuid(row, 0)?,
        hospital_id: row.get(1)?,
        specialty: row.get(2)?,
        license_number: row.get(3)?,
        contact_number: row.get(4)?,
    })
}

fn row_to_admin(row: &rusqlite::Row) -> rusqlite::Result<HospitalAdmin> {
    Ok(HospitalAdmin {
        user_id: rows::uuid(row, 0)?,
        hospital_id: row.get(1)?,
        job_title: row.get(2)?,
    })
}

/// Database statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DbStats {
    pub hospitals: usize,
    pub users: usize,
    pub patients: usize,
    pub doctors: usize,
    pub hospital_admins: usize,
    pub medical_records: usize,
    pub lab_tests: usize,
    pub procedures: usize,
    pub health_reports: usize,
}

impl DbStats {
    /// Label/value pairs in table order
    pub fn rows(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("Hospitals", self.hospitals),
            ("Users", self.users),
            ("Patients", self.patients),
            ("Doctors", self.doctors),
            ("Hospital admins", self.hospital_admins),
            ("Medical records", self.medical_records),
            ("Lab tests", self.lab_tests),
            ("Procedures", self.procedures),
            ("Health reports", self.health_reports),
        ]
    }
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        for (label, value) in self.rows() {
            writeln!(f, "  {}: {}", label, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{format_timestamp, Role};
    use crate::policy::{DeletePolicy, FOREIGN_KEYS};
    use std::collections::HashSet;

    fn hospital(store: &SqliteStore, name: &str) -> Hospital {
        store.insert_hospital(&NewHospital::new(name, "1 Main St")).unwrap()
    }

    fn patient(store: &SqliteStore, email: &str, first: &str, last: &str) -> User {
        store
            .register_patient(
                &NewUser::new(email, "hash", Role::Patient),
                &NewPatientProfile::new(first, last),
            )
            .unwrap()
            .0
    }

    fn doctor(store: &SqliteStore, email: &str, hospital_id: i64, license: &str) -> User {
        store
            .register_doctor(
                &NewUser::new(email, "hash", Role::Doctor),
                &NewDoctor::new(hospital_id, "Cardiology", license),
            )
            .unwrap()
            .0
    }

    #[test]
    fn test_schema_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.initialize_schema().unwrap();
        assert_eq!(store.stats().unwrap(), DbStats::default());
    }

    #[test]
    fn test_schema_foreign_keys_match_ruleset() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut live = HashSet::new();
        for table in Table::all() {
            let mut stmt = store
                .conn
                .prepare(&format!("SELECT \"table\", \"from\", on_delete FROM pragma_foreign_key_list('{}')", table))
                .unwrap();
            let fks = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?)))
                .unwrap()
                .collect::<rusqlite::Result<Vec<_>>>()
                .unwrap();
            for (parent, column, on_delete) in fks {
                let parent: Table = parent.parse().unwrap();
                let policy: DeletePolicy = on_delete.parse().unwrap();
                live.insert((*table, column, parent, policy));
            }
        }

        let declared: HashSet<_> = FOREIGN_KEYS
            .iter()
            .map(|fk| (fk.child, fk.column.to_string(), fk.parent, fk.on_delete))
            .collect();
        assert_eq!(live, declared);
    }

    #[test]
    fn test_hospital_crud() {
        let store = SqliteStore::open_in_memory().unwrap();
        let created = store
            .insert_hospital(&NewHospital::new("General", "1 Main St").with_contact("555-0100"))
            .unwrap();
        assert!(created.is_active);
        assert_eq!(created.contact_info.as_deref(), Some("555-0100"));

        let updated = store
            .update_hospital(
                created.id,
                &HospitalUpdate { is_active: Some(false), ..Default::default() },
            )
            .unwrap();
        assert!(!updated.is_active);
        assert_eq!(updated.name, "General");
        assert_eq!(updated.contact_info.as_deref(), Some("555-0100"));

        let cleared = store
            .update_hospital(
                created.id,
                &HospitalUpdate { contact_info: Some(None), ..Default::default() },
            )
            .unwrap();
        assert_eq!(cleared.contact_info, None);
        assert!(!cleared.is_active);

        hospital(&store, "Mercy");
        let page = store.list_hospitals(1, 10).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].name, "Mercy");

        store.delete_hospital(created.id).unwrap();
        assert!(store.get_hospital(created.id).unwrap().is_none());
        assert!(matches!(store.delete_hospital(created.id), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_duplicate_hospital_name() {
        let store = SqliteStore::open_in_memory().unwrap();
        hospital(&store, "General");
        let err = store.insert_hospital(&NewHospital::new("General", "elsewhere")).unwrap_err();
        assert!(matches!(err, Error::UniqueViolation(ref s) if s == "hospitals.name"), "{err}");
    }

    #[test]
    fn test_duplicate_email() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_user(&NewUser::new("a@example.com", "h", Role::Patient)).unwrap();
        let err = store
            .insert_user(&NewUser::new("a@example.com", "h2", Role::Doctor))
            .unwrap_err();
        assert!(matches!(err, Error::UniqueViolation(ref s) if s == "users.email"), "{err}");
    }

    #[test]
    fn test_duplicate_license_number() {
        let store = SqliteStore::open_in_memory().unwrap();
        let h = hospital(&store, "General");
        doctor(&store, "d1@example.com", h.id, "LIC-1");
        let err = store
            .register_doctor(
                &NewUser::new("d2@example.com", "hash", Role::Doctor),
                &NewDoctor::new(h.id, "Neurology", "LIC-1"),
            )
            .unwrap_err();
        assert!(matches!(err, Error::UniqueViolation(ref s) if s == "doctors.license_number"), "{err}");
        // The registration rolled back with the profile
        assert!(store.get_user_by_email("d2@example.com").unwrap().is_none());
    }

    #[test]
    fn test_failed_registration_inside_outer_transaction_leaves_no_user() {
        let store = SqliteStore::open_in_memory().unwrap();
        let h = hospital(&store, "General");
        doctor(&store, "d1@example.com", h.id, "LIC-1");

        store
            .transaction(|store| {
                let inner = store.register_doctor(
                    &NewUser::new("d2@example.com", "hash", Role::Doctor),
                    &NewDoctor::new(h.id, "Neurology", "LIC-1"),
                );
                assert!(matches!(inner, Err(Error::UniqueViolation(_))));
                // The outer unit carries on and commits its own work
                store.insert_hospital(&NewHospital::new("Mercy", "2 Side St"))?;
                Ok(())
            })
            .unwrap();

        assert!(store.get_user_by_email("d2@example.com").unwrap().is_none());
        assert_eq!(store.stats().unwrap().hospitals, 2);
        assert_eq!(store.stats().unwrap().users, 1);
    }

    #[test]
    fn test_outer_rollback_undoes_released_inner_unit() {
        let store = SqliteStore::open_in_memory().unwrap();
        let result: Result<()> = store.transaction(|store| {
            store.transaction(|store| store.insert_hospital(&NewHospital::new("General", "1 Main St")))?;
            Err(Error::not_found("hospital", 99))
        });
        assert!(result.is_err());
        assert_eq!(store.stats().unwrap().hospitals, 0);
    }

    #[test]
    fn test_role_outside_enumeration_is_check_violation() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err: Error = store
            .conn
            .execute(
                "INSERT INTO users (id, email, password_hash, role) VALUES (?1, 'n@example.com', 'h', 'Nurse')",
                [Uuid::new_v4().to_string()],
            )
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::CheckViolation(ref s) if s.contains("ck_users_role")), "{err}");
    }

    #[test]
    fn test_profile_must_match_role() {
        let store = SqliteStore::open_in_memory().unwrap();
        let h = hospital(&store, "General");
        let user = patient(&store, "p@example.com", "Ada", "Lovelace");

        let err = store
            .insert_doctor(user.id, &NewDoctor::new(h.id, "Cardiology", "LIC-9"))
            .unwrap_err();
        assert!(matches!(err, Error::RoleMismatch(_)), "{err}");

        let err = store
            .register_admin(&NewUser::new("x@example.com", "h", Role::Patient), &NewHospitalAdmin::new(h.id))
            .unwrap_err();
        assert!(matches!(err, Error::RoleMismatch(_)), "{err}");
        assert!(store.get_user_by_email("x@example.com").unwrap().is_none());
    }

    #[test]
    fn test_profile_for_missing_user_is_foreign_key_violation() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store
            .insert_patient_profile(Uuid::new_v4(), &NewPatientProfile::new("No", "Body"))
            .unwrap_err();
        assert!(matches!(err, Error::ForeignKeyViolation(_)), "{err}");
    }

    #[test]
    fn test_role_change_blocked_by_existing_profile() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = patient(&store, "p@example.com", "Ada", "Lovelace");
        let err = store
            .update_user(user.id, &UserUpdate { role: Some(Role::Doctor), ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, Error::RoleMismatch(_)), "{err}");

        // Same role is not a change
        store
            .update_user(user.id, &UserUpdate { role: Some(Role::Patient), ..Default::default() })
            .unwrap();
    }

    #[test]
    fn test_update_refreshes_timestamp() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = store.insert_user(&NewUser::new("a@example.com", "h", Role::Patient)).unwrap();

        let mut previous = user.updated_at;
        for _ in 0..5 {
            let touched = store.touch_user(user.id).unwrap();
            assert!(touched.updated_at > previous);
            previous = touched.updated_at;
        }

        let updated = store
            .update_user(user.id, &UserUpdate { email: Some("b@example.com".into()), ..Default::default() })
            .unwrap();
        assert!(updated.updated_at > previous);
        assert_eq!(updated.created_at, user.created_at);
    }

    #[test]
    fn test_caller_written_timestamp_is_replaced() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = store.insert_user(&NewUser::new("a@example.com", "h", Role::Patient)).unwrap();
        store
            .conn
            .execute(
                "UPDATE users SET updated_at = '2000-01-01T00:00:00.000Z' WHERE id = ?1",
                [user.id.to_string()],
            )
            .unwrap();
        let after = store.get_user(user.id).unwrap().unwrap();
        assert!(after.updated_at > user.updated_at);
        assert_ne!(format_timestamp(&after.updated_at), "2000-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_hospital_delete_restricted_until_reassigned() {
        let store = SqliteStore::open_in_memory().unwrap();
        let general = hospital(&store, "General");
        let mercy = hospital(&store, "Mercy");
        let doc = doctor(&store, "d@example.com", general.id, "LIC-1");
        let (admin, _) = store
            .register_admin(
                &NewUser::new("a@example.com", "h", Role::HospitalAdmin),
                &NewHospitalAdmin::new(general.id),
            )
            .unwrap();

        assert!(matches!(store.delete_hospital(general.id), Err(Error::ForeignKeyViolation(_))));
        store.reassign_doctor(doc.id, mercy.id).unwrap();
        assert!(matches!(store.delete_hospital(general.id), Err(Error::ForeignKeyViolation(_))));
        store.reassign_admin(admin.id, mercy.id).unwrap();

        store.delete_hospital(general.id).unwrap();
        assert_eq!(store.count_hospital_doctors(mercy.id).unwrap(), 1);
    }

    #[test]
    fn test_delete_user_cascades_to_profile() {
        let store = SqliteStore::open_in_memory().unwrap();
        let h = hospital(&store, "General");
        let doc = doctor(&store, "d@example.com", h.id, "LIC-1");
        store.delete_user(doc.id).unwrap();
        assert!(store.get_doctor(doc.id).unwrap().is_none());
        assert_eq!(store.count_hospital_doctors(h.id).unwrap(), 0);
    }

    #[test]
    fn test_search_patients() {
        let store = SqliteStore::open_in_memory().unwrap();
        patient(&store, "ada@example.com", "Ada", "Lovelace");
        patient(&store, "grace@navy.mil", "Grace", "Hopper");
        store.insert_user(&NewUser::new("adams@example.com", "h", Role::Doctor)).unwrap();

        let by_name = store.search_patients("love").unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].full_name(), "Ada Lovelace");

        // Matches both first name and email without duplicating the row
        assert_eq!(store.search_patients("ADA").unwrap().len(), 1);
        assert_eq!(store.search_patients("navy").unwrap()[0].last_name, "Hopper");
        assert!(store.search_patients("%").unwrap().is_empty());
        assert_eq!(store.count_patients().unwrap(), 2);
    }

    #[test]
    fn test_search_folds_ascii_case_only() {
        let store = SqliteStore::open_in_memory().unwrap();
        patient(&store, "emile@example.com", "Émile", "Zola");

        assert_eq!(store.search_patients("ZOLA").unwrap().len(), 1);
        assert_eq!(store.search_patients("Émile").unwrap().len(), 1);
        assert!(store.search_patients("émile").unwrap().is_empty());
    }
}
