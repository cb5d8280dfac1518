//! Database schema definitions
//!
//! Every delete rule listed in [`crate::policy::FOREIGN_KEYS`] is spelled out
//! here as an `ON DELETE` clause. Timestamps use the same text form the Rust
//! side writes: `YYYY-MM-DDTHH:MM:SS.sssZ`.

/// Connection settings applied before the schema
pub const PRAGMAS: &str = "PRAGMA foreign_keys = ON; PRAGMA recursive_triggers = OFF;";

/// SQL to create the hospitals table
pub const CREATE_HOSPITALS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS hospitals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    address TEXT NOT NULL,
    contact_info TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
)
"#;

/// SQL to create the users table
pub const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT NOT NULL PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    CONSTRAINT ck_users_role CHECK (role IN ('Patient', 'Doctor', 'Hospital Admin'))
)
"#;

/// SQL to create the patient_profiles table (specialization of users)
pub const CREATE_PATIENT_PROFILES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS patient_profiles (
    user_id TEXT NOT NULL PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    date_of_birth TEXT,
    gender TEXT,
    blood_type TEXT,
    contact_number TEXT,
    address TEXT
)
"#;

/// SQL to create the doctors table (specialization of users)
pub const CREATE_DOCTORS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS doctors (
    user_id TEXT NOT NULL PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
    hospital_id INTEGER NOT NULL REFERENCES hospitals(id) ON DELETE RESTRICT,
    specialty TEXT NOT NULL,
    license_number TEXT NOT NULL UNIQUE,
    contact_number TEXT
)
"#;

/// SQL to create the hospital_admins table (specialization of users)
pub const CREATE_HOSPITAL_ADMINS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS hospital_admins (
    user_id TEXT NOT NULL PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
    hospital_id INTEGER NOT NULL REFERENCES hospitals(id) ON DELETE RESTRICT,
    job_title TEXT
)
"#;

/// SQL to create the medical_records table
pub const CREATE_MEDICAL_RECORDS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS medical_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id TEXT NOT NULL REFERENCES patient_profiles(user_id) ON DELETE RESTRICT,
    doctor_id TEXT NOT NULL REFERENCES doctors(user_id) ON DELETE RESTRICT,
    hospital_id INTEGER NOT NULL REFERENCES hospitals(id) ON DELETE RESTRICT,
    date_of_visit TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    chief_complaint TEXT,
    diagnosis TEXT NOT NULL,
    treatment_summary TEXT,
    medications TEXT,
    notes TEXT,
    CONSTRAINT ck_medical_records_medications CHECK (medications IS NULL OR CASE WHEN json_valid(medications) THEN json_type(medications) = 'array' ELSE 0 END)
)
"#;

/// SQL to create the lab_tests table
pub const CREATE_LAB_TESTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS lab_tests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    medical_record_id INTEGER REFERENCES medical_records(id) ON DELETE CASCADE,
    patient_id TEXT NOT NULL REFERENCES patient_profiles(user_id) ON DELETE RESTRICT,
    test_name TEXT NOT NULL,
    test_date TEXT NOT NULL DEFAULT (date('now')),
    result_value TEXT,
    units TEXT,
    reference_range TEXT,
    is_abnormal INTEGER,
    test_data TEXT,
    performed_by_lab TEXT,
    result_file_url TEXT,
    CONSTRAINT ck_lab_tests_test_data CHECK (test_data IS NULL OR CASE WHEN json_valid(test_data) THEN json_type(test_data) = 'object' ELSE 0 END)
)
"#;

/// SQL to create the treatments_procedures table
pub const CREATE_TREATMENTS_PROCEDURES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS treatments_procedures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id TEXT NOT NULL REFERENCES patient_profiles(user_id) ON DELETE RESTRICT,
    doctor_id TEXT REFERENCES doctors(user_id) ON DELETE SET NULL,
    hospital_id INTEGER REFERENCES hospitals(id) ON DELETE RESTRICT,
    procedure_name TEXT NOT NULL,
    procedure_date TEXT NOT NULL,
    procedure_code TEXT,
    outcome TEXT,
    complications TEXT,
    notes TEXT,
    originating_record_id INTEGER REFERENCES medical_records(id) ON DELETE SET NULL
)
"#;

/// SQL to create the health_reports table
///
/// Uniqueness of (patient, date, type) is an index so that a missing type
/// counts as one value rather than as distinct NULLs.
pub const CREATE_HEALTH_REPORTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS health_reports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id TEXT NOT NULL REFERENCES patient_profiles(user_id) ON DELETE CASCADE,
    report_date TEXT NOT NULL,
    report_type TEXT,
    vitals TEXT,
    summary TEXT,
    analytics_data TEXT,
    CONSTRAINT ck_health_reports_vitals CHECK (vitals IS NULL OR CASE WHEN json_valid(vitals) THEN json_type(vitals) = 'object' ELSE 0 END),
    CONSTRAINT ck_health_reports_analytics CHECK (analytics_data IS NULL OR CASE WHEN json_valid(analytics_data) THEN json_type(analytics_data) = 'object' ELSE 0 END)
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)",
    "CREATE INDEX IF NOT EXISTS idx_doctors_hospital ON doctors(hospital_id)",
    "CREATE INDEX IF NOT EXISTS idx_hospital_admins_hospital ON hospital_admins(hospital_id)",
    "CREATE INDEX IF NOT EXISTS idx_medical_records_patient ON medical_records(patient_id)",
    "CREATE INDEX IF NOT EXISTS idx_medical_records_doctor ON medical_records(doctor_id)",
    "CREATE INDEX IF NOT EXISTS idx_lab_tests_patient ON lab_tests(patient_id)",
    "CREATE INDEX IF NOT EXISTS idx_lab_tests_record ON lab_tests(medical_record_id)",
    "CREATE INDEX IF NOT EXISTS idx_procedures_patient ON treatments_procedures(patient_id)",
    "CREATE INDEX IF NOT EXISTS idx_health_reports_patient ON health_reports(patient_id)",
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_health_reports_patient_date_type \
     ON health_reports(patient_id, report_date, COALESCE(report_type, ''))",
];

/// Refresh `users.updated_at` after every update of the row.
///
/// The new value is strictly later than the old one even when two updates
/// land in the same millisecond or the caller wrote the column itself.
pub const CREATE_USERS_UPDATED_AT_TRIGGER: &str = r#"
CREATE TRIGGER IF NOT EXISTS trg_users_updated_at
AFTER UPDATE ON users
FOR EACH ROW
BEGIN
    UPDATE users
    SET updated_at = CASE
        WHEN strftime('%Y-%m-%dT%H:%M:%fZ', 'now') > OLD.updated_at
            THEN strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
        ELSE strftime('%Y-%m-%dT%H:%M:%fZ', OLD.updated_at, '+0.001 seconds')
    END
    WHERE id = NEW.id;
END
"#;

/// Role guards: a specialization row must belong to a user of that role.
///
/// A missing user passes the guard and is then rejected by the foreign key.
pub const CREATE_ROLE_TRIGGERS: &[&str] = &[
    r#"
CREATE TRIGGER IF NOT EXISTS trg_patient_profiles_role_insert
BEFORE INSERT ON patient_profiles
FOR EACH ROW
WHEN EXISTS (SELECT 1 FROM users WHERE id = NEW.user_id AND role <> 'Patient')
BEGIN
    SELECT RAISE(ABORT, 'patient_profiles requires a user with role Patient');
END
"#,
    r#"
CREATE TRIGGER IF NOT EXISTS trg_patient_profiles_role_update
BEFORE UPDATE OF user_id ON patient_profiles
FOR EACH ROW
WHEN EXISTS (SELECT 1 FROM users WHERE id = NEW.user_id AND role <> 'Patient')
BEGIN
    SELECT RAISE(ABORT, 'patient_profiles requires a user with role Patient');
END
"#,
    r#"
CREATE TRIGGER IF NOT EXISTS trg_doctors_role_insert
BEFORE INSERT ON doctors
FOR EACH ROW
WHEN EXISTS (SELECT 1 FROM users WHERE id = NEW.user_id AND role <> 'Doctor')
BEGIN
    SELECT RAISE(ABORT, 'doctors requires a user with role Doctor');
END
"#,
    r#"
CREATE TRIGGER IF NOT EXISTS trg_doctors_role_update
BEFORE UPDATE OF user_id ON doctors
FOR EACH ROW
WHEN EXISTS (SELECT 1 FROM users WHERE id = NEW.user_id AND role <> 'Doctor')
BEGIN
    SELECT RAISE(ABORT, 'doctors requires a user with role Doctor');
END
"#,
    r#"
CREATE TRIGGER IF NOT EXISTS trg_hospital_admins_role_insert
BEFORE INSERT ON hospital_admins
FOR EACH ROW
WHEN EXISTS (SELECT 1 FROM users WHERE id = NEW.user_id AND role <> 'Hospital Admin')
BEGIN
    SELECT RAISE(ABORT, 'hospital_admins requires a user with role Hospital Admin');
END
"#,
    r#"
CREATE TRIGGER IF NOT EXISTS trg_hospital_admins_role_update
BEFORE UPDATE OF user_id ON hospital_admins
FOR EACH ROW
WHEN EXISTS (SELECT 1 FROM users WHERE id = NEW.user_id AND role <> 'Hospital Admin')
BEGIN
    SELECT RAISE(ABORT, 'hospital_admins requires a user with role Hospital Admin');
END
"#,
    r#"
CREATE TRIGGER IF NOT EXISTS trg_users_role_change
BEFORE UPDATE OF role ON users
FOR EACH ROW
WHEN NEW.role IS NOT OLD.role AND (
       (NEW.role <> 'Patient' AND EXISTS (SELECT 1 FROM patient_profiles WHERE user_id = OLD.id))
    OR (NEW.role <> 'Doctor' AND EXISTS (SELECT 1 FROM doctors WHERE user_id = OLD.id))
    OR (NEW.role <> 'Hospital Admin' AND EXISTS (SELECT 1 FROM hospital_admins WHERE user_id = OLD.id))
)
BEGIN
    SELECT RAISE(ABORT, 'users.role no longer matches the existing profile');
END
"#,
];

/// Tables in creation order (parents before children)
pub const CREATE_TABLES: &[&str] = &[
    CREATE_HOSPITALS_TABLE,
    CREATE_USERS_TABLE,
    CREATE_PATIENT_PROFILES_TABLE,
    CREATE_DOCTORS_TABLE,
    CREATE_HOSPITAL_ADMINS_TABLE,
    CREATE_MEDICAL_RECORDS_TABLE,
    CREATE_LAB_TESTS_TABLE,
    CREATE_TREATMENTS_PROCEDURES_TABLE,
    CREATE_HEALTH_REPORTS_TABLE,
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = CREATE_TABLES.to_vec();
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts.push(CREATE_USERS_UPDATED_AT_TRIGGER);
    stmts.extend(CREATE_ROLE_TRIGGERS.iter().copied());
    stmts
}
