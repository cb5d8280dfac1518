//! Visit records and the clinical data hanging off them

use super::Document;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One visit: who saw whom, where, and what was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalRecord {
    pub id: i64,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub hospital_id: i64,
    pub date_of_visit: DateTime<Utc>,
    pub chief_complaint: Option<String>,
    pub diagnosis: String,
    pub treatment_summary: Option<String>,
    pub medications: Option<Vec<Document>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewMedicalRecord {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub hospital_id: i64,
    /// Defaults to the time of insertion
    pub date_of_visit: Option<DateTime<Utc>>,
    pub chief_complaint: Option<String>,
    /// Required by the schema
    pub diagnosis: Option<String>,
    pub treatment_summary: Option<String>,
    pub medications: Option<Vec<Document>>,
    pub notes: Option<String>,
}

impl NewMedicalRecord {
    pub fn new(patient_id: Uuid, doctor_id: Uuid, hospital_id: i64, diagnosis: impl Into<String>) -> Self {
        Self {
            patient_id,
            doctor_id,
            hospital_id,
            diagnosis: Some(diagnosis.into()),
            ..Default::default()
        }
    }

    pub fn with_medication(mut self, medication: Medication) -> Self {
        self.medications.get_or_insert_with(Vec::new).push(medication.into());
        self
    }
}

/// Convenience shape for one medication entry.
///
/// Stored as a plain document; entries written by other tools may carry
/// different keys and are read back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub name: String,
    pub dosage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
}

impl Medication {
    pub fn new(name: impl Into<String>, dosage: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dosage: dosage.into(),
            frequency: None,
        }
    }

    pub fn with_frequency(mut self, frequency: impl Into<String>) -> Self {
        self.frequency = Some(frequency.into());
        self
    }
}

impl From<Medication> for Document {
    fn from(medication: Medication) -> Self {
        let mut doc = Document::new();
        doc.insert("name".into(), medication.name.into());
        doc.insert("dosage".into(), medication.dosage.into());
        if let Some(frequency) = medication.frequency {
            doc.insert("frequency".into(), frequency.into());
        }
        doc
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabTest {
    pub id: i64,
    /// Visit that ordered the test; deleting the visit deletes the test
    pub medical_record_id: Option<i64>,
    pub patient_id: Uuid,
    pub test_name: String,
    pub test_date: NaiveDate,
    pub result_value: Option<String>,
    pub units: Option<String>,
    pub reference_range: Option<String>,
    pub is_abnormal: Option<bool>,
    pub test_data: Option<Document>,
    pub performed_by_lab: Option<String>,
    pub result_file_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewLabTest {
    pub medical_record_id: Option<i64>,
    pub patient_id: Uuid,
    pub test_name: Option<String>,
    /// Defaults to the current date
    pub test_date: Option<NaiveDate>,
    pub result_value: Option<String>,
    pub units: Option<String>,
    pub reference_range: Option<String>,
    pub is_abnormal: Option<bool>,
    pub test_data: Option<Document>,
    pub performed_by_lab: Option<String>,
    pub result_file_url: Option<String>,
}

impl NewLabTest {
    pub fn new(patient_id: Uuid, test_name: impl Into<String>) -> Self {
        Self {
            patient_id,
            test_name: Some(test_name.into()),
            ..Default::default()
        }
    }

    pub fn for_record(mut self, medical_record_id: i64) -> Self {
        self.medical_record_id = Some(medical_record_id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentProcedure {
    pub id: i64,
    pub patient_id: Uuid,
    /// Cleared when the doctor is deleted
    pub doctor_id: Option<Uuid>,
    pub hospital_id: Option<i64>,
    pub procedure_name: String,
    pub procedure_date: DateTime<Utc>,
    pub procedure_code: Option<String>,
    pub outcome: Option<String>,
    pub complications: Option<String>,
    pub notes: Option<String>,
    /// Cleared when the originating visit is deleted
    pub originating_record_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTreatmentProcedure {
    pub patient_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub hospital_id: Option<i64>,
    /// Required by the schema
    pub procedure_name: Option<String>,
    /// Required by the schema
    pub procedure_date: Option<DateTime<Utc>>,
    pub procedure_code: Option<String>,
    pub outcome: Option<String>,
    pub complications: Option<String>,
    pub notes: Option<String>,
    pub originating_record_id: Option<i64>,
}

impl NewTreatmentProcedure {
    pub fn new(patient_id: Uuid, procedure_name: impl Into<String>, procedure_date: DateTime<Utc>) -> Self {
        Self {
            patient_id,
            procedure_name: Some(procedure_name.into()),
            procedure_date: Some(procedure_date),
            ..Default::default()
        }
    }

    pub fn performed_by(mut self, doctor_id: Uuid, hospital_id: i64) -> Self {
        self.doctor_id = Some(doctor_id);
        self.hospital_id = Some(hospital_id);
        self
    }

    pub fn originating_from(mut self, medical_record_id: i64) -> Self {
        self.originating_record_id = Some(medical_record_id);
        self
    }
}

/// Consolidated per-patient report; unique per (patient, date, type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub id: i64,
    pub patient_id: Uuid,
    pub report_date: NaiveDate,
    pub report_type: Option<String>,
    pub vitals: Option<Document>,
    pub summary: Option<String>,
    pub analytics_data: Option<Document>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewHealthReport {
    pub patient_id: Uuid,
    pub report_date: Option<NaiveDate>,
    pub report_type: Option<String>,
    pub vitals: Option<Document>,
    pub summary: Option<String>,
    pub analytics_data: Option<Document>,
}

impl NewHealthReport {
    pub fn new(patient_id: Uuid, report_date: NaiveDate, report_type: impl Into<String>) -> Self {
        Self {
            patient_id,
            report_date: Some(report_date),
            report_type: Some(report_type.into()),
            ..Default::default()
        }
    }
}
