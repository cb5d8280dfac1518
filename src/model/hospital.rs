use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hospital {
    pub id: i64,
    /// Globally unique
    pub name: String,
    pub address: String,
    pub contact_info: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewHospital {
    pub name: String,
    pub address: String,
    pub contact_info: Option<String>,
}

impl NewHospital {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            contact_info: None,
        }
    }

    pub fn with_contact(mut self, contact: impl Into<String>) -> Self {
        self.contact_info = Some(contact.into());
        self
    }
}

/// Partial update; `None` leaves the column untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HospitalUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    /// `Some(None)` clears the column
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_info: Option<Option<String>>,
    pub is_active: Option<bool>,
}

impl HospitalUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.address.is_none() && self.contact_info.is_none() && self.is_active.is_none()
    }
}
