//! Patient identity and demographics.

use chrono::{DateTime, NaiveDate, Utc};
use hass_shared::{validate_date, validate_email, validate_mrn, ValidationErrorCode, ValidationResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Patient profile; the aggregate root every clinical record points at
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: Uuid,
    /// Medical Record Number, issued at registration and unique system-wide
    pub mrn: String,
    pub hospital_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    /// YYYY-MM-DD
    pub date_of_birth: String,
    pub gender: Gender,
    pub blood_group: Option<BloodGroup>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<EmergencyContact>,
    /// Known allergies (critical for safety)
    pub allergies: Vec<String>,
    /// Portal account for patients who sign in themselves
    pub user_id: Option<Uuid>,
    pub registered_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
    Unknown,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum BloodGroup {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    ABPositive,
    #[serde(rename = "AB-")]
    ABNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EmergencyContact {
    pub name: String,
    pub relationship: String,
    pub phone: String,
}

/// Format an MRN from the registration date and a random suffix: `MRN-YYMMDD-XXXXX`.
pub fn format_mrn(registered_on: NaiveDate, suffix: &str) -> String {
    format!("MRN-{}-{}", registered_on.format("%y%m%d"), suffix)
}

pub fn validate_patient(patient: &Patient) -> ValidationResult {
    let mut result = validate_mrn(&patient.mrn);

    result.require("first_name", &patient.first_name);
    result.require("last_name", &patient.last_name);
    result.max_len("first_name", &patient.first_name, 100);
    result.max_len("last_name", &patient.last_name, 100);

    let dob = validate_date(&patient.date_of_birth, "date_of_birth");
    if dob.is_valid() {
        if let Ok(date) = NaiveDate::parse_from_str(&patient.date_of_birth, "%Y-%m-%d") {
            if date > patient.created_at.date_naive() {
                result.add_error(
                    "date_of_birth",
                    "Date of birth cannot be in the future",
                    ValidationErrorCode::OutOfRange,
                );
            }
        }
    }
    result.merge(dob);

    if let Some(email) = &patient.email {
        result.merge(validate_email(email, "email"));
    }

    if let Some(contact) = &patient.emergency_contact {
        result.require("emergency_contact.name", &contact.name);
        result.require("emergency_contact.phone", &contact.phone);
    }

    if patient.allergies.iter().any(|a| a.trim().is_empty()) {
        result.add_error("allergies", "Allergies cannot be blank", ValidationErrorCode::Required);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_patient() -> Patient {
        let now = Utc::now();
        Patient {
            id: Uuid::new_v4(),
            mrn: "MRN-261016-4F7KQ".to_string(),
            hospital_id: Uuid::new_v4(),
            first_name: "Ada".to_string(),
            last_name: "Obi".to_string(),
            date_of_birth: "1985-04-12".to_string(),
            gender: Gender::Female,
            blood_group: Some(BloodGroup::OPositive),
            phone: Some("+234-800-000-0000".to_string()),
            email: None,
            address: None,
            emergency_contact: None,
            allergies: vec!["Penicillin".to_string()],
            user_id: None,
            registered_by: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_valid_patient() {
        assert!(validate_patient(&create_test_patient()).is_valid());
    }

    #[test]
    fn test_names_required() {
        let mut patient = create_test_patient();
        patient.first_name = "  ".to_string();
        let result = validate_patient(&patient);
        assert!(result.errors.iter().any(|e| e.field == "first_name"));
    }

    #[test]
    fn test_future_birth_date_rejected() {
        let mut patient = create_test_patient();
        patient.date_of_birth = "2999-01-01".to_string();
        assert!(!validate_patient(&patient).is_valid());
    }

    #[test]
    fn test_mrn_format() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let mrn = format_mrn(date, "4F7KQ");
        assert_eq!(mrn, "MRN-261016-4F7KQ");
        assert!(validate_mrn(&mrn).is_valid());
    }

    #[test]
    fn test_blood_group_wire_format() {
        let json = serde_json::to_string(&BloodGroup::ABNegative).unwrap();
        assert_eq!(json, "\"AB-\"");
    }
}
