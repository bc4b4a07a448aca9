//! Visits: bounded episodes of care linking a patient to clinical records.

use chrono::{DateTime, Utc};
use derive_more::Display;
use hass_shared::{ValidationErrorCode, ValidationResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Lifecycle;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Visit {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub hospital_id: Uuid,
    pub visit_type: VisitType,
    pub status: VisitStatus,
    pub attending_doctor_id: Option<Uuid>,
    pub chief_complaint: Option<String>,
    pub department: Option<String>,
    pub admitted_at: Option<DateTime<Utc>>,
    pub discharged_at: Option<DateTime<Utc>>,
    pub discharge_summary: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
pub enum VisitType {
    #[display(fmt = "outpatient")]
    Outpatient,
    #[display(fmt = "inpatient")]
    Inpatient,
    #[display(fmt = "emergency")]
    Emergency,
}

/// pending → admitted → discharged. Outpatients may be discharged straight from pending.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    #[display(fmt = "pending")]
    Pending,
    #[display(fmt = "admitted")]
    Admitted,
    #[display(fmt = "discharged")]
    Discharged,
}

impl Lifecycle for VisitStatus {
    fn next_states(&self) -> &'static [Self] {
        match self {
            VisitStatus::Pending => &[VisitStatus::Admitted, VisitStatus::Discharged],
            VisitStatus::Admitted => &[VisitStatus::Discharged],
            VisitStatus::Discharged => &[],
        }
    }
}

impl Visit {
    /// Whether new clinical records may still be attached
    pub fn is_open(&self) -> bool {
        self.status != VisitStatus::Discharged
    }
}

pub fn validate_visit(visit: &Visit) -> ValidationResult {
    let mut result = ValidationResult::new();

    if let Some(complaint) = &visit.chief_complaint {
        result.max_len("chief_complaint", complaint, 2000);
    }

    match visit.status {
        VisitStatus::Admitted if visit.admitted_at.is_none() => {
            result.add_error("admitted_at", "Admitted visits need an admission time", ValidationErrorCode::Required);
        }
        VisitStatus::Discharged if visit.discharged_at.is_none() => {
            result.add_error(
                "discharged_at",
                "Discharged visits need a discharge time",
                ValidationErrorCode::Required,
            );
        }
        _ => {}
    }

    if let (Some(admitted), Some(discharged)) = (visit.admitted_at, visit.discharged_at) {
        if discharged < admitted {
            result.add_error(
                "discharged_at",
                "Discharge cannot precede admission",
                ValidationErrorCode::OutOfRange,
            );
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition;

    fn create_test_visit() -> Visit {
        let now = Utc::now();
        Visit {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            hospital_id: Uuid::new_v4(),
            visit_type: VisitType::Inpatient,
            status: VisitStatus::Pending,
            attending_doctor_id: None,
            chief_complaint: Some("Chest pain".to_string()),
            department: None,
            admitted_at: None,
            discharged_at: None,
            discharge_summary: None,
            created_by: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_visit_lifecycle_is_forward_only() {
        assert!(transition("Visit", VisitStatus::Pending, VisitStatus::Admitted).is_ok());
        assert!(transition("Visit", VisitStatus::Admitted, VisitStatus::Discharged).is_ok());
        assert!(transition("Visit", VisitStatus::Discharged, VisitStatus::Admitted).is_err());
        assert!(transition("Visit", VisitStatus::Admitted, VisitStatus::Pending).is_err());
    }

    #[test]
    fn test_admitted_visit_needs_timestamp() {
        let mut visit = create_test_visit();
        visit.status = VisitStatus::Admitted;
        assert!(!validate_visit(&visit).is_valid());
        visit.admitted_at = Some(Utc::now());
        assert!(validate_visit(&visit).is_valid());
    }

    #[test]
    fn test_discharged_visit_is_closed() {
        let mut visit = create_test_visit();
        assert!(visit.is_open());
        visit.status = VisitStatus::Discharged;
        visit.discharged_at = Some(Utc::now());
        assert!(!visit.is_open());
        assert!(validate_visit(&visit).is_valid());
    }

    #[test]
    fn test_visit_type_wire_format() {
        assert_eq!(serde_json::to_string(&VisitType::Outpatient).unwrap(), "\"outpatient\"");
        assert_eq!(VisitType::Emergency.to_string(), "emergency");
    }
}
