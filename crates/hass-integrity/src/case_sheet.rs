//! Case sheets: the comprehensive clinical document for a visit.
//!
//! A case sheet holds typed, individually optional sections, an
//! append-only list of progress notes, and an event timeline. Events that
//! require acknowledgment stay pending until someone acknowledges them by
//! their position in the timeline.

use chrono::{DateTime, Utc};
use hass_shared::{ValidationErrorCode, ValidationResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CaseSheet {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub visit_id: Uuid,
    pub hospital_id: Uuid,
    pub created_by: Uuid,
    pub presenting_complaint: Option<String>,
    pub history: Option<ClinicalHistory>,
    pub vital_signs_on_admission: Option<AdmissionVitals>,
    pub examination: Option<Examination>,
    #[serde(default)]
    pub differential_diagnosis: Vec<DifferentialDiagnosis>,
    #[serde(default)]
    pub investigations: Vec<Investigation>,
    pub provisional_diagnosis: Option<String>,
    pub final_diagnosis: Option<String>,
    pub treatment_plan: Option<String>,
    #[serde(default)]
    pub progress_notes: Vec<ProgressNote>,
    #[serde(default)]
    pub events: Vec<CaseSheetEvent>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ClinicalHistory {
    pub history_of_present_illness: Option<String>,
    pub past_medical_history: Option<String>,
    pub surgical_history: Option<String>,
    pub medication_history: Option<String>,
    pub family_history: Option<String>,
    pub social_history: Option<String>,
}

/// Snapshot taken at admission, separate from recorded `Vitals`
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct AdmissionVitals {
    pub blood_pressure: Option<String>,
    pub heart_rate: Option<u16>,
    pub temperature: Option<f64>,
    pub spo2: Option<u8>,
    pub respiratory_rate: Option<u16>,
    pub gcs: Option<u8>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Examination {
    pub general: Option<String>,
    pub cardiovascular: Option<String>,
    pub respiratory: Option<String>,
    pub abdominal: Option<String>,
    pub neurological: Option<String>,
    pub other: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DifferentialDiagnosis {
    pub diagnosis: String,
    pub likelihood: Option<String>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Investigation {
    pub name: String,
    pub result: Option<String>,
    pub ordered_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProgressNote {
    pub author_id: Uuid,
    pub note: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaseSheetEventType {
    DischargeRequest,
    CriticalFinding,
    TransferRequest,
    ConsultRequest,
    MedicationChange,
    StatusUpdate,
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CaseSheetEvent {
    pub event_type: CaseSheetEventType,
    pub description: String,
    pub recorded_by: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub requires_acknowledgment: bool,
    pub acknowledged_by: Option<Uuid>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledgment_notes: Option<String>,
}

impl CaseSheetEvent {
    pub fn is_pending(&self) -> bool {
        self.requires_acknowledgment && self.acknowledged_at.is_none()
    }
}

/// An event still waiting for acknowledgment, with its timeline position
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PendingEvent {
    pub case_sheet_id: Uuid,
    pub patient_id: Uuid,
    pub visit_id: Uuid,
    pub event_index: usize,
    pub event: CaseSheetEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AcknowledgeError {
    #[error("Event {0} does not exist on this case sheet")]
    NoSuchEvent(usize),
    #[error("Event {0} does not require acknowledgment")]
    NotRequired(usize),
    #[error("Event {0} has already been acknowledged")]
    AlreadyAcknowledged(usize),
}

/// Partial update of the typed sections. Absent fields are left unchanged.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct CaseSheetSections {
    pub presenting_complaint: Option<String>,
    pub history: Option<ClinicalHistory>,
    pub vital_signs_on_admission: Option<AdmissionVitals>,
    pub examination: Option<Examination>,
    pub differential_diagnosis: Option<Vec<DifferentialDiagnosis>>,
    pub investigations: Option<Vec<Investigation>>,
    pub provisional_diagnosis: Option<String>,
    pub final_diagnosis: Option<String>,
    pub treatment_plan: Option<String>,
}

impl CaseSheet {
    pub fn apply_sections(&mut self, sections: CaseSheetSections) {
        if let Some(v) = sections.presenting_complaint {
            self.presenting_complaint = Some(v);
        }
        if let Some(v) = sections.history {
            self.history = Some(v);
        }
        if let Some(v) = sections.vital_signs_on_admission {
            self.vital_signs_on_admission = Some(v);
        }
        if let Some(v) = sections.examination {
            self.examination = Some(v);
        }
        if let Some(v) = sections.differential_diagnosis {
            self.differential_diagnosis = v;
        }
        if let Some(v) = sections.investigations {
            self.investigations = v;
        }
        if let Some(v) = sections.provisional_diagnosis {
            self.provisional_diagnosis = Some(v);
        }
        if let Some(v) = sections.final_diagnosis {
            self.final_diagnosis = Some(v);
        }
        if let Some(v) = sections.treatment_plan {
            self.treatment_plan = Some(v);
        }
    }

    pub fn add_progress_note(&mut self, author_id: Uuid, note: String, at: DateTime<Utc>) {
        self.progress_notes.push(ProgressNote {
            author_id,
            note,
            recorded_at: at,
        });
    }

    /// Append an event and return its index
    pub fn record_event(
        &mut self,
        event_type: CaseSheetEventType,
        description: String,
        requires_acknowledgment: bool,
        recorded_by: Uuid,
        at: DateTime<Utc>,
    ) -> usize {
        self.events.push(CaseSheetEvent {
            event_type,
            description,
            recorded_by,
            recorded_at: at,
            requires_acknowledgment,
            acknowledged_by: None,
            acknowledged_at: None,
            acknowledgment_notes: None,
        });
        self.events.len() - 1
    }

    pub fn pending_events(&self) -> Vec<PendingEvent> {
        self.pending_matching(|_| true)
    }

    pub fn pending_discharge_requests(&self) -> Vec<PendingEvent> {
        self.pending_matching(|e| e.event_type == CaseSheetEventType::DischargeRequest)
    }

    fn pending_matching(&self, filter: impl Fn(&CaseSheetEvent) -> bool) -> Vec<PendingEvent> {
        self.events
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_pending() && filter(e))
            .map(|(event_index, event)| PendingEvent {
                case_sheet_id: self.id,
                patient_id: self.patient_id,
                visit_id: self.visit_id,
                event_index,
                event: event.clone(),
            })
            .collect()
    }

    pub fn acknowledge_event(
        &mut self,
        event_index: usize,
        acknowledged_by: Uuid,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<&CaseSheetEvent, AcknowledgeError> {
        let event = self
            .events
            .get_mut(event_index)
            .ok_or(AcknowledgeError::NoSuchEvent(event_index))?;

        if !event.requires_acknowledgment {
            return Err(AcknowledgeError::NotRequired(event_index));
        }
        if event.acknowledged_at.is_some() {
            return Err(AcknowledgeError::AlreadyAcknowledged(event_index));
        }

        event.acknowledged_by = Some(acknowledged_by);
        event.acknowledged_at = Some(at);
        event.acknowledgment_notes = notes;
        Ok(event)
    }

    /// Acknowledge every outstanding discharge request once the visit has
    /// been discharged. Returns the indices that were closed.
    pub fn settle_discharge_requests(
        &mut self,
        acknowledged_by: Uuid,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> Vec<usize> {
        let mut settled = Vec::new();
        for (index, event) in self.events.iter_mut().enumerate() {
            if event.event_type == CaseSheetEventType::DischargeRequest && event.is_pending() {
                event.acknowledged_by = Some(acknowledged_by);
                event.acknowledged_at = Some(at);
                event.acknowledgment_notes = notes.clone();
                settled.push(index);
            }
        }
        settled
    }
}

pub fn validate_case_sheet(sheet: &CaseSheet) -> ValidationResult {
    let mut result = ValidationResult::new();

    for note in &sheet.progress_notes {
        result.require("progress_notes.note", &note.note);
        result.max_len("progress_notes.note", &note.note, 10_000);
    }
    for event in &sheet.events {
        result.require("events.description", &event.description);
        if event.acknowledged_at.is_some() && event.acknowledged_by.is_none() {
            result.add_error(
                "events.acknowledged_by",
                "Acknowledged events must name who acknowledged them",
                ValidationErrorCode::Required,
            );
        }
    }
    for dx in &sheet.differential_diagnosis {
        result.require("differential_diagnosis.diagnosis", &dx.diagnosis);
    }
    if let Some(vitals) = &sheet.vital_signs_on_admission {
        if let Some(gcs) = vitals.gcs {
            result.in_range("vital_signs_on_admission.gcs", gcs, 3, 15);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_sheet() -> CaseSheet {
        let now = Utc::now();
        CaseSheet {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            visit_id: Uuid::new_v4(),
            hospital_id: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
            presenting_complaint: Some("Fever for three days".to_string()),
            history: None,
            vital_signs_on_admission: None,
            examination: None,
            differential_diagnosis: vec![],
            investigations: vec![],
            provisional_diagnosis: None,
            final_diagnosis: None,
            treatment_plan: None,
            progress_notes: vec![],
            events: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_pending_until_acknowledged() {
        let mut sheet = create_test_sheet();
        let doctor = Uuid::new_v4();
        let idx = sheet.record_event(
            CaseSheetEventType::DischargeRequest,
            "Ready for discharge".to_string(),
            true,
            doctor,
            Utc::now(),
        );
        sheet.record_event(CaseSheetEventType::StatusUpdate, "Stable".to_string(), false, doctor, Utc::now());

        assert_eq!(sheet.pending_events().len(), 1);
        assert_eq!(sheet.pending_discharge_requests()[0].event_index, idx);

        let ack = sheet
            .acknowledge_event(idx, Uuid::new_v4(), Some("Approved".to_string()), Utc::now())
            .unwrap();
        assert_eq!(ack.acknowledgment_notes.as_deref(), Some("Approved"));
        assert!(sheet.pending_events().is_empty());
    }

    #[test]
    fn test_acknowledge_errors() {
        let mut sheet = create_test_sheet();
        let idx = sheet.record_event(
            CaseSheetEventType::StatusUpdate,
            "Stable".to_string(),
            false,
            Uuid::new_v4(),
            Utc::now(),
        );

        assert_eq!(
            sheet.acknowledge_event(idx, Uuid::new_v4(), None, Utc::now()).unwrap_err(),
            AcknowledgeError::NotRequired(idx)
        );
        assert_eq!(
            sheet.acknowledge_event(9, Uuid::new_v4(), None, Utc::now()).unwrap_err(),
            AcknowledgeError::NoSuchEvent(9)
        );
    }

    #[test]
    fn test_double_acknowledge_rejected() {
        let mut sheet = create_test_sheet();
        let idx = sheet.record_event(
            CaseSheetEventType::CriticalFinding,
            "K+ 6.8".to_string(),
            true,
            Uuid::new_v4(),
            Utc::now(),
        );
        sheet.acknowledge_event(idx, Uuid::new_v4(), None, Utc::now()).unwrap();
        assert_eq!(
            sheet.acknowledge_event(idx, Uuid::new_v4(), None, Utc::now()).unwrap_err(),
            AcknowledgeError::AlreadyAcknowledged(idx)
        );
    }

    #[test]
    fn test_rejected_request_can_be_resubmitted() {
        let mut sheet = create_test_sheet();
        let doctor = Uuid::new_v4();
        let first = sheet.record_event(
            CaseSheetEventType::DischargeRequest,
            "Discharge".to_string(),
            true,
            doctor,
            Utc::now(),
        );
        sheet
            .acknowledge_event(first, Uuid::new_v4(), Some("Rejected: labs pending".to_string()), Utc::now())
            .unwrap();
        let second = sheet.record_event(
            CaseSheetEventType::DischargeRequest,
            "Discharge, labs back".to_string(),
            true,
            doctor,
            Utc::now(),
        );
        let pending = sheet.pending_discharge_requests();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event_index, second);
    }

    #[test]
    fn test_discharge_settles_every_request() {
        let mut sheet = create_test_sheet();
        let doctor = Uuid::new_v4();
        let first = sheet.record_event(
            CaseSheetEventType::DischargeRequest,
            "Discharge".to_string(),
            true,
            doctor,
            Utc::now(),
        );
        let critical = sheet.record_event(
            CaseSheetEventType::CriticalFinding,
            "Hb 6.1".to_string(),
            true,
            doctor,
            Utc::now(),
        );
        let second = sheet.record_event(
            CaseSheetEventType::DischargeRequest,
            "Discharge again".to_string(),
            true,
            doctor,
            Utc::now(),
        );

        let reception = Uuid::new_v4();
        let settled = sheet.settle_discharge_requests(reception, Some("Home".to_string()), Utc::now());
        assert_eq!(settled, vec![first, second]);
        assert!(sheet.pending_discharge_requests().is_empty());
        assert_eq!(sheet.events[second].acknowledged_by, Some(reception));
        assert_eq!(sheet.events[first].acknowledgment_notes.as_deref(), Some("Home"));
        // Other acknowledgments are left to the clinicians
        assert_eq!(sheet.pending_events()[0].event_index, critical);
        assert!(sheet.settle_discharge_requests(reception, None, Utc::now()).is_empty());
    }

    #[test]
    fn test_apply_sections_keeps_absent_fields() {
        let mut sheet = create_test_sheet();
        sheet.apply_sections(CaseSheetSections {
            provisional_diagnosis: Some("Malaria".to_string()),
            ..Default::default()
        });
        assert_eq!(sheet.presenting_complaint.as_deref(), Some("Fever for three days"));
        assert_eq!(sheet.provisional_diagnosis.as_deref(), Some("Malaria"));
    }

    #[test]
    fn test_unknown_event_type_is_other() {
        let t: CaseSheetEventType = serde_json::from_str("\"family_meeting\"").unwrap();
        assert_eq!(t, CaseSheetEventType::Other);
    }

    #[test]
    fn test_gcs_range() {
        let mut sheet = create_test_sheet();
        sheet.vital_signs_on_admission = Some(AdmissionVitals {
            gcs: Some(2),
            ..Default::default()
        });
        assert!(!validate_case_sheet(&sheet).is_valid());
    }
}
