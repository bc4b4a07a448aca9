//! Scheduled encounters between a patient and a clinician.

use chrono::{DateTime, Utc};
use derive_more::Display;
use hass_shared::{ValidationErrorCode, ValidationResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Lifecycle;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub hospital_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub reason: Option<String>,
    pub department: Option<String>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    #[display(fmt = "scheduled")]
    Scheduled,
    #[display(fmt = "checked_in")]
    CheckedIn,
    #[display(fmt = "in_progress")]
    InProgress,
    #[display(fmt = "completed")]
    Completed,
    #[display(fmt = "cancelled")]
    Cancelled,
    #[display(fmt = "no_show")]
    NoShow,
}

impl Lifecycle for AppointmentStatus {
    fn next_states(&self) -> &'static [Self] {
        use AppointmentStatus::*;
        match self {
            Scheduled => &[CheckedIn, Cancelled, NoShow],
            CheckedIn => &[InProgress, Cancelled],
            InProgress => &[Completed],
            Completed | Cancelled | NoShow => &[],
        }
    }
}

pub fn validate_appointment(appointment: &Appointment) -> ValidationResult {
    let mut result = ValidationResult::new();
    result.in_range("duration_minutes", appointment.duration_minutes, 5, 480);
    if let Some(reason) = &appointment.reason {
        result.max_len("reason", reason, 1000);
    }
    if appointment.status == AppointmentStatus::Scheduled && appointment.scheduled_at < appointment.created_at {
        result.add_error(
            "scheduled_at",
            "Appointments cannot be scheduled in the past",
            ValidationErrorCode::OutOfRange,
        );
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create_test_appointment() -> Appointment {
        let now = Utc::now();
        Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            hospital_id: Uuid::new_v4(),
            doctor_id: Some(Uuid::new_v4()),
            scheduled_at: now + Duration::days(2),
            duration_minutes: 30,
            reason: Some("Follow-up".to_string()),
            department: None,
            status: AppointmentStatus::Scheduled,
            notes: None,
            created_by: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_valid_appointment() {
        assert!(validate_appointment(&create_test_appointment()).is_valid());
    }

    #[test]
    fn test_past_booking_rejected() {
        let mut appointment = create_test_appointment();
        appointment.scheduled_at = appointment.created_at - Duration::hours(1);
        assert!(!validate_appointment(&appointment).is_valid());
    }

    #[test]
    fn test_no_show_only_from_scheduled() {
        assert!(AppointmentStatus::Scheduled.can_transition_to(AppointmentStatus::NoShow));
        assert!(!AppointmentStatus::InProgress.can_transition_to(AppointmentStatus::NoShow));
        assert!(AppointmentStatus::NoShow.is_terminal());
    }
}
