//! Ward beds and their occupancy.

use chrono::{DateTime, Utc};
use derive_more::Display;
use hass_shared::{ValidationErrorCode, ValidationResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Lifecycle;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Bed {
    pub id: Uuid,
    pub hospital_id: Uuid,
    pub ward: String,
    /// Unique within a hospital
    pub bed_number: String,
    pub bed_type: BedType,
    pub status: BedStatus,
    pub patient_id: Option<Uuid>,
    pub visit_id: Option<Uuid>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BedType {
    General,
    Icu,
    Maternity,
    Pediatric,
    Isolation,
}

/// Beds cycle: available ↔ occupied, available ↔ maintenance.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
pub enum BedStatus {
    #[display(fmt = "available")]
    Available,
    #[display(fmt = "occupied")]
    Occupied,
    #[display(fmt = "maintenance")]
    Maintenance,
}

impl Lifecycle for BedStatus {
    fn next_states(&self) -> &'static [Self] {
        match self {
            BedStatus::Available => &[BedStatus::Occupied, BedStatus::Maintenance],
            BedStatus::Occupied | BedStatus::Maintenance => &[BedStatus::Available],
        }
    }
}

impl Bed {
    /// Unique key within the hospital
    pub fn slot_key(&self) -> String {
        format!("{}:{}", self.hospital_id, self.bed_number.to_uppercase())
    }
}

/// Occupancy counts for a set of beds
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BedOccupancy {
    pub total: usize,
    pub available: usize,
    pub occupied: usize,
    pub maintenance: usize,
}

impl BedOccupancy {
    pub fn from_beds<'a>(beds: impl IntoIterator<Item = &'a Bed>) -> Self {
        let mut occupancy = Self::default();
        for bed in beds {
            occupancy.total += 1;
            match bed.status {
                BedStatus::Available => occupancy.available += 1,
                BedStatus::Occupied => occupancy.occupied += 1,
                BedStatus::Maintenance => occupancy.maintenance += 1,
            }
        }
        occupancy
    }

    /// Occupied share in percent, 0 when there are no beds
    pub fn rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.occupied as f64 * 100.0 / self.total as f64
        }
    }
}

pub fn validate_bed(bed: &Bed) -> ValidationResult {
    let mut result = ValidationResult::new();
    result.require("ward", &bed.ward);
    result.require("bed_number", &bed.bed_number);
    result.max_len("bed_number", &bed.bed_number, 20);

    let occupied = bed.status == BedStatus::Occupied;
    if occupied && (bed.patient_id.is_none() || bed.visit_id.is_none()) {
        result.add_error(
            "patient_id",
            "Occupied beds need a patient and visit",
            ValidationErrorCode::Required,
        );
    }
    if !occupied && (bed.patient_id.is_some() || bed.visit_id.is_some()) {
        result.add_error(
            "patient_id",
            "Only occupied beds can hold a patient",
            ValidationErrorCode::InvalidReference,
        );
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_bed(status: BedStatus) -> Bed {
        let now = Utc::now();
        Bed {
            id: Uuid::new_v4(),
            hospital_id: Uuid::new_v4(),
            ward: "Ward A".to_string(),
            bed_number: "a-12".to_string(),
            bed_type: BedType::General,
            status,
            patient_id: None,
            visit_id: None,
            assigned_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_bed_cycle() {
        assert!(BedStatus::Available.can_transition_to(BedStatus::Occupied));
        assert!(BedStatus::Occupied.can_transition_to(BedStatus::Available));
        assert!(!BedStatus::Occupied.can_transition_to(BedStatus::Maintenance));
        assert!(!BedStatus::Maintenance.can_transition_to(BedStatus::Occupied));
    }

    #[test]
    fn test_occupied_bed_needs_patient() {
        let mut bed = create_test_bed(BedStatus::Occupied);
        assert!(!validate_bed(&bed).is_valid());
        bed.patient_id = Some(Uuid::new_v4());
        bed.visit_id = Some(Uuid::new_v4());
        assert!(validate_bed(&bed).is_valid());
    }

    #[test]
    fn test_occupancy_rate() {
        let beds = vec![
            create_test_bed(BedStatus::Available),
            create_test_bed(BedStatus::Maintenance),
            Bed {
                patient_id: Some(Uuid::new_v4()),
                visit_id: Some(Uuid::new_v4()),
                ..create_test_bed(BedStatus::Occupied)
            },
            create_test_bed(BedStatus::Available),
        ];
        let occupancy = BedOccupancy::from_beds(&beds);
        assert_eq!(occupancy.total, 4);
        assert_eq!(occupancy.available, 2);
        assert_eq!(occupancy.rate(), 25.0);
    }

    #[test]
    fn test_slot_key_ignores_case() {
        let bed = create_test_bed(BedStatus::Available);
        assert!(bed.slot_key().ends_with(":A-12"));
    }
}
