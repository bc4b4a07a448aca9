//! Prescription lifecycle across doctor, pharmacist, nurse and patient.

#[cfg(test)]
mod tests {
    use crate::{unique_suffix, Harness};
    use chrono::Utc;
    use hass_client::{ClientError, DoseLog, ListParams, NewPrescription};
    use hass_integrity::{MedicationRoute, PrescriptionStatus};
    use hass_shared::Role;

    fn amoxicillin(patient_id: uuid::Uuid, visit_id: uuid::Uuid) -> NewPrescription {
        NewPrescription {
            patient_id,
            visit_id,
            medication_name: "Amoxicillin".to_string(),
            dosage: "500 mg".to_string(),
            frequency: "three times daily".to_string(),
            route: Some(MedicationRoute::Oral),
            duration_days: Some(7),
            quantity: Some(21),
            instructions: Some("Take with food".to_string()),
        }
    }

    #[tokio::test]
    async fn test_prescribe_dispense_administer() -> anyhow::Result<()> {
        let harness = Harness::start().await?;
        let (patient, visit) = harness.admit_walk_in(&format!("P{}", unique_suffix()), "Rx").await?;

        let doctor = harness.client_as(Role::Doctor).await?;
        let rx = doctor.create_prescription(&amoxicillin(patient.id, visit.id)).await?;
        assert_eq!(rx.status, PrescriptionStatus::Active);

        let pharmacist = harness.client_as(Role::Pharmacist).await?;
        let dispensed = pharmacist.dispense_prescription(rx.id).await?;
        assert_eq!(dispensed.status, PrescriptionStatus::Dispensed);
        assert!(dispensed.dispensed_at.is_some());

        let again = pharmacist.dispense_prescription(rx.id).await.unwrap_err();
        match again {
            ClientError::Api(api) => assert!(api.is_conflict(), "{}", api),
            other => panic!("unexpected error: {other}"),
        }

        let nurse = harness.client_as(Role::Nurse).await?;
        let administered = nurse.administer_prescription(rx.id, Some("First dose")).await?;
        assert_eq!(administered.status, PrescriptionStatus::Administered);
        assert_eq!(administered.administration_notes.as_deref(), Some("First dose"));

        // Administered is terminal
        let cancel = doctor.cancel_prescription(rx.id, Some("Too late")).await.unwrap_err();
        assert_eq!(cancel.status(), Some(409));

        let listed = doctor.list_prescriptions(&ListParams::for_patient(patient.id)).await?;
        assert_eq!(listed.total, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_only_pharmacy_dispenses() -> anyhow::Result<()> {
        let harness = Harness::start().await?;
        let (patient, visit) = harness.admit_walk_in(&format!("Q{}", unique_suffix()), "Rx").await?;
        let doctor = harness.client_as(Role::Doctor).await?;
        let rx = doctor.create_prescription(&amoxicillin(patient.id, visit.id)).await?;

        let err = doctor.dispense_prescription(rx.id).await.unwrap_err();
        assert_eq!(err.status(), Some(403));

        let cancelled = doctor.cancel_prescription(rx.id, Some("Allergy noted")).await?;
        assert_eq!(cancelled.status, PrescriptionStatus::Cancelled);
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some("Allergy noted"));
        Ok(())
    }

    #[tokio::test]
    async fn test_patient_tracks_doses_locally() -> anyhow::Result<()> {
        let harness = Harness::start().await?;
        let patient = harness.client_as(Role::Patient).await?;
        let me = patient.my_patient_record().await?;
        let visit = patient.patient_visits(me.id, &ListParams::default()).await?.items[0].clone();

        let doctor = harness.client_as(Role::Doctor).await?;
        let rx = doctor.create_prescription(&amoxicillin(me.id, visit.id)).await?;

        let mine = patient.list_prescriptions(&ListParams::for_patient(me.id)).await?;
        assert!(mine.items.iter().any(|p| p.id == rx.id));

        let today = Utc::now().date_naive();
        let mut log = DoseLog::load(patient.storage());
        assert!(log.mark_taken(rx.id, today));
        log.save(patient.storage())?;

        let reloaded = DoseLog::load(patient.storage());
        assert!(reloaded.is_taken(rx.id, today));
        assert_eq!(reloaded.days_taken(rx.id), 1);

        // Signing out keeps the dose history
        patient.logout().await?;
        assert!(DoseLog::load(patient.storage()).is_taken(rx.id, today));
        Ok(())
    }
}
