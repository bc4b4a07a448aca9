//! Vitals recording and the emergency alert it raises.

#[cfg(test)]
mod tests {
    use crate::{unique_suffix, Harness};
    use futures::StreamExt;
    use hass_client::{ListParams, NewVitals};
    use hass_integrity::{NotificationType, VitalsSeverity};
    use hass_shared::Role;
    use std::time::Duration;

    const ALERT_WAIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_extreme_vitals_show_critical_badge() -> anyhow::Result<()> {
        let harness = Harness::start().await?;
        let first_name = format!("X{}", unique_suffix());
        let (patient, visit) = harness.admit_walk_in(&first_name, "Extreme").await?;

        let nurse = harness.client_as(Role::Nurse).await?;
        let mut alerts = Box::pin(nurse.alerts().await?);

        let recorded = nurse
            .record_vitals(&NewVitals {
                patient_id: patient.id,
                visit_id: visit.id,
                blood_pressure_systolic: Some(180),
                blood_pressure_diastolic: Some(110),
                heart_rate: Some(120),
                temperature: Some(39.0),
                spo2: Some(88),
                respiratory_rate: Some(28),
                ..Default::default()
            })
            .await?;
        assert_eq!(recorded.badge, "CRITICAL");
        assert_eq!(recorded.vitals.severity, VitalsSeverity::Critical);
        assert!(!recorded.findings.is_empty());

        let alert = tokio::time::timeout(ALERT_WAIT, alerts.next())
            .await?
            .expect("alert stream ended")?;
        assert_eq!(alert.notification_type, NotificationType::EmergencyAlert);
        assert_eq!(alert.data.patient_id, Some(patient.id));
        assert!(alert.title.contains(&first_name), "{}", alert.title);

        let display = alert.display_options();
        assert!(display.require_interaction);
        assert_eq!(display.vibrate, vec![300, 100, 300, 100, 300]);

        // The doctor sees the same badge on the chart
        let doctor = harness.client_as(Role::Doctor).await?;
        let recent = doctor.recent_vitals(patient.id).await?;
        assert_eq!(recent.items[0].badge, "CRITICAL");
        Ok(())
    }

    #[tokio::test]
    async fn test_routine_vitals_stay_normal() -> anyhow::Result<()> {
        let harness = Harness::start().await?;
        let (patient, visit) = harness.admit_walk_in(&format!("N{}", unique_suffix()), "Routine").await?;
        let nurse = harness.client_as(Role::Nurse).await?;

        let recorded = nurse
            .record_vitals(&NewVitals {
                patient_id: patient.id,
                visit_id: visit.id,
                blood_pressure_systolic: Some(120),
                blood_pressure_diastolic: Some(80),
                heart_rate: Some(72),
                temperature: Some(36.8),
                spo2: Some(98),
                respiratory_rate: Some(16),
                ..Default::default()
            })
            .await?;
        assert_eq!(recorded.badge, "NORMAL");

        let listed = nurse.list_vitals(&ListParams::for_patient(patient.id)).await?;
        assert_eq!(listed.total, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_out_of_range_reading_is_rejected() -> anyhow::Result<()> {
        let harness = Harness::start().await?;
        let (patient, visit) = harness.admit_walk_in(&format!("R{}", unique_suffix()), "Range").await?;
        let nurse = harness.client_as(Role::Nurse).await?;

        let err = nurse
            .record_vitals(&NewVitals {
                patient_id: patient.id,
                visit_id: visit.id,
                spo2: Some(140),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(422));
        Ok(())
    }

    #[tokio::test]
    async fn test_patient_cannot_record_vitals() -> anyhow::Result<()> {
        let harness = Harness::start().await?;
        let patient_client = harness.client_as(Role::Patient).await?;
        let me = patient_client.my_patient_record().await?;
        let visits = patient_client.patient_visits(me.id, &ListParams::default()).await?;

        let err = patient_client
            .record_vitals(&NewVitals {
                patient_id: me.id,
                visit_id: visits.items[0].id,
                heart_rate: Some(70),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(403));
        Ok(())
    }
}
