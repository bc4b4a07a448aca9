//! Ward beds: create, assign, release, maintenance, occupancy.

#[cfg(test)]
mod tests {
    use crate::{unique_suffix, Harness};
    use hass_client::{ListParams, NewBed};
    use hass_integrity::{BedStatus, BedType};
    use hass_shared::Role;

    #[tokio::test]
    async fn test_bed_cycle() -> anyhow::Result<()> {
        let harness = Harness::start().await?;
        let manager = harness.client_as(Role::Manager).await?;
        let bed = manager
            .create_bed(&NewBed {
                ward: "Ward B".to_string(),
                bed_number: format!("B-{}", unique_suffix()),
                bed_type: Some(BedType::Isolation),
                hospital_id: None,
            })
            .await?;
        assert_eq!(bed.status, BedStatus::Available);
        assert_eq!(bed.bed_type, BedType::Isolation);

        let (patient, visit) = harness.admit_walk_in("Bea", &format!("B{}", unique_suffix())).await?;
        let reception = harness.client_as(Role::Reception).await?;
        let before = reception.bed_occupancy().await?;

        let assigned = reception.assign_bed(bed.id, patient.id, visit.id).await?;
        assert_eq!(assigned.status, BedStatus::Occupied);
        assert_eq!(assigned.patient_id, Some(patient.id));
        assert_eq!(assigned.visit_id, Some(visit.id));

        let during = reception.bed_occupancy().await?;
        assert_eq!(during.counts.occupied, before.counts.occupied + 1);
        assert_eq!(during.counts.available + 1, before.counts.available);
        assert!(during.occupancy_rate > before.occupancy_rate);

        // An occupied bed cannot go to maintenance
        let err = reception.bed_maintenance(bed.id).await.unwrap_err();
        assert_eq!(err.status(), Some(409));

        let released = reception.release_bed(bed.id).await?;
        assert_eq!(released.status, BedStatus::Available);
        assert_eq!(released.patient_id, None);

        let serviced = reception.bed_maintenance(bed.id).await?;
        assert_eq!(serviced.status, BedStatus::Maintenance);
        assert_eq!(reception.bed_occupancy().await?.counts.maintenance, before.counts.maintenance + 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_reception_cannot_create_beds() -> anyhow::Result<()> {
        let harness = Harness::start().await?;
        let reception = harness.client_as(Role::Reception).await?;
        let err = reception
            .create_bed(&NewBed {
                ward: "Ward Z".to_string(),
                bed_number: "Z-1".to_string(),
                bed_type: None,
                hospital_id: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(403));
        Ok(())
    }

    #[tokio::test]
    async fn test_discharge_frees_the_bed() -> anyhow::Result<()> {
        let harness = Harness::start().await?;
        let reception = harness.client_as(Role::Reception).await?;
        let beds = reception.list_beds(&ListParams::default().with_status("available")).await?;
        let bed = beds.items.first().cloned().expect("demo hospital has free beds");

        let (patient, visit) = harness.admit_walk_in("Cal", &format!("C{}", unique_suffix())).await?;
        reception.assign_bed(bed.id, patient.id, visit.id).await?;

        reception.discharge_visit(visit.id, &Default::default()).await?;
        let after = reception.get_bed(bed.id).await?;
        assert_eq!(after.status, BedStatus::Available);
        assert_eq!(after.visit_id, None);
        Ok(())
    }
}
