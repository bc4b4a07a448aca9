//! Doctor raises a discharge request on the case sheet; reception answers it.

#[cfg(test)]
mod tests {
    use crate::{unique_suffix, Harness};
    use hass_client::discharge::{decide, is_rejection, DischargeDecision};
    use hass_client::{ApiClient, DischargeRequestView, NewCaseSheet, NewCaseSheetEvent};
    use hass_integrity::{CaseSheet, CaseSheetEventType, CaseSheetSections, VisitStatus};
    use hass_shared::Role;
    use uuid::Uuid;

    async fn open_case_sheet(doctor: &ApiClient, patient_id: Uuid, visit_id: Uuid) -> anyhow::Result<CaseSheet> {
        let sheet = doctor
            .create_case_sheet(&NewCaseSheet {
                patient_id,
                visit_id,
                sections: CaseSheetSections {
                    presenting_complaint: Some("Shortness of breath".to_string()),
                    provisional_diagnosis: Some("Community acquired pneumonia".to_string()),
                    treatment_plan: Some("Oral antibiotics, review in 48 hours".to_string()),
                    ..Default::default()
                },
            })
            .await?;
        Ok(sheet)
    }

    async fn request_discharge(doctor: &ApiClient, sheet_id: Uuid, description: &str) -> anyhow::Result<usize> {
        let recorded = doctor
            .record_case_sheet_event(
                sheet_id,
                &NewCaseSheetEvent {
                    event_type: CaseSheetEventType::DischargeRequest,
                    description: description.to_string(),
                    requires_acknowledgment: false,
                },
            )
            .await?;
        assert!(recorded.event.requires_acknowledgment);
        Ok(recorded.event_index)
    }

    async fn pending_for(reception: &ApiClient, visit_id: Uuid) -> anyhow::Result<Vec<DischargeRequestView>> {
        Ok(reception
            .pending_discharge_requests()
            .await?
            .into_iter()
            .filter(|r| r.pending.visit_id == visit_id)
            .collect())
    }

    #[tokio::test]
    async fn test_rejected_request_can_be_raised_again_and_approved() -> anyhow::Result<()> {
        let harness = Harness::start().await?;
        let last_name = format!("D{}", unique_suffix());
        let (patient, visit) = harness.admit_walk_in("Dana", &last_name).await?;

        let doctor = harness.client_as(Role::Doctor).await?;
        let sheet = open_case_sheet(&doctor, patient.id, visit.id).await?;
        let first = request_discharge(&doctor, sheet.id, "Stable on oral antibiotics").await?;

        let reception = harness.client_as(Role::Reception).await?;
        let pending = pending_for(&reception, visit.id).await?;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].pending.event_index, first);
        assert_eq!(pending[0].mrn, patient.mrn);
        assert!(pending[0].patient_name.contains(&last_name));

        let rejected = decide(
            &reception,
            &pending[0],
            DischargeDecision::Reject {
                reason: "Awaiting chest X-ray".to_string(),
            },
        )
        .await?;
        assert!(rejected.visit.is_none());
        assert!(is_rejection(rejected.acknowledgment.event.acknowledgment_notes.as_deref()));
        assert!(pending_for(&reception, visit.id).await?.is_empty());
        assert_ne!(reception.get_visit(visit.id).await?.status, VisitStatus::Discharged);

        let second = request_discharge(&doctor, sheet.id, "X-ray clear").await?;
        assert!(second > first);

        let pending = pending_for(&reception, visit.id).await?;
        assert_eq!(pending.len(), 1);
        let approved = decide(
            &reception,
            &pending[0],
            DischargeDecision::Approve {
                notes: Some("Discharged home with follow-up".to_string()),
            },
        )
        .await?;
        let discharged = approved.visit.expect("approval discharges the visit");
        assert_eq!(discharged.status, VisitStatus::Discharged);
        assert!(discharged.discharged_at.is_some());
        assert!(pending_for(&reception, visit.id).await?.is_empty());

        // The timeline keeps both answers
        let sheet = doctor.get_case_sheet(sheet.id).await?;
        assert!(sheet.events.iter().all(|e| e.acknowledged_at.is_some()));
        Ok(())
    }

    #[tokio::test]
    async fn test_discharge_request_waits_on_the_case_sheet() -> anyhow::Result<()> {
        let harness = Harness::start().await?;
        let (patient, visit) = harness.admit_walk_in("Evan", &format!("E{}", unique_suffix())).await?;
        let doctor = harness.client_as(Role::Doctor).await?;
        let sheet = open_case_sheet(&doctor, patient.id, visit.id).await?;
        request_discharge(&doctor, sheet.id, "Ready for discharge").await?;

        let pending = doctor.pending_events(sheet.id).await?;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event.event_type, CaseSheetEventType::DischargeRequest);
        Ok(())
    }
}
