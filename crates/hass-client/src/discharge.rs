//! Reception's handling of doctors' discharge requests.
//!
//! A request is a `discharge_request` event on a case sheet. Approving it
//! discharges the visit, which closes every open request on that sheet;
//! rejecting it only acknowledges, with the reason recorded in the notes.
//! Either way the request leaves the pending list. A rejected request can be
//! raised again by the doctor as a new event.

use hass_integrity::Visit;
use uuid::Uuid;

use crate::client::ApiClient;
use crate::error::ClientResult;
use crate::types::{Acknowledgment, DischargeRequestView, DischargeVisit, EventRef};

pub const REJECTION_PREFIX: &str = "Rejected:";

/// How reception answered a discharge request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DischargeDecision {
    Approve { notes: Option<String> },
    Reject { reason: String },
}

#[derive(Clone, Debug)]
pub struct DischargeOutcome {
    pub acknowledgment: EventRef,
    /// The discharged visit, when approved
    pub visit: Option<Visit>,
}

/// Notes stored on the acknowledged event
pub fn acknowledgment_notes(decision: &DischargeDecision) -> Option<String> {
    match decision {
        DischargeDecision::Approve { notes } => notes.clone(),
        DischargeDecision::Reject { reason } => {
            let reason = reason.trim();
            Some(if reason.is_empty() {
                REJECTION_PREFIX.to_string()
            } else {
                format!("{} {}", REJECTION_PREFIX, reason)
            })
        }
    }
}

/// Whether an acknowledged request was turned down
pub fn is_rejection(notes: Option<&str>) -> bool {
    notes.is_some_and(|n| n.starts_with(REJECTION_PREFIX))
}

pub async fn decide(
    client: &ApiClient,
    request: &DischargeRequestView,
    decision: DischargeDecision,
) -> ClientResult<DischargeOutcome> {
    decide_event(
        client,
        request.pending.case_sheet_id,
        request.pending.visit_id,
        request.pending.event_index,
        decision,
    )
    .await
}

/// Answer the request at `event_index` on `case_sheet_id`.
pub async fn decide_event(
    client: &ApiClient,
    case_sheet_id: Uuid,
    visit_id: Uuid,
    event_index: usize,
    decision: DischargeDecision,
) -> ClientResult<DischargeOutcome> {
    let notes = acknowledgment_notes(&decision);
    let (visit, acknowledgment) = match &decision {
        DischargeDecision::Approve { .. } => {
            let discharge = DischargeVisit {
                discharge_summary: notes.clone(),
            };
            let visit = client.discharge_visit(visit_id, &discharge).await?;
            // Discharging settles the request unless the sheet was busy
            let sheet = client.get_case_sheet(case_sheet_id).await?;
            let acknowledgment = match sheet.events.get(event_index) {
                Some(event) if !event.is_pending() => EventRef {
                    case_sheet_id,
                    event_index,
                    event: event.clone(),
                },
                _ => {
                    client
                        .acknowledge_event(case_sheet_id, &Acknowledgment { event_index, notes })
                        .await?
                }
            };
            (Some(visit), acknowledgment)
        }
        DischargeDecision::Reject { .. } => {
            let acknowledgment = client
                .acknowledge_event(case_sheet_id, &Acknowledgment { event_index, notes })
                .await?;
            (None, acknowledgment)
        }
    };
    tracing::info!(
        case_sheet = %case_sheet_id,
        event_index,
        approved = visit.is_some(),
        "discharge request answered"
    );
    Ok(DischargeOutcome { acknowledgment, visit })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_notes_are_prefixed() {
        let notes = acknowledgment_notes(&DischargeDecision::Reject {
            reason: " Awaiting lab results ".to_string(),
        });
        assert_eq!(notes.as_deref(), Some("Rejected: Awaiting lab results"));
        assert!(is_rejection(notes.as_deref()));
    }

    #[test]
    fn test_blank_rejection_still_marked() {
        let notes = acknowledgment_notes(&DischargeDecision::Reject { reason: "  ".to_string() });
        assert_eq!(notes.as_deref(), Some(REJECTION_PREFIX));
    }

    #[test]
    fn test_approval_keeps_notes() {
        let notes = acknowledgment_notes(&DischargeDecision::Approve {
            notes: Some("Approved at front desk".to_string()),
        });
        assert_eq!(notes.as_deref(), Some("Approved at front desk"));
        assert!(!is_rejection(notes.as_deref()));
        assert!(!is_rejection(None));
    }
}
