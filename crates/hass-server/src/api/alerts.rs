//! `/alerts/stream`: server-sent events carrying push payloads.

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures::stream::{self, Stream};
use hass_integrity::PushPayload;
use hass_shared::Role;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::access;
use crate::alerts::visible_to;
use crate::auth::Caller;
use crate::error::ApiResult;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/stream", get(stream_alerts))
}

const KEEP_ALIVE_SECS: u64 = 15;

/// Who a stream delivers to
#[derive(Clone, Debug)]
enum Audience {
    /// Staff see alerts for the hospitals they work in (`None`: all hospitals)
    Staff(Option<Vec<Uuid>>),
    /// Patients see alerts about their own chart only
    Patient(Option<Uuid>),
}

impl Audience {
    fn wants(&self, payload: &PushPayload) -> bool {
        match self {
            Audience::Staff(scope) => visible_to(payload, scope),
            Audience::Patient(own) => own.is_some() && payload.data.patient_id == *own,
        }
    }
}

async fn stream_alerts(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let audience = if caller.role() == Role::Patient {
        Audience::Patient(access::own_patient(&state, &caller).await?.map(|p| p.id))
    } else {
        Audience::Staff(access::hospital_scope(&state, &caller).await?)
    };
    let receiver = state.alerts.subscribe();
    tracing::debug!(user = %caller.id(), subscribers = state.alerts.subscriber_count(), "alert stream opened");

    let events = stream::unfold((receiver, audience), |(mut receiver, audience)| async move {
        loop {
            match receiver.recv().await {
                Ok(payload) if audience.wants(&payload) => {
                    let event = match Event::default().event("alert").json_data(&payload) {
                        Ok(event) => event,
                        Err(err) => {
                            tracing::warn!(%err, "alert could not be encoded");
                            continue;
                        }
                    };
                    return Some((Ok(event), (receiver, audience)));
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "alert stream fell behind");
                    continue;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(KEEP_ALIVE_SECS))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hass_integrity::NotificationType;

    #[test]
    fn test_patient_audience_only_sees_own_chart() {
        let own = Uuid::new_v4();
        let audience = Audience::Patient(Some(own));
        let mine = PushPayload::new(NotificationType::LabResult, "Lab result ready", "CBC").for_patient(own, Uuid::new_v4());
        let other = PushPayload::new(NotificationType::LabResult, "Lab result ready", "CBC")
            .for_patient(Uuid::new_v4(), Uuid::new_v4());
        let broadcast = PushPayload::new(NotificationType::General, "Maintenance", "Tonight");

        assert!(audience.wants(&mine));
        assert!(!audience.wants(&other));
        assert!(!audience.wants(&broadcast));
        assert!(!Audience::Patient(None).wants(&mine));
    }

    #[test]
    fn test_staff_audience_follows_hospital_scope() {
        let hospital = Uuid::new_v4();
        let alert = PushPayload::new(NotificationType::EmergencyAlert, "Critical", "SpO2 88%").in_hospital(hospital);
        assert!(Audience::Staff(None).wants(&alert));
        assert!(Audience::Staff(Some(vec![hospital])).wants(&alert));
        assert!(!Audience::Staff(Some(vec![Uuid::new_v4()])).wants(&alert));
    }
}
