//! Real-time alert fan-out.
//!
//! Publishers push a `PushPayload` into a broadcast channel; each SSE
//! client holds one receiver and drops it when the stream closes.

use hass_integrity::PushPayload;
use tokio::sync::broadcast;
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct AlertHub {
    sender: broadcast::Sender<PushPayload>,
}

impl Default for AlertHub {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Returns how many subscribers received the alert
    pub fn publish(&self, payload: PushPayload) -> usize {
        tracing::info!(
            notification_type = ?payload.notification_type,
            title = %payload.title,
            "alert published"
        );
        // No subscribers is not an error
        self.sender.send(payload).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PushPayload> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Whether a subscriber scoped to `scope` should see `payload`.
/// `None` scope sees everything; unscoped alerts go to everyone.
pub fn visible_to(payload: &PushPayload, scope: &Option<Vec<Uuid>>) -> bool {
    match (scope, payload.hospital_id) {
        (None, _) | (_, None) => true,
        (Some(hospitals), Some(hospital_id)) => hospitals.contains(&hospital_id),
    }
}
