//! Push and SSE alert payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_ICON: &str = "/icons/icon-192x192.png";
pub const DEFAULT_BADGE: &str = "/icons/badge-72x72.png";
pub const DEFAULT_URL: &str = "/";

pub const EMERGENCY_VIBRATION: [u32; 5] = [300, 100, 300, 100, 300];
pub const DEFAULT_VIBRATION: [u32; 3] = [100, 50, 100];

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    EmergencyAlert,
    CaseSheetEvent,
    LabResult,
    Medication,
    Appointment,
    Message,
    #[serde(other)]
    General,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PushData {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<Uuid>,
}

impl Default for PushData {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            patient_id: None,
            record_id: None,
        }
    }
}

/// Payload delivered to subscribers. Missing fields fall back to defaults.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default = "default_badge")]
    pub badge: String,
    #[serde(default = "default_type")]
    pub notification_type: NotificationType,
    #[serde(default)]
    pub data: PushData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hospital_id: Option<Uuid>,
    #[serde(default = "Utc::now")]
    pub sent_at: DateTime<Utc>,
}

fn default_icon() -> String {
    DEFAULT_ICON.to_string()
}

fn default_badge() -> String {
    DEFAULT_BADGE.to_string()
}

fn default_type() -> NotificationType {
    NotificationType::General
}

/// How a payload should be presented
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DisplayOptions {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub require_interaction: bool,
    pub vibrate: Vec<u32>,
    pub url: String,
}

impl PushPayload {
    pub fn new(notification_type: NotificationType, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            icon: default_icon(),
            badge: default_badge(),
            notification_type,
            data: PushData::default(),
            hospital_id: None,
            sent_at: Utc::now(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.data.url = url.into();
        self
    }

    pub fn for_patient(mut self, patient_id: Uuid, record_id: Uuid) -> Self {
        self.data.patient_id = Some(patient_id);
        self.data.record_id = Some(record_id);
        self
    }

    pub fn in_hospital(mut self, hospital_id: Uuid) -> Self {
        self.hospital_id = Some(hospital_id);
        self
    }

    pub fn is_emergency(&self) -> bool {
        self.notification_type == NotificationType::EmergencyAlert
    }

    pub fn display_options(&self) -> DisplayOptions {
        let emergency = self.is_emergency();
        DisplayOptions {
            title: self.title.clone(),
            body: self.body.clone(),
            icon: self.icon.clone(),
            badge: self.badge.clone(),
            require_interaction: emergency,
            vibrate: if emergency {
                EMERGENCY_VIBRATION.to_vec()
            } else {
                DEFAULT_VIBRATION.to_vec()
            },
            url: self.data.url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emergency_display() {
        let payload = PushPayload::new(NotificationType::EmergencyAlert, "Critical vitals", "SpO2 88%");
        let options = payload.display_options();
        assert!(options.require_interaction);
        assert_eq!(options.vibrate, vec![300, 100, 300, 100, 300]);
    }

    #[test]
    fn test_default_display() {
        let options = PushPayload::new(NotificationType::Message, "New message", "Hi").display_options();
        assert!(!options.require_interaction);
        assert_eq!(options.vibrate, vec![100, 50, 100]);
        assert_eq!(options.url, "/");
    }

    #[test]
    fn test_sparse_payload_gets_defaults() {
        let payload: PushPayload = serde_json::from_str(r#"{"title":"t","body":"b"}"#).unwrap();
        assert_eq!(payload.icon, DEFAULT_ICON);
        assert_eq!(payload.badge, DEFAULT_BADGE);
        assert_eq!(payload.notification_type, NotificationType::General);
        assert_eq!(payload.data.url, "/");
    }
}
