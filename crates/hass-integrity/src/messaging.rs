//! Secure messaging between staff and patients.

use chrono::{DateTime, Utc};
use hass_shared::{ValidationErrorCode, ValidationResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MessageThread {
    pub id: Uuid,
    pub hospital_id: Option<Uuid>,
    pub subject: String,
    pub participant_ids: Vec<Uuid>,
    /// Patient the conversation is about, if any
    pub patient_id: Option<Uuid>,
    pub created_by: Uuid,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MessageThread {
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.participant_ids.contains(&user_id)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub sender_id: Uuid,
    pub body: String,
    pub read_by: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// Returns false if `user_id` had already read the message
    pub fn mark_read(&mut self, user_id: Uuid) -> bool {
        if self.read_by.contains(&user_id) {
            return false;
        }
        self.read_by.push(user_id);
        true
    }
}

pub fn validate_thread(thread: &MessageThread) -> ValidationResult {
    let mut result = ValidationResult::new();
    result.require("subject", &thread.subject);
    result.max_len("subject", &thread.subject, 200);

    if !thread.has_participant(thread.created_by) {
        result.add_error(
            "participant_ids",
            "The thread creator must be a participant",
            ValidationErrorCode::InvalidReference,
        );
    }
    if thread.participant_ids.len() < 2 {
        result.add_error(
            "participant_ids",
            "A thread needs at least two participants",
            ValidationErrorCode::TooShort,
        );
    }
    let mut unique = thread.participant_ids.clone();
    unique.sort();
    unique.dedup();
    if unique.len() != thread.participant_ids.len() {
        result.add_error(
            "participant_ids",
            "Participants must be unique",
            ValidationErrorCode::DuplicateValue,
        );
    }

    result
}

pub fn validate_message(message: &Message) -> ValidationResult {
    let mut result = ValidationResult::new();
    result.require("body", &message.body);
    result.max_len("body", &message.body, 10_000);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_participants() {
        let now = Utc::now();
        let creator = Uuid::new_v4();
        let mut thread = MessageThread {
            id: Uuid::new_v4(),
            hospital_id: None,
            subject: "Lab follow-up".to_string(),
            participant_ids: vec![creator],
            patient_id: None,
            created_by: creator,
            last_message_at: None,
            created_at: now,
            updated_at: now,
        };
        assert!(!validate_thread(&thread).is_valid());
        thread.participant_ids.push(Uuid::new_v4());
        assert!(validate_thread(&thread).is_valid());
        thread.participant_ids.push(creator);
        assert!(!validate_thread(&thread).is_valid());
    }

    #[test]
    fn test_mark_read_once() {
        let now = Utc::now();
        let reader = Uuid::new_v4();
        let mut message = Message {
            id: Uuid::new_v4(),
            thread_id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            body: "Results are in".to_string(),
            read_by: vec![],
            created_at: now,
            updated_at: now,
        };
        assert!(message.mark_read(reader));
        assert!(!message.mark_read(reader));
        assert_eq!(message.read_by.len(), 1);
    }
}
