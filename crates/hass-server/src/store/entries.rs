//! Table bindings for every stored record type.

use chrono::{DateTime, Utc};
use hass_integrity::*;
use hass_shared::AccessLogEntry;
use uuid::Uuid;

use super::{Entry, EntryIndex};

macro_rules! timestamps {
    () => {
        fn created_at(&self) -> DateTime<Utc> {
            self.created_at
        }

        fn updated_at(&self) -> DateTime<Utc> {
            self.updated_at
        }
    };
}

impl Entry for Region {
    const TABLE: &'static str = "regions";
    const KIND: &'static str = "Region";

    fn id(&self) -> Uuid {
        self.id
    }

    fn index(&self) -> EntryIndex {
        EntryIndex {
            unique_key: Some(self.code.to_uppercase()),
            ..Default::default()
        }
    }

    timestamps!();
}

impl Entry for Hospital {
    const TABLE: &'static str = "hospitals";
    const KIND: &'static str = "Hospital";

    fn id(&self) -> Uuid {
        self.id
    }

    fn index(&self) -> EntryIndex {
        EntryIndex {
            hospital_id: Some(self.id),
            parent_id: self.region_id,
            unique_key: Some(self.code.to_uppercase()),
            ..Default::default()
        }
    }

    timestamps!();
}

impl Entry for User {
    const TABLE: &'static str = "users";
    const KIND: &'static str = "User";

    fn id(&self) -> Uuid {
        self.id
    }

    fn index(&self) -> EntryIndex {
        EntryIndex {
            hospital_id: self.hospital_id,
            parent_id: self.region_id,
            status: Some(self.role.to_string()),
            unique_key: Some(self.email.clone()),
            ..Default::default()
        }
    }

    timestamps!();
}

impl Entry for UserCredentials {
    const TABLE: &'static str = "user_credentials";
    const KIND: &'static str = "Credentials";

    fn id(&self) -> Uuid {
        self.user_id
    }

    fn index(&self) -> EntryIndex {
        EntryIndex {
            parent_id: Some(self.user_id),
            ..Default::default()
        }
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Entry for Patient {
    const TABLE: &'static str = "patients";
    const KIND: &'static str = "Patient";

    fn id(&self) -> Uuid {
        self.id
    }

    fn index(&self) -> EntryIndex {
        EntryIndex {
            hospital_id: Some(self.hospital_id),
            // Patient-scoped filters match the patient's own row
            patient_id: Some(self.id),
            actor_id: self.user_id,
            unique_key: Some(self.mrn.clone()),
            ..Default::default()
        }
    }

    timestamps!();
}

impl Entry for Visit {
    const TABLE: &'static str = "visits";
    const KIND: &'static str = "Visit";

    fn id(&self) -> Uuid {
        self.id
    }

    fn index(&self) -> EntryIndex {
        EntryIndex {
            hospital_id: Some(self.hospital_id),
            patient_id: Some(self.patient_id),
            actor_id: self.attending_doctor_id,
            status: Some(self.status.to_string()),
            ..Default::default()
        }
    }

    timestamps!();
}

impl Entry for Vitals {
    const TABLE: &'static str = "vitals";
    const KIND: &'static str = "Vitals";

    fn id(&self) -> Uuid {
        self.id
    }

    fn index(&self) -> EntryIndex {
        EntryIndex {
            hospital_id: Some(self.hospital_id),
            patient_id: Some(self.patient_id),
            visit_id: Some(self.visit_id),
            actor_id: Some(self.recorded_by),
            status: Some(self.severity.to_string()),
            ..Default::default()
        }
    }

    timestamps!();
}

impl Entry for Prescription {
    const TABLE: &'static str = "prescriptions";
    const KIND: &'static str = "Prescription";

    fn id(&self) -> Uuid {
        self.id
    }

    fn index(&self) -> EntryIndex {
        EntryIndex {
            hospital_id: Some(self.hospital_id),
            patient_id: Some(self.patient_id),
            visit_id: Some(self.visit_id),
            actor_id: Some(self.prescribed_by),
            status: Some(self.status.to_string()),
            ..Default::default()
        }
    }

    timestamps!();
}

impl Entry for LabTest {
    const TABLE: &'static str = "lab_tests";
    const KIND: &'static str = "Lab test";

    fn id(&self) -> Uuid {
        self.id
    }

    fn index(&self) -> EntryIndex {
        EntryIndex {
            hospital_id: Some(self.hospital_id),
            patient_id: Some(self.patient_id),
            visit_id: Some(self.visit_id),
            actor_id: Some(self.ordered_by),
            status: Some(self.status.to_string()),
            ..Default::default()
        }
    }

    timestamps!();
}

impl Entry for NurseLog {
    const TABLE: &'static str = "nurse_logs";
    const KIND: &'static str = "Nurse log";

    fn id(&self) -> Uuid {
        self.id
    }

    fn index(&self) -> EntryIndex {
        EntryIndex {
            hospital_id: Some(self.hospital_id),
            patient_id: Some(self.patient_id),
            visit_id: Some(self.visit_id),
            actor_id: Some(self.recorded_by),
            status: Some(self.status.to_string()),
            ..Default::default()
        }
    }

    timestamps!();
}

impl Entry for CaseSheet {
    const TABLE: &'static str = "case_sheets";
    const KIND: &'static str = "Case sheet";

    fn id(&self) -> Uuid {
        self.id
    }

    fn index(&self) -> EntryIndex {
        EntryIndex {
            hospital_id: Some(self.hospital_id),
            patient_id: Some(self.patient_id),
            visit_id: Some(self.visit_id),
            actor_id: Some(self.created_by),
            // Revision marker: guarded updates compare against the last write time
            status: Some(super::timestamp(self.updated_at)),
            // One case sheet per visit
            unique_key: Some(self.visit_id.to_string()),
            ..Default::default()
        }
    }

    timestamps!();
}

impl Entry for Bed {
    const TABLE: &'static str = "beds";
    const KIND: &'static str = "Bed";

    fn id(&self) -> Uuid {
        self.id
    }

    fn index(&self) -> EntryIndex {
        EntryIndex {
            hospital_id: Some(self.hospital_id),
            patient_id: self.patient_id,
            visit_id: self.visit_id,
            status: Some(self.status.to_string()),
            unique_key: Some(self.slot_key()),
            ..Default::default()
        }
    }

    timestamps!();
}

impl Entry for Appointment {
    const TABLE: &'static str = "appointments";
    const KIND: &'static str = "Appointment";

    fn id(&self) -> Uuid {
        self.id
    }

    fn index(&self) -> EntryIndex {
        EntryIndex {
            hospital_id: Some(self.hospital_id),
            patient_id: Some(self.patient_id),
            actor_id: self.doctor_id,
            status: Some(self.status.to_string()),
            ..Default::default()
        }
    }

    timestamps!();
}

impl Entry for MessageThread {
    const TABLE: &'static str = "message_threads";
    const KIND: &'static str = "Thread";

    fn id(&self) -> Uuid {
        self.id
    }

    fn index(&self) -> EntryIndex {
        EntryIndex {
            hospital_id: self.hospital_id,
            patient_id: self.patient_id,
            actor_id: Some(self.created_by),
            ..Default::default()
        }
    }

    timestamps!();
}

impl Entry for Message {
    const TABLE: &'static str = "messages";
    const KIND: &'static str = "Message";

    fn id(&self) -> Uuid {
        self.id
    }

    fn index(&self) -> EntryIndex {
        EntryIndex {
            parent_id: Some(self.thread_id),
            actor_id: Some(self.sender_id),
            ..Default::default()
        }
    }

    timestamps!();
}

impl Entry for StoredFile {
    const TABLE: &'static str = "files";
    const KIND: &'static str = "File";

    fn id(&self) -> Uuid {
        self.id
    }

    fn index(&self) -> EntryIndex {
        EntryIndex {
            hospital_id: self.hospital_id,
            patient_id: self.patient_id,
            actor_id: Some(self.uploaded_by),
            ..Default::default()
        }
    }

    timestamps!();
}

impl Entry for AccessLogEntry {
    const TABLE: &'static str = "audit_log";
    const KIND: &'static str = "Audit entry";

    fn id(&self) -> Uuid {
        self.id
    }

    fn index(&self) -> EntryIndex {
        EntryIndex {
            hospital_id: self.hospital_id,
            patient_id: self.patient_id,
            actor_id: Some(self.accessor_id),
            status: Some(self.access_type.to_string()),
            ..Default::default()
        }
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.accessed_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.accessed_at
    }
}
