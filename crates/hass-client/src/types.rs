//! Request bodies and server-specific response shapes. Stored records
//! themselves come from `hass_integrity`.

use chrono::{DateTime, Utc};
use hass_integrity::{
    AppointmentStatus, BedOccupancy, BedType, BloodGroup, CaseSheetEvent, CaseSheetEventType, CaseSheetSections,
    EmergencyContact, Gender, LabPriority, LabResultValue, LabTestStatus, MedicationRoute, NurseLogType, PendingEvent,
    User, Vitals, VitalsFinding, VisitType,
};
use hass_shared::{DataCategory, Permission, Role};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// ==================== AUTH ====================

#[derive(Clone, Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_code: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: User,
    pub redirect_to: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MeResponse {
    pub user: User,
    pub dashboard: String,
    pub permissions: BTreeMap<DataCategory, Vec<Permission>>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TwoFactorSetup {
    pub secret: String,
    pub otpauth_uri: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TwoFactorStatus {
    pub two_factor_enabled: bool,
}

// ==================== PATIENTS & VISITS ====================

#[derive(Clone, Debug, Serialize)]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    /// YYYY-MM-DD
    pub date_of_birth: String,
    pub gender: Gender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_group: Option<BloodGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_contact: Option<EmergencyContact>,
    pub allergies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hospital_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
}

impl NewPatient {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        date_of_birth: impl Into<String>,
        gender: Gender,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            date_of_birth: date_of_birth.into(),
            gender,
            blood_group: None,
            phone: None,
            email: None,
            address: None,
            emergency_contact: None,
            allergies: Vec::new(),
            hospital_id: None,
            user_id: None,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct PatientUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_group: Option<BloodGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_contact: Option<EmergencyContact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allergies: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
}

#[derive(Clone, Debug, Serialize)]
pub struct NewVisit {
    pub patient_id: Uuid,
    pub visit_type: VisitType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attending_doctor_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chief_complaint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    pub admit: bool,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct AdmitVisit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attending_doctor_id: Option<Uuid>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct DischargeVisit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discharge_summary: Option<String>,
}

/// Vitals reading plus its display badge
#[derive(Clone, Debug, Deserialize)]
pub struct BadgedVitals {
    #[serde(flatten)]
    pub vitals: Vitals,
    pub badge: String,
    #[serde(default)]
    pub findings: Vec<VitalsFinding>,
}

// ==================== CLINICAL ====================

#[derive(Clone, Debug, Default, Serialize)]
pub struct NewVitals {
    pub patient_id: Uuid,
    pub visit_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_pressure_systolic: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_pressure_diastolic: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spo2: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub respiratory_rate: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height_cm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pain_score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct NewPrescription {
    pub patient_id: Uuid,
    pub visit_id: Uuid,
    pub medication_name: String,
    pub dosage: String,
    pub frequency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<MedicationRoute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct NewLabTest {
    pub patient_id: Uuid,
    pub visit_id: Uuid,
    pub test_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specimen_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<LabPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinical_notes: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct LabStatusUpdate {
    pub status: LabTestStatus,
}

#[derive(Clone, Debug, Serialize)]
pub struct LabResults {
    pub results: Vec<LabResultValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_summary: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct NewNurseLog {
    pub patient_id: Uuid,
    pub visit_id: Uuid,
    pub log_type: NurseLogType,
    pub notes: String,
}

// ==================== APPOINTMENTS & BEDS ====================

#[derive(Clone, Debug, Serialize)]
pub struct NewAppointment {
    /// Omit to book for the signed-in patient
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AppointmentStatusUpdate {
    pub status: AppointmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct NewBed {
    pub ward: String,
    pub bed_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bed_type: Option<BedType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hospital_id: Option<Uuid>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Occupancy {
    #[serde(flatten)]
    pub counts: BedOccupancy,
    pub occupancy_rate: f64,
}

// ==================== CASE SHEETS ====================

#[derive(Clone, Debug, Serialize)]
pub struct NewCaseSheet {
    pub patient_id: Uuid,
    pub visit_id: Uuid,
    #[serde(flatten)]
    pub sections: CaseSheetSections,
}

#[derive(Clone, Debug, Serialize)]
pub struct NewCaseSheetEvent {
    pub event_type: CaseSheetEventType,
    pub description: String,
    pub requires_acknowledgment: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct Acknowledgment {
    pub event_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// An event by its position in a case sheet timeline
#[derive(Clone, Debug, Deserialize)]
pub struct EventRef {
    pub case_sheet_id: Uuid,
    pub event_index: usize,
    pub event: CaseSheetEvent,
}

/// Pending discharge request as shown at reception
#[derive(Clone, Debug, Deserialize)]
pub struct DischargeRequestView {
    #[serde(flatten)]
    pub pending: PendingEvent,
    pub patient_name: String,
    pub mrn: String,
}

// ==================== MESSAGES ====================

#[derive(Clone, Debug, Serialize)]
pub struct NewThread {
    pub subject: String,
    pub participant_ids: Vec<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ReadReceipt {
    pub marked_read: usize,
}

// ==================== ADMIN ====================

#[derive(Clone, Debug, Serialize)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hospital_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hospital_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct NewHospital {
    pub name: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct NewRegion {
    pub name: String,
    pub code: String,
}

// ==================== ANALYTICS & BILLING ====================

#[derive(Clone, Debug, Deserialize)]
pub struct AnalyticsSummary {
    pub patients: usize,
    pub visits_by_status: BTreeMap<String, usize>,
    pub beds: BedOccupancy,
    pub bed_occupancy_rate: f64,
    pub prescriptions_by_status: BTreeMap<String, usize>,
    pub pending_lab_tests: usize,
    pub critical_vitals: usize,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DashboardCard {
    pub key: String,
    pub label: String,
    pub value: serde_json::Value,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DashboardSummary {
    pub role: Role,
    pub dashboard: String,
    pub cards: Vec<DashboardCard>,
}

impl DashboardSummary {
    pub fn card(&self, key: &str) -> Option<&DashboardCard> {
        self.cards.iter().find(|card| card.key == key)
    }
}

/// What billing pages render until billing exists
#[derive(Clone, Debug, Deserialize)]
pub struct BillingState {
    pub available: bool,
    pub message: String,
    #[serde(default)]
    pub items: Vec<serde_json::Value>,
}

/// Query string for list endpoints
#[derive(Clone, Debug, Default, Serialize)]
pub struct ListParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visit_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hospital_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ListParams {
    pub fn for_patient(patient_id: Uuid) -> Self {
        Self {
            patient_id: Some(patient_id),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: impl ToString) -> Self {
        self.status = Some(status.to_string());
        self
    }
}

/// Query string for `/admin/users`
#[derive(Clone, Debug, Default, Serialize)]
pub struct UserListParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hospital_id: Option<Uuid>,
}
