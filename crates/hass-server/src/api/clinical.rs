//! `/clinical`: vitals, prescriptions, lab tests, nurse logs.
//!
//! Every record is attached to an open visit of the patient it names.
//! Status changes go through the record's lifecycle and are persisted with
//! a guarded update, so two callers racing on the same transition get one
//! success and one 409.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use hass_integrity::{
    transition, validate_lab_test, validate_nurse_log, validate_prescription, validate_vitals, LabPriority,
    LabResultValue, LabFlag, LabTest, LabTestStatus, MedicationRoute, NotificationType, NurseLog, NurseLogStatus,
    NurseLogType, Patient, Prescription, PrescriptionStatus, PushPayload, VitalsFinding, Vitals, VitalsSeverity,
};
use hass_shared::{DataCategory, PaginatedResult, Permission};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::ListQuery;
use crate::access::{self, load_patient, log_data_access, require_authorization};
use crate::auth::Caller;
use crate::error::ApiResult;
use crate::extract::{Json, Path, Query};
use crate::store::Entry;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/vitals", get(list_vitals).post(record_vitals))
        .route("/vitals/{id}", get(get_vitals))
        .route("/prescriptions", get(list_prescriptions).post(create_prescription))
        .route("/prescriptions/{id}", get(get_prescription))
        .route("/prescriptions/{id}/dispense", post(dispense_prescription))
        .route("/prescriptions/{id}/administer", post(administer_prescription))
        .route("/prescriptions/{id}/cancel", post(cancel_prescription))
        .route("/lab-tests", get(list_lab_tests).post(order_lab_test))
        .route("/lab-tests/{id}", get(get_lab_test))
        .route("/lab-tests/{id}/status", post(update_lab_status))
        .route("/lab-tests/{id}/results", post(record_lab_results))
        .route("/nurse-logs", get(list_nurse_logs).post(create_nurse_log))
        .route("/nurse-logs/{id}/resolve", post(resolve_nurse_log))
}

/// Load a record by id and check the caller may see its patient.
async fn load_record<T: Entry>(
    state: &AppState,
    caller: &Caller,
    id: Uuid,
    category: DataCategory,
    permission: Permission,
    patient_of: impl Fn(&T) -> Uuid,
) -> ApiResult<(T, Patient)> {
    require_authorization(caller, category, permission)?;
    let record: T = state.store.get(id).await?;
    let patient: Patient = state.store.get(patient_of(&record)).await?;
    access::ensure_patient_access(state, caller, &patient).await?;
    Ok((record, patient))
}

async fn list_scoped<T: Entry>(
    state: &AppState,
    caller: &Caller,
    query: &ListQuery,
    category: DataCategory,
) -> ApiResult<PaginatedResult<T>> {
    require_authorization(caller, category, Permission::Read)?;
    let filter = query.narrow(access::scope_filter(state, caller).await?);
    Ok(state.store.list(&filter, &query.pagination()?).await?)
}

fn patient_url(patient_id: Uuid) -> String {
    format!("/patients/{}", patient_id)
}

// ============================================================================
// VITALS
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RecordVitalsRequest {
    pub patient_id: Uuid,
    pub visit_id: Uuid,
    pub blood_pressure_systolic: Option<u16>,
    pub blood_pressure_diastolic: Option<u16>,
    pub heart_rate: Option<u16>,
    pub temperature: Option<f64>,
    pub spo2: Option<u8>,
    pub respiratory_rate: Option<u16>,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub pain_score: Option<u8>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VitalsResponse {
    #[serde(flatten)]
    pub vitals: Vitals,
    pub badge: &'static str,
    pub findings: Vec<VitalsFinding>,
}

impl From<Vitals> for VitalsResponse {
    fn from(vitals: Vitals) -> Self {
        let assessment = vitals.assess();
        Self {
            badge: vitals.severity.badge(),
            findings: assessment.findings,
            vitals,
        }
    }
}

async fn record_vitals(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(input): Json<RecordVitalsRequest>,
) -> ApiResult<(StatusCode, Json<VitalsResponse>)> {
    let patient = load_patient(&state, &caller, input.patient_id, DataCategory::VitalSigns, Permission::Write).await?;
    let visit = access::load_open_visit_of(&state, &patient, input.visit_id).await?;

    let now = Utc::now();
    let mut vitals = Vitals {
        id: Uuid::new_v4(),
        patient_id: patient.id,
        visit_id: visit.id,
        hospital_id: visit.hospital_id,
        recorded_by: caller.id(),
        blood_pressure_systolic: input.blood_pressure_systolic,
        blood_pressure_diastolic: input.blood_pressure_diastolic,
        heart_rate: input.heart_rate,
        temperature: input.temperature,
        spo2: input.spo2,
        respiratory_rate: input.respiratory_rate,
        weight_kg: input.weight_kg,
        height_cm: input.height_cm,
        pain_score: input.pain_score,
        notes: input.notes,
        severity: VitalsSeverity::Normal,
        created_at: now,
        updated_at: now,
    };
    validate_vitals(&vitals).into_result()?;
    let assessment = vitals.assess();
    vitals.severity = assessment.severity;
    state.store.create(&vitals).await?;

    if vitals.severity == VitalsSeverity::Critical {
        let summary = assessment
            .findings
            .iter()
            .filter(|f| f.severity == VitalsSeverity::Critical)
            .map(|f| format!("{} {}", f.parameter, f.value))
            .collect::<Vec<_>>()
            .join(", ");
        state.alerts.publish(
            PushPayload::new(
                NotificationType::EmergencyAlert,
                format!("Critical vitals: {}", patient.full_name()),
                summary,
            )
            .with_url(patient_url(patient.id))
            .for_patient(patient.id, vitals.id)
            .in_hospital(vitals.hospital_id),
        );
        tracing::warn!(patient = %patient.id, vitals = %vitals.id, "critical vitals recorded");
    }

    log_data_access(
        &state,
        &caller,
        Some(patient.id),
        Some(vitals.hospital_id),
        vec![DataCategory::VitalSigns],
        Permission::Write,
        "POST /clinical/vitals",
    )
    .await?;

    Ok((StatusCode::CREATED, Json(vitals.into())))
}

async fn list_vitals(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PaginatedResult<VitalsResponse>>> {
    let page = list_scoped::<Vitals>(&state, &caller, &query, DataCategory::VitalSigns).await?;
    Ok(Json(page.map(VitalsResponse::from)))
}

async fn get_vitals(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<VitalsResponse>> {
    let (vitals, patient) =
        load_record::<Vitals>(&state, &caller, id, DataCategory::VitalSigns, Permission::Read, |v| v.patient_id)
            .await?;
    log_data_access(
        &state,
        &caller,
        Some(patient.id),
        Some(vitals.hospital_id),
        vec![DataCategory::VitalSigns],
        Permission::Read,
        "GET /clinical/vitals/{id}",
    )
    .await?;
    Ok(Json(vitals.into()))
}

// ============================================================================
// PRESCRIPTIONS
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreatePrescriptionRequest {
    pub patient_id: Uuid,
    pub visit_id: Uuid,
    pub medication_name: String,
    pub dosage: String,
    pub frequency: String,
    #[serde(default = "default_route")]
    pub route: MedicationRoute,
    pub duration_days: Option<u32>,
    pub quantity: Option<u32>,
    pub instructions: Option<String>,
}

fn default_route() -> MedicationRoute {
    MedicationRoute::Oral
}

#[derive(Debug, Default, Deserialize)]
pub struct AdministerRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

async fn create_prescription(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(input): Json<CreatePrescriptionRequest>,
) -> ApiResult<(StatusCode, Json<Prescription>)> {
    let patient = load_patient(&state, &caller, input.patient_id, DataCategory::Medications, Permission::Write).await?;
    let visit = access::load_open_visit_of(&state, &patient, input.visit_id).await?;

    let now = Utc::now();
    let rx = Prescription {
        id: Uuid::new_v4(),
        patient_id: patient.id,
        visit_id: visit.id,
        hospital_id: visit.hospital_id,
        prescribed_by: caller.id(),
        medication_name: input.medication_name.trim().to_string(),
        dosage: input.dosage.trim().to_string(),
        frequency: input.frequency.trim().to_string(),
        route: input.route,
        duration_days: input.duration_days,
        quantity: input.quantity,
        instructions: input.instructions,
        status: PrescriptionStatus::Active,
        dispensed_by: None,
        dispensed_at: None,
        administered_by: None,
        administered_at: None,
        administration_notes: None,
        cancelled_by: None,
        cancellation_reason: None,
        created_at: now,
        updated_at: now,
    };
    validate_prescription(&rx).into_result()?;
    state.store.create(&rx).await?;

    log_data_access(
        &state,
        &caller,
        Some(patient.id),
        Some(rx.hospital_id),
        vec![DataCategory::Medications],
        Permission::Write,
        "POST /clinical/prescriptions",
    )
    .await?;
    tracing::info!(prescription = %rx.id, medication = %rx.medication_name, "prescription created");

    Ok((StatusCode::CREATED, Json(rx)))
}

async fn list_prescriptions(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PaginatedResult<Prescription>>> {
    Ok(Json(list_scoped(&state, &caller, &query, DataCategory::Medications).await?))
}

async fn get_prescription(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Prescription>> {
    let (rx, _) = load_record::<Prescription>(&state, &caller, id, DataCategory::Medications, Permission::Read, |rx| {
        rx.patient_id
    })
    .await?;
    Ok(Json(rx))
}

/// Apply a prescription status change and persist it against the old status.
async fn move_prescription(
    state: &AppState,
    caller: &Caller,
    mut rx: Prescription,
    next: PrescriptionStatus,
    permission: Permission,
    action: &str,
    apply: impl FnOnce(&mut Prescription),
) -> ApiResult<Prescription> {
    let from = rx.status;
    rx.status = transition("Prescription", from, next)?;
    apply(&mut rx);
    rx.updated_at = Utc::now();
    validate_prescription(&rx).into_result()?;
    state.store.update_from_status(&rx, &from.to_string()).await?;

    log_data_access(
        state,
        caller,
        Some(rx.patient_id),
        Some(rx.hospital_id),
        vec![DataCategory::Medications],
        permission,
        action,
    )
    .await?;
    tracing::info!(prescription = %rx.id, from = %from, to = %rx.status, "prescription updated");
    Ok(rx)
}

async fn dispense_prescription(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Prescription>> {
    let (rx, _) = load_record::<Prescription>(&state, &caller, id, DataCategory::Medications, Permission::Dispense, |rx| {
        rx.patient_id
    })
    .await?;
    let by = caller.id();
    let rx = move_prescription(
        &state,
        &caller,
        rx,
        PrescriptionStatus::Dispensed,
        Permission::Dispense,
        "POST /clinical/prescriptions/{id}/dispense",
        |rx| {
            rx.dispensed_by = Some(by);
            rx.dispensed_at = Some(Utc::now());
        },
    )
    .await?;

    state.alerts.publish(
        PushPayload::new(
            NotificationType::Medication,
            "Medication dispensed",
            format!("{} {} is ready to administer", rx.medication_name, rx.dosage),
        )
        .with_url(patient_url(rx.patient_id))
        .for_patient(rx.patient_id, rx.id)
        .in_hospital(rx.hospital_id),
    );
    Ok(Json(rx))
}

async fn administer_prescription(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    body: Option<Json<AdministerRequest>>,
) -> ApiResult<Json<Prescription>> {
    let input = body.map(|Json(b)| b).unwrap_or_default();
    let (rx, _) = load_record::<Prescription>(
        &state,
        &caller,
        id,
        DataCategory::Medications,
        Permission::Administer,
        |rx| rx.patient_id,
    )
    .await?;
    let by = caller.id();
    let rx = move_prescription(
        &state,
        &caller,
        rx,
        PrescriptionStatus::Administered,
        Permission::Administer,
        "POST /clinical/prescriptions/{id}/administer",
        |rx| {
            rx.administered_by = Some(by);
            rx.administered_at = Some(Utc::now());
            rx.administration_notes = input.notes;
        },
    )
    .await?;
    Ok(Json(rx))
}

async fn cancel_prescription(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    body: Option<Json<CancelRequest>>,
) -> ApiResult<Json<Prescription>> {
    let input = body.map(|Json(b)| b).unwrap_or_default();
    let (rx, _) = load_record::<Prescription>(&state, &caller, id, DataCategory::Medications, Permission::Write, |rx| {
        rx.patient_id
    })
    .await?;
    let by = caller.id();
    let rx = move_prescription(
        &state,
        &caller,
        rx,
        PrescriptionStatus::Cancelled,
        Permission::Write,
        "POST /clinical/prescriptions/{id}/cancel",
        |rx| {
            rx.cancelled_by = Some(by);
            rx.cancellation_reason = input.reason;
        },
    )
    .await?;
    Ok(Json(rx))
}

// ============================================================================
// LAB TESTS
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct OrderLabTestRequest {
    pub patient_id: Uuid,
    pub visit_id: Uuid,
    pub test_name: String,
    pub test_code: Option<String>,
    pub specimen_type: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: LabPriority,
    pub clinical_notes: Option<String>,
}

fn default_priority() -> LabPriority {
    LabPriority::Routine
}

#[derive(Debug, Deserialize)]
pub struct LabStatusRequest {
    pub status: LabTestStatus,
}

#[derive(Debug, Deserialize)]
pub struct LabResultsRequest {
    #[serde(default)]
    pub results: Vec<LabResultValue>,
    pub result_summary: Option<String>,
}

async fn order_lab_test(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(input): Json<OrderLabTestRequest>,
) -> ApiResult<(StatusCode, Json<LabTest>)> {
    let patient = load_patient(&state, &caller, input.patient_id, DataCategory::LabResults, Permission::Write).await?;
    let visit = access::load_open_visit_of(&state, &patient, input.visit_id).await?;

    let now = Utc::now();
    let test = LabTest {
        id: Uuid::new_v4(),
        patient_id: patient.id,
        visit_id: visit.id,
        hospital_id: visit.hospital_id,
        ordered_by: caller.id(),
        test_name: input.test_name.trim().to_string(),
        test_code: input.test_code,
        specimen_type: input.specimen_type,
        priority: input.priority,
        clinical_notes: input.clinical_notes,
        status: LabTestStatus::Ordered,
        results: Vec::new(),
        result_summary: None,
        is_critical: false,
        performed_by: None,
        sample_collected_at: None,
        completed_at: None,
        created_at: now,
        updated_at: now,
    };
    validate_lab_test(&test).into_result()?;
    state.store.create(&test).await?;

    log_data_access(
        &state,
        &caller,
        Some(patient.id),
        Some(test.hospital_id),
        vec![DataCategory::LabResults],
        Permission::Write,
        "POST /clinical/lab-tests",
    )
    .await?;
    Ok((StatusCode::CREATED, Json(test)))
}

async fn list_lab_tests(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PaginatedResult<LabTest>>> {
    Ok(Json(list_scoped(&state, &caller, &query, DataCategory::LabResults).await?))
}

async fn get_lab_test(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<LabTest>> {
    let (test, patient) =
        load_record::<LabTest>(&state, &caller, id, DataCategory::LabResults, Permission::Read, |t| t.patient_id)
            .await?;
    log_data_access(
        &state,
        &caller,
        Some(patient.id),
        Some(test.hospital_id),
        vec![DataCategory::LabResults],
        Permission::Read,
        "GET /clinical/lab-tests/{id}",
    )
    .await?;
    Ok(Json(test))
}

async fn update_lab_status(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(input): Json<LabStatusRequest>,
) -> ApiResult<Json<LabTest>> {
    let (mut test, _) =
        load_record::<LabTest>(&state, &caller, id, DataCategory::LabResults, Permission::Write, |t| t.patient_id)
            .await?;

    let from = test.status;
    let now = Utc::now();
    test.status = transition("Lab test", from, input.status)?;
    match test.status {
        LabTestStatus::SampleCollected => test.sample_collected_at = Some(now),
        LabTestStatus::InProgress => test.performed_by = Some(caller.id()),
        LabTestStatus::Completed => test.completed_at = Some(now),
        _ => {}
    }
    test.updated_at = now;
    validate_lab_test(&test).into_result()?;
    state.store.update_from_status(&test, &from.to_string()).await?;

    log_data_access(
        &state,
        &caller,
        Some(test.patient_id),
        Some(test.hospital_id),
        vec![DataCategory::LabResults],
        Permission::Write,
        "POST /clinical/lab-tests/{id}/status",
    )
    .await?;
    Ok(Json(test))
}

/// Record results and complete the test. A test still awaiting processing
/// is moved through `in_progress` first.
async fn record_lab_results(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(input): Json<LabResultsRequest>,
) -> ApiResult<Json<LabTest>> {
    let (mut test, patient) =
        load_record::<LabTest>(&state, &caller, id, DataCategory::LabResults, Permission::Write, |t| t.patient_id)
            .await?;

    let from = test.status;
    let now = Utc::now();
    let mut status = from;
    if status == LabTestStatus::SampleCollected {
        status = transition("Lab test", status, LabTestStatus::InProgress)?;
    }
    test.status = transition("Lab test", status, LabTestStatus::Completed)?;
    test.is_critical = input.results.iter().any(|v| v.flag == LabFlag::Critical);
    test.results = input.results;
    test.result_summary = input.result_summary;
    test.performed_by = Some(caller.id());
    test.completed_at = Some(now);
    test.updated_at = now;
    validate_lab_test(&test).into_result()?;
    state.store.update_from_status(&test, &from.to_string()).await?;

    let (notification_type, title) = if test.is_critical {
        (NotificationType::EmergencyAlert, format!("Critical lab result: {}", patient.full_name()))
    } else {
        (NotificationType::LabResult, format!("Lab result ready: {}", patient.full_name()))
    };
    state.alerts.publish(
        PushPayload::new(notification_type, title, test.test_name.clone())
            .with_url(patient_url(patient.id))
            .for_patient(patient.id, test.id)
            .in_hospital(test.hospital_id),
    );

    log_data_access(
        &state,
        &caller,
        Some(patient.id),
        Some(test.hospital_id),
        vec![DataCategory::LabResults],
        Permission::Write,
        "POST /clinical/lab-tests/{id}/results",
    )
    .await?;
    Ok(Json(test))
}

// ============================================================================
// NURSE LOGS
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateNurseLogRequest {
    pub patient_id: Uuid,
    pub visit_id: Uuid,
    pub log_type: NurseLogType,
    pub notes: String,
}

async fn create_nurse_log(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(input): Json<CreateNurseLogRequest>,
) -> ApiResult<(StatusCode, Json<NurseLog>)> {
    let patient = load_patient(&state, &caller, input.patient_id, DataCategory::Nursing, Permission::Write).await?;
    let visit = access::load_open_visit_of(&state, &patient, input.visit_id).await?;

    let now = Utc::now();
    let log = NurseLog {
        id: Uuid::new_v4(),
        patient_id: patient.id,
        visit_id: visit.id,
        hospital_id: visit.hospital_id,
        recorded_by: caller.id(),
        log_type: input.log_type,
        notes: input.notes.trim().to_string(),
        status: NurseLogStatus::Open,
        resolved_by: None,
        resolved_at: None,
        created_at: now,
        updated_at: now,
    };
    validate_nurse_log(&log).into_result()?;
    state.store.create(&log).await?;

    log_data_access(
        &state,
        &caller,
        Some(patient.id),
        Some(log.hospital_id),
        vec![DataCategory::Nursing],
        Permission::Write,
        "POST /clinical/nurse-logs",
    )
    .await?;
    Ok((StatusCode::CREATED, Json(log)))
}

async fn list_nurse_logs(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PaginatedResult<NurseLog>>> {
    Ok(Json(list_scoped(&state, &caller, &query, DataCategory::Nursing).await?))
}

async fn resolve_nurse_log(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<NurseLog>> {
    let (mut log, _) =
        load_record::<NurseLog>(&state, &caller, id, DataCategory::Nursing, Permission::Write, |l| l.patient_id)
            .await?;

    let from = log.status;
    let now = Utc::now();
    log.status = transition("Nurse log", from, NurseLogStatus::Resolved)?;
    log.resolved_by = Some(caller.id());
    log.resolved_at = Some(now);
    log.updated_at = now;
    state.store.update_from_status(&log, &from.to_string()).await?;

    log_data_access(
        &state,
        &caller,
        Some(log.patient_id),
        Some(log.hospital_id),
        vec![DataCategory::Nursing],
        Permission::Write,
        "POST /clinical/nurse-logs/{id}/resolve",
    )
    .await?;
    Ok(Json(log))
}
