//! `/visits`: episodes of care and their admit/discharge transitions.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use hass_integrity::{
    transition, validate_visit, Bed, BedStatus, Patient, Visit, VisitStatus, VisitType,
};
use hass_shared::{DataCategory, PaginatedResult, Permission};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::{case_sheets, ListQuery};
use crate::access::{self, load_patient, log_data_access, require_authorization};
use crate::auth::Caller;
use crate::error::ApiResult;
use crate::extract::{Json, Path, Query};
use crate::store::Filter;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_visits).post(create_visit))
        .route("/{id}", get(get_visit))
        .route("/{id}/admit", post(admit_visit))
        .route("/{id}/discharge", post(discharge_visit))
}

#[derive(Debug, Deserialize)]
pub struct CreateVisitRequest {
    pub patient_id: Uuid,
    pub visit_type: VisitType,
    pub attending_doctor_id: Option<Uuid>,
    pub chief_complaint: Option<String>,
    pub department: Option<String>,
    /// Admit immediately instead of leaving the visit pending
    #[serde(default)]
    pub admit: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdmitRequest {
    pub department: Option<String>,
    pub attending_doctor_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DischargeRequest {
    pub discharge_summary: Option<String>,
}

/// Load a visit and its patient, checking the caller may see the patient.
pub async fn load_visit(
    state: &AppState,
    caller: &Caller,
    visit_id: Uuid,
    category: DataCategory,
    permission: Permission,
) -> ApiResult<(Visit, Patient)> {
    require_authorization(caller, category, permission)?;
    let visit: Visit = state.store.get(visit_id).await?;
    let patient: Patient = state.store.get(visit.patient_id).await?;
    access::ensure_patient_access(state, caller, &patient).await?;
    Ok((visit, patient))
}

async fn create_visit(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(input): Json<CreateVisitRequest>,
) -> ApiResult<(StatusCode, Json<Visit>)> {
    let patient = load_patient(&state, &caller, input.patient_id, DataCategory::Visits, Permission::Write).await?;
    if let Some(doctor_id) = input.attending_doctor_id {
        access::ensure_doctor_at(&state, patient.hospital_id, doctor_id).await?;
    }

    let now = Utc::now();
    let mut visit = Visit {
        id: Uuid::new_v4(),
        patient_id: patient.id,
        hospital_id: patient.hospital_id,
        visit_type: input.visit_type,
        status: VisitStatus::Pending,
        attending_doctor_id: input.attending_doctor_id,
        chief_complaint: input.chief_complaint,
        department: input.department,
        admitted_at: None,
        discharged_at: None,
        discharge_summary: None,
        created_by: caller.id(),
        created_at: now,
        updated_at: now,
    };
    if input.admit {
        visit.status = transition("Visit", visit.status, VisitStatus::Admitted)?;
        visit.admitted_at = Some(now);
    }
    validate_visit(&visit).into_result()?;
    state.store.create(&visit).await?;

    log_data_access(
        &state,
        &caller,
        Some(patient.id),
        Some(patient.hospital_id),
        vec![DataCategory::Visits],
        Permission::Write,
        "POST /visits",
    )
    .await?;
    tracing::info!(visit = %visit.id, patient = %patient.id, visit_type = %visit.visit_type, "visit opened");

    Ok((StatusCode::CREATED, Json(visit)))
}

async fn list_visits(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PaginatedResult<Visit>>> {
    require_authorization(&caller, DataCategory::Visits, Permission::Read)?;
    let filter = query.narrow(access::scope_filter(&state, &caller).await?);
    Ok(Json(state.store.list(&filter, &query.pagination()?).await?))
}

async fn get_visit(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Visit>> {
    let (visit, _) = load_visit(&state, &caller, id, DataCategory::Visits, Permission::Read).await?;
    Ok(Json(visit))
}

async fn admit_visit(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    body: Option<Json<AdmitRequest>>,
) -> ApiResult<Json<Visit>> {
    let (mut visit, patient) = load_visit(&state, &caller, id, DataCategory::Visits, Permission::Write).await?;
    let input = body.map(|Json(b)| b).unwrap_or_default();
    if let Some(doctor_id) = input.attending_doctor_id {
        access::ensure_doctor_at(&state, visit.hospital_id, doctor_id).await?;
    }

    let from = visit.status;
    let now = Utc::now();
    visit.status = transition("Visit", from, VisitStatus::Admitted)?;
    visit.admitted_at = Some(now);
    if input.department.is_some() {
        visit.department = input.department;
    }
    if input.attending_doctor_id.is_some() {
        visit.attending_doctor_id = input.attending_doctor_id;
    }
    visit.updated_at = now;
    validate_visit(&visit).into_result()?;
    state.store.update_from_status(&visit, &from.to_string()).await?;

    log_data_access(
        &state,
        &caller,
        Some(patient.id),
        Some(visit.hospital_id),
        vec![DataCategory::Visits],
        Permission::Write,
        "POST /visits/{id}/admit",
    )
    .await?;
    Ok(Json(visit))
}

async fn discharge_visit(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    body: Option<Json<DischargeRequest>>,
) -> ApiResult<Json<Visit>> {
    let (mut visit, patient) = load_visit(&state, &caller, id, DataCategory::Visits, Permission::Write).await?;
    let input = body.map(|Json(b)| b).unwrap_or_default();

    let from = visit.status;
    let now = Utc::now();
    visit.status = transition("Visit", from, VisitStatus::Discharged)?;
    visit.discharged_at = Some(now);
    if input.discharge_summary.is_some() {
        visit.discharge_summary = input.discharge_summary;
    }
    visit.updated_at = now;
    validate_visit(&visit).into_result()?;
    state.store.update_from_status(&visit, &from.to_string()).await?;

    // A discharged visit no longer holds a bed
    let occupied = Filter {
        visit_id: Some(visit.id),
        status: Some(BedStatus::Occupied.to_string()),
        ..Default::default()
    };
    for mut bed in state.store.list_all::<Bed>(&occupied).await? {
        bed.status = transition("Bed", bed.status, BedStatus::Available)?;
        bed.patient_id = None;
        bed.visit_id = None;
        bed.assigned_at = None;
        bed.updated_at = now;
        state.store.update_from_status(&bed, &BedStatus::Occupied.to_string()).await?;
        tracing::info!(bed = %bed.id, "bed released on discharge");
    }
    case_sheets::settle_discharge_requests(&state, &caller, visit.id, visit.discharge_summary.clone()).await?;

    log_data_access(
        &state,
        &caller,
        Some(patient.id),
        Some(visit.hospital_id),
        vec![DataCategory::Visits],
        Permission::Write,
        "POST /visits/{id}/discharge",
    )
    .await?;
    tracing::info!(visit = %visit.id, "visit discharged");
    Ok(Json(visit))
}
