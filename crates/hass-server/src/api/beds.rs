//! `/beds`: ward inventory, assignment, occupancy.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use hass_integrity::{transition, validate_bed, Bed, BedOccupancy, BedStatus, BedType};
use hass_shared::{DataCategory, PaginatedResult, Permission};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::ListQuery;
use crate::access::{self, log_data_access, require_authorization};
use crate::auth::Caller;
use crate::error::{ApiResult, AppError};
use crate::extract::{Json, Path, Query};
use crate::store::Filter;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_beds).post(create_bed))
        .route("/occupancy", get(occupancy))
        .route("/{id}", get(get_bed))
        .route("/{id}/assign", post(assign_bed))
        .route("/{id}/release", post(release_bed))
        .route("/{id}/maintenance", post(maintenance_bed))
}

#[derive(Debug, Deserialize)]
pub struct CreateBedRequest {
    pub ward: String,
    pub bed_number: String,
    #[serde(default = "default_bed_type")]
    pub bed_type: BedType,
    pub hospital_id: Option<Uuid>,
}

fn default_bed_type() -> BedType {
    BedType::General
}

#[derive(Debug, Deserialize)]
pub struct AssignBedRequest {
    pub patient_id: Uuid,
    pub visit_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct OccupancyResponse {
    #[serde(flatten)]
    pub counts: BedOccupancy,
    pub occupancy_rate: f64,
}

impl From<BedOccupancy> for OccupancyResponse {
    fn from(counts: BedOccupancy) -> Self {
        Self {
            occupancy_rate: counts.rate(),
            counts,
        }
    }
}

async fn load_bed(state: &AppState, caller: &Caller, id: Uuid, permission: Permission) -> ApiResult<Bed> {
    require_authorization(caller, DataCategory::Beds, permission)?;
    let bed: Bed = state.store.get(id).await?;
    access::ensure_hospital(state, caller, bed.hospital_id).await?;
    Ok(bed)
}

/// Persist a bed status change against the status it was read in.
async fn save_transition(state: &AppState, caller: &Caller, bed: &Bed, from: BedStatus, action: &str) -> ApiResult<()> {
    validate_bed(bed).into_result()?;
    state.store.update_from_status(bed, &from.to_string()).await?;
    log_data_access(
        state,
        caller,
        bed.patient_id,
        Some(bed.hospital_id),
        vec![DataCategory::Beds],
        Permission::Write,
        action,
    )
    .await?;
    tracing::info!(bed = %bed.id, from = %from, to = %bed.status, "bed updated");
    Ok(())
}

async fn create_bed(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(input): Json<CreateBedRequest>,
) -> ApiResult<(StatusCode, Json<Bed>)> {
    require_authorization(&caller, DataCategory::Beds, Permission::Manage)?;
    let hospital_id = input
        .hospital_id
        .or(caller.hospital_id())
        .ok_or_else(|| AppError::validation("hospital_id is required"))?;
    access::ensure_hospital(&state, &caller, hospital_id).await?;

    let now = Utc::now();
    let bed = Bed {
        id: Uuid::new_v4(),
        hospital_id,
        ward: input.ward.trim().to_string(),
        bed_number: input.bed_number.trim().to_string(),
        bed_type: input.bed_type,
        status: BedStatus::Available,
        patient_id: None,
        visit_id: None,
        assigned_at: None,
        created_at: now,
        updated_at: now,
    };
    validate_bed(&bed).into_result()?;
    state.store.create(&bed).await?;
    Ok((StatusCode::CREATED, Json(bed)))
}

async fn list_beds(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PaginatedResult<Bed>>> {
    require_authorization(&caller, DataCategory::Beds, Permission::Read)?;
    let scope = Filter {
        hospital_in: access::hospital_scope(&state, &caller).await?,
        ..Default::default()
    };
    let filter = query.narrow(scope);
    Ok(Json(state.store.list(&filter, &query.pagination()?).await?))
}

async fn occupancy(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<OccupancyResponse>> {
    require_authorization(&caller, DataCategory::Beds, Permission::Read)?;
    let scope = Filter {
        hospital_in: access::hospital_scope(&state, &caller).await?,
        ..Default::default()
    };
    let beds: Vec<Bed> = state.store.list_all(&query.narrow(scope)).await?;
    Ok(Json(BedOccupancy::from_beds(&beds).into()))
}

async fn get_bed(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Bed>> {
    Ok(Json(load_bed(&state, &caller, id, Permission::Read).await?))
}

async fn assign_bed(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(input): Json<AssignBedRequest>,
) -> ApiResult<Json<Bed>> {
    let mut bed = load_bed(&state, &caller, id, Permission::Write).await?;
    let patient = access::load_patient(&state, &caller, input.patient_id, DataCategory::Visits, Permission::Read).await?;
    let visit = access::load_open_visit_of(&state, &patient, input.visit_id).await?;
    if visit.hospital_id != bed.hospital_id {
        return Err(AppError::validation("Bed and visit belong to different hospitals"));
    }

    let from = bed.status;
    let now = Utc::now();
    bed.status = transition("Bed", from, BedStatus::Occupied)?;
    bed.patient_id = Some(patient.id);
    bed.visit_id = Some(visit.id);
    bed.assigned_at = Some(now);
    bed.updated_at = now;
    save_transition(&state, &caller, &bed, from, "POST /beds/{id}/assign").await?;
    Ok(Json(bed))
}

async fn release_bed(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Bed>> {
    let mut bed = load_bed(&state, &caller, id, Permission::Write).await?;
    let from = bed.status;
    bed.status = transition("Bed", from, BedStatus::Available)?;
    bed.patient_id = None;
    bed.visit_id = None;
    bed.assigned_at = None;
    bed.updated_at = Utc::now();
    save_transition(&state, &caller, &bed, from, "POST /beds/{id}/release").await?;
    Ok(Json(bed))
}

async fn maintenance_bed(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Bed>> {
    let mut bed = load_bed(&state, &caller, id, Permission::Write).await?;
    let from = bed.status;
    bed.status = transition("Bed", from, BedStatus::Maintenance)?;
    bed.updated_at = Utc::now();
    save_transition(&state, &caller, &bed, from, "POST /beds/{id}/maintenance").await?;
    Ok(Json(bed))
}
