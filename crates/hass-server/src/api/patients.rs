//! `/patients`: registration, demographics, per-patient views.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use hass_integrity::{
    format_mrn, validate_patient, BloodGroup, EmergencyContact, Gender, Patient, Visit, Vitals,
};
use hass_shared::{DataCategory, PaginatedResult, Permission, Role};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::ListQuery;
use crate::access::{self, load_patient, log_data_access, require_authorization};
use crate::auth::Caller;
use crate::error::{ApiResult, AppError};
use crate::extract::{Json, Path, Query};
use crate::store::{Filter, StoreError};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_patients).post(create_patient))
        .route("/me", get(my_record))
        .route("/mrn/{mrn}", get(get_by_mrn))
        .route("/{id}", get(get_patient).patch(update_patient))
        .route("/{id}/visits", get(patient_visits))
        .route("/{id}/vitals/recent", get(recent_vitals))
}

const MRN_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const MRN_ATTEMPTS: usize = 5;

fn mrn_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..5)
        .map(|_| MRN_ALPHABET[rng.gen_range(0..MRN_ALPHABET.len())] as char)
        .collect()
}

/// Assign a fresh MRN and store the patient, retrying on collision.
pub async fn register(state: &AppState, patient: Patient) -> ApiResult<Patient> {
    register_with(state, patient, mrn_suffix).await
}

/// [`register`] with MRN suffixes drawn from `next_suffix`
pub async fn register_with(
    state: &AppState,
    mut patient: Patient,
    mut next_suffix: impl FnMut() -> String,
) -> ApiResult<Patient> {
    for _ in 0..MRN_ATTEMPTS {
        patient.mrn = format_mrn(patient.created_at.date_naive(), &next_suffix());
        validate_patient(&patient).into_result()?;
        match state.store.create(&patient).await {
            Ok(()) => return Ok(patient),
            Err(StoreError::Duplicate(_)) => {
                tracing::debug!(mrn = %patient.mrn, "MRN collision, retrying");
            }
            Err(err) => return Err(err.into()),
        }
    }
    Err(AppError::Conflict("Could not allocate a unique MRN".to_string()))
}

#[derive(Debug, Deserialize)]
pub struct CreatePatientRequest {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
    pub gender: Gender,
    pub blood_group: Option<BloodGroup>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<EmergencyContact>,
    #[serde(default)]
    pub allergies: Vec<String>,
    /// Required for callers not attached to a hospital
    pub hospital_id: Option<Uuid>,
    /// Portal account to link
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePatientRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<Gender>,
    pub blood_group: Option<BloodGroup>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<EmergencyContact>,
    pub allergies: Option<Vec<String>>,
    pub user_id: Option<Uuid>,
}

/// A vitals reading with its display badge
#[derive(Debug, Serialize)]
pub struct RecentVitals {
    #[serde(flatten)]
    pub vitals: Vitals,
    pub badge: &'static str,
}

async fn create_patient(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(input): Json<CreatePatientRequest>,
) -> ApiResult<(StatusCode, Json<Patient>)> {
    require_authorization(&caller, DataCategory::Demographics, Permission::Write)?;
    if caller.role() == Role::Patient {
        return Err(AppError::Forbidden("Patients cannot register patients".to_string()));
    }

    let hospital_id = caller
        .hospital_id()
        .or(input.hospital_id)
        .ok_or_else(|| AppError::validation("hospital_id is required"))?;
    access::ensure_hospital(&state, &caller, hospital_id).await?;

    let now = Utc::now();
    let patient = Patient {
        id: Uuid::new_v4(),
        mrn: String::new(),
        hospital_id,
        first_name: input.first_name.trim().to_string(),
        last_name: input.last_name.trim().to_string(),
        date_of_birth: input.date_of_birth,
        gender: input.gender,
        blood_group: input.blood_group,
        phone: input.phone,
        email: input.email.map(|e| e.trim().to_lowercase()),
        address: input.address,
        emergency_contact: input.emergency_contact,
        allergies: input.allergies,
        user_id: input.user_id,
        registered_by: caller.id(),
        created_at: now,
        updated_at: now,
    };
    let patient = register(&state, patient).await?;

    log_data_access(
        &state,
        &caller,
        Some(patient.id),
        Some(hospital_id),
        vec![DataCategory::Demographics],
        Permission::Write,
        "POST /patients",
    )
    .await?;
    tracing::info!(patient = %patient.id, mrn = %patient.mrn, "patient registered");

    Ok((StatusCode::CREATED, Json(patient)))
}

async fn list_patients(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PaginatedResult<Patient>>> {
    require_authorization(&caller, DataCategory::Demographics, Permission::Read)?;
    let pagination = query.pagination()?;

    // A patient's own chart is the patient record itself
    if caller.role() == Role::Patient {
        let own: Vec<Patient> = access::own_patient(&state, &caller).await?.into_iter().collect();
        let total = own.len();
        return Ok(Json(PaginatedResult::new(own, total, &pagination)));
    }

    let mut filter = access::scope_filter(&state, &caller).await?;
    if let Some(hospital_id) = query.hospital_id {
        filter = ListQuery {
            hospital_id: Some(hospital_id),
            ..Default::default()
        }
        .narrow(filter);
    }
    Ok(Json(state.store.list(&filter, &pagination).await?))
}

async fn my_record(State(state): State<Arc<AppState>>, caller: Caller) -> ApiResult<Json<Patient>> {
    let patient = access::own_patient(&state, &caller)
        .await?
        .ok_or_else(|| AppError::not_found("Patient record"))?;
    Ok(Json(patient))
}

async fn get_by_mrn(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(mrn): Path<String>,
) -> ApiResult<Json<Patient>> {
    require_authorization(&caller, DataCategory::Demographics, Permission::Read)?;
    let patient: Patient = state
        .store
        .find_by_key(&mrn.to_uppercase())
        .await?
        .ok_or_else(|| AppError::not_found("Patient"))?;
    access::ensure_patient_access(&state, &caller, &patient).await?;
    Ok(Json(patient))
}

async fn get_patient(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Patient>> {
    let patient = load_patient(&state, &caller, id, DataCategory::Demographics, Permission::Read).await?;
    log_data_access(
        &state,
        &caller,
        Some(patient.id),
        Some(patient.hospital_id),
        vec![DataCategory::Demographics],
        Permission::Read,
        "GET /patients/{id}",
    )
    .await?;
    Ok(Json(patient))
}

async fn update_patient(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdatePatientRequest>,
) -> ApiResult<Json<Patient>> {
    let mut patient = load_patient(&state, &caller, id, DataCategory::Demographics, Permission::Write).await?;

    if let Some(v) = input.first_name {
        patient.first_name = v.trim().to_string();
    }
    if let Some(v) = input.last_name {
        patient.last_name = v.trim().to_string();
    }
    if let Some(v) = input.date_of_birth {
        patient.date_of_birth = v;
    }
    if let Some(v) = input.gender {
        patient.gender = v;
    }
    if input.blood_group.is_some() {
        patient.blood_group = input.blood_group;
    }
    if input.phone.is_some() {
        patient.phone = input.phone;
    }
    if let Some(v) = input.email {
        patient.email = Some(v.trim().to_lowercase());
    }
    if input.address.is_some() {
        patient.address = input.address;
    }
    if input.emergency_contact.is_some() {
        patient.emergency_contact = input.emergency_contact;
    }
    if let Some(v) = input.allergies {
        patient.allergies = v;
    }
    if input.user_id.is_some() {
        patient.user_id = input.user_id;
    }
    patient.updated_at = Utc::now();
    validate_patient(&patient).into_result()?;
    state.store.update(&patient).await?;

    log_data_access(
        &state,
        &caller,
        Some(patient.id),
        Some(patient.hospital_id),
        vec![DataCategory::Demographics],
        Permission::Write,
        "PATCH /patients/{id}",
    )
    .await?;
    Ok(Json(patient))
}

async fn patient_visits(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PaginatedResult<Visit>>> {
    let patient = load_patient(&state, &caller, id, DataCategory::Visits, Permission::Read).await?;
    let filter = Filter {
        status: query.status.clone(),
        ..Filter::patient(patient.id)
    };
    Ok(Json(state.store.list(&filter, &query.pagination()?).await?))
}

async fn recent_vitals(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PaginatedResult<RecentVitals>>> {
    let patient = load_patient(&state, &caller, id, DataCategory::VitalSigns, Permission::Read).await?;
    let pagination = query.pagination()?;
    let page = state.store.list::<Vitals>(&Filter::patient(patient.id), &pagination).await?;

    log_data_access(
        &state,
        &caller,
        Some(patient.id),
        Some(patient.hospital_id),
        vec![DataCategory::VitalSigns],
        Permission::Read,
        "GET /patients/{id}/vitals/recent",
    )
    .await?;

    Ok(Json(page.map(|vitals| RecentVitals {
        badge: vitals.severity.badge(),
        vitals,
    })))
}
