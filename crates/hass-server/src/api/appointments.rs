//! `/appointments`: booking and the check-in lifecycle.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use hass_integrity::{
    transition, validate_appointment, Appointment, AppointmentStatus, NotificationType, Patient, PushPayload,
};
use hass_shared::{DataCategory, PaginatedResult, Permission, Role};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::ListQuery;
use crate::access::{self, load_patient, log_data_access, require_authorization};
use crate::auth::Caller;
use crate::error::{ApiResult, AppError};
use crate::extract::{Json, Path, Query};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_appointments).post(book_appointment))
        .route("/{id}", get(get_appointment))
        .route("/{id}/status", post(update_status))
}

#[derive(Debug, Deserialize)]
pub struct BookAppointmentRequest {
    /// Defaults to the caller's own record for patients
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default = "default_duration")]
    pub duration_minutes: u32,
    pub reason: Option<String>,
    pub department: Option<String>,
}

fn default_duration() -> u32 {
    30
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: AppointmentStatus,
    pub notes: Option<String>,
}

async fn resolve_patient(state: &AppState, caller: &Caller, patient_id: Option<Uuid>) -> ApiResult<Patient> {
    let patient_id = match (patient_id, caller.role()) {
        (Some(id), _) => id,
        (None, Role::Patient) => {
            access::own_patient(state, caller)
                .await?
                .ok_or_else(|| AppError::not_found("Patient record"))?
                .id
        }
        (None, _) => return Err(AppError::validation("patient_id is required")),
    };
    load_patient(state, caller, patient_id, DataCategory::Appointments, Permission::Write).await
}

async fn book_appointment(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(input): Json<BookAppointmentRequest>,
) -> ApiResult<(StatusCode, Json<Appointment>)> {
    let patient = resolve_patient(&state, &caller, input.patient_id).await?;
    if let Some(doctor_id) = input.doctor_id {
        access::ensure_doctor_at(&state, patient.hospital_id, doctor_id).await?;
    }

    let now = Utc::now();
    let appointment = Appointment {
        id: Uuid::new_v4(),
        patient_id: patient.id,
        hospital_id: patient.hospital_id,
        doctor_id: input.doctor_id,
        scheduled_at: input.scheduled_at,
        duration_minutes: input.duration_minutes,
        reason: input.reason,
        department: input.department,
        status: AppointmentStatus::Scheduled,
        notes: None,
        created_by: caller.id(),
        created_at: now,
        updated_at: now,
    };
    validate_appointment(&appointment).into_result()?;
    state.store.create(&appointment).await?;

    state.alerts.publish(
        PushPayload::new(
            NotificationType::Appointment,
            "Appointment booked",
            format!("{} on {}", patient.full_name(), appointment.scheduled_at.format("%Y-%m-%d %H:%M")),
        )
        .for_patient(patient.id, appointment.id)
        .in_hospital(appointment.hospital_id),
    );
    log_data_access(
        &state,
        &caller,
        Some(patient.id),
        Some(appointment.hospital_id),
        vec![DataCategory::Appointments],
        Permission::Write,
        "POST /appointments",
    )
    .await?;

    Ok((StatusCode::CREATED, Json(appointment)))
}

async fn list_appointments(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PaginatedResult<Appointment>>> {
    require_authorization(&caller, DataCategory::Appointments, Permission::Read)?;
    let filter = query.narrow(access::scope_filter(&state, &caller).await?);
    Ok(Json(state.store.list(&filter, &query.pagination()?).await?))
}

async fn load_appointment(
    state: &AppState,
    caller: &Caller,
    id: Uuid,
    permission: Permission,
) -> ApiResult<Appointment> {
    require_authorization(caller, DataCategory::Appointments, permission)?;
    let appointment: Appointment = state.store.get(id).await?;
    let patient: Patient = state.store.get(appointment.patient_id).await?;
    access::ensure_patient_access(state, caller, &patient).await?;
    Ok(appointment)
}

async fn get_appointment(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Appointment>> {
    Ok(Json(load_appointment(&state, &caller, id, Permission::Read).await?))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(input): Json<StatusRequest>,
) -> ApiResult<Json<Appointment>> {
    let mut appointment = load_appointment(&state, &caller, id, Permission::Write).await?;
    if caller.role() == Role::Patient && input.status != AppointmentStatus::Cancelled {
        return Err(AppError::Forbidden("Patients can only cancel appointments".to_string()));
    }

    let from = appointment.status;
    appointment.status = transition("Appointment", from, input.status)?;
    if input.notes.is_some() {
        appointment.notes = input.notes;
    }
    appointment.updated_at = Utc::now();
    state.store.update_from_status(&appointment, &from.to_string()).await?;

    log_data_access(
        &state,
        &caller,
        Some(appointment.patient_id),
        Some(appointment.hospital_id),
        vec![DataCategory::Appointments],
        Permission::Write,
        "POST /appointments/{id}/status",
    )
    .await?;
    Ok(Json(appointment))
}
