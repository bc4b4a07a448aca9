//! `/case-sheets`: the per-visit clinical document and its event timeline.
//!
//! Events needing acknowledgment are addressed by their index in the
//! timeline. Writes are guarded by the sheet's last update time, so two
//! people acknowledging the same event at once cannot both succeed.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use hass_integrity::{
    validate_case_sheet, CaseSheet, CaseSheetEvent, CaseSheetEventType, CaseSheetSections, NotificationType, Patient,
    PendingEvent, PushPayload, Visit,
};
use hass_shared::{DataCategory, PaginatedResult, Permission};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::ListQuery;
use crate::access::{self, load_patient, log_data_access, require_authorization};
use crate::auth::Caller;
use crate::error::{ApiResult, AppError};
use crate::extract::{Json, Path, Query};
use crate::store::{timestamp, StoreError};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_case_sheets).post(create_case_sheet))
        .route("/discharge-requests/pending", get(pending_discharge_requests))
        .route("/{id}", get(get_case_sheet).patch(update_sections))
        .route("/{id}/progress-notes", post(add_progress_note))
        .route("/{id}/events", post(record_event))
        .route("/{id}/events/pending", get(pending_events))
        .route("/{id}/acknowledge", post(acknowledge_event))
}

#[derive(Debug, Deserialize)]
pub struct CreateCaseSheetRequest {
    pub patient_id: Uuid,
    pub visit_id: Uuid,
    #[serde(flatten)]
    pub sections: CaseSheetSections,
}

#[derive(Debug, Deserialize)]
pub struct ProgressNoteRequest {
    pub note: String,
}

#[derive(Debug, Deserialize)]
pub struct RecordEventRequest {
    pub event_type: CaseSheetEventType,
    pub description: String,
    #[serde(default)]
    pub requires_acknowledgment: bool,
}

#[derive(Debug, Deserialize)]
pub struct AcknowledgeRequest {
    pub event_index: usize,
    pub notes: Option<String>,
}

/// An event addressed by its case sheet and timeline position
#[derive(Debug, Serialize)]
pub struct EventRef {
    pub case_sheet_id: Uuid,
    pub event_index: usize,
    pub event: CaseSheetEvent,
}

/// Pending discharge request with enough patient detail for the reception queue
#[derive(Debug, Serialize)]
pub struct DischargeRequestView {
    #[serde(flatten)]
    pub pending: PendingEvent,
    pub patient_name: String,
    pub mrn: String,
}

async fn load_sheet(
    state: &AppState,
    caller: &Caller,
    id: Uuid,
    permission: Permission,
) -> ApiResult<(CaseSheet, Patient)> {
    require_authorization(caller, DataCategory::CaseSheets, permission)?;
    let sheet: CaseSheet = state.store.get(id).await?;
    let patient: Patient = state.store.get(sheet.patient_id).await?;
    access::ensure_patient_access(state, caller, &patient).await?;
    Ok((sheet, patient))
}

/// Write `sheet` if nobody else has changed it since `revision`.
async fn save_sheet(state: &AppState, sheet: &CaseSheet, revision: &str) -> ApiResult<()> {
    validate_case_sheet(sheet).into_result()?;
    match state.store.update_from_status(sheet, revision).await {
        Ok(()) => Ok(()),
        Err(StoreError::Conflict(_)) => Err(AppError::Conflict(
            "Case sheet was changed by someone else; reload and try again".to_string(),
        )),
        Err(err) => Err(err.into()),
    }
}

async fn create_case_sheet(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(input): Json<CreateCaseSheetRequest>,
) -> ApiResult<(StatusCode, Json<CaseSheet>)> {
    let patient = load_patient(&state, &caller, input.patient_id, DataCategory::CaseSheets, Permission::Write).await?;
    let visit = access::load_visit_of(&state, &patient, input.visit_id).await?;

    let now = Utc::now();
    let mut sheet = CaseSheet {
        id: Uuid::new_v4(),
        patient_id: patient.id,
        visit_id: visit.id,
        hospital_id: visit.hospital_id,
        created_by: caller.id(),
        presenting_complaint: None,
        history: None,
        vital_signs_on_admission: None,
        examination: None,
        differential_diagnosis: Vec::new(),
        investigations: Vec::new(),
        provisional_diagnosis: None,
        final_diagnosis: None,
        treatment_plan: None,
        progress_notes: Vec::new(),
        events: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    sheet.apply_sections(input.sections);
    validate_case_sheet(&sheet).into_result()?;
    state.store.create(&sheet).await?;

    log_data_access(
        &state,
        &caller,
        Some(patient.id),
        Some(sheet.hospital_id),
        vec![DataCategory::CaseSheets],
        Permission::Write,
        "POST /case-sheets",
    )
    .await?;
    Ok((StatusCode::CREATED, Json(sheet)))
}

async fn list_case_sheets(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PaginatedResult<CaseSheet>>> {
    require_authorization(&caller, DataCategory::CaseSheets, Permission::Read)?;
    // The status column holds a revision marker, not a lifecycle status
    let query = ListQuery { status: None, ..query };
    let filter = query.narrow(access::scope_filter(&state, &caller).await?);
    Ok(Json(state.store.list(&filter, &query.pagination()?).await?))
}

async fn get_case_sheet(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CaseSheet>> {
    let (sheet, patient) = load_sheet(&state, &caller, id, Permission::Read).await?;
    log_data_access(
        &state,
        &caller,
        Some(patient.id),
        Some(sheet.hospital_id),
        vec![DataCategory::CaseSheets],
        Permission::Read,
        "GET /case-sheets/{id}",
    )
    .await?;
    Ok(Json(sheet))
}

async fn update_sections(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(sections): Json<CaseSheetSections>,
) -> ApiResult<Json<CaseSheet>> {
    let (mut sheet, patient) = load_sheet(&state, &caller, id, Permission::Write).await?;
    let revision = timestamp(sheet.updated_at);
    sheet.apply_sections(sections);
    sheet.updated_at = Utc::now();
    save_sheet(&state, &sheet, &revision).await?;

    log_data_access(
        &state,
        &caller,
        Some(patient.id),
        Some(sheet.hospital_id),
        vec![DataCategory::CaseSheets],
        Permission::Write,
        "PATCH /case-sheets/{id}",
    )
    .await?;
    Ok(Json(sheet))
}

async fn add_progress_note(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(input): Json<ProgressNoteRequest>,
) -> ApiResult<(StatusCode, Json<CaseSheet>)> {
    let (mut sheet, patient) = load_sheet(&state, &caller, id, Permission::Write).await?;
    let revision = timestamp(sheet.updated_at);
    let now = Utc::now();
    sheet.add_progress_note(caller.id(), input.note.trim().to_string(), now);
    sheet.updated_at = now;
    save_sheet(&state, &sheet, &revision).await?;

    log_data_access(
        &state,
        &caller,
        Some(patient.id),
        Some(sheet.hospital_id),
        vec![DataCategory::CaseSheets],
        Permission::Write,
        "POST /case-sheets/{id}/progress-notes",
    )
    .await?;
    Ok((StatusCode::CREATED, Json(sheet)))
}

async fn record_event(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(input): Json<RecordEventRequest>,
) -> ApiResult<(StatusCode, Json<EventRef>)> {
    let (mut sheet, patient) = load_sheet(&state, &caller, id, Permission::Write).await?;
    if input.event_type == CaseSheetEventType::DischargeRequest {
        access::load_open_visit_of(&state, &patient, sheet.visit_id).await?;
    }
    let revision = timestamp(sheet.updated_at);
    let now = Utc::now();

    // Discharge requests always wait for reception
    let requires_acknowledgment =
        input.requires_acknowledgment || input.event_type == CaseSheetEventType::DischargeRequest;
    let description = input.description.trim().to_string();
    let event_index = sheet.record_event(input.event_type, description, requires_acknowledgment, caller.id(), now);
    sheet.updated_at = now;
    save_sheet(&state, &sheet, &revision).await?;

    let event = sheet.events[event_index].clone();
    if event.requires_acknowledgment {
        let title = match event.event_type {
            CaseSheetEventType::DischargeRequest => format!("Discharge requested: {}", patient.full_name()),
            _ => format!("Case sheet event: {}", patient.full_name()),
        };
        state.alerts.publish(
            PushPayload::new(NotificationType::CaseSheetEvent, title, event.description.clone())
                .with_url(format!("/case-sheets/{}", sheet.id))
                .for_patient(patient.id, sheet.id)
                .in_hospital(sheet.hospital_id),
        );
    }

    log_data_access(
        &state,
        &caller,
        Some(patient.id),
        Some(sheet.hospital_id),
        vec![DataCategory::CaseSheets],
        Permission::Write,
        "POST /case-sheets/{id}/events",
    )
    .await?;
    tracing::info!(case_sheet = %sheet.id, event_index, event_type = ?event.event_type, "case sheet event recorded");

    Ok((
        StatusCode::CREATED,
        Json(EventRef {
            case_sheet_id: sheet.id,
            event_index,
            event,
        }),
    ))
}

async fn pending_events(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<PendingEvent>>> {
    let (sheet, _) = load_sheet(&state, &caller, id, Permission::Read).await?;
    Ok(Json(sheet.pending_events()))
}

async fn acknowledge_event(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(input): Json<AcknowledgeRequest>,
) -> ApiResult<Json<EventRef>> {
    let (mut sheet, patient) = load_sheet(&state, &caller, id, Permission::Acknowledge).await?;
    let revision = timestamp(sheet.updated_at);
    let now = Utc::now();

    let event = sheet
        .acknowledge_event(input.event_index, caller.id(), input.notes, now)?
        .clone();
    sheet.updated_at = now;
    save_sheet(&state, &sheet, &revision).await?;

    log_data_access(
        &state,
        &caller,
        Some(patient.id),
        Some(sheet.hospital_id),
        vec![DataCategory::CaseSheets],
        Permission::Acknowledge,
        "POST /case-sheets/{id}/acknowledge",
    )
    .await?;
    tracing::info!(case_sheet = %sheet.id, event_index = input.event_index, "event acknowledged");

    Ok(Json(EventRef {
        case_sheet_id: sheet.id,
        event_index: input.event_index,
        event,
    }))
}

async fn pending_discharge_requests(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> ApiResult<Json<Vec<DischargeRequestView>>> {
    require_authorization(&caller, DataCategory::CaseSheets, Permission::Read)?;
    let filter = access::scope_filter(&state, &caller).await?;
    let sheets: Vec<CaseSheet> = state.store.list_all(&filter).await?;

    let mut requests = Vec::new();
    for sheet in &sheets {
        let pending = sheet.pending_discharge_requests();
        if pending.is_empty() {
            continue;
        }
        let visit: Visit = state.store.get(sheet.visit_id).await?;
        if !visit.is_open() {
            continue;
        }
        let patient: Patient = state.store.get(sheet.patient_id).await?;
        for event in pending {
            requests.push(DischargeRequestView {
                pending: event,
                patient_name: patient.full_name(),
                mrn: patient.mrn.clone(),
            });
        }
    }
    // Oldest request first
    requests.sort_by_key(|r| r.pending.event.recorded_at);
    Ok(Json(requests))
}

/// Close the discharge requests on a visit's case sheet after the visit is discharged.
pub async fn settle_discharge_requests(
    state: &AppState,
    caller: &Caller,
    visit_id: Uuid,
    notes: Option<String>,
) -> ApiResult<()> {
    // Retry when a concurrent edit moves the revision
    for _ in 0..3 {
        let Some(mut sheet) = state.store.find_by_key::<CaseSheet>(&visit_id.to_string()).await? else {
            return Ok(());
        };
        let revision = timestamp(sheet.updated_at);
        let now = Utc::now();
        let settled = sheet.settle_discharge_requests(caller.id(), notes.clone(), now);
        if settled.is_empty() {
            return Ok(());
        }
        sheet.updated_at = now;
        match save_sheet(state, &sheet, &revision).await {
            Ok(()) => {
                tracing::info!(case_sheet = %sheet.id, ?settled, "discharge requests closed by discharge");
                return Ok(());
            }
            Err(AppError::Conflict(_)) => continue,
            Err(err) => return Err(err),
        }
    }
    tracing::warn!(visit = %visit_id, "case sheet kept changing; discharge requests left open");
    Ok(())
}
