//! `/files`: multipart upload, listing, download.

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use hass_integrity::{sanitize_filename, validate_stored_file, Patient, StoredFile};
use hass_shared::{DataCategory, PaginatedResult, Permission};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use super::ListQuery;
use crate::access::{self, log_data_access, require_authorization};
use crate::auth::Caller;
use crate::error::{ApiResult, AppError};
use crate::extract::{Json, Path, Query};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_files).post(upload_file))
        .route("/{id}", get(get_file))
        .route("/{id}/download", get(download_file))
}

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(err.body_text())
    }
}

struct Upload {
    filename: String,
    content_type: String,
    bytes: Vec<u8>,
}

async fn upload_file(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<StoredFile>)> {
    require_authorization(&caller, DataCategory::Files, Permission::Write)?;

    let mut upload = None;
    let mut patient_id = None;
    let mut description = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("file") => {
                let filename = sanitize_filename(field.file_name().unwrap_or_default());
                let content_type = field.content_type().unwrap_or(DEFAULT_CONTENT_TYPE).to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?.to_vec();
                upload = Some(Upload {
                    filename,
                    content_type,
                    bytes,
                });
            }
            Some("patient_id") => {
                let text = field.text().await.map_err(multipart_error)?;
                let id = Uuid::parse_str(text.trim()).map_err(|_| AppError::validation("patient_id is not a valid id"))?;
                patient_id = Some(id);
            }
            Some("description") => {
                description = Some(field.text().await.map_err(multipart_error)?);
            }
            _ => {}
        }
    }
    let upload = upload.ok_or_else(|| AppError::validation("A file field is required"))?;

    let max = state.config.max_upload_bytes;
    if upload.bytes.len() as u64 > max {
        return Err(AppError::PayloadTooLarge(format!("File exceeds the {} byte limit", max)));
    }

    let hospital_id = match patient_id {
        Some(id) => {
            let patient = access::load_patient(&state, &caller, id, DataCategory::Files, Permission::Write).await?;
            Some(patient.hospital_id)
        }
        None => caller.hospital_id(),
    };

    let now = Utc::now();
    let file = StoredFile {
        id: Uuid::new_v4(),
        hospital_id,
        patient_id,
        filename: upload.filename,
        content_type: upload.content_type,
        size_bytes: upload.bytes.len() as u64,
        sha256: hex::encode(Sha256::digest(&upload.bytes)),
        description,
        uploaded_by: caller.id(),
        created_at: now,
        updated_at: now,
    };
    validate_stored_file(&file, max).into_result()?;

    persist_upload(&state, &file, &upload.bytes).await?;

    log_data_access(
        &state,
        &caller,
        file.patient_id,
        file.hospital_id,
        vec![DataCategory::Files],
        Permission::Write,
        "POST /files",
    )
    .await?;
    tracing::info!(file = %file.id, size = file.size_bytes, "file uploaded");

    Ok((StatusCode::CREATED, Json(file)))
}

/// Write the blob, then its record. A failed insert removes the blob again.
pub async fn persist_upload(state: &AppState, file: &StoredFile, bytes: &[u8]) -> ApiResult<()> {
    let path = state.config.upload_dir.join(file.id.to_string());
    tokio::fs::write(&path, bytes).await?;
    if let Err(err) = state.store.create(file).await {
        if let Err(io) = tokio::fs::remove_file(&path).await {
            tracing::warn!(file = %file.id, error = %io, "could not remove orphaned upload");
        }
        return Err(err.into());
    }
    Ok(())
}

async fn list_files(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PaginatedResult<StoredFile>>> {
    require_authorization(&caller, DataCategory::Files, Permission::Read)?;
    let filter = query.narrow(access::scope_filter(&state, &caller).await?);
    Ok(Json(state.store.list(&filter, &query.pagination()?).await?))
}

async fn load_file(state: &AppState, caller: &Caller, id: Uuid) -> ApiResult<StoredFile> {
    require_authorization(caller, DataCategory::Files, Permission::Read)?;
    let file: StoredFile = state.store.get(id).await?;
    match (file.patient_id, file.hospital_id) {
        (Some(patient_id), _) => {
            let patient: Patient = state.store.get(patient_id).await?;
            access::ensure_patient_access(state, caller, &patient).await?;
        }
        (None, Some(hospital_id)) => access::ensure_hospital(state, caller, hospital_id).await?,
        (None, None) if file.uploaded_by == caller.id() => {}
        (None, None) => return Err(AppError::not_found("File")),
    }
    Ok(file)
}

async fn get_file(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<StoredFile>> {
    Ok(Json(load_file(&state, &caller, id).await?))
}

async fn download_file(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let file = load_file(&state, &caller, id).await?;
    let bytes = tokio::fs::read(state.config.upload_dir.join(file.id.to_string())).await?;

    log_data_access(
        &state,
        &caller,
        file.patient_id,
        file.hospital_id,
        vec![DataCategory::Files],
        Permission::Read,
        "GET /files/{id}/download",
    )
    .await?;

    let disposition = format!("attachment; filename=\"{}\"", file.filename);
    Ok((
        [
            (header::CONTENT_TYPE, file.content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}
