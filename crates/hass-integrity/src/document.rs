//! Uploaded file metadata. File bytes live on disk, addressed by `id`.

use chrono::{DateTime, Utc};
use hass_shared::{ValidationErrorCode, ValidationResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StoredFile {
    pub id: Uuid,
    pub hospital_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: u64,
    /// Hex SHA-256 of the contents
    pub sha256: String,
    pub description: Option<String>,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Strip any directory components and characters unsafe in a download header.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control() && *c != '"')
        .collect();
    let trimmed = cleaned.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        "upload.bin".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn validate_stored_file(file: &StoredFile, max_bytes: u64) -> ValidationResult {
    let mut result = ValidationResult::new();
    result.require("filename", &file.filename);
    result.max_len("filename", &file.filename, 255);
    if file.size_bytes == 0 {
        result.add_error("file", "Uploaded file is empty", ValidationErrorCode::Required);
    }
    if file.size_bytes > max_bytes {
        result.add_error(
            "file",
            &format!("File exceeds the {} byte limit", max_bytes),
            ValidationErrorCode::OutOfRange,
        );
    }
    if !file.content_type.contains('/') {
        result.add_error("content_type", "Invalid content type", ValidationErrorCode::InvalidFormat);
    }
    result
}
