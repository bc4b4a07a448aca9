//! Record-level access control and the audit trail.
//!
//! Role permissions come from `hass_shared`; this module adds hospital
//! boundaries, regional scoping, and the rule that patients only ever see
//! their own chart.

use hass_integrity::{Hospital, Patient, User, Visit};
use hass_shared::{check_authorization, AccessLogEntry, AuthorizationResult, DataCategory, Permission, Role};
use uuid::Uuid;

use crate::auth::Caller;
use crate::error::{ApiResult, AppError};
use crate::store::Filter;
use crate::AppState;

/// Fail with 403 unless the caller's role grants `permission` on `category`.
pub fn require_authorization(
    caller: &Caller,
    category: DataCategory,
    permission: Permission,
) -> ApiResult<AuthorizationResult> {
    let result = check_authorization(caller.role(), category, permission);
    if !result.authorized {
        tracing::debug!(user = %caller.id(), reason = %result.reason, "authorization denied");
        return Err(AppError::Forbidden(
            "You do not have permission to perform this action".to_string(),
        ));
    }
    Ok(result)
}

/// Hospitals the caller may act in. `None` means every hospital.
pub async fn hospital_scope(state: &AppState, caller: &Caller) -> ApiResult<Option<Vec<Uuid>>> {
    match caller.role() {
        Role::SuperAdmin => Ok(None),
        Role::RegionalAdmin => {
            let Some(region_id) = caller.user.region_id else {
                return Ok(Some(Vec::new()));
            };
            let filter = Filter {
                parent_id: Some(region_id),
                ..Default::default()
            };
            let hospitals: Vec<Hospital> = state.store.list_all(&filter).await?;
            Ok(Some(hospitals.into_iter().map(|h| h.id).collect()))
        }
        _ => Ok(Some(caller.hospital_id().into_iter().collect())),
    }
}

pub async fn ensure_hospital(state: &AppState, caller: &Caller, hospital_id: Uuid) -> ApiResult<()> {
    match hospital_scope(state, caller).await? {
        None => Ok(()),
        Some(ids) if ids.contains(&hospital_id) => Ok(()),
        Some(_) => Err(AppError::Forbidden("Record belongs to another hospital".to_string())),
    }
}

/// The patient record linked to a patient-role account
pub async fn own_patient(state: &AppState, caller: &Caller) -> ApiResult<Option<Patient>> {
    let filter = Filter {
        actor_id: Some(caller.id()),
        ..Default::default()
    };
    let mut linked: Vec<Patient> = state.store.list_all(&filter).await?;
    Ok(linked.pop())
}

/// Base filter for list endpoints: the caller's hospitals, or their own chart for patients.
pub async fn scope_filter(state: &AppState, caller: &Caller) -> ApiResult<Filter> {
    if caller.role() == Role::Patient {
        return Ok(match own_patient(state, caller).await? {
            Some(patient) => Filter::patient(patient.id),
            None => Filter {
                hospital_in: Some(Vec::new()),
                ..Default::default()
            },
        });
    }
    Ok(Filter {
        hospital_in: hospital_scope(state, caller).await?,
        ..Default::default()
    })
}

pub async fn ensure_patient_access(state: &AppState, caller: &Caller, patient: &Patient) -> ApiResult<()> {
    if caller.role() == Role::Patient {
        return if patient.user_id == Some(caller.id()) {
            Ok(())
        } else {
            Err(AppError::Forbidden("Patients may only view their own records".to_string()))
        };
    }
    ensure_hospital(state, caller, patient.hospital_id).await
}

/// Authorize, load the patient, and check the caller may see it.
pub async fn load_patient(
    state: &AppState,
    caller: &Caller,
    patient_id: Uuid,
    category: DataCategory,
    permission: Permission,
) -> ApiResult<Patient> {
    require_authorization(caller, category, permission)?;
    let patient: Patient = state.store.get(patient_id).await?;
    ensure_patient_access(state, caller, &patient).await?;
    Ok(patient)
}

/// Load a visit and check it belongs to `patient`.
pub async fn load_visit_of(state: &AppState, patient: &Patient, visit_id: Uuid) -> ApiResult<Visit> {
    let visit: Visit = state.store.get(visit_id).await?;
    if visit.patient_id != patient.id {
        return Err(AppError::validation("Visit does not belong to this patient"));
    }
    Ok(visit)
}

/// Like [`load_visit_of`], but the visit must not be discharged yet.
pub async fn load_open_visit_of(state: &AppState, patient: &Patient, visit_id: Uuid) -> ApiResult<Visit> {
    let visit = load_visit_of(state, patient, visit_id).await?;
    if !visit.is_open() {
        return Err(AppError::Conflict("Visit has already been discharged".to_string()));
    }
    Ok(visit)
}

/// The user named as a patient's doctor must be an active doctor at the patient's hospital.
pub async fn ensure_doctor_at(state: &AppState, hospital_id: Uuid, doctor_id: Uuid) -> ApiResult<User> {
    match state.store.find::<User>(doctor_id).await? {
        Some(user) if user.role == Role::Doctor && user.can_sign_in() && user.hospital_id == Some(hospital_id) => {
            Ok(user)
        }
        _ => Err(AppError::validation("Assigned doctor must be an active doctor at this hospital")),
    }
}

/// Record the access in the audit log.
pub async fn log_data_access(
    state: &AppState,
    caller: &Caller,
    patient_id: Option<Uuid>,
    hospital_id: Option<Uuid>,
    categories: Vec<DataCategory>,
    access_type: Permission,
    action: &str,
) -> ApiResult<()> {
    let entry = AccessLogEntry::new(caller.id(), caller.role(), patient_id, categories, access_type, action)
        .with_hospital(hospital_id.or(caller.hospital_id()));
    state.store.create(&entry).await?;
    Ok(())
}
