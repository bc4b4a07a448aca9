//! `/admin`: staff accounts, hospitals, regions, and the audit trail.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use hass_integrity::{validate_hospital, validate_region, validate_user, Hospital, Region, User, UserCredentials};
use hass_shared::{validate_password, AccessLogEntry, DataCategory, PaginatedResult, Permission, Role};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::ListQuery;
use crate::access::{self, log_data_access, require_authorization};
use crate::auth::{self, Caller};
use crate::error::{ApiResult, AppError};
use crate::extract::{Json, Path, Query};
use crate::store::Filter;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", get(get_user).patch(update_user).delete(delete_user))
        .route("/hospitals", get(list_hospitals).post(create_hospital))
        .route("/regions", get(list_regions).post(create_region))
        .route("/audit-logs", get(list_audit_logs))
}

/// Store a new account together with its password hash.
pub async fn create_account(state: &AppState, user: User, password: &str) -> ApiResult<User> {
    let mut checks = validate_user(&user);
    checks.merge(validate_password(password));
    checks.into_result()?;

    state.store.create(&user).await?;
    let credentials = UserCredentials {
        user_id: user.id,
        password_hash: auth::hash_password(password),
        totp_secret: None,
        pending_totp_secret: None,
        updated_at: user.created_at,
    };
    state.store.create(&credentials).await?;
    tracing::info!(user = %user.id, role = %user.role, "account created");
    Ok(user)
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
    pub hospital_id: Option<Uuid>,
    pub region_id: Option<Uuid>,
    pub phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub role: Option<Role>,
    pub hospital_id: Option<Uuid>,
    pub region_id: Option<Uuid>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    pub role: Option<Role>,
    pub hospital_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CreateHospitalRequest {
    pub name: String,
    pub code: String,
    pub region_id: Option<Uuid>,
    pub address: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRegionRequest {
    pub name: String,
    pub code: String,
}

/// Roles only a super admin may hand out
fn is_privileged(role: Role) -> bool {
    matches!(role, Role::SuperAdmin | Role::RegionalAdmin)
}

/// Check the caller may manage an account with this role and placement.
async fn ensure_can_manage(
    state: &AppState,
    caller: &Caller,
    role: Role,
    hospital_id: Option<Uuid>,
) -> ApiResult<()> {
    if caller.role() == Role::SuperAdmin {
        return Ok(());
    }
    if is_privileged(role) {
        return Err(AppError::Forbidden("Only a super admin can manage administrator accounts".to_string()));
    }
    match hospital_id {
        Some(hospital_id) => access::ensure_hospital(state, caller, hospital_id).await,
        // Patient portal accounts have no hospital
        None if role == Role::Patient => Ok(()),
        None => Err(AppError::validation("hospital_id is required")),
    }
}

async fn load_managed_user(state: &AppState, caller: &Caller, id: Uuid) -> ApiResult<User> {
    let user: User = state.store.get(id).await?;
    if user.is_deleted {
        return Err(AppError::not_found("User"));
    }
    ensure_can_manage(state, caller, user.role, user.hospital_id).await?;
    Ok(user)
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(input): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    require_authorization(&caller, DataCategory::Administration, Permission::Write)?;
    // Hospital admins create staff for their own hospital by default
    let hospital_id = input.hospital_id.or_else(|| match (caller.role(), input.role) {
        (_, Role::Patient | Role::SuperAdmin | Role::RegionalAdmin) => None,
        _ => caller.hospital_id(),
    });
    ensure_can_manage(&state, &caller, input.role, hospital_id).await?;

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        email: input.email.trim().to_lowercase(),
        full_name: input.full_name.trim().to_string(),
        role: input.role,
        hospital_id,
        region_id: input.region_id,
        phone: input.phone,
        is_active: true,
        is_deleted: false,
        two_factor_enabled: false,
        last_login_at: None,
        created_at: now,
        updated_at: now,
    };
    let user = create_account(&state, user, &input.password).await?;

    log_data_access(
        &state,
        &caller,
        None,
        user.hospital_id,
        vec![DataCategory::Administration],
        Permission::Write,
        "POST /admin/users",
    )
    .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<UserListQuery>,
) -> ApiResult<Json<PaginatedResult<User>>> {
    require_authorization(&caller, DataCategory::Administration, Permission::Read)?;
    let list_query = ListQuery {
        offset: query.offset,
        limit: query.limit,
        hospital_id: query.hospital_id,
        status: query.role.map(|r| r.to_string()),
        ..Default::default()
    };
    let pagination = list_query.pagination()?;
    let filter = list_query.narrow(access::scope_filter(&state, &caller).await?);

    // Soft-deleted accounts stay in the table but never leave the API
    let users: Vec<User> = state
        .store
        .list_all::<User>(&filter)
        .await?
        .into_iter()
        .filter(|u| !u.is_deleted)
        .collect();
    let total = users.len();
    let items = users.into_iter().skip(pagination.offset).take(pagination.limit).collect();
    Ok(Json(PaginatedResult::new(items, total, &pagination)))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    require_authorization(&caller, DataCategory::Administration, Permission::Read)?;
    Ok(Json(load_managed_user(&state, &caller, id).await?))
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    require_authorization(&caller, DataCategory::Administration, Permission::Write)?;
    let mut user = load_managed_user(&state, &caller, id).await?;
    let seen = user.updated_at;

    if let Some(v) = input.full_name {
        user.full_name = v.trim().to_string();
    }
    if let Some(v) = input.role {
        user.role = v;
    }
    if input.hospital_id.is_some() {
        user.hospital_id = input.hospital_id;
    }
    if input.region_id.is_some() {
        user.region_id = input.region_id;
    }
    if input.phone.is_some() {
        user.phone = input.phone;
    }
    if let Some(v) = input.is_active {
        if !v && user.id == caller.id() {
            return Err(AppError::BadRequest("You cannot deactivate your own account".to_string()));
        }
        user.is_active = v;
    }
    // The new placement must be one the caller could have created
    ensure_can_manage(&state, &caller, user.role, user.hospital_id).await?;
    user.updated_at = Utc::now();
    validate_user(&user).into_result()?;

    if let Some(password) = &input.password {
        validate_password(password).into_result()?;
    }
    state.store.update_unchanged_since(&user, seen).await?;
    if let Some(password) = input.password {
        let mut credentials: UserCredentials = state.store.get(user.id).await?;
        credentials.password_hash = auth::hash_password(&password);
        credentials.updated_at = user.updated_at;
        state.store.update(&credentials).await?;
    }

    log_data_access(
        &state,
        &caller,
        None,
        user.hospital_id,
        vec![DataCategory::Administration],
        Permission::Write,
        "PATCH /admin/users/{id}",
    )
    .await?;
    Ok(Json(user))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_authorization(&caller, DataCategory::Administration, Permission::Manage)?;
    if id == caller.id() {
        return Err(AppError::BadRequest("You cannot delete your own account".to_string()));
    }
    let mut user = load_managed_user(&state, &caller, id).await?;
    let seen = user.updated_at;
    user.is_deleted = true;
    user.is_active = false;
    user.updated_at = Utc::now();
    state.store.update_unchanged_since(&user, seen).await?;

    log_data_access(
        &state,
        &caller,
        None,
        user.hospital_id,
        vec![DataCategory::Administration],
        Permission::Manage,
        "DELETE /admin/users/{id}",
    )
    .await?;
    tracing::info!(user = %user.id, "account deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn create_hospital(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(input): Json<CreateHospitalRequest>,
) -> ApiResult<(StatusCode, Json<Hospital>)> {
    require_authorization(&caller, DataCategory::Administration, Permission::Manage)?;
    let region_id = match caller.role() {
        Role::SuperAdmin => input.region_id,
        Role::RegionalAdmin => {
            let own = caller.user.region_id;
            if input.region_id.is_some() && input.region_id != own {
                return Err(AppError::Forbidden("Hospitals can only be added to your own region".to_string()));
            }
            own
        }
        _ => return Err(AppError::Forbidden("Only regional or super admins can add hospitals".to_string())),
    };

    let now = Utc::now();
    let hospital = Hospital {
        id: Uuid::new_v4(),
        name: input.name.trim().to_string(),
        code: input.code.trim().to_uppercase(),
        region_id,
        address: input.address,
        phone: input.phone,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    validate_hospital(&hospital).into_result()?;
    state.store.create(&hospital).await?;
    tracing::info!(hospital = %hospital.code, "hospital created");
    Ok((StatusCode::CREATED, Json(hospital)))
}

async fn list_hospitals(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PaginatedResult<Hospital>>> {
    require_authorization(&caller, DataCategory::Administration, Permission::Read)?;
    let filter = Filter {
        hospital_in: access::hospital_scope(&state, &caller).await?,
        ..Default::default()
    };
    Ok(Json(state.store.list(&query.narrow(filter), &query.pagination()?).await?))
}

async fn create_region(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(input): Json<CreateRegionRequest>,
) -> ApiResult<(StatusCode, Json<Region>)> {
    if caller.role() != Role::SuperAdmin {
        return Err(AppError::Forbidden("Only a super admin can add regions".to_string()));
    }
    let now = Utc::now();
    let region = Region {
        id: Uuid::new_v4(),
        name: input.name.trim().to_string(),
        code: input.code.trim().to_uppercase(),
        created_at: now,
        updated_at: now,
    };
    validate_region(&region).into_result()?;
    state.store.create(&region).await?;
    Ok((StatusCode::CREATED, Json(region)))
}

async fn list_regions(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Region>>> {
    require_authorization(&caller, DataCategory::Administration, Permission::Read)?;
    let regions: Vec<Region> = state.store.list_all(&Filter::default()).await?;
    let regions = match caller.role() {
        Role::SuperAdmin => regions,
        Role::RegionalAdmin => regions.into_iter().filter(|r| Some(r.id) == caller.user.region_id).collect(),
        _ => {
            let hospital = match caller.hospital_id() {
                Some(id) => state.store.find::<Hospital>(id).await?,
                None => None,
            };
            let own = hospital.and_then(|h| h.region_id);
            regions.into_iter().filter(|r| Some(r.id) == own).collect()
        }
    };
    let pagination = query.pagination()?;
    Ok(Json(regions.into_iter().skip(pagination.offset).take(pagination.limit).collect()))
}

async fn list_audit_logs(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PaginatedResult<AccessLogEntry>>> {
    require_authorization(&caller, DataCategory::Administration, Permission::Manage)?;
    let filter = query.narrow(access::scope_filter(&state, &caller).await?);
    Ok(Json(state.store.list(&filter, &query.pagination()?).await?))
}
