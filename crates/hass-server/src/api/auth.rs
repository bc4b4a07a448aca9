//! `/auth`: login, token refresh, current user, two-factor setup.

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use hass_integrity::{User, UserCredentials};
use hass_shared::{DataCategory, Permission};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{self, Caller, TokenKind, ACCESS_COOKIE};
use crate::error::{ApiResult, AppError};
use crate::extract::Json;
use crate::store::StoreError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/refresh", post(refresh))
        .route("/me", get(me))
        .route("/2fa/setup", post(two_factor_setup))
        .route("/2fa/verify", post(two_factor_verify))
        .route("/2fa/disable", post(two_factor_disable))
}

const BAD_CREDENTIALS: &str = "Incorrect email or password";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub otp_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub user: User,
    pub redirect_to: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub dashboard: String,
    pub permissions: BTreeMap<DataCategory, Vec<Permission>>,
}

#[derive(Debug, Serialize)]
pub struct TwoFactorSetupResponse {
    /// Base32 secret for manual entry
    pub secret: String,
    pub otpauth_uri: String,
}

#[derive(Debug, Deserialize)]
pub struct TwoFactorCode {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct TwoFactorStatus {
    pub two_factor_enabled: bool,
}

fn issue_tokens(state: &AppState, user: User) -> TokenResponse {
    TokenResponse {
        access_token: state.signer.issue(&user, TokenKind::Access),
        refresh_token: state.signer.issue(&user, TokenKind::Refresh),
        token_type: "bearer",
        expires_in: state.signer.access_ttl().num_seconds(),
        redirect_to: user.role.dashboard_path(),
        user,
    }
}

fn access_cookie(token: &str, max_age: i64) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}", ACCESS_COOKIE, token, max_age)
}

/// Apply `change` to the stored user, re-reading and retrying if another
/// write lands in between so that change is never reverted.
async fn update_user(state: &AppState, user_id: Uuid, change: impl Fn(&mut User)) -> ApiResult<User> {
    for _ in 0..3 {
        let mut user: User = state.store.get(user_id).await?;
        let seen = user.updated_at;
        change(&mut user);
        user.updated_at = Utc::now();
        match state.store.update_unchanged_since(&user, seen).await {
            Ok(()) => return Ok(user),
            Err(StoreError::Conflict(_)) => continue,
            Err(err) => return Err(err.into()),
        }
    }
    Err(AppError::Conflict("Account is being changed; try again".to_string()))
}

async fn login(State(state): State<Arc<AppState>>, Json(input): Json<LoginRequest>) -> ApiResult<impl IntoResponse> {
    let email = input.email.trim().to_lowercase();
    let user: Option<User> = state.store.find_by_key(&email).await?;
    let Some(user) = user else {
        tracing::info!(%email, "login failed: unknown account");
        return Err(AppError::Unauthorized(BAD_CREDENTIALS.to_string()));
    };

    let credentials: UserCredentials = state.store.get(user.id).await?;
    if !auth::verify_password(&input.password, &credentials.password_hash) {
        tracing::info!(%email, "login failed: wrong password");
        return Err(AppError::Unauthorized(BAD_CREDENTIALS.to_string()));
    }
    if !user.can_sign_in() {
        return Err(AppError::Unauthorized("Account is disabled".to_string()));
    }

    if user.two_factor_enabled {
        let secret = credentials.totp_secret.as_deref().unwrap_or_default();
        match input.otp_code.as_deref() {
            None => return Err(AppError::Unauthorized("Two-factor code required".to_string())),
            Some(code) if !auth::verify_totp(secret, code, Utc::now().timestamp()) => {
                return Err(AppError::Unauthorized("Invalid two-factor code".to_string()));
            }
            Some(_) => {}
        }
    }

    let now = Utc::now();
    let user = update_user(&state, user.id, |u| u.last_login_at = Some(now)).await?;
    // An admin may have disabled the account while we were checking the password
    if !user.can_sign_in() {
        return Err(AppError::Unauthorized("Account is disabled".to_string()));
    }
    tracing::info!(user = %user.id, role = %user.role, "login succeeded");

    let tokens = issue_tokens(&state, user);
    let cookie = access_cookie(&tokens.access_token, tokens.expires_in);
    Ok(([(SET_COOKIE, cookie)], Json(tokens)))
}

async fn logout() -> impl IntoResponse {
    ([(SET_COOKIE, access_cookie("", 0))], Json(serde_json::json!({ "detail": "Logged out" })))
}

async fn refresh(State(state): State<Arc<AppState>>, Json(input): Json<RefreshRequest>) -> ApiResult<Json<TokenResponse>> {
    let claims = state
        .signer
        .verify(&input.refresh_token, TokenKind::Refresh)
        .map_err(|_| AppError::unauthorized())?;
    let user: User = state.store.find(claims.sub).await?.ok_or_else(AppError::unauthorized)?;
    if !user.can_sign_in() {
        return Err(AppError::Unauthorized("Account is disabled".to_string()));
    }
    Ok(Json(issue_tokens(&state, user)))
}

async fn me(caller: Caller) -> Json<MeResponse> {
    let role = caller.role();
    Json(MeResponse {
        dashboard: role.dashboard_path(),
        permissions: role.permission_map(),
        user: caller.user,
    })
}

async fn two_factor_setup(State(state): State<Arc<AppState>>, caller: Caller) -> ApiResult<Json<TwoFactorSetupResponse>> {
    if caller.user.two_factor_enabled {
        return Err(AppError::Conflict("Two-factor authentication is already enabled".to_string()));
    }
    let mut credentials: UserCredentials = state.store.get(caller.id()).await?;
    let secret = auth::generate_totp_secret();
    credentials.pending_totp_secret = Some(secret.clone());
    credentials.updated_at = Utc::now();
    state.store.update(&credentials).await?;

    Ok(Json(TwoFactorSetupResponse {
        otpauth_uri: auth::otpauth_uri(&secret, &caller.user.email),
        secret,
    }))
}

async fn two_factor_verify(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(input): Json<TwoFactorCode>,
) -> ApiResult<Json<TwoFactorStatus>> {
    let mut credentials: UserCredentials = state.store.get(caller.id()).await?;
    let secret = credentials
        .pending_totp_secret
        .clone()
        .ok_or_else(|| AppError::BadRequest("Run two-factor setup first".to_string()))?;
    if !auth::verify_totp(&secret, &input.code, Utc::now().timestamp()) {
        return Err(AppError::BadRequest("Invalid two-factor code".to_string()));
    }

    let now = Utc::now();
    credentials.totp_secret = Some(secret);
    credentials.pending_totp_secret = None;
    credentials.updated_at = now;
    state.store.update(&credentials).await?;

    let user = update_user(&state, caller.id(), |u| u.two_factor_enabled = true).await?;
    tracing::info!(user = %user.id, "two-factor enabled");

    Ok(Json(TwoFactorStatus { two_factor_enabled: true }))
}

async fn two_factor_disable(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(input): Json<TwoFactorCode>,
) -> ApiResult<Json<TwoFactorStatus>> {
    let mut credentials: UserCredentials = state.store.get(caller.id()).await?;
    let Some(secret) = credentials.totp_secret.clone().filter(|_| caller.user.two_factor_enabled) else {
        return Err(AppError::BadRequest("Two-factor authentication is not enabled".to_string()));
    };
    if !auth::verify_totp(&secret, &input.code, Utc::now().timestamp()) {
        return Err(AppError::BadRequest("Invalid two-factor code".to_string()));
    }

    let now = Utc::now();
    credentials.totp_secret = None;
    credentials.updated_at = now;
    state.store.update(&credentials).await?;

    let user = update_user(&state, caller.id(), |u| u.two_factor_enabled = false).await?;
    tracing::info!(user = %user.id, "two-factor disabled");

    Ok(Json(TwoFactorStatus { two_factor_enabled: false }))
}
