//! `/billing`: placeholder endpoints. Billing has no data model yet, so
//! every page gets an explicit empty state instead of a 404.

use axum::routing::get;
use axum::Router;
use hass_shared::{DataCategory, Permission};
use serde::Serialize;
use std::sync::Arc;

use crate::access::require_authorization;
use crate::auth::Caller;
use crate::error::ApiResult;
use crate::extract::Json;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/invoices", get(invoices))
        .route("/summary", get(summary))
}

const UNAVAILABLE: &str = "Billing is not available yet";

#[derive(Debug, Serialize)]
pub struct BillingEmptyState {
    pub available: bool,
    pub message: &'static str,
    pub items: Vec<serde_json::Value>,
}

impl BillingEmptyState {
    fn new() -> Self {
        Self {
            available: false,
            message: UNAVAILABLE,
            items: Vec::new(),
        }
    }
}

async fn invoices(caller: Caller) -> ApiResult<Json<BillingEmptyState>> {
    require_authorization(&caller, DataCategory::Billing, Permission::Read)?;
    Ok(Json(BillingEmptyState::new()))
}

async fn summary(caller: Caller) -> ApiResult<Json<BillingEmptyState>> {
    require_authorization(&caller, DataCategory::Billing, Permission::Read)?;
    Ok(Json(BillingEmptyState::new()))
}
