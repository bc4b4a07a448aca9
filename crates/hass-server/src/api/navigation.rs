//! `/navigation`: the sidebar manifest for the signed-in role.

use axum::routing::get;
use axum::Router;
use hass_integrity::{navigation_for, Navigation};
use std::sync::Arc;

use crate::auth::Caller;
use crate::extract::Json;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/navigation", get(navigation))
}

async fn navigation(caller: Caller) -> Json<Navigation> {
    Json(navigation_for(caller.role()))
}
