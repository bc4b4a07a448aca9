//! HTTP handlers, one module per endpoint family under `/api/v1`.

pub mod admin;
pub mod alerts;
pub mod analytics;
pub mod appointments;
pub mod auth;
pub mod beds;
pub mod billing;
pub mod case_sheets;
pub mod clinical;
pub mod files;
pub mod messages;
pub mod navigation;
pub mod patients;
pub mod visits;

use axum::Router;
use hass_shared::PaginationInput;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::store::Filter;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/auth", auth::routes())
        .nest("/patients", patients::routes())
        .nest("/visits", visits::routes())
        .nest("/clinical", clinical::routes())
        .nest("/appointments", appointments::routes())
        .nest("/beds", beds::routes())
        .nest("/case-sheets", case_sheets::routes())
        .nest("/messages", messages::routes())
        .nest("/admin", admin::routes())
        .nest("/analytics", analytics::routes())
        .nest("/files", files::routes())
        .nest("/billing", billing::routes())
        .nest("/alerts", alerts::routes())
        .merge(navigation::routes())
}

/// Query string shared by list endpoints
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    pub patient_id: Option<Uuid>,
    pub visit_id: Option<Uuid>,
    pub hospital_id: Option<Uuid>,
    pub status: Option<String>,
}

impl ListQuery {
    pub fn pagination(&self) -> ApiResult<PaginationInput> {
        let pagination = PaginationInput::from_parts(self.offset, self.limit);
        pagination.validate()?;
        Ok(pagination)
    }

    /// Narrow `scope` by the query. Never widens it: asking for a patient
    /// or hospital outside the scope yields an empty result.
    pub fn narrow(&self, mut scope: Filter) -> Filter {
        if let Some(patient_id) = self.patient_id {
            match scope.patient_id {
                Some(scoped) if scoped != patient_id => scope.hospital_in = Some(Vec::new()),
                _ => scope.patient_id = Some(patient_id),
            }
        }
        if let Some(hospital_id) = self.hospital_id {
            let allowed = scope.hospital_in.as_ref().map_or(true, |ids| ids.contains(&hospital_id));
            scope.hospital_in = Some(if allowed { vec![hospital_id] } else { Vec::new() });
        }
        if self.visit_id.is_some() {
            scope.visit_id = self.visit_id;
        }
        if self.status.is_some() {
            scope.status = self.status.clone();
        }
        scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_narrow_never_widens_patient_scope() {
        let own = Uuid::new_v4();
        let query = ListQuery {
            patient_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        let filter = query.narrow(Filter::patient(own));
        assert_eq!(filter.patient_id, Some(own));
        assert_eq!(filter.hospital_in, Some(vec![]));
    }

    #[test]
    fn test_narrow_hospital_within_scope() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let scope = Filter {
            hospital_in: Some(vec![a, b]),
            ..Default::default()
        };
        let query = ListQuery {
            hospital_id: Some(b),
            ..Default::default()
        };
        assert_eq!(query.narrow(scope.clone()).hospital_in, Some(vec![b]));

        let outside = ListQuery {
            hospital_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        assert_eq!(outside.narrow(scope).hospital_in, Some(vec![]));
    }

    #[test]
    fn test_oversized_page_rejected() {
        let query = ListQuery {
            limit: Some(500),
            ..Default::default()
        };
        assert!(query.pagination().is_err());
    }
}
