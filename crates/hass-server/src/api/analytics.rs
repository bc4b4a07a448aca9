//! `/analytics`: hospital-wide counts and the per-role dashboard cards.

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use hass_integrity::{
    Appointment, AppointmentStatus, Bed, BedOccupancy, BedStatus, CaseSheet, LabTest, LabTestStatus, NurseLog,
    NurseLogStatus, Patient, Prescription, PrescriptionStatus, Visit, VisitStatus, Vitals, VitalsSeverity,
};
use hass_shared::{DataCategory, Permission, Role};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::access::{self, require_authorization};
use crate::auth::Caller;
use crate::error::ApiResult;
use crate::extract::Json;
use crate::store::{Entry, Filter};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/summary", get(summary))
        .route("/dashboard", get(dashboard))
}

#[derive(Debug, Serialize)]
pub struct AnalyticsSummary {
    pub patients: usize,
    pub visits_by_status: BTreeMap<String, usize>,
    pub beds: BedOccupancy,
    pub bed_occupancy_rate: f64,
    pub prescriptions_by_status: BTreeMap<String, usize>,
    pub pending_lab_tests: usize,
    pub critical_vitals: usize,
}

#[derive(Debug, Serialize)]
pub struct DashboardCard {
    pub key: &'static str,
    pub label: &'static str,
    pub value: Value,
}

#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub role: Role,
    pub dashboard: String,
    pub cards: Vec<DashboardCard>,
}

const PENDING_LAB: [LabTestStatus; 3] = [
    LabTestStatus::Ordered,
    LabTestStatus::SampleCollected,
    LabTestStatus::InProgress,
];

/// Count records in `scope` with the given status
async fn count_status<T: Entry>(state: &AppState, scope: &Filter, status: impl ToString) -> ApiResult<usize> {
    let filter = Filter {
        status: Some(status.to_string()),
        ..scope.clone()
    };
    Ok(state.store.count::<T>(&filter).await?)
}

async fn pending_lab_tests(state: &AppState, scope: &Filter) -> ApiResult<usize> {
    let counts = state.store.count_by_status::<LabTest>(scope).await?;
    Ok(PENDING_LAB
        .iter()
        .map(|s| counts.get(&s.to_string()).copied().unwrap_or(0))
        .sum())
}

async fn bed_occupancy(state: &AppState, caller: &Caller) -> ApiResult<BedOccupancy> {
    let scope = Filter {
        hospital_in: access::hospital_scope(state, caller).await?,
        ..Default::default()
    };
    let beds: Vec<Bed> = state.store.list_all(&scope).await?;
    Ok(BedOccupancy::from_beds(&beds))
}

async fn summary(State(state): State<Arc<AppState>>, caller: Caller) -> ApiResult<Json<AnalyticsSummary>> {
    require_authorization(&caller, DataCategory::Analytics, Permission::Read)?;
    let scope = access::scope_filter(&state, &caller).await?;

    let patients = if caller.role() == Role::Patient {
        usize::from(access::own_patient(&state, &caller).await?.is_some())
    } else {
        state.store.count::<Patient>(&scope).await?
    };
    let beds = if caller.role() == Role::Patient {
        BedOccupancy::default()
    } else {
        bed_occupancy(&state, &caller).await?
    };

    Ok(Json(AnalyticsSummary {
        patients,
        visits_by_status: state.store.count_by_status::<Visit>(&scope).await?,
        bed_occupancy_rate: beds.rate(),
        beds,
        prescriptions_by_status: state.store.count_by_status::<Prescription>(&scope).await?,
        pending_lab_tests: pending_lab_tests(&state, &scope).await?,
        critical_vitals: count_status::<Vitals>(&state, &scope, VitalsSeverity::Critical).await?,
    }))
}

fn card(key: &'static str, label: &'static str, value: impl Into<Value>) -> DashboardCard {
    DashboardCard {
        key,
        label,
        value: value.into(),
    }
}

async fn dashboard(State(state): State<Arc<AppState>>, caller: Caller) -> ApiResult<Json<DashboardSummary>> {
    require_authorization(&caller, DataCategory::Analytics, Permission::Read)?;
    let role = caller.role();
    let scope = access::scope_filter(&state, &caller).await?;

    let cards = match role {
        Role::Doctor => {
            let mine = Filter {
                actor_id: Some(caller.id()),
                ..scope.clone()
            };
            let admitted = count_status::<Visit>(&state, &mine, VisitStatus::Admitted).await?;
            let upcoming = count_status::<Appointment>(&state, &mine, AppointmentStatus::Scheduled).await?;
            let active = count_status::<Prescription>(&state, &scope, PrescriptionStatus::Active).await?;
            vec![
                card("admitted_patients", "My admitted patients", admitted),
                card("upcoming_appointments", "My upcoming appointments", upcoming),
                card("pending_lab_tests", "Pending lab tests", pending_lab_tests(&state, &scope).await?),
                card("active_prescriptions", "Active prescriptions", active),
            ]
        }
        Role::Nurse => {
            let critical = count_status::<Vitals>(&state, &scope, VitalsSeverity::Critical).await?;
            let to_administer = count_status::<Prescription>(&state, &scope, PrescriptionStatus::Dispensed).await?;
            let open_logs = count_status::<NurseLog>(&state, &scope, NurseLogStatus::Open).await?;
            vec![
                card("critical_vitals", "Critical vitals", critical),
                card("to_administer", "Medications to administer", to_administer),
                card("open_nurse_logs", "Open nurse logs", open_logs),
                card("occupied_beds", "Occupied beds", bed_occupancy(&state, &caller).await?.occupied),
            ]
        }
        Role::Patient => {
            let upcoming = count_status::<Appointment>(&state, &scope, AppointmentStatus::Scheduled).await?;
            let active = count_status::<Prescription>(&state, &scope, PrescriptionStatus::Active).await?;
            let results = count_status::<LabTest>(&state, &scope, LabTestStatus::Completed).await?;
            vec![
                card("upcoming_appointments", "Upcoming appointments", upcoming),
                card("active_prescriptions", "Active prescriptions", active),
                card("lab_results", "Lab results", results),
            ]
        }
        Role::Pharmacist => {
            let to_dispense = count_status::<Prescription>(&state, &scope, PrescriptionStatus::Active).await?;
            let dispensed = count_status::<Prescription>(&state, &scope, PrescriptionStatus::Dispensed).await?;
            vec![
                card("to_dispense", "Prescriptions to dispense", to_dispense),
                card("dispensed", "Dispensed", dispensed),
            ]
        }
        Role::LabTech => {
            let ordered = count_status::<LabTest>(&state, &scope, LabTestStatus::Ordered).await?;
            let collected = count_status::<LabTest>(&state, &scope, LabTestStatus::SampleCollected).await?;
            let in_progress = count_status::<LabTest>(&state, &scope, LabTestStatus::InProgress).await?;
            vec![
                card("ordered", "Awaiting sample", ordered),
                card("sample_collected", "Samples collected", collected),
                card("in_progress", "In progress", in_progress),
            ]
        }
        Role::Reception => {
            let sheets: Vec<CaseSheet> = state.store.list_all(&scope).await?;
            let discharge_requests: usize = sheets.iter().map(|s| s.pending_discharge_requests().len()).sum();
            let waiting = count_status::<Visit>(&state, &scope, VisitStatus::Pending).await?;
            let scheduled = count_status::<Appointment>(&state, &scope, AppointmentStatus::Scheduled).await?;
            let available = count_status::<Bed>(&state, &scope, BedStatus::Available).await?;
            vec![
                card("pending_visits", "Waiting patients", waiting),
                card("scheduled_appointments", "Scheduled appointments", scheduled),
                card("discharge_requests", "Pending discharge requests", discharge_requests),
                card("available_beds", "Available beds", available),
            ]
        }
        Role::Manager | Role::Admin | Role::RegionalAdmin | Role::SuperAdmin => {
            let beds = bed_occupancy(&state, &caller).await?;
            let admitted = count_status::<Visit>(&state, &scope, VisitStatus::Admitted).await?;
            vec![
                card("patients", "Registered patients", state.store.count::<Patient>(&scope).await?),
                card("admitted", "Admitted", admitted),
                card("bed_occupancy_rate", "Bed occupancy (%)", json!((beds.rate() * 10.0).round() / 10.0)),
                card("available_beds", "Available beds", beds.available),
            ]
        }
    };

    Ok(Json(DashboardSummary {
        role,
        dashboard: role.dashboard_path(),
        cards,
    }))
}
