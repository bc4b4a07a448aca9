//! HASS End-to-End Test Suite
//!
//! Drives a live server over HTTP through `hass-client`, one role at a time:
//! - Sign-in and dashboard routing for every role
//! - Sidebar navigation for every role
//! - Critical vitals and the emergency alert stream
//! - Prescription lifecycle
//! - Case-sheet discharge requests at reception
//! - Beds and file uploads
//!
//! By default each test boots its own server on an ephemeral port with an
//! in-memory database and the demo hospital. Set `API_BASE_URL` (or
//! `BASE_URL`) to run against a server that is already up instead.

pub mod auth;
pub mod beds;
pub mod discharge;
pub mod files;
pub mod navigation;
pub mod prescriptions;
pub mod vitals;

use anyhow::Context;
use hass_client::{ApiClient, ClientConfig, NewPatient, NewVisit};
use hass_integrity::{Gender, Patient, Visit, VisitType};
use hass_server::seed::{demo_email, DEMO_PASSWORD};
use hass_server::ServerConfig;
use hass_shared::Role;
use std::sync::Once;
use tokio::task::JoinHandle;

/// Server under test
pub struct Harness {
    pub base_url: String,
    server: Option<JoinHandle<()>>,
}

impl Drop for Harness {
    fn drop(&mut self) {
        if let Some(server) = self.server.take() {
            server.abort();
        }
    }
}

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

fn external_base_url() -> Option<String> {
    ["API_BASE_URL", "BASE_URL"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}

/// Account the smoke tests sign in with: `E2E_EMAIL` / `E2E_PASSWORD`, or
/// the demo super admin.
pub fn operator_credentials() -> (String, String) {
    let email = std::env::var("E2E_EMAIL").unwrap_or_else(|_| demo_email(Role::SuperAdmin));
    let password = std::env::var("E2E_PASSWORD").unwrap_or_else(|_| DEMO_PASSWORD.to_string());
    (email, password)
}

/// Millisecond stamp for names that must not collide across runs
pub fn unique_suffix() -> String {
    chrono::Utc::now().timestamp_millis().to_string()
}

impl Harness {
    pub async fn start() -> anyhow::Result<Self> {
        init_tracing();
        if let Some(base_url) = external_base_url() {
            return Ok(Self { base_url, server: None });
        }

        let (addr, server) = hass_server::spawn(ServerConfig::ephemeral())
            .await
            .context("starting hass-server")?;
        Ok(Self {
            base_url: format!("http://{}", addr),
            server: Some(server),
        })
    }

    /// A client with no session
    pub fn client(&self) -> anyhow::Result<ApiClient> {
        Ok(ApiClient::new(ClientConfig::new(self.base_url.clone()))?)
    }

    /// A client signed in as the demo account for `role`
    pub async fn client_as(&self, role: Role) -> anyhow::Result<ApiClient> {
        let client = self.client()?;
        client
            .login(&demo_email(role), DEMO_PASSWORD, None)
            .await
            .with_context(|| format!("signing in as {}", role))?;
        Ok(client)
    }

    /// Register a patient at reception and open an outpatient visit.
    pub async fn admit_walk_in(&self, first_name: &str, last_name: &str) -> anyhow::Result<(Patient, Visit)> {
        let reception = self.client_as(Role::Reception).await?;
        let patient = reception
            .create_patient(&NewPatient::new(first_name, last_name, "1975-06-15", Gender::Male))
            .await?;
        let visit = reception
            .create_visit(&NewVisit {
                patient_id: patient.id,
                visit_type: VisitType::Outpatient,
                attending_doctor_id: None,
                chief_complaint: Some("Shortness of breath".to_string()),
                department: Some("Emergency".to_string()),
                admit: false,
            })
            .await?;
        Ok((patient, visit))
    }
}
