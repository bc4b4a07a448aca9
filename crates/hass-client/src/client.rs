//! `ApiClient`: one method per endpoint of the HASS REST API.

use futures::stream::{self, Stream, StreamExt};
use hass_integrity::{
    Appointment, Bed, CaseSheet, CaseSheetSections, Hospital, LabTest, Message, MessageThread, Navigation, NurseLog,
    Patient, PendingEvent, Prescription, PushPayload, Region, StoredFile, User, Visit,
};
use hass_shared::{AccessLogEntry, PaginatedResult};
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{ClientConfig, API_PREFIX};
use crate::error::{ApiError, ClientError, ClientResult};
use crate::sse::{decode_alert, SseParser};
use crate::storage::{self, ClientStorage, MemoryStorage, Session};
use crate::types::*;

/// File to upload through `/files`
#[derive(Clone, Debug)]
pub struct Upload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub patient_id: Option<Uuid>,
    pub description: Option<String>,
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
    storage: Arc<dyn ClientStorage>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.config.base_url)
            .field("signed_in", &self.is_signed_in())
            .finish()
    }
}

impl ApiClient {
    /// Client with in-memory session storage
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        Self::with_storage(config, Arc::new(MemoryStorage::new()))
    }

    pub fn with_storage(config: ClientConfig, storage: Arc<dyn ClientStorage>) -> ClientResult<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config, storage })
    }

    pub fn from_env() -> ClientResult<Self> {
        Self::new(ClientConfig::from_env())
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn storage(&self) -> &dyn ClientStorage {
        self.storage.as_ref()
    }

    pub fn session(&self) -> Option<Session> {
        storage::load_session(self.storage.as_ref())
    }

    pub fn is_signed_in(&self) -> bool {
        self.storage.get(storage::ACCESS_TOKEN_KEY).is_some()
    }

    /// The signed-in user as stored at login
    pub fn current_user(&self) -> Option<User> {
        self.session().and_then(|session| session.user)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.config.base_url, API_PREFIX, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.storage.get(storage::ACCESS_TOKEN_KEY) {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Turn a non-2xx response into an `ApiError`. A 401 ends the session.
    async fn check(&self, response: Response) -> ClientResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let err = ApiError::from_response(status, &body);
        if err.is_unauthorized() {
            if let Err(clear_err) = storage::clear_session(self.storage.as_ref()) {
                tracing::warn!(%clear_err, "could not clear session after 401");
            }
        }
        tracing::debug!(status = err.status, message = %err.message, "api request failed");
        Err(err.into())
    }

    /// Send a request. GET and HEAD are retried with exponential backoff on
    /// network errors and 5xx responses; other methods are sent once.
    async fn send(
        &self,
        method: Method,
        path: &str,
        build: impl Fn(RequestBuilder) -> RequestBuilder,
    ) -> ClientResult<Response> {
        let retries = if method == Method::GET || method == Method::HEAD {
            self.config.max_retries
        } else {
            0
        };
        let url = self.url(path);

        let mut attempt = 0;
        loop {
            let request = build(self.authorized(self.http.request(method.clone(), &url)));
            match request.send().await {
                Ok(response) if response.status().is_server_error() && attempt < retries => {
                    tracing::warn!(%url, status = %response.status(), attempt, "server error, retrying");
                }
                Ok(response) => return self.check(response).await,
                Err(err) if attempt < retries => {
                    tracing::warn!(%url, %err, attempt, "request failed, retrying");
                }
                Err(err) => return Err(ClientError::Network(err)),
            }
            tokio::time::sleep(self.config.backoff(attempt)).await;
            attempt += 1;
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        Self::decode(self.send(Method::GET, path, |r| r).await?).await
    }

    async fn get_query<T: DeserializeOwned, Q: Serialize + ?Sized>(&self, path: &str, query: &Q) -> ClientResult<T> {
        Self::decode(self.send(Method::GET, path, |r| r.query(query)).await?).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ClientResult<T> {
        Self::decode(self.send(Method::POST, path, |r| r.json(body)).await?).await
    }

    async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ClientResult<T> {
        Self::decode(self.send(Method::PATCH, path, |r| r.json(body)).await?).await
    }

    // ==================== HEALTH ====================

    /// `GET /health`, outside the API prefix
    pub async fn health(&self) -> ClientResult<Value> {
        let response = self.http.get(format!("{}/health", self.config.base_url)).send().await?;
        Self::decode(self.check(response).await?).await
    }

    // ==================== AUTH ====================

    /// Sign in and keep the session in storage.
    pub async fn login(&self, email: &str, password: &str, otp_code: Option<&str>) -> ClientResult<TokenResponse> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
            otp_code: otp_code.map(str::to_string),
        };
        let tokens: TokenResponse = self.post("/auth/login", &request).await?;
        self.store_tokens(&tokens)?;
        tracing::info!(user = %tokens.user.id, role = %tokens.user.role, "signed in");
        Ok(tokens)
    }

    fn store_tokens(&self, tokens: &TokenResponse) -> ClientResult<()> {
        storage::save_session(
            self.storage.as_ref(),
            &Session {
                access_token: tokens.access_token.clone(),
                refresh_token: Some(tokens.refresh_token.clone()),
                user: Some(tokens.user.clone()),
            },
        )
    }

    /// Sign out locally even if the server cannot be reached.
    pub async fn logout(&self) -> ClientResult<()> {
        let result = self.send(Method::POST, "/auth/logout", |r| r).await;
        storage::clear_session(self.storage.as_ref())?;
        result.map(|_| ())
    }

    pub async fn refresh(&self) -> ClientResult<TokenResponse> {
        let refresh_token = self
            .storage
            .get(storage::REFRESH_TOKEN_KEY)
            .ok_or(ClientError::NotSignedIn)?;
        let tokens: TokenResponse = self.post("/auth/refresh", &json!({ "refresh_token": refresh_token })).await?;
        self.store_tokens(&tokens)?;
        Ok(tokens)
    }

    pub async fn me(&self) -> ClientResult<MeResponse> {
        self.get("/auth/me").await
    }

    pub async fn two_factor_setup(&self) -> ClientResult<TwoFactorSetup> {
        self.post("/auth/2fa/setup", &json!({})).await
    }

    pub async fn two_factor_verify(&self, code: &str) -> ClientResult<TwoFactorStatus> {
        self.post("/auth/2fa/verify", &json!({ "code": code })).await
    }

    pub async fn two_factor_disable(&self, code: &str) -> ClientResult<TwoFactorStatus> {
        self.post("/auth/2fa/disable", &json!({ "code": code })).await
    }

    // ==================== PATIENTS ====================

    pub async fn list_patients(&self, params: &ListParams) -> ClientResult<PaginatedResult<Patient>> {
        self.get_query("/patients", params).await
    }

    pub async fn create_patient(&self, patient: &NewPatient) -> ClientResult<Patient> {
        self.post("/patients", patient).await
    }

    /// The signed-in patient's own record
    pub async fn my_patient_record(&self) -> ClientResult<Patient> {
        self.get("/patients/me").await
    }

    pub async fn patient_by_mrn(&self, mrn: &str) -> ClientResult<Patient> {
        self.get(&format!("/patients/mrn/{}", mrn)).await
    }

    pub async fn get_patient(&self, id: Uuid) -> ClientResult<Patient> {
        self.get(&format!("/patients/{}", id)).await
    }

    pub async fn update_patient(&self, id: Uuid, update: &PatientUpdate) -> ClientResult<Patient> {
        self.patch(&format!("/patients/{}", id), update).await
    }

    pub async fn patient_visits(&self, id: Uuid, params: &ListParams) -> ClientResult<PaginatedResult<Visit>> {
        self.get_query(&format!("/patients/{}/visits", id), params).await
    }

    pub async fn recent_vitals(&self, id: Uuid) -> ClientResult<PaginatedResult<BadgedVitals>> {
        self.get(&format!("/patients/{}/vitals/recent", id)).await
    }

    // ==================== VISITS ====================

    pub async fn list_visits(&self, params: &ListParams) -> ClientResult<PaginatedResult<Visit>> {
        self.get_query("/visits", params).await
    }

    pub async fn create_visit(&self, visit: &NewVisit) -> ClientResult<Visit> {
        self.post("/visits", visit).await
    }

    pub async fn get_visit(&self, id: Uuid) -> ClientResult<Visit> {
        self.get(&format!("/visits/{}", id)).await
    }

    pub async fn admit_visit(&self, id: Uuid, admit: &AdmitVisit) -> ClientResult<Visit> {
        self.post(&format!("/visits/{}/admit", id), admit).await
    }

    pub async fn discharge_visit(&self, id: Uuid, discharge: &DischargeVisit) -> ClientResult<Visit> {
        self.post(&format!("/visits/{}/discharge", id), discharge).await
    }

    // ==================== CLINICAL ====================

    pub async fn record_vitals(&self, vitals: &NewVitals) -> ClientResult<BadgedVitals> {
        self.post("/clinical/vitals", vitals).await
    }

    pub async fn list_vitals(&self, params: &ListParams) -> ClientResult<PaginatedResult<BadgedVitals>> {
        self.get_query("/clinical/vitals", params).await
    }

    pub async fn get_vitals(&self, id: Uuid) -> ClientResult<BadgedVitals> {
        self.get(&format!("/clinical/vitals/{}", id)).await
    }

    pub async fn create_prescription(&self, prescription: &NewPrescription) -> ClientResult<Prescription> {
        self.post("/clinical/prescriptions", prescription).await
    }

    pub async fn list_prescriptions(&self, params: &ListParams) -> ClientResult<PaginatedResult<Prescription>> {
        self.get_query("/clinical/prescriptions", params).await
    }

    pub async fn get_prescription(&self, id: Uuid) -> ClientResult<Prescription> {
        self.get(&format!("/clinical/prescriptions/{}", id)).await
    }

    pub async fn dispense_prescription(&self, id: Uuid) -> ClientResult<Prescription> {
        self.post(&format!("/clinical/prescriptions/{}/dispense", id), &json!({})).await
    }

    pub async fn administer_prescription(&self, id: Uuid, notes: Option<&str>) -> ClientResult<Prescription> {
        self.post(&format!("/clinical/prescriptions/{}/administer", id), &json!({ "notes": notes }))
            .await
    }

    pub async fn cancel_prescription(&self, id: Uuid, reason: Option<&str>) -> ClientResult<Prescription> {
        self.post(&format!("/clinical/prescriptions/{}/cancel", id), &json!({ "reason": reason }))
            .await
    }

    pub async fn order_lab_test(&self, test: &NewLabTest) -> ClientResult<LabTest> {
        self.post("/clinical/lab-tests", test).await
    }

    pub async fn list_lab_tests(&self, params: &ListParams) -> ClientResult<PaginatedResult<LabTest>> {
        self.get_query("/clinical/lab-tests", params).await
    }

    pub async fn get_lab_test(&self, id: Uuid) -> ClientResult<LabTest> {
        self.get(&format!("/clinical/lab-tests/{}", id)).await
    }

    pub async fn update_lab_status(&self, id: Uuid, update: &LabStatusUpdate) -> ClientResult<LabTest> {
        self.post(&format!("/clinical/lab-tests/{}/status", id), update).await
    }

    pub async fn record_lab_results(&self, id: Uuid, results: &LabResults) -> ClientResult<LabTest> {
        self.post(&format!("/clinical/lab-tests/{}/results", id), results).await
    }

    pub async fn create_nurse_log(&self, log: &NewNurseLog) -> ClientResult<NurseLog> {
        self.post("/clinical/nurse-logs", log).await
    }

    pub async fn list_nurse_logs(&self, params: &ListParams) -> ClientResult<PaginatedResult<NurseLog>> {
        self.get_query("/clinical/nurse-logs", params).await
    }

    pub async fn resolve_nurse_log(&self, id: Uuid) -> ClientResult<NurseLog> {
        self.post(&format!("/clinical/nurse-logs/{}/resolve", id), &json!({})).await
    }

    // ==================== APPOINTMENTS ====================

    pub async fn book_appointment(&self, appointment: &NewAppointment) -> ClientResult<Appointment> {
        self.post("/appointments", appointment).await
    }

    pub async fn list_appointments(&self, params: &ListParams) -> ClientResult<PaginatedResult<Appointment>> {
        self.get_query("/appointments", params).await
    }

    pub async fn get_appointment(&self, id: Uuid) -> ClientResult<Appointment> {
        self.get(&format!("/appointments/{}", id)).await
    }

    pub async fn update_appointment_status(&self, id: Uuid, update: &AppointmentStatusUpdate) -> ClientResult<Appointment> {
        self.post(&format!("/appointments/{}/status", id), update).await
    }

    // ==================== BEDS ====================

    pub async fn list_beds(&self, params: &ListParams) -> ClientResult<PaginatedResult<Bed>> {
        self.get_query("/beds", params).await
    }

    pub async fn create_bed(&self, bed: &NewBed) -> ClientResult<Bed> {
        self.post("/beds", bed).await
    }

    pub async fn bed_occupancy(&self) -> ClientResult<Occupancy> {
        self.get("/beds/occupancy").await
    }

    pub async fn get_bed(&self, id: Uuid) -> ClientResult<Bed> {
        self.get(&format!("/beds/{}", id)).await
    }

    pub async fn assign_bed(&self, id: Uuid, patient_id: Uuid, visit_id: Uuid) -> ClientResult<Bed> {
        self.post(
            &format!("/beds/{}/assign", id),
            &json!({ "patient_id": patient_id, "visit_id": visit_id }),
        )
        .await
    }

    pub async fn release_bed(&self, id: Uuid) -> ClientResult<Bed> {
        self.post(&format!("/beds/{}/release", id), &json!({})).await
    }

    pub async fn bed_maintenance(&self, id: Uuid) -> ClientResult<Bed> {
        self.post(&format!("/beds/{}/maintenance", id), &json!({})).await
    }

    // ==================== CASE SHEETS ====================

    pub async fn create_case_sheet(&self, sheet: &NewCaseSheet) -> ClientResult<CaseSheet> {
        self.post("/case-sheets", sheet).await
    }

    pub async fn list_case_sheets(&self, params: &ListParams) -> ClientResult<PaginatedResult<CaseSheet>> {
        self.get_query("/case-sheets", params).await
    }

    pub async fn get_case_sheet(&self, id: Uuid) -> ClientResult<CaseSheet> {
        self.get(&format!("/case-sheets/{}", id)).await
    }

    pub async fn update_case_sheet(&self, id: Uuid, sections: &CaseSheetSections) -> ClientResult<CaseSheet> {
        self.patch(&format!("/case-sheets/{}", id), sections).await
    }

    pub async fn add_progress_note(&self, id: Uuid, note: &str) -> ClientResult<CaseSheet> {
        self.post(&format!("/case-sheets/{}/progress-notes", id), &json!({ "note": note }))
            .await
    }

    pub async fn record_case_sheet_event(&self, id: Uuid, event: &NewCaseSheetEvent) -> ClientResult<EventRef> {
        self.post(&format!("/case-sheets/{}/events", id), event).await
    }

    pub async fn pending_events(&self, id: Uuid) -> ClientResult<Vec<PendingEvent>> {
        self.get(&format!("/case-sheets/{}/events/pending", id)).await
    }

    pub async fn acknowledge_event(&self, id: Uuid, acknowledgment: &Acknowledgment) -> ClientResult<EventRef> {
        self.post(&format!("/case-sheets/{}/acknowledge", id), acknowledgment).await
    }

    pub async fn pending_discharge_requests(&self) -> ClientResult<Vec<DischargeRequestView>> {
        self.get("/case-sheets/discharge-requests/pending").await
    }

    // ==================== MESSAGES ====================

    pub async fn list_threads(&self, params: &ListParams) -> ClientResult<PaginatedResult<MessageThread>> {
        self.get_query("/messages/threads", params).await
    }

    pub async fn create_thread(&self, thread: &NewThread) -> ClientResult<MessageThread> {
        self.post("/messages/threads", thread).await
    }

    pub async fn get_thread(&self, id: Uuid) -> ClientResult<MessageThread> {
        self.get(&format!("/messages/threads/{}", id)).await
    }

    pub async fn list_messages(&self, thread_id: Uuid, params: &ListParams) -> ClientResult<PaginatedResult<Message>> {
        self.get_query(&format!("/messages/threads/{}/messages", thread_id), params).await
    }

    pub async fn send_message(&self, thread_id: Uuid, body: &str) -> ClientResult<Message> {
        self.post(&format!("/messages/threads/{}/messages", thread_id), &json!({ "body": body }))
            .await
    }

    pub async fn mark_thread_read(&self, thread_id: Uuid) -> ClientResult<ReadReceipt> {
        self.post(&format!("/messages/threads/{}/read", thread_id), &json!({})).await
    }

    // ==================== ADMIN ====================

    pub async fn list_users(&self, params: &UserListParams) -> ClientResult<PaginatedResult<User>> {
        self.get_query("/admin/users", params).await
    }

    pub async fn create_user(&self, user: &NewUser) -> ClientResult<User> {
        self.post("/admin/users", user).await
    }

    pub async fn get_user(&self, id: Uuid) -> ClientResult<User> {
        self.get(&format!("/admin/users/{}", id)).await
    }

    pub async fn update_user(&self, id: Uuid, update: &UserUpdate) -> ClientResult<User> {
        self.patch(&format!("/admin/users/{}", id), update).await
    }

    pub async fn delete_user(&self, id: Uuid) -> ClientResult<()> {
        self.send(Method::DELETE, &format!("/admin/users/{}", id), |r| r).await?;
        Ok(())
    }

    pub async fn list_hospitals(&self, params: &ListParams) -> ClientResult<PaginatedResult<Hospital>> {
        self.get_query("/admin/hospitals", params).await
    }

    pub async fn create_hospital(&self, hospital: &NewHospital) -> ClientResult<Hospital> {
        self.post("/admin/hospitals", hospital).await
    }

    pub async fn list_regions(&self) -> ClientResult<Vec<Region>> {
        self.get("/admin/regions").await
    }

    pub async fn create_region(&self, region: &NewRegion) -> ClientResult<Region> {
        self.post("/admin/regions", region).await
    }

    pub async fn audit_logs(&self, params: &ListParams) -> ClientResult<PaginatedResult<AccessLogEntry>> {
        self.get_query("/admin/audit-logs", params).await
    }

    // ==================== ANALYTICS, BILLING, NAVIGATION ====================

    pub async fn analytics_summary(&self) -> ClientResult<AnalyticsSummary> {
        self.get("/analytics/summary").await
    }

    pub async fn dashboard(&self) -> ClientResult<DashboardSummary> {
        self.get("/analytics/dashboard").await
    }

    pub async fn billing_invoices(&self) -> ClientResult<BillingState> {
        self.get("/billing/invoices").await
    }

    pub async fn billing_summary(&self) -> ClientResult<BillingState> {
        self.get("/billing/summary").await
    }

    pub async fn navigation(&self) -> ClientResult<Navigation> {
        self.get("/navigation").await
    }

    /// GET an arbitrary API path, e.g. a navigation item's endpoint. The
    /// API prefix is stripped if present.
    pub async fn get_json(&self, path: &str) -> ClientResult<Value> {
        self.get(path.strip_prefix(API_PREFIX).unwrap_or(path)).await
    }

    // ==================== FILES ====================

    pub async fn upload_file(&self, upload: Upload) -> ClientResult<StoredFile> {
        let part = Part::bytes(upload.bytes)
            .file_name(upload.filename)
            .mime_str(&upload.content_type)?;
        let mut form = Form::new().part("file", part);
        if let Some(patient_id) = upload.patient_id {
            form = form.text("patient_id", patient_id.to_string());
        }
        if let Some(description) = upload.description {
            form = form.text("description", description);
        }

        let request = self.authorized(self.http.post(self.url("/files"))).multipart(form);
        let response = self.check(request.send().await?).await?;
        Self::decode(response).await
    }

    pub async fn list_files(&self, params: &ListParams) -> ClientResult<PaginatedResult<StoredFile>> {
        self.get_query("/files", params).await
    }

    pub async fn get_file(&self, id: Uuid) -> ClientResult<StoredFile> {
        self.get(&format!("/files/{}", id)).await
    }

    pub async fn download_file(&self, id: Uuid) -> ClientResult<Vec<u8>> {
        let response = self.send(Method::GET, &format!("/files/{}/download", id), |r| r).await?;
        Ok(response.bytes().await?.to_vec())
    }

    // ==================== ALERTS ====================

    /// Subscribe to real-time alerts. The stream ends when the server
    /// closes the connection; dropping it unsubscribes.
    pub async fn alerts(&self) -> ClientResult<impl Stream<Item = ClientResult<PushPayload>> + Send> {
        let request = self
            .authorized(self.http.get(self.url("/alerts/stream")))
            .header(ACCEPT, "text/event-stream");
        let response = self.check(request.send().await?).await?;

        let body = response.bytes_stream().boxed();
        let state = (body, SseParser::new(), VecDeque::new());
        Ok(stream::unfold(state, |(mut body, mut parser, mut queued)| async move {
            loop {
                if let Some(item) = queued.pop_front() {
                    return Some((item, (body, parser, queued)));
                }
                match body.next().await {
                    Some(Ok(chunk)) => {
                        for event in parser.feed(&chunk) {
                            if let Some(decoded) = decode_alert(&event) {
                                queued.push_back(decoded.map_err(ClientError::from));
                            }
                        }
                    }
                    Some(Err(err)) => return Some((Err(ClientError::Network(err)), (body, parser, queued))),
                    None => return None,
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Read one request: headers plus a Content-Length body.
    async fn read_request(socket: &mut TcpStream) {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let Ok(n) = socket.read(&mut buf).await else { return };
            if n == 0 {
                return;
            }
            data.extend_from_slice(&buf[..n]);
            let Some(end) = data.windows(4).position(|w| w == b"\r\n\r\n") else { continue };
            let head = String::from_utf8_lossy(&data[..end]).to_lowercase();
            let length = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if data.len() >= end + 4 + length {
                return;
            }
        }
    }

    /// Answer each connection with the next scripted response, then 200 `{}`.
    async fn scripted(responses: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            let mut responses = responses.into_iter();
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                read_request(&mut socket).await;
                let (status, body) = responses.next().unwrap_or((200, "{}"));
                let response = format!(
                    "HTTP/1.1 {} Scripted\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        (format!("http://{}", addr), hits)
    }

    fn client(base_url: &str) -> ApiClient {
        let config = ClientConfig {
            retry_base_delay: Duration::from_millis(1),
            ..ClientConfig::new(base_url)
        };
        ApiClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_get_retried_on_server_error() {
        let (url, hits) = scripted(vec![(503, ""), (502, ""), (200, r#"{"ok":true}"#)]).await;
        let value = client(&url).get_json("/api/v1/navigation").await.unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_get_gives_up_after_three_retries() {
        let (url, hits) = scripted(vec![(500, ""); 6]).await;
        let err = client(&url).get_json("/navigation").await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_post_never_retried() {
        let (url, hits) = scripted(vec![(503, ""), (200, "{}")]).await;
        let err = client(&url).mark_thread_read(Uuid::new_v4()).await.unwrap_err();
        match err {
            ClientError::Api(api) => {
                assert_eq!(api.status, 503);
                assert_eq!(api.message, "The server is temporarily unavailable. Please try again later.");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_clears_session() {
        let (url, _) = scripted(vec![(401, r#"{"detail":"Not authenticated"}"#)]).await;
        let client = client(&url);
        storage::save_session(
            client.storage(),
            &Session {
                access_token: "stale".to_string(),
                refresh_token: Some("stale-refresh".to_string()),
                user: None,
            },
        )
        .unwrap();
        assert!(client.is_signed_in());

        let err = client.me().await.unwrap_err();
        match err {
            ClientError::Api(api) => {
                assert_eq!(api.message, "Not authenticated");
                assert_eq!(api.redirect_to.as_deref(), Some("/login"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!client.is_signed_in());
        assert!(client.session().is_none());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(&format!("http://{}", addr)).get_json("/navigation").await.unwrap_err();
        assert!(matches!(err, ClientError::Network(_)));
        assert_eq!(err.to_string(), crate::error::NETWORK_MESSAGE);
    }
}
