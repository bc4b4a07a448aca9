//! `/messages`: threaded messaging between staff and patients.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use hass_integrity::{
    validate_message, validate_thread, Message, MessageThread, NotificationType, PushPayload, User,
};
use hass_shared::{DataCategory, PaginatedResult, Permission};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::ListQuery;
use crate::access::{self, require_authorization};
use crate::auth::Caller;
use crate::error::{ApiResult, AppError};
use crate::extract::{Json, Path, Query};
use crate::store::Filter;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/threads", get(list_threads).post(create_thread))
        .route("/threads/{id}", get(get_thread))
        .route("/threads/{id}/messages", get(list_messages).post(send_message))
        .route("/threads/{id}/read", post(mark_thread_read))
}

#[derive(Debug, Deserialize)]
pub struct CreateThreadRequest {
    pub subject: String,
    /// Other participants; the caller is always added
    pub participant_ids: Vec<Uuid>,
    pub patient_id: Option<Uuid>,
    /// Optional opening message
    pub body: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct ReadReceipt {
    pub marked_read: usize,
}

async fn load_thread(state: &AppState, caller: &Caller, id: Uuid, permission: Permission) -> ApiResult<MessageThread> {
    require_authorization(caller, DataCategory::Messages, permission)?;
    let thread: MessageThread = state.store.get(id).await?;
    // Threads are private to their participants
    if !thread.has_participant(caller.id()) {
        return Err(AppError::not_found("Thread"));
    }
    Ok(thread)
}

fn new_message(thread_id: Uuid, sender_id: Uuid, body: &str) -> Message {
    let now = Utc::now();
    Message {
        id: Uuid::new_v4(),
        thread_id,
        sender_id,
        body: body.trim().to_string(),
        read_by: vec![sender_id],
        created_at: now,
        updated_at: now,
    }
}

async fn create_thread(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(input): Json<CreateThreadRequest>,
) -> ApiResult<(StatusCode, Json<MessageThread>)> {
    require_authorization(&caller, DataCategory::Messages, Permission::Write)?;

    let mut participant_ids = vec![caller.id()];
    for id in input.participant_ids {
        if participant_ids.contains(&id) {
            continue;
        }
        let user: Option<User> = state.store.find(id).await?;
        match user {
            Some(user) if !user.is_deleted => participant_ids.push(id),
            _ => return Err(AppError::validation(format!("Unknown participant {}", id))),
        }
    }
    if let Some(patient_id) = input.patient_id {
        access::load_patient(&state, &caller, patient_id, DataCategory::Demographics, Permission::Read).await?;
    }

    let now = Utc::now();
    let mut thread = MessageThread {
        id: Uuid::new_v4(),
        hospital_id: caller.hospital_id(),
        subject: input.subject.trim().to_string(),
        participant_ids,
        patient_id: input.patient_id,
        created_by: caller.id(),
        last_message_at: None,
        created_at: now,
        updated_at: now,
    };
    validate_thread(&thread).into_result()?;

    let opening = input.body.as_deref().map(|body| new_message(thread.id, caller.id(), body));
    if let Some(message) = &opening {
        validate_message(message).into_result()?;
        thread.last_message_at = Some(message.created_at);
    }
    state.store.create(&thread).await?;
    if let Some(message) = &opening {
        state.store.create(message).await?;
    }

    tracing::info!(thread = %thread.id, participants = thread.participant_ids.len(), "thread created");
    Ok((StatusCode::CREATED, Json(thread)))
}

async fn list_threads(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PaginatedResult<MessageThread>>> {
    require_authorization(&caller, DataCategory::Messages, Permission::Read)?;
    let filter = Filter {
        participant: Some(caller.id()),
        patient_id: query.patient_id,
        ..Default::default()
    };
    Ok(Json(state.store.list(&filter, &query.pagination()?).await?))
}

async fn get_thread(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageThread>> {
    Ok(Json(load_thread(&state, &caller, id, Permission::Read).await?))
}

async fn list_messages(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PaginatedResult<Message>>> {
    let thread = load_thread(&state, &caller, id, Permission::Read).await?;
    let filter = Filter {
        parent_id: Some(thread.id),
        ..Default::default()
    };
    Ok(Json(state.store.list(&filter, &query.pagination()?).await?))
}

async fn send_message(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(input): Json<SendMessageRequest>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    let mut thread = load_thread(&state, &caller, id, Permission::Write).await?;
    let message = new_message(thread.id, caller.id(), &input.body);
    validate_message(&message).into_result()?;
    state.store.create(&message).await?;

    thread.last_message_at = Some(message.created_at);
    thread.updated_at = message.created_at;
    state.store.update(&thread).await?;

    let mut alert = PushPayload::new(
        NotificationType::Message,
        format!("New message: {}", thread.subject),
        format!("{}: {}", caller.user.full_name, preview(&message.body)),
    )
    .with_url(format!("/messages/{}", thread.id));
    if let Some(hospital_id) = thread.hospital_id {
        alert = alert.in_hospital(hospital_id);
    }
    state.alerts.publish(alert);

    Ok((StatusCode::CREATED, Json(message)))
}

/// First 80 characters of a message body
fn preview(body: &str) -> String {
    const LIMIT: usize = 80;
    if body.chars().count() <= LIMIT {
        body.to_string()
    } else {
        let cut: String = body.chars().take(LIMIT).collect();
        format!("{}…", cut)
    }
}

async fn mark_thread_read(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ReadReceipt>> {
    let thread = load_thread(&state, &caller, id, Permission::Read).await?;
    let filter = Filter {
        parent_id: Some(thread.id),
        ..Default::default()
    };
    let mut marked_read = 0;
    for mut message in state.store.list_all::<Message>(&filter).await? {
        if message.mark_read(caller.id()) {
            message.updated_at = Utc::now();
            state.store.update(&message).await?;
            marked_read += 1;
        }
    }
    Ok(Json(ReadReceipt { marked_read }))
}
