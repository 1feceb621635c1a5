//! VitalVoice HTTP REST API
//!
//! Axum-based HTTP server for the voice client.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to an
//! inner function returning `(StatusCode, serde_json::Value)`. The inner
//! functions take only the collaborators they need, so they are testable
//! without axum dispatch.
//!
//! Endpoints:
//! - GET    /health                   health check with DB status
//! - GET    /version                  server version info
//! - POST   /chat/message             route one utterance
//! - GET    /chat/history             a user's conversation log
//! - POST   /format-reminder          model-assisted reminder extraction
//! - GET    /reminders                list a user's reminders
//! - GET    /reminders/:id            fetch one reminder
//! - POST   /reminder-data            save client-structured reminders
//! - POST   /delete-reminder          delete a user's reminder
//! - POST   /send-emergency           WhatsApp alert fan-out
//! - GET    /api/saved-contacts       list emergency contacts
//! - POST   /api/saved-contacts       add or replace a contact
//! - DELETE /api/saved-contacts/:id   remove a contact

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use uuid::Uuid;

use vitalvoice_core::alerts::AlertSender;
use vitalvoice_core::models::{Role, SavedContact};
use vitalvoice_core::store::{ContactStore, HistoryStore, ReminderStore};
use vitalvoice_core::VitalConfig;

use crate::router::{ChatError, ChatRequest, ConversationRouter};
use crate::subsystems::alerts::{alert_body, contact_numbers, coordinate, fan_out};
use crate::subsystems::reminders::{
    format_reminders, save_reminder_data, FormatError, ReminderDataError,
};

/// Header carrying the caller's user id for the contacts API.
pub const USER_ID_HEADER: &str = "x-user-id";

const CHAT_FAILED: &str = "Failed to get a response from the assistant";

/// Shared state for all HTTP handlers
pub struct HttpState {
    pub config: VitalConfig,
    pub router: ConversationRouter,
    pub reminders: Arc<dyn ReminderStore>,
    pub history: Arc<dyn HistoryStore>,
    pub contacts: Arc<dyn ContactStore>,
    /// `None` when alerts are disabled in config.
    pub alerts: Option<Arc<dyn AlertSender>>,
    /// `None` when running on the in-memory store.
    pub pool: Option<PgPool>,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/chat/message", post(chat_handler))
        .route("/chat/history", get(history_handler))
        .route("/format-reminder", post(format_reminder_handler))
        .route("/reminders", get(list_reminders_handler))
        .route("/reminders/:id", get(get_reminder_handler))
        .route("/reminder-data", post(reminder_data_handler))
        .route("/delete-reminder", post(delete_reminder_handler))
        .route("/send-emergency", post(send_emergency_handler))
        .route(
            "/api/saved-contacts",
            get(list_contacts_handler).post(add_contact_handler),
        )
        .route("/api/saved-contacts/:id", delete(delete_contact_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<HttpState>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("VitalVoice HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

fn error_body(msg: impl Into<String>) -> Value {
    json!({ "success": false, "error": msg.into() })
}

fn text_field<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner health check. Without a pool the in-memory store is reported.
pub async fn health_inner(pool: Option<&PgPool>) -> (StatusCode, Value) {
    let Some(pool) = pool else {
        return (
            StatusCode::OK,
            json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "storage": "memory",
            }),
        );
    };

    match vitalvoice_core::db::health_check(pool).await {
        Ok(pg_ver) => (
            StatusCode::OK,
            json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "storage": "postgresql",
                "postgresql": pg_ver,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({
                "status": "unhealthy",
                "error": e.to_string(),
            }),
        ),
    }
}

/// Inner version (pure, no IO).
pub fn version_inner() -> Value {
    json!({
        "version": env!("CARGO_PKG_VERSION"),
        "service": "vitalvoice",
    })
}

/// Inner chat. Validation failures, including mistyped fields, are 400; any
/// upstream failure is a generic 500 with the cause logged.
pub async fn chat_inner(router: &ConversationRouter, body: Value) -> (StatusCode, Value) {
    let outcome = match ChatRequest::from_json(&body) {
        Ok(req) => router.handle(req).await,
        Err(e) => Err(e),
    };
    match outcome {
        Ok(outcome) => {
            tracing::debug!(branch = ?outcome.branch, "Chat message routed");
            (StatusCode::OK, outcome.to_json())
        }
        Err(ChatError::Validation(msg)) => (StatusCode::BAD_REQUEST, error_body(msg)),
        Err(e) => {
            tracing::error!(error = %e, "Chat message failed");
            (StatusCode::INTERNAL_SERVER_ERROR, error_body(CHAT_FAILED))
        }
    }
}

pub async fn history_inner(
    history: &dyn HistoryStore,
    user_id: Option<&str>,
) -> (StatusCode, Value) {
    let Some(user_id) = user_id.map(str::trim).filter(|u| !u.is_empty()) else {
        return (StatusCode::BAD_REQUEST, error_body("userId is required"));
    };

    match history.find_history(user_id, None).await {
        Ok(turns) => {
            let turns: Vec<_> = turns.into_iter().filter(|t| t.role != Role::System).collect();
            (
                StatusCode::OK,
                json!({ "success": true, "count": turns.len(), "history": turns }),
            )
        }
        Err(e) => {
            tracing::error!(user_id, error = %e, "Failed to load history");
            (StatusCode::INTERNAL_SERVER_ERROR, error_body("Failed to load history"))
        }
    }
}

pub async fn format_reminder_inner(router: &ConversationRouter, body: Value) -> (StatusCode, Value) {
    let Some(input) = text_field(&body, "input") else {
        return (
            StatusCode::BAD_REQUEST,
            error_body("No input provided. Please provide a reminder description."),
        );
    };
    let Some(user_id) = text_field(&body, "userId") else {
        return (StatusCode::BAD_REQUEST, error_body("userId is required"));
    };

    let result = format_reminders(
        input,
        user_id,
        router.clock().now(),
        router.completion(),
        router.intent_classifier(),
        router.reminder_store(),
    )
    .await;

    match result {
        Ok(outcome) => {
            let errors = if outcome.errors.is_empty() {
                Value::Null
            } else {
                json!(outcome.errors)
            };
            (
                StatusCode::OK,
                json!({
                    "success": true,
                    "count": outcome.reminders.len(),
                    "reminders": outcome.reminders,
                    "errors": errors,
                    "used_fallback": outcome.used_fallback,
                }),
            )
        }
        Err(FormatError::Completion(e)) => {
            tracing::error!(user_id, error = %e, "Reminder formatting failed");
            (StatusCode::INTERNAL_SERVER_ERROR, error_body("Failed to format reminder"))
        }
        Err(FormatError::NothingSaved { errors }) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({
                "success": false,
                "error": "No reminders could be saved",
                "details": errors,
            }),
        ),
    }
}

pub async fn list_reminders_inner(
    reminders: &dyn ReminderStore,
    user_id: Option<&str>,
) -> (StatusCode, Value) {
    let Some(user_id) = user_id.map(str::trim).filter(|u| !u.is_empty()) else {
        return (StatusCode::BAD_REQUEST, error_body("userId is required"));
    };

    match reminders.list_for_user(user_id).await {
        Ok(list) => (
            StatusCode::OK,
            json!({ "success": true, "count": list.len(), "reminders": list }),
        ),
        Err(e) => {
            tracing::error!(user_id, error = %e, "Failed to list reminders");
            (StatusCode::INTERNAL_SERVER_ERROR, error_body("Failed to fetch reminders"))
        }
    }
}

pub async fn get_reminder_inner(reminders: &dyn ReminderStore, id: &str) -> (StatusCode, Value) {
    let not_found = || {
        (
            StatusCode::NOT_FOUND,
            error_body(format!("Reminder with ID {} not found", id)),
        )
    };
    let Ok(uuid) = Uuid::parse_str(id) else {
        return not_found();
    };

    match reminders.get(uuid).await {
        Ok(Some(reminder)) => (StatusCode::OK, json!({ "success": true, "reminder": reminder })),
        Ok(None) => not_found(),
        Err(e) => {
            tracing::error!(id, error = %e, "Failed to fetch reminder");
            (StatusCode::INTERNAL_SERVER_ERROR, error_body("Failed to fetch reminder"))
        }
    }
}

/// Inner reminder-data. A single object answers with `reminder`, an array
/// with `reminders`.
pub async fn reminder_data_inner(
    reminders: &dyn ReminderStore,
    now: chrono::NaiveDateTime,
    body: Value,
) -> (StatusCode, Value) {
    match save_reminder_data(&body, now, reminders).await {
        Ok(saved) if body.is_array() => (
            StatusCode::OK,
            json!({ "success": true, "count": saved.len(), "reminders": saved }),
        ),
        Ok(saved) => (
            StatusCode::OK,
            json!({ "success": true, "reminder": saved.first() }),
        ),
        Err(ReminderDataError::Invalid(msg)) => (StatusCode::BAD_REQUEST, error_body(msg)),
        Err(e @ ReminderDataError::Store(_)) => {
            tracing::error!(error = %e, "Failed to save reminder data");
            (StatusCode::INTERNAL_SERVER_ERROR, error_body("Failed to save reminder"))
        }
    }
}

pub async fn delete_reminder_inner(reminders: &dyn ReminderStore, body: Value) -> (StatusCode, Value) {
    let (Some(id), Some(user_id)) = (text_field(&body, "id"), text_field(&body, "userId")) else {
        return (StatusCode::BAD_REQUEST, error_body("Both id and userId are required"));
    };
    let not_found = || {
        (
            StatusCode::NOT_FOUND,
            error_body(format!("Reminder with ID {} not found", id)),
        )
    };
    let Ok(uuid) = Uuid::parse_str(id) else {
        return not_found();
    };

    match reminders.delete(uuid, user_id).await {
        Ok(true) => {
            tracing::info!(id, user_id, "Reminder deleted");
            (
                StatusCode::OK,
                json!({ "success": true, "message": format!("Reminder with ID {} deleted", id) }),
            )
        }
        Ok(false) => not_found(),
        Err(e) => {
            tracing::error!(id, error = %e, "Failed to delete reminder");
            (StatusCode::INTERNAL_SERVER_ERROR, error_body("Failed to delete reminder"))
        }
    }
}

/// Inner send-emergency. Request shape is checked before the sender, so a
/// malformed request is 400 even when alerts are disabled.
pub async fn send_emergency_inner(
    alerts: Option<&dyn AlertSender>,
    body: Value,
) -> (StatusCode, Value) {
    let numbers = contact_numbers(body.get("contacts"));
    let latitude = coordinate(body.get("latitude"));
    let longitude = coordinate(body.get("longitude"));

    let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
        return (StatusCode::BAD_REQUEST, error_body("Missing contacts or location data"));
    };
    if numbers.is_empty() {
        return (StatusCode::BAD_REQUEST, error_body("Missing contacts or location data"));
    }

    let Some(sender) = alerts else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            error_body("Emergency alerts are not configured"),
        );
    };

    let results = fan_out(sender, &numbers, &alert_body(&latitude, &longitude)).await;
    (
        StatusCode::OK,
        json!({
            "message": "WhatsApp emergency messages processed",
            "results": results,
        }),
    )
}

pub async fn list_contacts_inner(contacts: &dyn ContactStore, user_id: Option<&str>) -> (StatusCode, Value) {
    let Some(user_id) = user_id else {
        return (StatusCode::BAD_REQUEST, error_body("Missing user id"));
    };

    match contacts.list_contacts(user_id).await {
        Ok(list) => (StatusCode::OK, json!(list)),
        Err(e) => {
            tracing::error!(user_id, error = %e, "Failed to list contacts");
            (StatusCode::INTERNAL_SERVER_ERROR, error_body("Failed to fetch contacts"))
        }
    }
}

/// Inner add-contact. A missing id is generated; relationship defaults to
/// "Custom".
pub async fn add_contact_inner(
    contacts: &dyn ContactStore,
    user_id: Option<&str>,
    body: Value,
) -> (StatusCode, Value) {
    let Some(user_id) = user_id else {
        return (StatusCode::BAD_REQUEST, error_body("Missing user id"));
    };
    let (Some(name), Some(phone)) = (text_field(&body, "name"), text_field(&body, "phone")) else {
        return (StatusCode::BAD_REQUEST, error_body("Missing name or phone"));
    };

    let contact = SavedContact {
        id: text_field(&body, "id")
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        user_id: user_id.to_string(),
        name: name.to_string(),
        phone: phone.to_string(),
        relationship: text_field(&body, "relationship").unwrap_or("Custom").to_string(),
    };

    match contacts.add_contact(contact).await {
        Ok(saved) => (StatusCode::CREATED, json!(saved)),
        Err(e) => {
            tracing::error!(user_id, error = %e, "Failed to save contact");
            (StatusCode::INTERNAL_SERVER_ERROR, error_body("Failed to save contact"))
        }
    }
}

pub async fn delete_contact_inner(
    contacts: &dyn ContactStore,
    user_id: Option<&str>,
    id: &str,
) -> (StatusCode, Value) {
    let Some(user_id) = user_id else {
        return (StatusCode::BAD_REQUEST, error_body("Missing user id"));
    };

    match contacts.delete_contact(user_id, id).await {
        Ok(true) => (StatusCode::OK, json!({ "success": true })),
        Ok(false) => (StatusCode::NOT_FOUND, error_body("Contact not found")),
        Err(e) => {
            tracing::error!(user_id, id, error = %e, "Failed to delete contact");
            (StatusCode::INTERNAL_SERVER_ERROR, error_body("Failed to delete contact"))
        }
    }
}

// ============================================================================
// Axum handler wrappers (thin, delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(state.pool.as_ref()).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn chat_handler(
    State(state): State<Arc<HttpState>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let (status, body) = chat_inner(&state.router, body).await;
    (status, Json(body))
}

pub async fn history_handler(
    State(state): State<Arc<HttpState>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let user_id = params.get("userId").map(String::as_str);
    let (status, body) = history_inner(state.history.as_ref(), user_id).await;
    (status, Json(body))
}

pub async fn format_reminder_handler(
    State(state): State<Arc<HttpState>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let (status, body) = format_reminder_inner(&state.router, body).await;
    (status, Json(body))
}

pub async fn list_reminders_handler(
    State(state): State<Arc<HttpState>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let user_id = params.get("userId").map(String::as_str);
    let (status, body) = list_reminders_inner(state.reminders.as_ref(), user_id).await;
    (status, Json(body))
}

pub async fn get_reminder_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = get_reminder_inner(state.reminders.as_ref(), &id).await;
    (status, Json(body))
}

pub async fn reminder_data_handler(
    State(state): State<Arc<HttpState>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let now = state.router.clock().now();
    let (status, body) = reminder_data_inner(state.reminders.as_ref(), now, body).await;
    (status, Json(body))
}

pub async fn delete_reminder_handler(
    State(state): State<Arc<HttpState>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let (status, body) = delete_reminder_inner(state.reminders.as_ref(), body).await;
    (status, Json(body))
}

pub async fn send_emergency_handler(
    State(state): State<Arc<HttpState>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let (status, body) = send_emergency_inner(state.alerts.as_deref(), body).await;
    (status, Json(body))
}

pub async fn list_contacts_handler(
    State(state): State<Arc<HttpState>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let user_id = caller_id(&params, &headers);
    let (status, body) = list_contacts_inner(state.contacts.as_ref(), user_id.as_deref()).await;
    (status, Json(body))
}

pub async fn add_contact_handler(
    State(state): State<Arc<HttpState>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let user_id = caller_id(&params, &headers);
    let (status, body) = add_contact_inner(state.contacts.as_ref(), user_id.as_deref(), body).await;
    (status, Json(body))
}

pub async fn delete_contact_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let user_id = caller_id(&params, &headers);
    let (status, body) =
        delete_contact_inner(state.contacts.as_ref(), user_id.as_deref(), &id).await;
    (status, Json(body))
}

// ============================================================================
// Helpers
// ============================================================================

/// The contacts API identifies the caller by `user_id` query parameter,
/// falling back to the `X-User-Id` header.
pub fn caller_id(params: &HashMap<String, String>, headers: &HeaderMap) -> Option<String> {
    params
        .get("user_id")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get(USER_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================
