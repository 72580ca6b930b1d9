//! Operator endpoints over the contact registry.
//!
//! Every route requires the `x-facultag-admin-key` header to match
//! `server.admin_api_key`. Without a configured key the routes answer 403.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use facultag_core::domain::contact::Contact;
use facultag_core::errors::{ApplicationError, InterfaceError};
use facultag_db::{ContactRepository, RepositoryError};
use facultag_line::client::MULTICAST_MAX_RECIPIENTS;
use facultag_line::{MessagingApi, OutboundMessage};

pub const ADMIN_KEY_HEADER: &str = "x-facultag-admin-key";
pub const MISSING_MESSAGE: &str = "ไม่ได้ระบุข้อความที่ต้องการส่ง";
pub const BROADCAST_SENT: &str = "ส่งข้อความเรียบร้อยแล้ว";

#[derive(Clone)]
pub struct AdminState {
    contacts: Arc<dyn ContactRepository>,
    messaging: Arc<dyn MessagingApi>,
    admin_api_key: Option<SecretString>,
}

impl AdminState {
    pub fn new(
        contacts: Arc<dyn ContactRepository>,
        messaging: Arc<dyn MessagingApi>,
        admin_api_key: Option<SecretString>,
    ) -> Self {
        Self { contacts, messaging, admin_api_key }
    }
}

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/broadcast", post(broadcast))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
    correlation_id: String,
}

pub struct AdminError(InterfaceError);

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::Forbidden { .. } => StatusCode::FORBIDDEN,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match &self.0 {
            InterfaceError::BadRequest { message, .. }
            | InterfaceError::Forbidden { message, .. } => message.clone(),
            other => other.user_message().to_owned(),
        };
        let body = ErrorBody {
            status: "error",
            message,
            correlation_id: self.0.correlation_id().to_owned(),
        };
        (status, Json(body)).into_response()
    }
}

fn fail(error: ApplicationError, correlation_id: &str) -> AdminError {
    warn!(
        event_name = "admin.request.failed",
        correlation_id,
        error = %error,
        "admin request failed"
    );
    AdminError(error.into_interface(correlation_id))
}

fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

fn authorize(state: &AdminState, headers: &HeaderMap) -> Result<(), ApplicationError> {
    let Some(expected) = &state.admin_api_key else {
        return Err(ApplicationError::AccessDenied(
            "admin API is disabled; set server.admin_api_key to enable it".to_owned(),
        ));
    };
    let provided = headers.get(ADMIN_KEY_HEADER).and_then(|value| value.to_str().ok());
    match provided {
        Some(value) if value == expected.expose_secret() => Ok(()),
        Some(_) => Err(ApplicationError::AccessDenied("admin key does not match".to_owned())),
        None => Err(ApplicationError::AccessDenied(format!("missing {ADMIN_KEY_HEADER} header"))),
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContactView {
    pub line_user_id: String,
    pub display_name: Option<String>,
    pub picture_url: Option<String>,
    pub category: Option<String>,
    pub registered_at: DateTime<Utc>,
    pub last_interaction: DateTime<Utc>,
}

impl From<Contact> for ContactView {
    fn from(contact: Contact) -> Self {
        Self {
            line_user_id: contact.user_id.0,
            display_name: contact.display_name,
            picture_url: contact.picture_url,
            category: contact.category,
            registered_at: contact.registered_at,
            last_interaction: contact.last_interaction,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UsersResponse {
    pub status: String,
    pub total_users: usize,
    pub users: Vec<ContactView>,
}

async fn list_users(
    State(state): State<AdminState>,
    headers: HeaderMap,
) -> Result<Json<UsersResponse>, AdminError> {
    let correlation_id = format!("admin-{}", Uuid::new_v4());
    authorize(&state, &headers).map_err(|error| fail(error, &correlation_id))?;

    let contacts =
        state.contacts.list().await.map_err(|error| fail(persistence(error), &correlation_id))?;
    let users: Vec<ContactView> = contacts.into_iter().map(ContactView::from).collect();

    Ok(Json(UsersResponse { status: "success".to_owned(), total_users: users.len(), users }))
}

#[derive(Debug, Default, Deserialize)]
pub struct BroadcastRequest {
    #[serde(default, alias = "faculty")]
    pub category: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BroadcastResponse {
    pub status: String,
    pub total_recipients: usize,
    pub message: String,
}

async fn broadcast(
    State(state): State<AdminState>,
    headers: HeaderMap,
    payload: Result<Json<BroadcastRequest>, JsonRejection>,
) -> Result<Json<BroadcastResponse>, AdminError> {
    let correlation_id = format!("admin-{}", Uuid::new_v4());
    authorize(&state, &headers).map_err(|error| fail(error, &correlation_id))?;

    let Json(request) = payload.map_err(|rejection| {
        fail(ApplicationError::Validation(rejection.body_text()), &correlation_id)
    })?;
    let text = request.message.filter(|message| !message.trim().is_empty()).ok_or_else(|| {
        fail(ApplicationError::Validation(MISSING_MESSAGE.to_owned()), &correlation_id)
    })?;
    let category = request.category.filter(|category| !category.trim().is_empty());

    let recipients = state
        .contacts
        .recipients(category.as_deref())
        .await
        .map_err(|error| fail(persistence(error), &correlation_id))?;

    let messages = [OutboundMessage::text(text)];
    for chunk in recipients.chunks(MULTICAST_MAX_RECIPIENTS) {
        state.messaging.multicast(chunk, &messages).await.map_err(|error| {
            fail(ApplicationError::Integration(error.to_string()), &correlation_id)
        })?;
    }

    info!(
        event_name = "admin.broadcast.sent",
        correlation_id = %correlation_id,
        category = category.as_deref().unwrap_or("all"),
        total_recipients = recipients.len(),
        "broadcast delivered"
    );
    Ok(Json(BroadcastResponse {
        status: "success".to_owned(),
        total_recipients: recipients.len(),
        message: BROADCAST_SENT.to_owned(),
    }))
}
