//! `POST /callback` and the observer that keeps the contact registry current.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use chrono::Utc;
use tracing::{debug, warn};

use facultag_core::domain::contact::UserId;
use facultag_db::ContactRepository;
use facultag_line::events::EventContext;
use facultag_line::signature::SIGNATURE_HEADER;
use facultag_line::webhook::{ContactActivity, ContactObserver, ObserverError};
use facultag_line::{MessagingApi, WebhookError, WebhookProcessor};

pub fn router(processor: Arc<WebhookProcessor>) -> Router {
    Router::new().route("/callback", post(callback)).with_state(processor)
}

pub async fn callback(
    State(processor): State<Arc<WebhookProcessor>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|value| value.to_str().ok());

    match processor.process(&body, signature).await {
        Ok(_) => (StatusCode::OK, "OK").into_response(),
        Err(WebhookError::Signature(_) | WebhookError::Decode(_)) => {
            StatusCode::BAD_REQUEST.into_response()
        }
    }
}

/// Mirrors contact activity into the local registry.
pub struct RegistryObserver {
    contacts: Arc<dyn ContactRepository>,
    messaging: Arc<dyn MessagingApi>,
}

impl RegistryObserver {
    pub fn new(contacts: Arc<dyn ContactRepository>, messaging: Arc<dyn MessagingApi>) -> Self {
        Self { contacts, messaging }
    }
}

#[async_trait]
impl ContactObserver for RegistryObserver {
    async fn observe(
        &self,
        user_id: &UserId,
        activity: &ContactActivity,
        ctx: &EventContext,
    ) -> Result<(), ObserverError> {
        let now = Utc::now();
        let result = match activity {
            ContactActivity::Followed => {
                let profile = match self.messaging.get_profile(user_id).await {
                    Ok(profile) => Some(profile),
                    Err(error) => {
                        warn!(
                            event_name = "registry.profile.unavailable",
                            correlation_id = %ctx.correlation_id,
                            user_id = %user_id,
                            error = %error,
                            "registering contact without profile"
                        );
                        None
                    }
                };
                self.contacts.record_follow(user_id, profile.as_ref(), now).await
            }
            ContactActivity::CategorySelected { label } => {
                self.contacts.record_category(user_id, label, now).await
            }
            ContactActivity::Interacted => self.contacts.touch(user_id, now).await,
        };

        result.map_err(|error| ObserverError(error.to_string()))?;
        debug!(
            event_name = "registry.contact.updated",
            correlation_id = %ctx.correlation_id,
            user_id = %user_id,
            activity = ?activity,
        );
        Ok(())
    }
}
