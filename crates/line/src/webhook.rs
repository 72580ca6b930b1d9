use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use facultag_core::catalog::CategoryCatalog;
use facultag_core::domain::contact::UserId;

use crate::client::MessagingApi;
use crate::events::{decode_webhook, DecodeError, EventContext, InboundEvent};
use crate::postback::PostbackCommand;
use crate::router::{EventRouter, HandlerResult};
use crate::signature::{SignatureError, SignatureVerifier};

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error(transparent)]
    Signature(#[from] SignatureError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// What a processed event says about the contact who sent it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContactActivity {
    Followed,
    CategorySelected { label: String },
    Interacted,
}

pub fn contact_activity(
    event: &InboundEvent,
    catalog: &CategoryCatalog,
) -> Option<(UserId, ContactActivity)> {
    match event {
        InboundEvent::ContactAdded(event) => {
            Some((event.user_id.clone(), ContactActivity::Followed))
        }
        InboundEvent::Postback(event) => {
            let activity = match PostbackCommand::decode(&event.payload, catalog) {
                Some(PostbackCommand::SelectCategory(index)) => catalog
                    .get(index)
                    .map(|category| ContactActivity::CategorySelected {
                        label: category.label().to_owned(),
                    })
                    .unwrap_or(ContactActivity::Interacted),
                Some(PostbackCommand::ShowMoreCategories) | None => ContactActivity::Interacted,
            };
            Some((event.user_id.clone(), activity))
        }
        InboundEvent::TextMessage(event) => {
            Some((event.user_id.clone(), ContactActivity::Interacted))
        }
        InboundEvent::Unsupported { .. } => None,
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("contact observer failed: {0}")]
pub struct ObserverError(pub String);

#[async_trait]
pub trait ContactObserver: Send + Sync {
    async fn observe(
        &self,
        user_id: &UserId,
        activity: &ContactActivity,
        ctx: &EventContext,
    ) -> Result<(), ObserverError>;
}

#[derive(Default)]
pub struct NoopContactObserver;

#[async_trait]
impl ContactObserver for NoopContactObserver {
    async fn observe(
        &self,
        _user_id: &UserId,
        _activity: &ContactActivity,
        _ctx: &EventContext,
    ) -> Result<(), ObserverError> {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub events: usize,
    pub responded: usize,
    pub processed: usize,
    pub ignored: usize,
    pub reply_failures: usize,
}

pub struct WebhookProcessor {
    verifier: SignatureVerifier,
    router: EventRouter,
    messaging: Arc<dyn MessagingApi>,
    observer: Arc<dyn ContactObserver>,
}

impl WebhookProcessor {
    pub fn new(
        verifier: SignatureVerifier,
        router: EventRouter,
        messaging: Arc<dyn MessagingApi>,
        observer: Arc<dyn ContactObserver>,
    ) -> Self {
        Self { verifier, router, messaging, observer }
    }

    /// Runs one delivery. Events are handled strictly in batch order; a failure
    /// while handling one event never prevents the next from running.
    pub async fn process(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<BatchSummary, WebhookError> {
        if let Err(error) = self.verifier.verify(body, signature) {
            warn!(
                event_name = "ingress.line.signature_rejected",
                error = %error,
                body_bytes = body.len(),
                "rejecting webhook delivery"
            );
            return Err(error.into());
        }

        let envelopes = decode_webhook(body).map_err(|error| {
            warn!(
                event_name = "ingress.line.decode_failed",
                error = %error,
                "undecodable webhook body"
            );
            error
        })?;

        let mut summary = BatchSummary { events: envelopes.len(), ..BatchSummary::default() };
        if envelopes.is_empty() {
            debug!(event_name = "ingress.line.empty_batch", "verification request acknowledged");
            return Ok(summary);
        }

        for envelope in &envelopes {
            let context = envelope.context();
            info!(
                event_name = "ingress.line.event_received",
                correlation_id = %context.correlation_id,
                event_type = ?envelope.event.event_type(),
                user_id = envelope.event.user_id().map(|id| id.0.as_str()).unwrap_or("unknown"),
                is_redelivery = envelope.is_redelivery,
                "received line event"
            );

            match self.router.route(&envelope.event, &context).await {
                HandlerResult::Responded(reply) => {
                    summary.responded += 1;
                    if let Err(error) = self.messaging.reply(&reply).await {
                        summary.reply_failures += 1;
                        warn!(
                            event_name = "egress.line.reply_failed",
                            correlation_id = %context.correlation_id,
                            status = error.status(),
                            error = %error,
                            "reply could not be delivered; continuing batch"
                        );
                    } else {
                        debug!(
                            event_name = "egress.line.reply_sent",
                            correlation_id = %context.correlation_id,
                            messages = reply.messages.len(),
                        );
                    }
                }
                HandlerResult::Processed => summary.processed += 1,
                HandlerResult::Ignored => summary.ignored += 1,
            }

            self.report_activity(&envelope.event, &context).await;
        }

        info!(
            event_name = "ingress.line.batch_processed",
            events = summary.events,
            responded = summary.responded,
            processed = summary.processed,
            ignored = summary.ignored,
            reply_failures = summary.reply_failures,
            "webhook batch processed"
        );
        Ok(summary)
    }

    async fn report_activity(&self, event: &InboundEvent, context: &EventContext) {
        let Some((user_id, activity)) = contact_activity(event, self.router.catalog()) else {
            return;
        };
        if let Err(error) = self.observer.observe(&user_id, &activity, context).await {
            warn!(
                event_name = "ingress.line.observer_failed",
                correlation_id = %context.correlation_id,
                user_id = %user_id,
                error = %error,
                "contact activity was not recorded"
            );
        }
    }
}
