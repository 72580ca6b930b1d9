use std::fmt;

use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use facultag_core::domain::contact::UserId;

/// One-time handle for answering an event. Single use, expires quickly on the platform side.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ReplyToken(pub String);

impl fmt::Display for ReplyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContactAddedEvent {
    pub user_id: UserId,
    pub reply_token: ReplyToken,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostbackEvent {
    pub user_id: UserId,
    pub reply_token: ReplyToken,
    pub payload: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextMessageEvent {
    pub user_id: UserId,
    pub reply_token: ReplyToken,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    ContactAdded(ContactAddedEvent),
    Postback(PostbackEvent),
    TextMessage(TextMessageEvent),
    Unsupported { event_type: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InboundEventType {
    ContactAdded,
    Postback,
    TextMessage,
    Unsupported,
}

impl InboundEvent {
    pub fn event_type(&self) -> InboundEventType {
        match self {
            Self::ContactAdded(_) => InboundEventType::ContactAdded,
            Self::Postback(_) => InboundEventType::Postback,
            Self::TextMessage(_) => InboundEventType::TextMessage,
            Self::Unsupported { .. } => InboundEventType::Unsupported,
        }
    }

    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::ContactAdded(event) => Some(&event.user_id),
            Self::Postback(event) => Some(&event.user_id),
            Self::TextMessage(event) => Some(&event.user_id),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookEnvelope {
    pub webhook_event_id: Option<String>,
    pub is_redelivery: bool,
    pub event: InboundEvent,
}

impl WebhookEnvelope {
    pub fn new(event: InboundEvent) -> Self {
        Self { webhook_event_id: None, is_redelivery: false, event }
    }

    /// Correlates logs with the platform's event id when one was supplied.
    pub fn context(&self) -> EventContext {
        match &self.webhook_event_id {
            Some(id) if !id.trim().is_empty() => EventContext { correlation_id: id.clone() },
            _ => EventContext::generate(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl EventContext {
    pub fn generate() -> Self {
        Self { correlation_id: format!("evt-{}", Uuid::new_v4()) }
    }
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("webhook body is not a valid event batch: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decodes a webhook delivery body into envelopes, preserving event order.
///
/// An empty `events` array is the platform's verification request and decodes
/// to an empty batch.
pub fn decode_webhook(body: &[u8]) -> Result<Vec<WebhookEnvelope>, DecodeError> {
    let raw: RawWebhook = serde_json::from_slice(body)?;
    Ok(raw.events.into_iter().map(RawEvent::into_envelope).collect())
}

#[derive(Debug, Deserialize)]
struct RawWebhook {
    events: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    reply_token: Option<String>,
    source: Option<RawSource>,
    postback: Option<RawPostback>,
    message: Option<RawMessage>,
    webhook_event_id: Option<String>,
    delivery_context: Option<RawDeliveryContext>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSource {
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPostback {
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    message_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDeliveryContext {
    #[serde(default)]
    is_redelivery: bool,
}

impl RawEvent {
    fn into_envelope(self) -> WebhookEnvelope {
        let webhook_event_id = self.webhook_event_id.clone();
        let is_redelivery = self.delivery_context.as_ref().is_some_and(|ctx| ctx.is_redelivery);
        WebhookEnvelope { webhook_event_id, is_redelivery, event: self.into_event() }
    }

    fn into_event(self) -> InboundEvent {
        let unsupported = |event_type: String| InboundEvent::Unsupported { event_type };

        let user_id = self.source.and_then(|source| source.user_id).filter(|id| !id.is_empty());
        let reply_token = self.reply_token.filter(|token| !token.is_empty());
        let (Some(user_id), Some(reply_token)) = (user_id, reply_token) else {
            return unsupported(self.event_type);
        };
        let user_id = UserId(user_id);
        let reply_token = ReplyToken(reply_token);

        match self.event_type.as_str() {
            "follow" => InboundEvent::ContactAdded(ContactAddedEvent { user_id, reply_token }),
            "postback" => match self.postback.and_then(|postback| postback.data) {
                Some(payload) => {
                    InboundEvent::Postback(PostbackEvent { user_id, reply_token, payload })
                }
                None => unsupported(self.event_type.clone()),
            },
            "message" => match self.message {
                Some(RawMessage { message_type, text: Some(text) }) if message_type == "text" => {
                    InboundEvent::TextMessage(TextMessageEvent { user_id, reply_token, text })
                }
                Some(RawMessage { message_type, .. }) => {
                    unsupported(format!("{}:{message_type}", self.event_type))
                }
                None => unsupported(self.event_type.clone()),
            },
            _ => unsupported(self.event_type.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use facultag_core::domain::contact::UserId;

    use super::{
        decode_webhook, ContactAddedEvent, DecodeError, InboundEvent, InboundEventType,
        PostbackEvent, ReplyToken, TextMessageEvent, WebhookEnvelope,
    };

    fn decode(body: &str) -> Vec<WebhookEnvelope> {
        decode_webhook(body.as_bytes()).expect("decode webhook")
    }

    #[test]
    fn follow_event_becomes_contact_added() {
        let envelopes = decode(
            r#"{"destination":"Ubot","events":[{
                "type":"follow","replyToken":"rt-1","mode":"active","timestamp":1,
                "source":{"type":"user","userId":"U1"},
                "webhookEventId":"01HEVENT","deliveryContext":{"isRedelivery":false}
            }]}"#,
        );

        assert_eq!(envelopes.len(), 1);
        assert_eq!(
            envelopes[0].event,
            InboundEvent::ContactAdded(ContactAddedEvent {
                user_id: UserId("U1".to_owned()),
                reply_token: ReplyToken("rt-1".to_owned()),
            })
        );
        assert_eq!(envelopes[0].context().correlation_id, "01HEVENT");
        assert!(!envelopes[0].is_redelivery);
    }

    #[test]
    fn postback_and_text_events_keep_batch_order() {
        let envelopes = decode(
            r#"{"events":[
                {"type":"postback","replyToken":"rt-a","source":{"userId":"U1"},
                 "postback":{"data":"selectCategory:2"}},
                {"type":"message","replyToken":"rt-b","source":{"userId":"U2"},
                 "message":{"id":"1","type":"text","text":"สวัสดี"},
                 "deliveryContext":{"isRedelivery":true}}
            ]}"#,
        );

        assert_eq!(
            envelopes[0].event,
            InboundEvent::Postback(PostbackEvent {
                user_id: UserId("U1".to_owned()),
                reply_token: ReplyToken("rt-a".to_owned()),
                payload: "selectCategory:2".to_owned(),
            })
        );
        assert_eq!(
            envelopes[1].event,
            InboundEvent::TextMessage(TextMessageEvent {
                user_id: UserId("U2".to_owned()),
                reply_token: ReplyToken("rt-b".to_owned()),
                text: "สวัสดี".to_owned(),
            })
        );
        assert!(envelopes[1].is_redelivery);
    }

    #[test]
    fn unknown_or_incomplete_events_are_unsupported() {
        let envelopes = decode(
            r#"{"events":[
                {"type":"unfollow","source":{"userId":"U1"}},
                {"type":"message","replyToken":"rt","source":{"userId":"U1"},
                 "message":{"id":"2","type":"sticker","packageId":"1","stickerId":"1"}},
                {"type":"follow","source":{"userId":"U1"}},
                {"type":"postback","replyToken":"rt","source":{"type":"group","groupId":"G1"},
                 "postback":{"data":"selectCategory:1"}},
                {"type":"postback","replyToken":"rt","source":{"userId":"U1"},"postback":{}}
            ]}"#,
        );

        let kinds: Vec<InboundEventType> =
            envelopes.iter().map(|envelope| envelope.event.event_type()).collect();
        assert_eq!(kinds, vec![InboundEventType::Unsupported; 5]);
        assert_eq!(
            envelopes[1].event,
            InboundEvent::Unsupported { event_type: "message:sticker".to_owned() }
        );
    }

    #[test]
    fn empty_batch_is_valid() {
        assert!(decode(r#"{"destination":"Ubot","events":[]}"#).is_empty());
    }

    #[test]
    fn malformed_body_is_a_decode_error() {
        assert!(matches!(decode_webhook(b"not json"), Err(DecodeError::Json(_))));
        assert!(matches!(decode_webhook(br#"{"destination":"x"}"#), Err(DecodeError::Json(_))));
    }

    #[test]
    fn missing_event_id_generates_a_correlation_id() {
        let envelope = WebhookEnvelope::new(InboundEvent::Unsupported {
            event_type: "beacon".to_owned(),
        });
        assert!(envelope.context().correlation_id.starts_with("evt-"));
    }
}
