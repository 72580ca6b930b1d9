//! LINE Messaging API integration
//!
//! This crate turns signed webhook deliveries into replies and tag assignments:
//! - **Webhook** (`webhook`) - verify, decode and process one delivery batch
//! - **Events** (`events`) - typed inbound events decoded from the webhook JSON
//! - **Router** (`router`) - maps each event to a reply
//! - **Provisioner** (`provisioner`) - lookup-or-create a tag, then attach it to a user
//! - **Messages** (`messages`) - text and buttons-template builders, category menus
//! - **Client** (`client`) - platform API traits and the reqwest implementation
//!
//! # Architecture
//!
//! ```text
//! POST /callback → SignatureVerifier → decode_webhook → EventRouter → MessagingApi::reply
//!                                                            ↓
//!                                                    TagProvisioner → TagApi
//! ```

pub mod client;
pub mod events;
pub mod memory;
pub mod messages;
pub mod postback;
pub mod provisioner;
pub mod router;
pub mod signature;
pub mod webhook;

pub use client::{ApiError, HttpLineClient, MessagingApi, TagApi};
pub use events::{EventContext, InboundEvent, ReplyToken, WebhookEnvelope};
pub use memory::InMemoryLineApi;
pub use messages::{OutboundMessage, OutboundReply};
pub use provisioner::{ProvisionError, ProvisionStage, TagProvisioner};
pub use router::{EventRouter, HandlerResult};
pub use signature::{SignatureError, SignatureVerifier};
pub use webhook::{
    contact_activity, BatchSummary, ContactActivity, ContactObserver, NoopContactObserver,
    ObserverError, WebhookError, WebhookProcessor,
};
