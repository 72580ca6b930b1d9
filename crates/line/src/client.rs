use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use facultag_core::config::LineConfig;
use facultag_core::domain::contact::{ContactProfile, UserId};
use facultag_core::domain::tag::{Tag, TagId};

use crate::messages::{OutboundMessage, OutboundReply};

/// Recipients accepted by one multicast call.
pub const MULTICAST_MAX_RECIPIENTS: usize = 500;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("platform returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("platform request failed: {0}")]
    Transport(String),
    #[error("platform response could not be decoded: {0}")]
    Decode(String),
    #[error("request rejected before sending: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Remote tag collection. Every call is a single attempt.
#[async_trait]
pub trait TagApi: Send + Sync {
    async fn list_tags(&self) -> Result<Vec<Tag>, ApiError>;
    async fn create_tag(&self, name: &str) -> Result<TagId, ApiError>;
    async fn add_tag_to_user(&self, user_id: &UserId, tag_id: &TagId) -> Result<(), ApiError>;
}

#[async_trait]
pub trait MessagingApi: Send + Sync {
    async fn reply(&self, reply: &OutboundReply) -> Result<(), ApiError>;
    async fn multicast(
        &self,
        recipients: &[UserId],
        messages: &[OutboundMessage],
    ) -> Result<(), ApiError>;
    async fn get_profile(&self, user_id: &UserId) -> Result<ContactProfile, ApiError>;
}

pub fn check_multicast(recipients: &[UserId]) -> Result<(), ApiError> {
    if recipients.is_empty() {
        return Err(ApiError::InvalidRequest("multicast needs at least one recipient".to_owned()));
    }
    if recipients.len() > MULTICAST_MAX_RECIPIENTS {
        return Err(ApiError::InvalidRequest(format!(
            "multicast accepts at most {MULTICAST_MAX_RECIPIENTS} recipients, got {}",
            recipients.len()
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct HttpLineClient {
    client: Client,
    base_url: String,
    access_token: SecretString,
}

impl std::fmt::Debug for HttpLineClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpLineClient").field("base_url", &self.base_url).finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct TagListResponse {
    #[serde(default)]
    tags: Vec<Tag>,
}

#[derive(Serialize)]
struct CreateTagRequest<'a> {
    name: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTagResponse {
    tag_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddTagRequest<'a> {
    tag_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: &'a [OutboundMessage],
}

#[derive(Serialize)]
struct MulticastRequest<'a> {
    to: Vec<&'a str>,
    messages: &'a [OutboundMessage],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    display_name: String,
    picture_url: Option<String>,
}

impl HttpLineClient {
    pub fn new(
        base_url: impl Into<String>,
        access_token: SecretString,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| ApiError::Transport(error.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Ok(Self { client, base_url, access_token })
    }

    pub fn from_config(config: &LineConfig) -> Result<Self, ApiError> {
        Self::new(
            config.api_base_url.clone(),
            config.channel_access_token.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.bearer_auth(self.access_token.expose_secret())
    }

    async fn send(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<Response, ApiError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|error| ApiError::Transport(error.to_string()))?;

        let status = response.status();
        debug!(event_name = "line.api.response", operation, status = status.as_u16());
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status { status: status.as_u16(), body })
    }

    async fn decode<T>(response: Response) -> Result<T, ApiError>
    where
        T: serde::de::DeserializeOwned,
    {
        response.json::<T>().await.map_err(|error| ApiError::Decode(error.to_string()))
    }
}

#[async_trait]
impl TagApi for HttpLineClient {
    async fn list_tags(&self) -> Result<Vec<Tag>, ApiError> {
        let request = self.client.get(self.url("/v2/bot/tag"));
        let response = self.send("list_tags", request).await?;
        Ok(Self::decode::<TagListResponse>(response).await?.tags)
    }

    async fn create_tag(&self, name: &str) -> Result<TagId, ApiError> {
        let request = self.client.post(self.url("/v2/bot/tag")).json(&CreateTagRequest { name });
        let response = self.send("create_tag", request).await?;
        let created = Self::decode::<CreateTagResponse>(response).await?;
        Ok(TagId(created.tag_id))
    }

    async fn add_tag_to_user(&self, user_id: &UserId, tag_id: &TagId) -> Result<(), ApiError> {
        let request = self
            .client
            .post(self.url(&format!("/v2/bot/user/{}/tag", user_id.0)))
            .json(&AddTagRequest { tag_id: &tag_id.0 });
        self.send("add_tag_to_user", request).await?;
        Ok(())
    }
}

#[async_trait]
impl MessagingApi for HttpLineClient {
    async fn reply(&self, reply: &OutboundReply) -> Result<(), ApiError> {
        let request = self.client.post(self.url("/v2/bot/message/reply")).json(&ReplyRequest {
            reply_token: &reply.reply_token.0,
            messages: &reply.messages,
        });
        self.send("reply", request).await?;
        Ok(())
    }

    async fn multicast(
        &self,
        recipients: &[UserId],
        messages: &[OutboundMessage],
    ) -> Result<(), ApiError> {
        check_multicast(recipients)?;
        let to = recipients.iter().map(|user| user.0.as_str()).collect();
        let request = self
            .client
            .post(self.url("/v2/bot/message/multicast"))
            .json(&MulticastRequest { to, messages });
        self.send("multicast", request).await?;
        Ok(())
    }

    async fn get_profile(&self, user_id: &UserId) -> Result<ContactProfile, ApiError> {
        let request = self.client.get(self.url(&format!("/v2/bot/profile/{}", user_id.0)));
        let response = self.send("get_profile", request).await?;
        let profile = Self::decode::<ProfileResponse>(response).await?;
        Ok(ContactProfile { display_name: profile.display_name, picture_url: profile.picture_url })
    }
}
