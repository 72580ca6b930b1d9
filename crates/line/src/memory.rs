use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use facultag_core::domain::contact::{ContactProfile, UserId};
use facultag_core::domain::tag::{Tag, TagId};

use crate::client::{check_multicast, ApiError, MessagingApi, TagApi};
use crate::messages::{OutboundMessage, OutboundReply};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordedCall {
    ListTags,
    CreateTag { name: String },
    AddTagToUser { user_id: UserId, tag_id: TagId },
    Reply(OutboundReply),
    Multicast { recipients: Vec<UserId>, messages: Vec<OutboundMessage> },
    GetProfile(UserId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailurePoint {
    ListTags,
    CreateTag,
    AddTagToUser,
    Reply,
    Multicast,
    GetProfile,
}

#[derive(Default)]
struct State {
    tags: Vec<Tag>,
    next_tag: u64,
    calls: Vec<RecordedCall>,
    failures: HashMap<FailurePoint, ApiError>,
    profiles: HashMap<UserId, ContactProfile>,
}

/// Platform double that keeps tags in memory and records every attempted call.
///
/// Failures are injected per operation; a failing call is still recorded.
/// Like the real platform it does not enforce unique tag names.
#[derive(Default)]
pub struct InMemoryLineApi {
    state: Mutex<State>,
    list_latency: Option<Duration>,
}

impl InMemoryLineApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tags(tags: Vec<Tag>) -> Self {
        let api = Self::default();
        api.lock().tags = tags;
        api
    }

    /// Delays every tag listing, widening the lookup-then-create window.
    pub fn with_list_latency(mut self, latency: Duration) -> Self {
        self.list_latency = Some(latency);
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn fail(&self, point: FailurePoint, error: ApiError) {
        self.lock().failures.insert(point, error);
    }

    pub fn clear_failure(&self, point: FailurePoint) {
        self.lock().failures.remove(&point);
    }

    pub fn add_profile(&self, user_id: UserId, profile: ContactProfile) {
        self.lock().profiles.insert(user_id, profile);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn tags(&self) -> Vec<Tag> {
        self.lock().tags.clone()
    }

    pub fn replies(&self) -> Vec<OutboundReply> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                RecordedCall::Reply(reply) => Some(reply.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, point: FailurePoint) -> usize {
        self.lock().calls.iter().filter(|call| call_point(call) == point).count()
    }

    fn record(&self, call: RecordedCall) -> Result<(), ApiError> {
        let mut state = self.lock();
        let point = call_point(&call);
        state.calls.push(call);
        match state.failures.get(&point) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

fn call_point(call: &RecordedCall) -> FailurePoint {
    match call {
        RecordedCall::ListTags => FailurePoint::ListTags,
        RecordedCall::CreateTag { .. } => FailurePoint::CreateTag,
        RecordedCall::AddTagToUser { .. } => FailurePoint::AddTagToUser,
        RecordedCall::Reply(_) => FailurePoint::Reply,
        RecordedCall::Multicast { .. } => FailurePoint::Multicast,
        RecordedCall::GetProfile(_) => FailurePoint::GetProfile,
    }
}

#[async_trait]
impl TagApi for InMemoryLineApi {
    async fn list_tags(&self) -> Result<Vec<Tag>, ApiError> {
        self.record(RecordedCall::ListTags)?;
        let snapshot = self.tags();
        if let Some(latency) = self.list_latency {
            tokio::time::sleep(latency).await;
        }
        Ok(snapshot)
    }

    async fn create_tag(&self, name: &str) -> Result<TagId, ApiError> {
        self.record(RecordedCall::CreateTag { name: name.to_owned() })?;
        let mut state = self.lock();
        state.next_tag += 1;
        let tag_id = TagId(format!("tag-{}", state.next_tag));
        state.tags.push(Tag { tag_id: tag_id.clone(), name: name.to_owned() });
        Ok(tag_id)
    }

    async fn add_tag_to_user(&self, user_id: &UserId, tag_id: &TagId) -> Result<(), ApiError> {
        self.record(RecordedCall::AddTagToUser { user_id: user_id.clone(), tag_id: tag_id.clone() })
    }
}

#[async_trait]
impl MessagingApi for InMemoryLineApi {
    async fn reply(&self, reply: &OutboundReply) -> Result<(), ApiError> {
        self.record(RecordedCall::Reply(reply.clone()))
    }

    async fn multicast(
        &self,
        recipients: &[UserId],
        messages: &[OutboundMessage],
    ) -> Result<(), ApiError> {
        check_multicast(recipients)?;
        self.record(RecordedCall::Multicast {
            recipients: recipients.to_vec(),
            messages: messages.to_vec(),
        })
    }

    async fn get_profile(&self, user_id: &UserId) -> Result<ContactProfile, ApiError> {
        self.record(RecordedCall::GetProfile(user_id.clone()))?;
        self.lock().profiles.get(user_id).cloned().ok_or_else(|| ApiError::Status {
            status: 404,
            body: r#"{"message":"Not found"}"#.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use facultag_core::domain::contact::UserId;

    use super::{FailurePoint, InMemoryLineApi, RecordedCall};
    use crate::client::{ApiError, MessagingApi, TagApi};

    #[tokio::test]
    async fn created_tags_become_visible_to_later_listings() {
        let api = InMemoryLineApi::new();

        let tag_id = api.create_tag("Law").await.expect("create");
        let tags = api.list_tags().await.expect("list");

        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].tag_id, tag_id);
        assert_eq!(api.count(FailurePoint::CreateTag), 1);
    }

    #[tokio::test]
    async fn injected_failure_is_returned_and_still_recorded() {
        let api = InMemoryLineApi::new();
        api.fail(FailurePoint::ListTags, ApiError::Status { status: 500, body: "boom".to_owned() });

        let result = api.list_tags().await;

        assert_eq!(result, Err(ApiError::Status { status: 500, body: "boom".to_owned() }));
        assert_eq!(api.calls(), vec![RecordedCall::ListTags]);

        api.clear_failure(FailurePoint::ListTags);
        assert!(api.list_tags().await.is_ok());
    }

    #[tokio::test]
    async fn unknown_profile_is_not_found() {
        let api = InMemoryLineApi::new();
        let result = api.get_profile(&UserId("U-unknown".to_owned())).await;

        assert!(matches!(result, Err(ApiError::Status { status: 404, .. })));
    }
}
