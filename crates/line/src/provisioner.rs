//! Lookup-or-create tagging.
//!
//! Each call re-reads the remote tag list; nothing is cached. Without
//! serialization, two first-time selections of the same label can both miss
//! the lookup and both create a tag. Enabling per-label serialization closes
//! that window for calls made through the same provisioner.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use facultag_core::domain::contact::UserId;
use facultag_core::domain::tag::TagId;

use crate::client::{ApiError, TagApi};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProvisionStage {
    List,
    Create,
    Associate,
}

impl ProvisionStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Create => "create",
            Self::Associate => "associate",
        }
    }
}

impl fmt::Display for ProvisionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("tag provisioning failed at {stage} stage: {source}")]
pub struct ProvisionError {
    pub stage: ProvisionStage,
    #[source]
    pub source: ApiError,
}

impl ProvisionError {
    fn at(stage: ProvisionStage) -> impl FnOnce(ApiError) -> Self {
        move |source| Self { stage, source }
    }

    pub fn status(&self) -> Option<u16> {
        self.source.status()
    }

    pub fn body(&self) -> Option<&str> {
        self.source.body()
    }
}

pub struct TagProvisioner {
    api: Arc<dyn TagApi>,
    label_locks: Option<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl TagProvisioner {
    pub fn new(api: Arc<dyn TagApi>) -> Self {
        Self { api, label_locks: None }
    }

    pub fn serialized(api: Arc<dyn TagApi>) -> Self {
        Self { api, label_locks: Some(Mutex::new(HashMap::new())) }
    }

    pub fn from_flag(api: Arc<dyn TagApi>, serialize: bool) -> Self {
        if serialize {
            Self::serialized(api)
        } else {
            Self::new(api)
        }
    }

    pub fn is_serialized(&self) -> bool {
        self.label_locks.is_some()
    }

    /// Ensures a tag named exactly `label` exists and is attached to `user_id`.
    ///
    /// Three single-attempt remote calls: list, create (only on a miss), associate.
    /// The first failure aborts the remaining steps.
    pub async fn ensure_user_tagged(
        &self,
        user_id: &UserId,
        label: &str,
    ) -> Result<TagId, ProvisionError> {
        let tag_id = match &self.label_locks {
            Some(locks) => {
                let label_lock = {
                    let mut locks = locks.lock().await;
                    Arc::clone(locks.entry(label.to_owned()).or_default())
                };
                let _guard = label_lock.lock().await;
                self.lookup_or_create(label).await?
            }
            None => self.lookup_or_create(label).await?,
        };

        self.api
            .add_tag_to_user(user_id, &tag_id)
            .await
            .map_err(ProvisionError::at(ProvisionStage::Associate))?;

        info!(
            event_name = "line.tag.assigned",
            user_id = %user_id,
            tag_id = %tag_id,
            tag_name = label,
            "tag assigned to user"
        );
        Ok(tag_id)
    }

    async fn lookup_or_create(&self, label: &str) -> Result<TagId, ProvisionError> {
        let tags = self.api.list_tags().await.map_err(ProvisionError::at(ProvisionStage::List))?;

        if let Some(tag) = tags.into_iter().find(|tag| tag.name == label) {
            debug!(event_name = "line.tag.found", tag_id = %tag.tag_id, tag_name = label);
            return Ok(tag.tag_id);
        }

        let tag_id = self
            .api
            .create_tag(label)
            .await
            .map_err(ProvisionError::at(ProvisionStage::Create))?;
        info!(event_name = "line.tag.created", tag_id = %tag_id, tag_name = label, "tag created");
        Ok(tag_id)
    }
}
