use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use facultag_core::domain::contact::{Contact, ContactProfile, UserId};

pub mod contact;
pub mod memory;

pub use contact::SqlContactRepository;
pub use memory::InMemoryContactRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Local record of contacts who talked to the bot.
///
/// Writes are upserts keyed by user id, so replays of the same webhook event
/// leave a single row. Tag lookups never go through this registry.
#[async_trait]
pub trait ContactRepository: Send + Sync {
    /// Registers a follow. The first registration time is kept on re-follow;
    /// profile fields are only overwritten when a profile was fetched.
    async fn record_follow(
        &self,
        user_id: &UserId,
        profile: Option<&ContactProfile>,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Stores the full label of the category the contact just selected.
    async fn record_category(
        &self,
        user_id: &UserId,
        label: &str,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    async fn touch(&self, user_id: &UserId, at: DateTime<Utc>) -> Result<(), RepositoryError>;

    async fn find(&self, user_id: &UserId) -> Result<Option<Contact>, RepositoryError>;

    /// All contacts, newest registration first.
    async fn list(&self) -> Result<Vec<Contact>, RepositoryError>;

    /// User ids to address, optionally restricted to one category label.
    async fn recipients(&self, category: Option<&str>) -> Result<Vec<UserId>, RepositoryError>;
}
