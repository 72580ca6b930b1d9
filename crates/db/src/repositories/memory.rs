use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use facultag_core::domain::contact::{Contact, ContactProfile, UserId};

use super::{ContactRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryContactRepository {
    contacts: RwLock<HashMap<UserId, Contact>>,
}

fn new_contact(user_id: &UserId, at: DateTime<Utc>) -> Contact {
    Contact {
        user_id: user_id.clone(),
        display_name: None,
        picture_url: None,
        category: None,
        registered_at: at,
        last_interaction: at,
    }
}

#[async_trait::async_trait]
impl ContactRepository for InMemoryContactRepository {
    async fn record_follow(
        &self,
        user_id: &UserId,
        profile: Option<&ContactProfile>,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut contacts = self.contacts.write().await;
        let contact = contacts.entry(user_id.clone()).or_insert_with(|| new_contact(user_id, at));
        if let Some(profile) = profile {
            contact.display_name = Some(profile.display_name.clone());
            if profile.picture_url.is_some() {
                contact.picture_url = profile.picture_url.clone();
            }
        }
        contact.last_interaction = at;
        Ok(())
    }

    async fn record_category(
        &self,
        user_id: &UserId,
        label: &str,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut contacts = self.contacts.write().await;
        let contact = contacts.entry(user_id.clone()).or_insert_with(|| new_contact(user_id, at));
        contact.category = Some(label.to_string());
        contact.last_interaction = at;
        Ok(())
    }

    async fn touch(&self, user_id: &UserId, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let mut contacts = self.contacts.write().await;
        let contact = contacts.entry(user_id.clone()).or_insert_with(|| new_contact(user_id, at));
        contact.last_interaction = at;
        Ok(())
    }

    async fn find(&self, user_id: &UserId) -> Result<Option<Contact>, RepositoryError> {
        let contacts = self.contacts.read().await;
        Ok(contacts.get(user_id).cloned())
    }

    async fn list(&self) -> Result<Vec<Contact>, RepositoryError> {
        let contacts = self.contacts.read().await;
        let mut listed: Vec<Contact> = contacts.values().cloned().collect();
        listed.sort_by(|a, b| {
            b.registered_at.cmp(&a.registered_at).then_with(|| a.user_id.cmp(&b.user_id))
        });
        Ok(listed)
    }

    async fn recipients(&self, category: Option<&str>) -> Result<Vec<UserId>, RepositoryError> {
        let contacts = self.contacts.read().await;
        let mut ids: Vec<UserId> = contacts
            .values()
            .filter(|contact| match category {
                Some(wanted) => contact.category.as_deref() == Some(wanted),
                None => true,
            })
            .map(|contact| contact.user_id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}
