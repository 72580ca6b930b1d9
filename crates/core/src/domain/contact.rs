use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactProfile {
    pub display_name: String,
    pub picture_url: Option<String>,
}

/// Locally recorded view of a chat contact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub user_id: UserId,
    pub display_name: Option<String>,
    pub picture_url: Option<String>,
    /// Full label of the last category the contact selected.
    pub category: Option<String>,
    pub registered_at: DateTime<Utc>,
    pub last_interaction: DateTime<Utc>,
}
