use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use tracing::debug;

use facultag_core::domain::contact::{Contact, ContactProfile, UserId};

use super::{ContactRepository, RepositoryError};
use crate::DbPool;

pub struct SqlContactRepository {
    pool: DbPool,
}

impl SqlContactRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContactRepository for SqlContactRepository {
    async fn record_follow(
        &self,
        user_id: &UserId,
        profile: Option<&ContactProfile>,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let timestamp = format_timestamp(at);
        sqlx::query(
            r#"
            INSERT INTO contact (
                line_user_id, display_name, picture_url, category, registered_at, last_interaction
            ) VALUES (?, ?, ?, NULL, ?, ?)
            ON CONFLICT(line_user_id) DO UPDATE SET
                display_name = COALESCE(excluded.display_name, contact.display_name),
                picture_url = COALESCE(excluded.picture_url, contact.picture_url),
                last_interaction = excluded.last_interaction
            "#,
        )
        .bind(&user_id.0)
        .bind(profile.map(|p| p.display_name.as_str()))
        .bind(profile.and_then(|p| p.picture_url.as_deref()))
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(&self.pool)
        .await?;

        debug!(
            event_name = "db.contact.follow_recorded",
            user_id = %user_id,
            has_profile = profile.is_some(),
            "contact follow recorded"
        );
        Ok(())
    }

    async fn record_category(
        &self,
        user_id: &UserId,
        label: &str,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let timestamp = format_timestamp(at);
        sqlx::query(
            r#"
            INSERT INTO contact (
                line_user_id, display_name, picture_url, category, registered_at, last_interaction
            ) VALUES (?, NULL, NULL, ?, ?, ?)
            ON CONFLICT(line_user_id) DO UPDATE SET
                category = excluded.category,
                last_interaction = excluded.last_interaction
            "#,
        )
        .bind(&user_id.0)
        .bind(label)
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(&self.pool)
        .await?;

        debug!(
            event_name = "db.contact.category_recorded",
            user_id = %user_id,
            category = label,
            "contact category recorded"
        );
        Ok(())
    }

    async fn touch(&self, user_id: &UserId, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let timestamp = format_timestamp(at);
        sqlx::query(
            r#"
            INSERT INTO contact (
                line_user_id, display_name, picture_url, category, registered_at, last_interaction
            ) VALUES (?, NULL, NULL, NULL, ?, ?)
            ON CONFLICT(line_user_id) DO UPDATE SET
                last_interaction = excluded.last_interaction
            "#,
        )
        .bind(&user_id.0)
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, user_id: &UserId) -> Result<Option<Contact>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT line_user_id, display_name, picture_url, category, registered_at, last_interaction
            FROM contact
            WHERE line_user_id = ?
            "#,
        )
        .bind(&user_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| contact_from_row(&r)).transpose()
    }

    async fn list(&self) -> Result<Vec<Contact>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT line_user_id, display_name, picture_url, category, registered_at, last_interaction
            FROM contact
            ORDER BY registered_at DESC, line_user_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(contact_from_row).collect()
    }

    async fn recipients(&self, category: Option<&str>) -> Result<Vec<UserId>, RepositoryError> {
        let rows = match category {
            Some(category) => {
                sqlx::query(
                    "SELECT line_user_id FROM contact WHERE category = ? ORDER BY line_user_id",
                )
                .bind(category)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT line_user_id FROM contact ORDER BY line_user_id")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter()
            .map(|row| row.try_get::<String, _>("line_user_id").map(UserId).map_err(Into::into))
            .collect()
    }
}

fn contact_from_row(row: &SqliteRow) -> Result<Contact, RepositoryError> {
    let user_id: String = row.try_get("line_user_id")?;
    let registered_at: String = row.try_get("registered_at")?;
    let last_interaction: String = row.try_get("last_interaction")?;

    Ok(Contact {
        user_id: UserId(user_id),
        display_name: row.try_get("display_name")?,
        picture_url: row.try_get("picture_url")?,
        category: row.try_get("category")?,
        registered_at: parse_timestamp("registered_at", registered_at)?,
        last_interaction: parse_timestamp("last_interaction", last_interaction)?,
    })
}

// Fixed-width UTC so that ORDER BY on the text column is chronological.
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("invalid timestamp in `{column}`: {e}")))
}
