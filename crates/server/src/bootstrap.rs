use std::sync::Arc;

use axum::Router;
use facultag_core::config::{AppConfig, ConfigError, LoadOptions};
use facultag_db::{
    connect_with_settings, migrations, ContactRepository, DbPool, SqlContactRepository,
};
use facultag_line::{
    ApiError, EventRouter, HttpLineClient, MessagingApi, SignatureVerifier, TagApi,
    TagProvisioner, WebhookProcessor,
};
use thiserror::Error;
use tracing::info;

use crate::admin::{self, AdminState};
use crate::health;
use crate::webhook::{self, RegistryObserver};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub processor: Arc<WebhookProcessor>,
    pub contacts: Arc<dyn ContactRepository>,
    pub messaging: Arc<dyn MessagingApi>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("platform client could not be built: {0}")]
    LineClient(#[source] ApiError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let line_api =
        Arc::new(HttpLineClient::from_config(&config.line).map_err(BootstrapError::LineClient)?);
    assemble(config, db_pool, line_api)
}

/// Wires the webhook pipeline and the registry around an already-open pool.
pub fn assemble<L>(
    config: AppConfig,
    db_pool: DbPool,
    line_api: Arc<L>,
) -> Result<Application, BootstrapError>
where
    L: TagApi + MessagingApi + 'static,
{
    let catalog = Arc::new(config.category_catalog()?);
    let provisioner = Arc::new(TagProvisioner::from_flag(
        line_api.clone(),
        config.line.serialize_tag_provisioning,
    ));
    let contacts: Arc<dyn ContactRepository> =
        Arc::new(SqlContactRepository::new(db_pool.clone()));
    let messaging: Arc<dyn MessagingApi> = line_api;

    let observer = Arc::new(RegistryObserver::new(contacts.clone(), messaging.clone()));
    let processor = Arc::new(WebhookProcessor::new(
        SignatureVerifier::new(config.line.channel_secret.clone()),
        EventRouter::new(catalog.clone(), provisioner.clone()),
        messaging.clone(),
        observer,
    ));

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        categories = catalog.len(),
        serialized_tagging = provisioner.is_serialized(),
        admin_api = config.server.admin_api_key.is_some(),
        "webhook pipeline assembled"
    );

    Ok(Application { config, db_pool, processor, contacts, messaging })
}

impl Application {
    pub fn router(&self) -> Router {
        Router::new()
            .merge(webhook::router(self.processor.clone()))
            .merge(health::router(self.db_pool.clone()))
            .merge(admin::router(AdminState::new(
                self.contacts.clone(),
                self.messaging.clone(),
                self.config.server.admin_api_key.clone(),
            )))
    }
}
