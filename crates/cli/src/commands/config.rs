use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use facultag_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

struct Field {
    key_path: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key_path,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key_path, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let admin_api_key = match &config.server.admin_api_key {
        Some(key) => redact_secret(key),
        None => "<unset> (admin API disabled)".to_string(),
    };

    vec![
        Field {
            key_path: "database.url",
            env_keys: &["FACULTAG_DATABASE_URL"],
            value: config.database.url.clone(),
        },
        Field {
            key_path: "database.max_connections",
            env_keys: &["FACULTAG_DATABASE_MAX_CONNECTIONS"],
            value: config.database.max_connections.to_string(),
        },
        Field {
            key_path: "database.timeout_secs",
            env_keys: &["FACULTAG_DATABASE_TIMEOUT_SECS"],
            value: config.database.timeout_secs.to_string(),
        },
        Field {
            key_path: "line.channel_secret",
            env_keys: &["FACULTAG_LINE_CHANNEL_SECRET", "LINE_CHANNEL_SECRET"],
            value: redact_secret(&config.line.channel_secret),
        },
        Field {
            key_path: "line.channel_access_token",
            env_keys: &["FACULTAG_LINE_CHANNEL_ACCESS_TOKEN", "LINE_CHANNEL_ACCESS_TOKEN"],
            value: redact_secret(&config.line.channel_access_token),
        },
        Field {
            key_path: "line.api_base_url",
            env_keys: &["FACULTAG_LINE_API_BASE_URL"],
            value: config.line.api_base_url.clone(),
        },
        Field {
            key_path: "line.timeout_secs",
            env_keys: &["FACULTAG_LINE_TIMEOUT_SECS"],
            value: config.line.timeout_secs.to_string(),
        },
        Field {
            key_path: "line.serialize_tag_provisioning",
            env_keys: &["FACULTAG_LINE_SERIALIZE_TAG_PROVISIONING"],
            value: config.line.serialize_tag_provisioning.to_string(),
        },
        Field {
            key_path: "server.bind_address",
            env_keys: &["FACULTAG_SERVER_BIND_ADDRESS"],
            value: config.server.bind_address.clone(),
        },
        Field {
            key_path: "server.port",
            env_keys: &["FACULTAG_SERVER_PORT", "PORT"],
            value: config.server.port.to_string(),
        },
        Field {
            key_path: "server.admin_api_key",
            env_keys: &["FACULTAG_SERVER_ADMIN_API_KEY"],
            value: admin_api_key,
        },
        Field {
            key_path: "server.graceful_shutdown_secs",
            env_keys: &["FACULTAG_SERVER_GRACEFUL_SHUTDOWN_SECS"],
            value: config.server.graceful_shutdown_secs.to_string(),
        },
        Field {
            key_path: "catalog.categories",
            env_keys: &["FACULTAG_CATALOG_CATEGORIES"],
            value: format!("[{}]", config.catalog.categories.join(", ")),
        },
        Field {
            key_path: "logging.level",
            env_keys: &["FACULTAG_LOGGING_LEVEL", "FACULTAG_LOG_LEVEL"],
            value: config.logging.level.clone(),
        },
        Field {
            key_path: "logging.format",
            env_keys: &["FACULTAG_LOGGING_FORMAT", "FACULTAG_LOG_FORMAT"],
            value: format!("{:?}", config.logging.format),
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("facultag.toml"), PathBuf::from("config/facultag.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the last four characters so operators can tell credentials apart.
fn redact_secret(secret: &SecretString) -> String {
    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let count = trimmed.chars().count();
    if count <= 8 {
        return "<redacted>".to_string();
    }
    let tail: String = trimmed.chars().skip(count - 4).collect();
    format!("***{tail}")
}
