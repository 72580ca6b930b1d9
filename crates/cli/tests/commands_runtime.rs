use std::env;
use std::sync::{Mutex, OnceLock};

use axum::routing::get;
use axum::{Json, Router};
use facultag_cli::commands::{catalog, config, doctor, migrate, tags};
use serde_json::{json, Value};

const VALID_SECRET: &str = "0123456789abcdef0123456789abcdef";

#[test]
fn migrate_returns_success_with_valid_env() {
    let dir = tempfile::TempDir::new().expect("temp dir");
    let url = format!("sqlite://{}", dir.path().join("registry.db").display());

    with_env(&valid_env(&url), || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_without_channel_credentials() {
    with_env(&[("FACULTAG_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
        assert!(payload["message"].as_str().unwrap_or_default().contains("line.channel_secret"));
    });
}

#[test]
fn config_reports_env_sources_and_redacts_secrets() {
    with_env(&valid_env("sqlite::memory:"), || {
        let output = config::run();

        assert!(output
            .contains("- database.url = sqlite::memory: (source: env (FACULTAG_DATABASE_URL))"));
        assert!(output
            .contains("line.channel_secret = ***cdef (source: env (LINE_CHANNEL_SECRET))"));
        assert!(output.contains("server.admin_api_key = <unset> (admin API disabled)"));
        assert!(!output.contains(VALID_SECRET));
    });
}

#[test]
fn doctor_json_passes_with_default_catalog() {
    with_env(&valid_env("sqlite::memory:"), || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 0, "doctor output: {}", result.output);

        let report: Value = serde_json::from_str(&result.output).expect("doctor json");
        assert_eq!(report["overall_status"], "pass");
        let names: Vec<&str> = report["checks"]
            .as_array()
            .expect("checks")
            .iter()
            .filter_map(|check| check["name"].as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "config_validation",
                "channel_credentials",
                "category_catalog",
                "database_connectivity"
            ]
        );
    });
}

#[test]
fn doctor_warns_when_categories_overflow_the_menu() {
    let mut vars = valid_env("sqlite::memory:");
    vars.push(("FACULTAG_CATALOG_CATEGORIES", "A,B,C,D,E,F,G,H,I"));

    with_env(&vars, || {
        let result = doctor::run(true);
        let report: Value = serde_json::from_str(&result.output).expect("doctor json");

        assert_eq!(result.exit_code, 0);
        assert_eq!(report["overall_status"], "warn");
        assert_eq!(report["checks"][2]["status"], "warn");
    });
}

#[test]
fn doctor_fails_and_skips_without_config() {
    with_env(&[], || {
        let result = doctor::run(false);

        assert_eq!(result.exit_code, 1);
        assert!(result.output.starts_with("doctor: one or more readiness checks failed"));
        assert!(result.output.contains("- [skip] database_connectivity"));
    });
}

#[test]
fn catalog_lists_pages_postbacks_and_truncated_labels() {
    let mut vars = valid_env("sqlite::memory:");
    vars.push(("FACULTAG_CATALOG_CATEGORIES", "Law,Faculty of Veterinary Science"));

    with_env(&vars, || {
        let result = catalog::run();
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["message"], "2 categories over 1 menu page(s)");
        assert_eq!(payload["data"][1]["label"], "Faculty of Veterinary Science");
        assert_eq!(payload["data"][1]["button_label"], "Faculty of V...");
        assert_eq!(payload["data"][1]["postback"], "selectCategory:1");
    });
}

#[test]
fn catalog_flags_categories_beyond_the_second_page() {
    let mut vars = valid_env("sqlite::memory:");
    vars.push(("FACULTAG_CATALOG_CATEGORIES", "A,B,C,D,E,F,G,H,I"));

    with_env(&vars, || {
        let payload = parse_payload(&catalog::run().output);

        assert_eq!(payload["data"][8]["page"], 2);
        assert_eq!(payload["data"][8]["reachable"], false);
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.ends_with("1 cannot be selected from the menu"), "message: {message}");
    });
}

#[test]
fn tags_lists_platform_tags_and_missing_categories() {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let base_url = runtime.block_on(async {
        let app = Router::new().route(
            "/v2/bot/tag",
            get(|| async {
                Json(json!({ "tags": [{ "tagId": "t-1", "name": "Law" }] }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("stub server");
        });
        format!("http://{address}")
    });

    let mut vars = valid_env("sqlite::memory:");
    vars.push(("FACULTAG_LINE_API_BASE_URL", base_url.as_str()));
    vars.push(("FACULTAG_CATALOG_CATEGORIES", "Law,Science"));

    with_env(&vars, || {
        let result = tags::run();
        assert_eq!(result.exit_code, 0, "tags output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"][0]["tagId"], "t-1");
        assert_eq!(
            payload["message"],
            "1 tag(s) on the platform; 1 category label(s) without a tag: Science"
        );
    });
}

#[test]
fn tags_reports_platform_failures() {
    let mut vars = valid_env("sqlite::memory:");
    vars.push(("FACULTAG_LINE_API_BASE_URL", "http://127.0.0.1:9"));
    vars.push(("FACULTAG_LINE_TIMEOUT_SECS", "2"));

    with_env(&vars, || {
        let result = tags::run();

        assert_eq!(result.exit_code, 5);
        assert_eq!(parse_payload(&result.output)["error_class"], "platform_request");
    });
}

fn valid_env(database_url: &str) -> Vec<(&'static str, &str)> {
    vec![
        ("FACULTAG_DATABASE_URL", database_url),
        ("LINE_CHANNEL_SECRET", VALID_SECRET),
        ("LINE_CHANNEL_ACCESS_TOKEN", "access-token"),
    ]
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let keys = [
        "FACULTAG_DATABASE_URL",
        "FACULTAG_DATABASE_MAX_CONNECTIONS",
        "FACULTAG_DATABASE_TIMEOUT_SECS",
        "FACULTAG_LINE_CHANNEL_SECRET",
        "FACULTAG_LINE_CHANNEL_ACCESS_TOKEN",
        "LINE_CHANNEL_SECRET",
        "LINE_CHANNEL_ACCESS_TOKEN",
        "FACULTAG_LINE_API_BASE_URL",
        "FACULTAG_LINE_TIMEOUT_SECS",
        "FACULTAG_LINE_SERIALIZE_TAG_PROVISIONING",
        "FACULTAG_SERVER_BIND_ADDRESS",
        "FACULTAG_SERVER_PORT",
        "PORT",
        "FACULTAG_SERVER_ADMIN_API_KEY",
        "FACULTAG_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "FACULTAG_CATALOG_CATEGORIES",
        "FACULTAG_LOGGING_LEVEL",
        "FACULTAG_LOGGING_FORMAT",
        "FACULTAG_LOG_LEVEL",
        "FACULTAG_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
