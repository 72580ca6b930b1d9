use facultag_core::catalog::{BUTTON_LABEL_LIMIT, MENU_PAGE_SIZE};
use facultag_core::config::{AppConfig, LoadOptions};
use facultag_db::connect_with_settings;
use facultag_line::messages::category_menu;
use secrecy::ExposeSecret;
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_channel_credentials(&config));
            checks.push(check_catalog(&config));
            checks.push(check_database_connectivity(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["channel_credentials", "category_catalog", "database_connectivity"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let any_fail = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let any_warn = checks.iter().any(|check| check.status == CheckStatus::Warn);
    let (overall_status, summary) = if any_fail {
        (CheckStatus::Fail, "doctor: one or more readiness checks failed")
    } else if any_warn {
        (CheckStatus::Warn, "doctor: ready, with warnings")
    } else {
        (CheckStatus::Pass, "doctor: all readiness checks passed")
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn check_channel_credentials(config: &AppConfig) -> DoctorCheck {
    let secret = config.line.channel_secret.expose_secret().trim();
    // Console-issued channel secrets are 32 hex characters.
    let looks_issued = secret.len() == 32 && secret.chars().all(|ch| ch.is_ascii_hexdigit());

    if looks_issued {
        DoctorCheck {
            name: "channel_credentials",
            status: CheckStatus::Pass,
            details: "channel secret and access token are present".to_string(),
        }
    } else {
        DoctorCheck {
            name: "channel_credentials",
            status: CheckStatus::Warn,
            details: "channel secret is not 32 hex characters; webhook signatures will not verify"
                .to_string(),
        }
    }
}

fn check_catalog(config: &AppConfig) -> DoctorCheck {
    let catalog = match config.category_catalog() {
        Ok(catalog) => catalog,
        Err(error) => {
            return DoctorCheck {
                name: "category_catalog",
                status: CheckStatus::Fail,
                details: error.to_string(),
            };
        }
    };

    if let Err(error) = category_menu(&catalog, 0) {
        return DoctorCheck {
            name: "category_catalog",
            status: CheckStatus::Fail,
            details: format!("first menu page cannot be built: {error}"),
        };
    }

    let truncated = catalog
        .iter()
        .filter(|category| category.label().chars().count() > BUTTON_LABEL_LIMIT)
        .count();
    let reachable = catalog.len().min(2 * MENU_PAGE_SIZE);
    if reachable < catalog.len() {
        return DoctorCheck {
            name: "category_catalog",
            status: CheckStatus::Warn,
            details: format!(
                "{} categories configured but only the first {reachable} appear in the menu",
                catalog.len()
            ),
        };
    }

    DoctorCheck {
        name: "category_catalog",
        status: CheckStatus::Pass,
        details: format!(
            "{} categories over {} menu page(s); {truncated} button label(s) truncated",
            catalog.len(),
            catalog.page_count()
        ),
    }
}

fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        pool.close().await;
        Ok::<(), String>(())
    });

    match result {
        Ok(()) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", config.database.url),
        },
        Err(error) => {
            DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details: error }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
