//! Preflight checks run before a sync: configuration, webhook URL shape
//! and reference-data reachability. Nothing here writes to the CRM.

use std::path::PathBuf;

use secrecy::ExposeSecret;
use serde::Serialize;

use quotebridge_bitrix::ReferenceClient;
use quotebridge_core::config::{AppConfig, LoadOptions};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
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

pub fn run(json_output: bool, config_path: Option<PathBuf>) -> String {
    let report = build_report(config_path);

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
            )
        });
    }

    render_human(&report)
}

fn build_report(config_path: Option<PathBuf>) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions {
        require_file: config_path.is_some(),
        config_path,
        ..LoadOptions::default()
    }) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_webhook_shape(&config));
            checks.push(check_reference_connectivity(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["crm_webhook_shape", "reference_connectivity"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// Bitrix inbound webhooks always carry `/rest/<user>/<token>`.
fn check_webhook_shape(config: &AppConfig) -> DoctorCheck {
    let url = config.crm.webhook_url.expose_secret();
    if url.contains("/rest/") {
        DoctorCheck {
            name: "crm_webhook_shape",
            status: CheckStatus::Pass,
            details: "webhook url has the expected /rest/ path".to_string(),
        }
    } else {
        DoctorCheck {
            name: "crm_webhook_shape",
            status: CheckStatus::Fail,
            details: "webhook url does not look like a Bitrix inbound webhook".to_string(),
        }
    }
}

fn check_reference_connectivity(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "reference_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let client = ReferenceClient::new(&config.reference);
    let result = runtime.block_on(async {
        let catalog = client
            .load_catalog()
            .await
            .map_err(|error| format!("failed to load product catalog: {error}"))?;
        let directory = client
            .load_directory()
            .await
            .map_err(|error| format!("failed to load employee directory: {error}"))?;
        Ok::<(usize, usize), String>((catalog.len(), directory.len()))
    });

    match result {
        Ok((products, employees)) => DoctorCheck {
            name: "reference_connectivity",
            status: CheckStatus::Pass,
            details: format!("loaded {products} products and {employees} employees"),
        },
        Err(details) => {
            DoctorCheck { name: "reference_connectivity", status: CheckStatus::Fail, details }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut output = String::new();
    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "FAIL",
            CheckStatus::Skipped => "--",
        };
        output.push_str(&format!("  {marker:<4} {:<24} {}\n", check.name, check.details));
    }
    output.push_str(&report.summary);
    output
}

#[cfg(test)]
mod tests {
    use super::{build_report, CheckStatus};

    #[test]
    fn missing_required_config_file_fails_the_report() {
        let report = build_report(Some("does-not-exist.toml".into()));
        assert_eq!(report.overall_status, CheckStatus::Fail);
        assert_eq!(report.checks[0].name, "config_validation");
        assert_eq!(report.checks[0].status, CheckStatus::Fail);
        assert!(report.checks[1..].iter().all(|check| check.status == CheckStatus::Skipped));
    }
}
