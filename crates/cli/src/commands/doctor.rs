use pedrabotnik_core::config::{AppConfig, KnowledgeConfig, LoadOptions};
use pedrabotnik_core::contracts::ContractRegistry;
use pedrabotnik_core::knowledge::KnowledgeBase;
use serde::Serialize;

use super::CommandResult;

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

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report(AppConfig::load(LoadOptions::default()).map_err(|error| error.to_string()));
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

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

fn build_report(config: Result<AppConfig, String>) -> DoctorReport {
    let mut checks = Vec::new();

    match config {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_telegram(&config));
            checks.push(check_knowledge(&config.knowledge));
            checks.push(check_contracts(&config.knowledge));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error,
            });
            for name in ["telegram_readiness", "knowledge_files", "contract_data"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status != CheckStatus::Fail)
        && checks.iter().any(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_telegram(config: &AppConfig) -> DoctorCheck {
    if !config.telegram.enabled {
        return DoctorCheck {
            name: "telegram_readiness",
            status: CheckStatus::Skipped,
            details: "telegram transport disabled".to_string(),
        };
    }
    DoctorCheck {
        name: "telegram_readiness",
        status: CheckStatus::Pass,
        details: format!("bot token present, polling `{}`", config.telegram.api_base_url),
    }
}

fn check_knowledge(knowledge: &KnowledgeConfig) -> DoctorCheck {
    match KnowledgeBase::load(knowledge) {
        Ok(base) => DoctorCheck {
            name: "knowledge_files",
            status: CheckStatus::Pass,
            details: format!(
                "{} dialogue examples, {} catalog courses",
                base.dialogue_count(),
                base.course_count()
            ),
        },
        Err(error) => DoctorCheck { name: "knowledge_files", status: CheckStatus::Fail, details: error.to_string() },
    }
}

fn check_contracts(knowledge: &KnowledgeConfig) -> DoctorCheck {
    if knowledge.contract_info_json.is_none() && knowledge.contracts_path.is_none() {
        return DoctorCheck {
            name: "contract_data",
            status: CheckStatus::Skipped,
            details: "no contract data configured; every lookup reports not found".to_string(),
        };
    }

    let registry = ContractRegistry::from_config(knowledge);
    if registry.is_malformed() {
        return DoctorCheck {
            name: "contract_data",
            status: CheckStatus::Fail,
            details: "contract data is unreadable or not a JSON object".to_string(),
        };
    }
    DoctorCheck {
        name: "contract_data",
        status: CheckStatus::Pass,
        details: format!("{} contracts loaded", registry.len()),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
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

#[cfg(test)]
mod tests {
    use std::fs;

    use pedrabotnik_core::config::AppConfig;
    use tempfile::TempDir;

    use super::{build_report, render_human, CheckStatus};

    fn config_with_knowledge(dir: &TempDir) -> AppConfig {
        let path = |name: &str| dir.path().join(name);
        fs::write(path("dialogs.txt"), "Вопрос: Как оплатить?\nОтвет: Картой.\n").expect("dialogs");
        fs::write(path("topics.md"), "[payment]\nКартой.\n").expect("topics");
        fs::write(path("retraining.json"), "[]").expect("retraining");
        fs::write(path("upskilling.json"), "[]").expect("upskilling");

        let mut config = AppConfig::default();
        config.telegram.enabled = false;
        config.knowledge.dialogs_path = path("dialogs.txt");
        config.knowledge.topics_path = path("topics.md");
        config.knowledge.retraining_catalog_path = path("retraining.json");
        config.knowledge.upskilling_catalog_path = path("upskilling.json");
        config
    }

    #[test]
    fn readable_knowledge_passes() {
        let dir = TempDir::new().expect("tempdir");
        let report = build_report(Ok(config_with_knowledge(&dir)));

        assert_eq!(report.overall_status, CheckStatus::Pass);
        assert!(render_human(&report).contains("- [ok] knowledge_files: 1 dialogue examples, 0 catalog courses"));
    }

    #[test]
    fn malformed_contract_data_fails() {
        let dir = TempDir::new().expect("tempdir");
        let mut config = config_with_knowledge(&dir);
        config.knowledge.contract_info_json = Some("[1, 2".to_string());

        let report = build_report(Ok(config));

        assert_eq!(report.overall_status, CheckStatus::Fail);
        let contracts = report.checks.iter().find(|check| check.name == "contract_data").expect("check");
        assert_eq!(contracts.status, CheckStatus::Fail);
    }

    #[test]
    fn config_failure_skips_the_rest() {
        let report = build_report(Err("telegram.bot_token is required".to_string()));

        assert_eq!(report.overall_status, CheckStatus::Fail);
        assert_eq!(report.checks.iter().filter(|check| check.status == CheckStatus::Skipped).count(), 3);
    }
}
