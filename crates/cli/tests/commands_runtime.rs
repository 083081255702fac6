use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use pedrabotnik_cli::commands::{ask, config, doctor};
use serde_json::Value;
use tempfile::TempDir;

#[test]
fn doctor_passes_with_valid_env_and_knowledge() {
    let dir = TempDir::new().expect("tempdir");
    let knowledge = knowledge_env(&dir);
    let mut vars = vec![
        ("PEDRABOTNIK_TELEGRAM_BOT_TOKEN", "123456:test-token".to_string()),
        ("PEDRABOTNIK_LLM_API_KEY", "sk-test".to_string()),
    ];
    vars.extend(knowledge);

    with_env(&vars, || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 0, "expected passing doctor run: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "pass");
        assert_eq!(payload["checks"][1]["name"], "telegram_readiness");
        assert_eq!(payload["checks"][1]["status"], "pass");
    });
}

#[test]
fn doctor_fails_without_bot_token() {
    with_env(&[("PEDRABOTNIK_LLM_API_KEY", "sk-test".to_string())], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["name"], "config_validation");
        assert_eq!(payload["checks"][0]["status"], "fail");
    });
}

#[test]
fn config_redacts_token_and_reports_env_source() {
    with_env(
        &[
            ("PEDRABOTNIK_TELEGRAM_BOT_TOKEN", "123456:very-secret".to_string()),
            ("PEDRABOTNIK_LLM_API_KEY", "sk-test".to_string()),
        ],
        || {
            let output = config::run();

            assert!(output.contains("- telegram.bot_token = 123456:***"));
            assert!(!output.contains("very-secret"));
            assert!(!output.contains("sk-test"));
            assert!(output.contains("PEDRABOTNIK_TELEGRAM_BOT_TOKEN"));
        },
    );
}

#[test]
fn ask_reports_missing_knowledge_file() {
    let dir = TempDir::new().expect("tempdir");
    let missing = dir.path().join("absent.txt").display().to_string();

    with_env(
        &[
            ("PEDRABOTNIK_LLM_API_KEY", "sk-test".to_string()),
            ("PEDRABOTNIK_KNOWLEDGE_DIALOGS_PATH", missing),
        ],
        || {
            let result = ask::run("Как оплатить обучение?", None);
            assert_eq!(result.exit_code, 2);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "ask");
            assert_eq!(payload["status"], "error");
            assert_eq!(payload["error_class"], "knowledge");
        },
    );
}

fn knowledge_env(dir: &TempDir) -> Vec<(&'static str, String)> {
    let path = |name: &str| dir.path().join(name);
    fs::write(path("dialogs.txt"), "Вопрос: Как оплатить?\nОтвет: Картой.\n").expect("dialogs");
    fs::write(path("topics.md"), "[payment]\nКартой или по счету.\n").expect("topics");
    fs::write(path("retraining.json"), "[]").expect("retraining");
    fs::write(path("upskilling.json"), "[]").expect("upskilling");

    vec![
        ("PEDRABOTNIK_KNOWLEDGE_DIALOGS_PATH", path("dialogs.txt").display().to_string()),
        ("PEDRABOTNIK_KNOWLEDGE_TOPICS_PATH", path("topics.md").display().to_string()),
        ("PEDRABOTNIK_KNOWLEDGE_RETRAINING_CATALOG_PATH", path("retraining.json").display().to_string()),
        ("PEDRABOTNIK_KNOWLEDGE_UPSKILLING_CATALOG_PATH", path("upskilling.json").display().to_string()),
    ]
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, String)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "PEDRABOTNIK_TELEGRAM_ENABLED",
        "PEDRABOTNIK_TELEGRAM_BOT_TOKEN",
        "TELEGRAM_BOT_TOKEN",
        "PEDRABOTNIK_LLM_PROVIDER",
        "PEDRABOTNIK_LLM_API_KEY",
        "OPENAI_API_KEY",
        "PEDRABOTNIK_LLM_BASE_URL",
        "PEDRABOTNIK_LLM_MODEL",
        "PEDRABOTNIK_KNOWLEDGE_DIALOGS_PATH",
        "PEDRABOTNIK_KNOWLEDGE_TOPICS_PATH",
        "PEDRABOTNIK_KNOWLEDGE_RETRAINING_CATALOG_PATH",
        "PEDRABOTNIK_KNOWLEDGE_UPSKILLING_CATALOG_PATH",
        "PEDRABOTNIK_KNOWLEDGE_CONTRACTS_PATH",
        "PEDRABOTNIK_CONTRACT_INFO_JSON",
        "CONTRACT_INFO_JSON",
        "PEDRABOTNIK_LOGGING_LEVEL",
        "PEDRABOTNIK_LOG_LEVEL",
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
