use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use pedrabotnik_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILES};
use secrecy::ExposeSecret;
use toml::Value;

/// One reported setting: key path, rendered value, env vars that can set it.
struct Entry {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn entry(key: &'static str, value: impl Into<String>, env_keys: &'static [&'static str]) -> Entry {
    Entry { key, value: value.into(), env_keys }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for entry in entries(&config) {
        let source =
            field_source(entry.key, entry.env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(entry.key, &entry.value, source));
    }

    lines.join("\n")
}

fn entries(config: &AppConfig) -> Vec<Entry> {
    let path = |path: &Path| path.display().to_string();
    vec![
        entry("telegram.enabled", config.telegram.enabled.to_string(), &["PEDRABOTNIK_TELEGRAM_ENABLED"]),
        entry(
            "telegram.bot_token",
            redact_token(config.telegram.bot_token.expose_secret()),
            &["PEDRABOTNIK_TELEGRAM_BOT_TOKEN", "TELEGRAM_BOT_TOKEN"],
        ),
        entry("telegram.api_base_url", &config.telegram.api_base_url, &["PEDRABOTNIK_TELEGRAM_API_BASE_URL"]),
        entry(
            "telegram.poll_timeout_secs",
            config.telegram.poll_timeout_secs.to_string(),
            &["PEDRABOTNIK_TELEGRAM_POLL_TIMEOUT_SECS"],
        ),
        entry(
            "telegram.typing_interval_secs",
            config.telegram.typing_interval_secs.to_string(),
            &["PEDRABOTNIK_TELEGRAM_TYPING_INTERVAL_SECS"],
        ),
        entry("llm.provider", format!("{:?}", config.llm.provider), &["PEDRABOTNIK_LLM_PROVIDER"]),
        entry("llm.model", &config.llm.model, &["PEDRABOTNIK_LLM_MODEL"]),
        entry("llm.base_url", config.llm.effective_base_url(), &["PEDRABOTNIK_LLM_BASE_URL"]),
        entry(
            "llm.api_key",
            if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" },
            &["PEDRABOTNIK_LLM_API_KEY", "OPENAI_API_KEY"],
        ),
        entry("llm.timeout_secs", config.llm.timeout_secs.to_string(), &["PEDRABOTNIK_LLM_TIMEOUT_SECS"]),
        entry("safety.jailbreak_model", &config.safety.jailbreak_model, &["PEDRABOTNIK_SAFETY_JAILBREAK_MODEL"]),
        entry(
            "safety.jailbreak_threshold",
            config.safety.jailbreak_threshold.to_string(),
            &["PEDRABOTNIK_SAFETY_JAILBREAK_THRESHOLD"],
        ),
        entry("safety.mask_pii", config.safety.mask_pii.to_string(), &["PEDRABOTNIK_SAFETY_MASK_PII"]),
        entry("safety.strict", config.safety.strict.to_string(), &["PEDRABOTNIK_SAFETY_STRICT"]),
        entry(
            "knowledge.dialogs_path",
            path(&config.knowledge.dialogs_path),
            &["PEDRABOTNIK_KNOWLEDGE_DIALOGS_PATH"],
        ),
        entry("knowledge.topics_path", path(&config.knowledge.topics_path), &["PEDRABOTNIK_KNOWLEDGE_TOPICS_PATH"]),
        entry(
            "knowledge.retraining_catalog_path",
            path(&config.knowledge.retraining_catalog_path),
            &["PEDRABOTNIK_KNOWLEDGE_RETRAINING_CATALOG_PATH"],
        ),
        entry(
            "knowledge.upskilling_catalog_path",
            path(&config.knowledge.upskilling_catalog_path),
            &["PEDRABOTNIK_KNOWLEDGE_UPSKILLING_CATALOG_PATH"],
        ),
        entry(
            "knowledge.contracts_path",
            config.knowledge.contracts_path.as_deref().map(path).unwrap_or_else(|| "<unset>".to_string()),
            &["PEDRABOTNIK_KNOWLEDGE_CONTRACTS_PATH"],
        ),
        entry(
            "knowledge.contract_info_json",
            if config.knowledge.contract_info_json.is_some() { "<inline>" } else { "<unset>" },
            &["PEDRABOTNIK_CONTRACT_INFO_JSON", "CONTRACT_INFO_JSON"],
        ),
        entry("workflow.timeout_secs", config.workflow.timeout_secs.to_string(), &["PEDRABOTNIK_WORKFLOW_TIMEOUT_SECS"]),
        entry("session.max_turns", config.session.max_turns.to_string(), &["PEDRABOTNIK_SESSION_MAX_TURNS"]),
        entry("server.bind_address", &config.server.bind_address, &["PEDRABOTNIK_SERVER_BIND_ADDRESS"]),
        entry(
            "server.health_check_port",
            config.server.health_check_port.to_string(),
            &["PEDRABOTNIK_SERVER_HEALTH_CHECK_PORT"],
        ),
        entry("logging.level", &config.logging.level, &["PEDRABOTNIK_LOGGING_LEVEL", "PEDRABOTNIK_LOG_LEVEL"]),
        entry(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["PEDRABOTNIK_LOGGING_FORMAT", "PEDRABOTNIK_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    DEFAULT_CONFIG_FILES.into_iter().map(PathBuf::from).find(|path| path.exists())
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
    if let Some(env_key) = env_keys.iter().find(|env_key| env::var_os(env_key).is_some()) {
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

/// Keeps the bot id of a `<id>:<secret>` token.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((bot_id, _)) = trimmed.split_once(':') {
        return format!("{bot_id}:***");
    }

    "<redacted>".to_string()
}
