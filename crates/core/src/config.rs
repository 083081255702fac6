use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::safety::SafetyCheck;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub llm: LlmConfig,
    pub safety: SafetyConfig,
    pub knowledge: KnowledgeConfig,
    pub workflow: WorkflowConfig,
    pub session: SessionConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub enabled: bool,
    pub bot_token: SecretString,
    pub api_base_url: String,
    pub poll_timeout_secs: u64,
    pub typing_interval_secs: u64,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SafetyConfig {
    pub jailbreak_model: String,
    pub jailbreak_threshold: f64,
    /// Adds a non-blocking PII check, which turns on the scrub pass.
    pub mask_pii: bool,
    pub strict: bool,
}

#[derive(Clone, Debug)]
pub struct KnowledgeConfig {
    pub dialogs_path: PathBuf,
    pub topics_path: PathBuf,
    pub retraining_catalog_path: PathBuf,
    pub upskilling_catalog_path: PathBuf,
    pub contracts_path: Option<PathBuf>,
    /// Inline contract map; wins over `contracts_path`.
    pub contract_info_json: Option<String>,
}

#[derive(Clone, Debug)]
pub struct WorkflowConfig {
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub max_turns: usize,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Ollama,
}

impl LlmProvider {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Ollama => "http://localhost:11434/v1",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub telegram_enabled: Option<bool>,
    pub telegram_bot_token: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const DEFAULT_CONFIG_FILES: [&str; 2] = ["pedrabotnik.toml", "config/pedrabotnik.toml"];

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig {
                enabled: true,
                bot_token: String::new().into(),
                api_base_url: "https://api.telegram.org".to_string(),
                poll_timeout_secs: 30,
                typing_interval_secs: 4,
                max_retries: 5,
                base_delay_ms: 1_000,
                max_delay_ms: 30_000,
            },
            llm: LlmConfig {
                provider: LlmProvider::OpenAi,
                api_key: None,
                base_url: None,
                model: "gpt-5.1-chat-latest".to_string(),
                timeout_secs: 60,
            },
            safety: SafetyConfig {
                jailbreak_model: "gpt-5-nano".to_string(),
                jailbreak_threshold: 0.7,
                mask_pii: false,
                strict: true,
            },
            knowledge: KnowledgeConfig {
                dialogs_path: PathBuf::from("knowledge/dialogs.txt"),
                topics_path: PathBuf::from("knowledge/topics.md"),
                retraining_catalog_path: PathBuf::from("knowledge/retraining.json"),
                upskilling_catalog_path: PathBuf::from("knowledge/upskilling.json"),
                contracts_path: None,
                contract_info_json: None,
            },
            workflow: WorkflowConfig { timeout_secs: 90 },
            session: SessionConfig { max_turns: 20 },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl LlmConfig {
    pub fn effective_base_url(&self) -> String {
        self.base_url
            .clone()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| self.provider.default_base_url().to_string())
    }
}

/// One configured safety check.
#[derive(Clone, Debug, PartialEq)]
pub struct CheckConfig {
    pub check: SafetyCheck,
    pub model: Option<String>,
    pub confidence_threshold: Option<f64>,
    pub block: bool,
    pub entities: Vec<String>,
}

impl SafetyConfig {
    /// Jailbreak always; a non-blocking PII check when masking is on.
    pub fn checks(&self) -> Vec<CheckConfig> {
        let mut checks = vec![CheckConfig {
            check: SafetyCheck::Jailbreak,
            model: Some(self.jailbreak_model.clone()),
            confidence_threshold: Some(self.jailbreak_threshold),
            block: true,
            entities: Vec::new(),
        }];
        if self.mask_pii {
            checks.push(CheckConfig {
                check: SafetyCheck::Pii,
                model: None,
                confidence_threshold: None,
                block: false,
                entities: vec![
                    "EMAIL_ADDRESS".to_string(),
                    "PHONE_NUMBER".to_string(),
                    "CREDIT_CARD".to_string(),
                ],
            });
        }
        checks
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(telegram) = patch.telegram {
            if let Some(enabled) = telegram.enabled {
                self.telegram.enabled = enabled;
            }
            if let Some(bot_token_value) = telegram.bot_token {
                self.telegram.bot_token = secret_value(bot_token_value);
            }
            if let Some(api_base_url) = telegram.api_base_url {
                self.telegram.api_base_url = api_base_url;
            }
            if let Some(poll_timeout_secs) = telegram.poll_timeout_secs {
                self.telegram.poll_timeout_secs = poll_timeout_secs;
            }
            if let Some(typing_interval_secs) = telegram.typing_interval_secs {
                self.telegram.typing_interval_secs = typing_interval_secs;
            }
            if let Some(max_retries) = telegram.max_retries {
                self.telegram.max_retries = max_retries;
            }
            if let Some(base_delay_ms) = telegram.base_delay_ms {
                self.telegram.base_delay_ms = base_delay_ms;
            }
            if let Some(max_delay_ms) = telegram.max_delay_ms {
                self.telegram.max_delay_ms = max_delay_ms;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(safety) = patch.safety {
            if let Some(jailbreak_model) = safety.jailbreak_model {
                self.safety.jailbreak_model = jailbreak_model;
            }
            if let Some(jailbreak_threshold) = safety.jailbreak_threshold {
                self.safety.jailbreak_threshold = jailbreak_threshold;
            }
            if let Some(mask_pii) = safety.mask_pii {
                self.safety.mask_pii = mask_pii;
            }
            if let Some(strict) = safety.strict {
                self.safety.strict = strict;
            }
        }

        if let Some(knowledge) = patch.knowledge {
            if let Some(dialogs_path) = knowledge.dialogs_path {
                self.knowledge.dialogs_path = dialogs_path;
            }
            if let Some(topics_path) = knowledge.topics_path {
                self.knowledge.topics_path = topics_path;
            }
            if let Some(retraining_catalog_path) = knowledge.retraining_catalog_path {
                self.knowledge.retraining_catalog_path = retraining_catalog_path;
            }
            if let Some(upskilling_catalog_path) = knowledge.upskilling_catalog_path {
                self.knowledge.upskilling_catalog_path = upskilling_catalog_path;
            }
            if let Some(contracts_path) = knowledge.contracts_path {
                self.knowledge.contracts_path = Some(contracts_path);
            }
        }

        if let Some(workflow) = patch.workflow {
            if let Some(timeout_secs) = workflow.timeout_secs {
                self.workflow.timeout_secs = timeout_secs;
            }
        }

        if let Some(session) = patch.session {
            if let Some(max_turns) = session.max_turns {
                self.session.max_turns = max_turns;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PEDRABOTNIK_TELEGRAM_ENABLED") {
            self.telegram.enabled = parse_bool("PEDRABOTNIK_TELEGRAM_ENABLED", &value)?;
        }
        let bot_token =
            read_env("PEDRABOTNIK_TELEGRAM_BOT_TOKEN").or_else(|| read_env("TELEGRAM_BOT_TOKEN"));
        if let Some(value) = bot_token {
            self.telegram.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("PEDRABOTNIK_TELEGRAM_API_BASE_URL") {
            self.telegram.api_base_url = value;
        }
        if let Some(value) = read_env("PEDRABOTNIK_TELEGRAM_POLL_TIMEOUT_SECS") {
            self.telegram.poll_timeout_secs =
                parse_u64("PEDRABOTNIK_TELEGRAM_POLL_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("PEDRABOTNIK_TELEGRAM_TYPING_INTERVAL_SECS") {
            self.telegram.typing_interval_secs =
                parse_u64("PEDRABOTNIK_TELEGRAM_TYPING_INTERVAL_SECS", &value)?;
        }

        if let Some(value) = read_env("PEDRABOTNIK_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        let api_key = read_env("PEDRABOTNIK_LLM_API_KEY").or_else(|| read_env("OPENAI_API_KEY"));
        if let Some(value) = api_key {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("PEDRABOTNIK_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("PEDRABOTNIK_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("PEDRABOTNIK_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("PEDRABOTNIK_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("PEDRABOTNIK_SAFETY_JAILBREAK_MODEL") {
            self.safety.jailbreak_model = value;
        }
        if let Some(value) = read_env("PEDRABOTNIK_SAFETY_JAILBREAK_THRESHOLD") {
            self.safety.jailbreak_threshold =
                parse_f64("PEDRABOTNIK_SAFETY_JAILBREAK_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("PEDRABOTNIK_SAFETY_MASK_PII") {
            self.safety.mask_pii = parse_bool("PEDRABOTNIK_SAFETY_MASK_PII", &value)?;
        }
        if let Some(value) = read_env("PEDRABOTNIK_SAFETY_STRICT") {
            self.safety.strict = parse_bool("PEDRABOTNIK_SAFETY_STRICT", &value)?;
        }

        if let Some(value) = read_env("PEDRABOTNIK_KNOWLEDGE_DIALOGS_PATH") {
            self.knowledge.dialogs_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("PEDRABOTNIK_KNOWLEDGE_TOPICS_PATH") {
            self.knowledge.topics_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("PEDRABOTNIK_KNOWLEDGE_RETRAINING_CATALOG_PATH") {
            self.knowledge.retraining_catalog_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("PEDRABOTNIK_KNOWLEDGE_UPSKILLING_CATALOG_PATH") {
            self.knowledge.upskilling_catalog_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("PEDRABOTNIK_KNOWLEDGE_CONTRACTS_PATH") {
            self.knowledge.contracts_path = Some(PathBuf::from(value));
        }
        let contract_info =
            read_env("PEDRABOTNIK_CONTRACT_INFO_JSON").or_else(|| read_env("CONTRACT_INFO_JSON"));
        if let Some(value) = contract_info {
            self.knowledge.contract_info_json = Some(value);
        }

        if let Some(value) = read_env("PEDRABOTNIK_WORKFLOW_TIMEOUT_SECS") {
            self.workflow.timeout_secs = parse_u64("PEDRABOTNIK_WORKFLOW_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("PEDRABOTNIK_SESSION_MAX_TURNS") {
            self.session.max_turns = parse_usize("PEDRABOTNIK_SESSION_MAX_TURNS", &value)?;
        }

        if let Some(value) = read_env("PEDRABOTNIK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("PEDRABOTNIK_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("PEDRABOTNIK_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("PEDRABOTNIK_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("PEDRABOTNIK_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("PEDRABOTNIK_LOGGING_LEVEL").or_else(|| read_env("PEDRABOTNIK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PEDRABOTNIK_LOGGING_FORMAT").or_else(|| read_env("PEDRABOTNIK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(enabled) = overrides.telegram_enabled {
            self.telegram.enabled = enabled;
        }
        if let Some(bot_token) = overrides.telegram_bot_token {
            self.telegram.bot_token = secret_value(bot_token);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_telegram(&self.telegram)?;
        validate_llm(&self.llm)?;
        validate_safety(&self.safety)?;
        validate_workflow(&self.workflow, &self.session)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    DEFAULT_CONFIG_FILES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_telegram(telegram: &TelegramConfig) -> Result<(), ConfigError> {
    if !telegram.enabled {
        return Ok(());
    }

    let bot_token = telegram.bot_token.expose_secret();
    if bot_token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "telegram.bot_token is required (set TELEGRAM_BOT_TOKEN or PEDRABOTNIK_TELEGRAM_BOT_TOKEN). Get it from @BotFather".to_string(),
        ));
    }
    if !bot_token.contains(':') {
        return Err(ConfigError::Validation(
            "telegram.bot_token must look like `<bot id>:<secret>` as issued by @BotFather"
                .to_string(),
        ));
    }

    if telegram.poll_timeout_secs == 0 || telegram.poll_timeout_secs > 50 {
        return Err(ConfigError::Validation(
            "telegram.poll_timeout_secs must be in range 1..=50".to_string(),
        ));
    }
    if telegram.typing_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "telegram.typing_interval_secs must be greater than zero".to_string(),
        ));
    }
    if telegram.base_delay_ms > telegram.max_delay_ms {
        return Err(ConfigError::Validation(
            "telegram.base_delay_ms must not exceed telegram.max_delay_ms".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    match llm.provider {
        LlmProvider::OpenAi => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for the openai provider (set OPENAI_API_KEY)"
                        .to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {}
    }

    if let Some(base_url) = &llm.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_safety(safety: &SafetyConfig) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&safety.jailbreak_threshold) {
        return Err(ConfigError::Validation(
            "safety.jailbreak_threshold must be in range 0.0..=1.0".to_string(),
        ));
    }
    if safety.jailbreak_model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "safety.jailbreak_model must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_workflow(workflow: &WorkflowConfig, session: &SessionConfig) -> Result<(), ConfigError> {
    if workflow.timeout_secs == 0 || workflow.timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "workflow.timeout_secs must be in range 1..=600".to_string(),
        ));
    }
    if session.max_turns == 0 {
        return Err(ConfigError::Validation(
            "session.max_turns must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| invalid_override(key, value))
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.parse::<f64>().map_err(|_| invalid_override(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    telegram: Option<TelegramPatch>,
    llm: Option<LlmPatch>,
    safety: Option<SafetyPatch>,
    knowledge: Option<KnowledgePatch>,
    workflow: Option<WorkflowPatch>,
    session: Option<SessionPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramPatch {
    enabled: Option<bool>,
    bot_token: Option<String>,
    api_base_url: Option<String>,
    poll_timeout_secs: Option<u64>,
    typing_interval_secs: Option<u64>,
    max_retries: Option<u32>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SafetyPatch {
    jailbreak_model: Option<String>,
    jailbreak_threshold: Option<f64>,
    mask_pii: Option<bool>,
    strict: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct KnowledgePatch {
    dialogs_path: Option<PathBuf>,
    topics_path: Option<PathBuf>,
    retraining_catalog_path: Option<PathBuf>,
    upskilling_catalog_path: Option<PathBuf>,
    contracts_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct WorkflowPatch {
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    max_turns: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
