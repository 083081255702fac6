//! OpenAI-compatible chat-completions client.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use pedrabotnik_core::config::LlmConfig;
use pedrabotnik_core::domain::conversation::{Role, Transcript};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::llm::{InferenceOutput, LlmClient};
use crate::persona::PersonaConfig;

const MAX_ERROR_BODY_CHARS: usize = 300;

pub struct OpenAiClient {
    client: Client,
    endpoint: String,
    /// `"Bearer <key>"`, built once.
    cached_auth_header: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("failed to build inference HTTP client")?;
        let base_url = config.effective_base_url();

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            cached_auth_header: config
                .api_key
                .as_ref()
                .map(|key| format!("Bearer {}", key.expose_secret())),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_request(persona: &PersonaConfig, transcript: &Transcript) -> ChatRequest {
        let mut messages = Vec::with_capacity(transcript.len() + 1);
        messages.push(Message { role: "system", content: persona.instructions.to_string() });

        for turn in transcript.turns() {
            let content = turn.text();
            if content.trim().is_empty() {
                continue;
            }
            let role = match turn.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push(Message { role, content });
        }

        let response_format = persona.structured_schema().map(|(name, schema)| {
            json!({
                "type": "json_schema",
                "json_schema": { "name": name, "schema": schema, "strict": true }
            })
        });

        ChatRequest { model: persona.model.clone(), messages, response_format }
    }

    fn parse_response(persona: &PersonaConfig, response: ChatResponse) -> Result<InferenceOutput> {
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty());

        let Some(content) = content else {
            return Ok(InferenceOutput::empty());
        };

        if persona.structured_schema().is_some() {
            let value: Value = serde_json::from_str(content.trim()).with_context(|| {
                format!("structured output of `{}` was not valid JSON", persona.id)
            })?;
            Ok(InferenceOutput::structured(value))
        } else {
            Ok(InferenceOutput::text(content.trim()))
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn run(&self, persona: &PersonaConfig, transcript: &Transcript) -> Result<InferenceOutput> {
        let request = Self::build_request(persona, transcript);

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(auth_header) = &self.cached_auth_header {
            builder = builder.header("Authorization", auth_header);
        }

        let response = builder.send().await.context("inference request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(anyhow!("inference API returned {status}: {body}"));
        }

        let parsed: ChatResponse =
            response.json().await.context("inference response JSON decode failed")?;
        Self::parse_response(persona, parsed)
    }
}
