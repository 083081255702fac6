//! Telegram Bot API subset used by the bot: long polling, replies, typing.

use std::time::Duration;

use async_trait::async_trait;
use pedrabotnik_core::config::TelegramConfig;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::polling::TransportError;

/// Telegram rejects longer `sendMessage` texts.
pub const MAX_MESSAGE_CHARS: usize = 4096;

const SEND_TIMEOUT_SECS: u64 = 30;
/// Headroom over the long-poll timeout before the HTTP request gives up.
const POLL_GRACE_SECS: u64 = 15;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: i64,
}

impl Message {
    /// Trimmed text, `None` for non-text or blank messages.
    pub fn trimmed_text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|text| !text.is_empty())
    }

    /// The sender when known, otherwise the chat itself.
    pub fn client_id(&self) -> i64 {
        self.from.as_ref().map(|user| user.id).unwrap_or(self.chat.id)
    }
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self, method: &'static str) -> Result<T, TransportError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            (true, None) => {
                Err(TransportError::Api { method, description: "response carried no result".to_owned() })
            }
            (false, _) => Err(TransportError::Api {
                method,
                description: self.description.unwrap_or_else(|| "unknown error".to_owned()),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

#[async_trait]
pub trait TelegramApi: Send + Sync {
    /// Long-polls for updates after `offset`.
    async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>, TransportError>;
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TransportError>;
    async fn send_typing(&self, chat_id: i64) -> Result<(), TransportError>;
}

pub struct HttpTelegramApi {
    client: Client,
    api_base_url: String,
    bot_token: SecretString,
}

impl HttpTelegramApi {
    pub fn from_config(config: &TelegramConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|error| TransportError::Connect(error.without_url().to_string()))?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            bot_token: config.bot_token.clone(),
        })
    }

    async fn call<T>(
        &self,
        method: &'static str,
        body: &impl Serialize,
        timeout: Duration,
    ) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/bot{}/{method}", self.api_base_url, self.bot_token.expose_secret());
        // The URL carries the token; errors are stripped of it before they leave.
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|error| TransportError::Connect(format!("{method}: {}", error.without_url())))?;

        let payload: ApiResponse<T> = response
            .json()
            .await
            .map_err(|error| TransportError::Receive(format!("{method}: {}", error.without_url())))?;
        payload.into_result(method)
    }
}

#[async_trait]
impl TelegramApi for HttpTelegramApi {
    async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>, TransportError> {
        let request = GetUpdatesRequest { offset, timeout: timeout_secs, allowed_updates: ["message"] };
        self.call("getUpdates", &request, Duration::from_secs(timeout_secs + POLL_GRACE_SECS)).await
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TransportError> {
        let body = json!({ "chat_id": chat_id, "text": text });
        self.call::<Value>("sendMessage", &body, Duration::from_secs(SEND_TIMEOUT_SECS)).await.map(|_| ())
    }

    async fn send_typing(&self, chat_id: i64) -> Result<(), TransportError> {
        let body = json!({ "chat_id": chat_id, "action": "typing" });
        self.call::<Value>("sendChatAction", &body, Duration::from_secs(SEND_TIMEOUT_SECS)).await.map(|_| ())
    }
}

/// Splits `text` into sendable chunks, preferring line breaks as cut points.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    for line in text.split_inclusive('\n') {
        let line_chars = line.chars().count();
        if current_chars + line_chars <= max_chars {
            current.push_str(line);
            current_chars += line_chars;
            continue;
        }
        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        // A single line longer than the limit is cut on char boundaries.
        let mut chars = line.chars().peekable();
        while chars.peek().is_some() {
            let piece: String = chars.by_ref().take(max_chars).collect();
            let piece_chars = piece.chars().count();
            if piece_chars == max_chars {
                chunks.push(piece);
            } else {
                current = piece;
                current_chars = piece_chars;
            }
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
        .into_iter()
        .map(|chunk| chunk.trim_end_matches('\n').to_owned())
        .filter(|chunk| !chunk.trim().is_empty())
        .collect()
}
