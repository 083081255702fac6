//! Telegram transport for the consultation bot.
//!
//! - **API** (`api`) - the Bot API calls the bot needs: `getUpdates`, `sendMessage`, `sendChatAction`
//! - **Polling** (`polling`) - long-polling loop with reconnect backoff
//! - **Handler** (`handler`) - one workflow run per text message, typing indicator, reply mapping
//!
//! # Architecture
//!
//! ```text
//! getUpdates → PollingRunner → MessageHandler → ConsultationWorkflow
//!                                   ↓
//!                 SessionStore ← exchange, sendMessage ← reply
//! ```
//!
//! Errors and timeouts never reach the user verbatim: the handler answers with
//! the fixed failure text and logs the detail.

pub mod api;
pub mod handler;
pub mod polling;

pub use api::{HttpTelegramApi, TelegramApi};
pub use handler::{HandlerSettings, MessageHandler};
pub use polling::{PollingRunner, ReconnectPolicy, TransportError};
