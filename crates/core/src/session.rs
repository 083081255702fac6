//! Cross-turn chat history.
//!
//! The workflow never writes here: the transport reads the prior turns before an
//! invocation and appends the new ones after it returns.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::conversation::ConversationTurn;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Prior turns for a chat, oldest first.
    async fn history(&self, chat_id: &str) -> Vec<ConversationTurn>;
    async fn append(&self, chat_id: &str, turns: Vec<ConversationTurn>);
    async fn chat_count(&self) -> usize;
}

/// Per-chat ring buffer; the oldest turns are evicted first.
pub struct InMemorySessionStore {
    max_turns: usize,
    chats: Mutex<HashMap<String, VecDeque<ConversationTurn>>>,
}

impl InMemorySessionStore {
    pub fn new(max_turns: usize) -> Self {
        Self { max_turns: max_turns.max(1), chats: Mutex::new(HashMap::new()) }
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    fn with_chats<R>(&self, f: impl FnOnce(&mut HashMap<String, VecDeque<ConversationTurn>>) -> R) -> R {
        match self.chats.lock() {
            Ok(mut chats) => f(&mut chats),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn history(&self, chat_id: &str) -> Vec<ConversationTurn> {
        self.with_chats(|chats| {
            chats.get(chat_id).map(|turns| turns.iter().cloned().collect()).unwrap_or_default()
        })
    }

    async fn append(&self, chat_id: &str, turns: Vec<ConversationTurn>) {
        let max_turns = self.max_turns;
        self.with_chats(|chats| {
            let history = chats.entry(chat_id.to_owned()).or_default();
            history.extend(turns);
            while history.len() > max_turns {
                history.pop_front();
            }
        });
    }

    async fn chat_count(&self) -> usize {
        self.with_chats(|chats| chats.len())
    }
}
