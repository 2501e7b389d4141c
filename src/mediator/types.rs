//! Shared data types and the capability traits the mediator dispatches to in
//! LOCAL mode.
//!
//! Each trait is one narrow method set. Implementations may be in-process
//! (see [`crate::local`]) or test doubles; the mediator only ever sees
//! `Arc<dyn Trait>`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::BackendError;

/// Opaque per-user key. Uniqueness is the transport's responsibility.
pub type UserId = u64;

pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

/// One role-tagged turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub text: String,
}

impl HistoryEntry {
    pub fn new(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self { role: role.into(), text: text.into() }
    }

    pub fn is_user(&self) -> bool {
        self.role == ROLE_USER
    }

    pub fn is_assistant(&self) -> bool {
        self.role == ROLE_ASSISTANT
    }
}

/// A retrieved chunk of reference text and its relevance score
/// (higher = more relevant).
#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    pub text: String,
    pub source: String,
    pub score: f32,
}

/// Generation backend with per-user conversation history.
#[async_trait]
pub trait GenerationBot: Send + Sync {
    async fn get_user_history(&self, user_id: UserId) -> Result<Vec<HistoryEntry>, BackendError>;

    async fn add_to_history(&self, user_id: UserId, role: &str, text: &str) -> Result<(), BackendError>;

    async fn clear_history(&self, user_id: UserId) -> Result<(), BackendError>;

    /// Answer `question`. With `Some(user_id)` the user's history is used as
    /// context and the exchange is recorded; with `None` the call is one-shot.
    async fn ask_gpt(&self, question: &str, user_id: Option<UserId>) -> Result<String, BackendError>;
}

/// Searchable reference corpus. Opaque to the mediator, which only passes
/// the handle through to the retrieval client.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn query(&self, q: &str, top_k: usize) -> Result<Vec<Passage>, BackendError>;
}

/// Retrieval-augmented answering: search `store`, then ask `bot`.
#[async_trait]
pub trait RetrievalClient: Send + Sync {
    async fn answer(
        &self,
        store: &dyn VectorStore,
        bot: &dyn GenerationBot,
        user_id: Option<UserId>,
        query: &str,
    ) -> Result<String, BackendError>;
}
