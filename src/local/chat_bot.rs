//! In-process generation bot — per-user history over an [`LlmProvider`].
//!
//! History is kept in memory, capped per user (FIFO, oldest entries dropped
//! first). The lock is a plain `std::sync::Mutex` and is never held across
//! the provider call.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::llm::{ChatMessage, LlmProvider};
use crate::mediator::{BackendError, GenerationBot, HistoryEntry, UserId, ROLE_ASSISTANT, ROLE_USER};

/// Default maximum number of history entries per user.
const DEFAULT_HISTORY_CAP: usize = 50;

pub struct ChatBot {
    provider: LlmProvider,
    system_prompt: Option<String>,
    history_cap: usize,
    history: Mutex<HashMap<UserId, VecDeque<HistoryEntry>>>,
}

impl ChatBot {
    pub fn new(provider: LlmProvider, system_prompt: Option<String>, history_cap: Option<usize>) -> Self {
        Self {
            provider,
            system_prompt,
            history_cap: history_cap.unwrap_or(DEFAULT_HISTORY_CAP).max(1),
            history: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<UserId, VecDeque<HistoryEntry>>>, BackendError> {
        self.history
            .lock()
            .map_err(|_| BackendError::Collaborator("history lock poisoned".into()))
    }

    fn push(&self, user_id: UserId, entry: HistoryEntry) -> Result<(), BackendError> {
        let mut history = self.lock()?;
        let entries = history.entry(user_id).or_default();
        entries.push_back(entry);
        while entries.len() > self.history_cap {
            entries.pop_front();
        }
        Ok(())
    }

    fn build_messages(&self, question: &str, past: &[HistoryEntry]) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(past.len() + 2);
        if let Some(system) = &self.system_prompt {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.extend(past.iter().map(|e| ChatMessage::new(e.role.clone(), e.text.clone())));
        messages.push(ChatMessage::user(question));
        messages
    }
}

#[async_trait]
impl GenerationBot for ChatBot {
    async fn get_user_history(&self, user_id: UserId) -> Result<Vec<HistoryEntry>, BackendError> {
        let history = self.lock()?;
        Ok(history
            .get(&user_id)
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn add_to_history(&self, user_id: UserId, role: &str, text: &str) -> Result<(), BackendError> {
        self.push(user_id, HistoryEntry::new(role, text))
    }

    async fn clear_history(&self, user_id: UserId) -> Result<(), BackendError> {
        self.lock()?.remove(&user_id);
        Ok(())
    }

    async fn ask_gpt(&self, question: &str, user_id: Option<UserId>) -> Result<String, BackendError> {
        let past = match user_id {
            Some(id) => self.get_user_history(id).await?,
            None => Vec::new(),
        };
        let messages = self.build_messages(question, &past);

        debug!(provider = self.provider.name(), ?user_id, history = past.len(), "asking model");
        let answer = self.provider.complete(&messages).await.map_err(|e| {
            warn!(error = %e, "model request failed");
            BackendError::Collaborator(e.to_string())
        })?;

        if let Some(id) = user_id {
            self.push(id, HistoryEntry::new(ROLE_USER, question))?;
            self.push(id, HistoryEntry::new(ROLE_ASSISTANT, answer.clone()))?;
        }
        Ok(answer)
    }
}
