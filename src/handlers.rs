//! Chat command handlers — transport-agnostic.
//!
//! Channels hand every incoming text to [`BotHandlers::handle`] and send the
//! returned string back to the user. Mediator errors stop here: they are
//! logged with their full source chain and turned into a generic apology.

use std::error::Error as _;
use std::sync::Arc;

use tracing::{error, info};

use crate::mediator::{Mediator, MediatorError, UserId};

pub const HELP_TEXT: &str = "Hi! I answer questions with the help of a language model.\n\
Just send me your question.\n\n\
Available commands:\n\
/start - show this message\n\
/reset - clear the conversation history\n\
/history - show how many messages are in the history\n\
/rag <question> - search the documentation and answer <question> from it";

pub const RESET_REPLY: &str = "✅ Conversation history cleared. Starting a new conversation!";
pub const EMPTY_HISTORY_REPLY: &str = "📭 Conversation history is empty";
pub const EMPTY_RAG_REPLY: &str = "Please enter a question after the /rag command";
pub const EMPTY_QUESTION_REPLY: &str = "Please enter a question";
pub const ERROR_REPLY: &str =
    "Sorry, something went wrong while processing your request. Please try again later.";

/// Characters of a message included in log lines.
const LOG_PREVIEW_CHARS: usize = 50;

/// A parsed incoming message.
#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Start,
    Reset,
    History,
    Rag(&'a str),
    Text(&'a str),
}

impl<'a> Command<'a> {
    /// Parse `/cmd[@botname] args`. Unknown commands are treated as text.
    pub fn parse(input: &'a str) -> Self {
        let trimmed = input.trim();
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Command::Text(trimmed);
        };
        let (head, args) = match rest.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.trim()),
            None => (rest, ""),
        };
        let name = head.split('@').next().unwrap_or(head);
        match name {
            "start" | "help" => Command::Start,
            "reset" => Command::Reset,
            "history" => Command::History,
            "rag" => Command::Rag(args),
            _ => Command::Text(trimmed),
        }
    }
}

pub struct BotHandlers {
    mediator: Arc<Mediator>,
}

impl BotHandlers {
    pub fn new(mediator: Arc<Mediator>) -> Self {
        Self { mediator }
    }

    /// Dispatch one incoming message and produce the reply text.
    pub async fn handle(&self, user_id: UserId, username: Option<&str>, input: &str) -> String {
        match Command::parse(input) {
            Command::Start => HELP_TEXT.to_string(),
            Command::Reset => self.reset_history(user_id).await,
            Command::History => self.show_history_info(user_id).await,
            Command::Rag(question) => self.rag_command(user_id, question).await,
            Command::Text(text) => self.handle_message(user_id, username, text).await,
        }
    }

    async fn reset_history(&self, user_id: UserId) -> String {
        match self.mediator.clear_history(user_id).await {
            Ok(()) => RESET_REPLY.to_string(),
            Err(e) => failure("/reset", user_id, &e),
        }
    }

    async fn show_history_info(&self, user_id: UserId) -> String {
        let history = match self.mediator.get_user_history(user_id).await {
            Ok(history) => history,
            Err(e) => return failure("/history", user_id, &e),
        };
        if history.is_empty() {
            return EMPTY_HISTORY_REPLY.to_string();
        }

        let user_messages = history.iter().filter(|e| e.is_user()).count();
        let assistant_messages = history.iter().filter(|e| e.is_assistant()).count();
        format!(
            "📚 Conversation history:\n\
             Your messages: {user_messages}\n\
             Bot replies: {assistant_messages}\n\
             Total messages: {}\n\n\
             Use /reset to clear the history",
            history.len()
        )
    }

    async fn rag_command(&self, user_id: UserId, question: &str) -> String {
        if question.trim().is_empty() {
            return EMPTY_RAG_REPLY.to_string();
        }
        match self.mediator.rag_answer(question, Some(user_id)).await {
            Ok(answer) => answer,
            Err(e) => failure("/rag", user_id, &e),
        }
    }

    async fn handle_message(&self, user_id: UserId, username: Option<&str>, text: &str) -> String {
        if text.trim().is_empty() {
            return EMPTY_QUESTION_REPLY.to_string();
        }

        let preview: String = text.chars().take(LOG_PREVIEW_CHARS).collect();
        let fallback_name = format!("user_{user_id}");
        info!(
            username = username.unwrap_or(&fallback_name),
            user_id,
            message = %preview,
            "processing message"
        );

        match self.mediator.ask_gpt(text, user_id).await {
            Ok(answer) => answer,
            Err(e) => failure("message", user_id, &e),
        }
    }
}

fn failure(what: &str, user_id: UserId, e: &MediatorError) -> String {
    let cause = e.source().map(|s| s.to_string()).unwrap_or_default();
    error!(what, user_id, error = %e, cause = %cause, "request failed");
    ERROR_REPLY.to_string()
}
