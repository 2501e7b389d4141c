//! Mediator error taxonomy.
//!
//! - [`MediatorError::Initialization`] — no usable backend combination at
//!   construction time. The mediator is never built.
//! - [`MediatorError::Operation`] — the resolved backend cannot service the
//!   requested operation.
//! - [`MediatorError::Backend`] — the collaborator or the remote API failed.
//!   The underlying [`BackendError`] is kept as the error source.

use std::fmt;

use thiserror::Error;

/// The five operations the mediator exposes. Used to name the failing call
/// in errors and log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GetUserHistory,
    AddToHistory,
    ClearHistory,
    AskGpt,
    RagAnswer,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::GetUserHistory => "get_user_history",
            Operation::AddToHistory => "add_to_history",
            Operation::ClearHistory => "clear_history",
            Operation::AskGpt => "ask_gpt",
            Operation::RagAnswer => "rag_answer",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum MediatorError {
    #[error("mediator initialization failed: {0}")]
    Initialization(String),

    #[error("operation `{0}` cannot be serviced by the configured backend")]
    Operation(Operation),

    #[error("`{operation}` failed: {source}")]
    Backend {
        operation: Operation,
        #[source]
        source: BackendError,
    },
}

impl MediatorError {
    pub(crate) fn backend(operation: Operation) -> impl FnOnce(BackendError) -> Self {
        move |source| MediatorError::Backend { operation, source }
    }
}

/// Failures raised below the mediator — HTTP transport, remote status codes,
/// malformed bodies, or errors reported by an in-process collaborator.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("invalid request url: {0}")]
    Url(String),

    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response body: {0}")]
    Decode(String),

    #[error("collaborator error: {0}")]
    Collaborator(String),
}
