//! Remote session — the API-mode side of the mediator.
//!
//! Wraps a `reqwest::Client` bound to a base URL. Every request path is
//! resolved against the base with URL-join semantics, so `/history/7` on
//! `http://host:8000` becomes `http://host:8000/history/7`. Each call carries
//! its own timeout; there are no retries.

use std::time::Duration;

use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace, warn};

use super::error::BackendError;
use super::types::{HistoryEntry, UserId};

/// Which path `rag_answer` posts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RagRoute {
    /// `POST /rag/` — one shared corpus, no personalization.
    #[default]
    Global,
    /// `POST /rag/{user_id}`, falling back to `/rag/` when no id is given.
    PerUser,
}

/// Handle to the remote API. Cheap to clone; `reqwest::Client` is an `Arc`
/// internally.
#[derive(Debug, Clone)]
pub struct ApiSession {
    client: Client,
    base_url: Url,
    timeout: Duration,
    rag_route: RagRoute,
}

impl ApiSession {
    pub fn new(base_url: &str, timeout: Duration, rag_route: RagRoute) -> Result<Self, BackendError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| BackendError::Url(format!("{base_url}: {e}")))?;
        let client = Client::builder().build()?;
        Ok(Self { client, base_url, timeout, rag_route })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn history_path(user_id: UserId) -> String {
        format!("/history/{user_id}")
    }

    pub fn gpt_path(user_id: UserId) -> String {
        format!("/gpt/{user_id}")
    }

    pub fn rag_path(&self, user_id: Option<UserId>) -> String {
        match (self.rag_route, user_id) {
            (RagRoute::PerUser, Some(id)) => format!("/rag/{id}"),
            _ => "/rag/".to_string(),
        }
    }

    // ── Endpoints ─────────────────────────────────────────────────────────

    pub async fn get_history(&self, user_id: UserId) -> Result<Vec<HistoryEntry>, BackendError> {
        let response = self
            .send(Method::GET, &Self::history_path(user_id), None::<&()>)
            .await?;
        let body: HistoryBody = decode(response).await?;
        Ok(body.into_entries())
    }

    pub async fn put_history(&self, user_id: UserId, role: &str, text: &str) -> Result<(), BackendError> {
        let body = HistoryEntryRef { role, text };
        let response = self
            .dispatch(Method::PUT, &Self::history_path(user_id), Some(&body))
            .await?;
        // The write is fire-and-forget: only transport failures are errors.
        if !response.status().is_success() {
            warn!(user_id, status = %response.status(), "history write not acknowledged");
        }
        Ok(())
    }

    /// Clearing is idempotent: a `404` for an already-empty history counts
    /// as success.
    pub async fn delete_history(&self, user_id: UserId) -> Result<(), BackendError> {
        let response = self
            .dispatch(Method::DELETE, &Self::history_path(user_id), None::<&()>)
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(user_id, "history already empty");
            return Ok(());
        }
        check_status(response).await?;
        Ok(())
    }

    pub async fn ask(&self, user_id: UserId, question: &str) -> Result<String, BackendError> {
        let response = self
            .send(Method::POST, &Self::gpt_path(user_id), Some(&QuestionBody { question }))
            .await?;
        let body: AnswerBody<String> = decode(response).await?;
        Ok(body.answer)
    }

    pub async fn rag(&self, user_id: Option<UserId>, question: &str) -> Result<String, BackendError> {
        let response = self
            .send(Method::POST, &self.rag_path(user_id), Some(&QuestionBody { question }))
            .await?;
        let body: AnswerBody<String> = decode(response).await?;
        Ok(body.answer)
    }

    // ── Plumbing ──────────────────────────────────────────────────────────

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, BackendError> {
        let response = self.dispatch(method, path, body).await?;
        check_status(response).await
    }

    /// Issue one request without looking at the status code.
    async fn dispatch<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, BackendError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| BackendError::Url(format!("{path}: {e}")))?;

        debug!(%method, %url, timeout_ms = self.timeout.as_millis() as u64, "sending API request");

        let mut req = self.client.request(method, url.clone()).timeout(self.timeout);
        if let Some(body) = body {
            req = req.json(body);
        }

        let response = req.send().await.map_err(|e| {
            error!(%url, error = %e, timeout = e.is_timeout(), "API request failed (transport)");
            BackendError::Transport(e)
        })?;

        Ok(response)
    }
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct QuestionBody<'a> {
    question: &'a str,
}

#[derive(Debug, Serialize)]
struct HistoryEntryRef<'a> {
    role: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnswerBody<T> {
    answer: T,
}

/// Servers disagree on whether the history list is wrapped in `answer`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HistoryBody {
    Wrapped { answer: Vec<HistoryEntry> },
    Raw(Vec<HistoryEntry>),
}

impl HistoryBody {
    fn into_entries(self) -> Vec<HistoryEntry> {
        match self {
            HistoryBody::Wrapped { answer } => answer,
            HistoryBody::Raw(entries) => entries,
        }
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let text = response.text().await?;
    trace!(body = %text, "API response body");
    serde_json::from_str(&text).map_err(|e| {
        error!(error = %e, "failed to deserialize API response");
        BackendError::Decode(e.to_string())
    })
}

/// Return the response if its status is a success, otherwise a structured
/// error carrying the status code and body.
async fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());

    error!(%status, %body, "API request returned HTTP error");
    Err(BackendError::Status { status: status.as_u16(), body })
}
