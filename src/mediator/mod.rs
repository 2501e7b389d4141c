//! Mediator — one interface over two backend topologies.
//!
//! The backend is resolved once, in [`Mediator::new`], into a [`Backend`]
//! tagged union:
//!
//! - **LOCAL** — a generation bot and a retrieval client are both supplied.
//!   Calls become in-process trait calls. A remote session, if also
//!   supplied, is ignored.
//! - **API** — otherwise, if a remote session is supplied. Calls become HTTP
//!   requests against the session's base URL.
//! - Neither — construction fails with [`MediatorError::Initialization`].
//!
//! The resolved mode never changes. The mediator holds no state besides the
//! injected handles and performs no locking, retries or queuing of its own.

pub mod api;
mod error;
pub mod types;

pub use api::{ApiSession, RagRoute};
pub use error::{BackendError, MediatorError, Operation};
pub use types::{
    GenerationBot, HistoryEntry, Passage, RetrievalClient, UserId, VectorStore, ROLE_ASSISTANT,
    ROLE_USER,
};

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

/// The resolved backend topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Local,
    Api,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Local => f.write_str("LOCAL"),
            Mode::Api => f.write_str("API"),
        }
    }
}

/// The optional collaborator handles supplied at startup.
///
/// All handles are shared; the mediator neither creates nor destroys them.
#[derive(Clone, Default)]
pub struct BackendHandles {
    pub api: Option<ApiSession>,
    pub retrieval: Option<Arc<dyn RetrievalClient>>,
    pub vector_store: Option<Arc<dyn VectorStore>>,
    pub generation: Option<Arc<dyn GenerationBot>>,
}

impl fmt::Debug for BackendHandles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendHandles")
            .field("api", &self.api.as_ref().map(|s| s.base_url().as_str()))
            .field("retrieval", &self.retrieval.is_some())
            .field("vector_store", &self.vector_store.is_some())
            .field("generation", &self.generation.is_some())
            .finish()
    }
}

enum Backend {
    Local {
        retrieval: Arc<dyn RetrievalClient>,
        generation: Arc<dyn GenerationBot>,
        vector_store: Option<Arc<dyn VectorStore>>,
    },
    Api(ApiSession),
}

pub struct Mediator {
    backend: Backend,
}

impl fmt::Debug for Mediator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mediator").field("mode", &self.mode()).finish()
    }
}

impl Mediator {
    /// Resolve the mode from `handles` and build the mediator.
    pub fn new(handles: BackendHandles) -> Result<Self, MediatorError> {
        let BackendHandles { api, retrieval, vector_store, generation } = handles;

        let backend = match (generation, retrieval, api) {
            (Some(generation), Some(retrieval), api) => {
                if api.is_some() {
                    debug!("remote session supplied alongside local backend, ignoring it");
                }
                if vector_store.is_none() {
                    warn!("local backend has no vector store, rag_answer will be unavailable");
                }
                Backend::Local { retrieval, generation, vector_store }
            }
            (_, _, Some(session)) => Backend::Api(session),
            _ => {
                return Err(MediatorError::Initialization("no usable backend supplied".into()));
            }
        };

        let mediator = Self { backend };
        info!(mode = %mediator.mode(), "mediator ready");
        Ok(mediator)
    }

    pub fn mode(&self) -> Mode {
        match self.backend {
            Backend::Local { .. } => Mode::Local,
            Backend::Api(_) => Mode::Api,
        }
    }

    // ── History ───────────────────────────────────────────────────────────

    pub async fn get_user_history(&self, user_id: UserId) -> Result<Vec<HistoryEntry>, MediatorError> {
        let op = Operation::GetUserHistory;
        debug!(%op, user_id, mode = %self.mode(), "dispatch");
        let result = match &self.backend {
            Backend::Local { generation, .. } => generation.get_user_history(user_id).await,
            Backend::Api(session) => session.get_history(user_id).await,
        };
        result.map_err(MediatorError::backend(op))
    }

    pub async fn add_to_history(&self, user_id: UserId, role: &str, text: &str) -> Result<(), MediatorError> {
        let op = Operation::AddToHistory;
        debug!(%op, user_id, role, mode = %self.mode(), "dispatch");
        let result = match &self.backend {
            Backend::Local { generation, .. } => generation.add_to_history(user_id, role, text).await,
            Backend::Api(session) => session.put_history(user_id, role, text).await,
        };
        result.map_err(MediatorError::backend(op))
    }

    pub async fn clear_history(&self, user_id: UserId) -> Result<(), MediatorError> {
        let op = Operation::ClearHistory;
        debug!(%op, user_id, mode = %self.mode(), "dispatch");
        let result = match &self.backend {
            Backend::Local { generation, .. } => generation.clear_history(user_id).await,
            Backend::Api(session) => session.delete_history(user_id).await,
        };
        result.map_err(MediatorError::backend(op))
    }

    // ── Answering ─────────────────────────────────────────────────────────

    pub async fn ask_gpt(&self, question: &str, user_id: UserId) -> Result<String, MediatorError> {
        let op = Operation::AskGpt;
        debug!(%op, user_id, question_len = question.len(), mode = %self.mode(), "dispatch");
        let result = match &self.backend {
            Backend::Local { generation, .. } => generation.ask_gpt(question, Some(user_id)).await,
            Backend::Api(session) => session.ask(user_id, question).await,
        };
        result.map_err(MediatorError::backend(op))
    }

    /// Retrieval-augmented answer. `user_id` is optional here only; with
    /// `None` no personalization or history context is applied.
    pub async fn rag_answer(&self, question: &str, user_id: Option<UserId>) -> Result<String, MediatorError> {
        let op = Operation::RagAnswer;
        debug!(%op, ?user_id, question_len = question.len(), mode = %self.mode(), "dispatch");
        let result = match &self.backend {
            Backend::Local { retrieval, generation, vector_store } => {
                let store = vector_store.as_deref().ok_or(MediatorError::Operation(op))?;
                retrieval
                    .answer(store, generation.as_ref(), user_id, question)
                    .await
            }
            Backend::Api(session) => session.rag(user_id, question).await,
        };
        result.map_err(MediatorError::backend(op))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    #[derive(Default)]
    struct RecordingBot {
        asks: Mutex<Vec<(String, Option<UserId>)>>,
        history: Mutex<HashMap<UserId, Vec<HistoryEntry>>>,
    }

    #[async_trait]
    impl GenerationBot for RecordingBot {
        async fn get_user_history(&self, user_id: UserId) -> Result<Vec<HistoryEntry>, BackendError> {
            Ok(self.history.lock().unwrap().get(&user_id).cloned().unwrap_or_default())
        }

        async fn add_to_history(&self, user_id: UserId, role: &str, text: &str) -> Result<(), BackendError> {
            self.history
                .lock()
                .unwrap()
                .entry(user_id)
                .or_default()
                .push(HistoryEntry::new(role, text));
            Ok(())
        }

        async fn clear_history(&self, user_id: UserId) -> Result<(), BackendError> {
            self.history.lock().unwrap().remove(&user_id);
            Ok(())
        }

        async fn ask_gpt(&self, question: &str, user_id: Option<UserId>) -> Result<String, BackendError> {
            self.asks.lock().unwrap().push((question.to_string(), user_id));
            Ok("4".to_string())
        }
    }

    struct FailingBot;

    #[async_trait]
    impl GenerationBot for FailingBot {
        async fn get_user_history(&self, _: UserId) -> Result<Vec<HistoryEntry>, BackendError> {
            Err(BackendError::Collaborator("history offline".into()))
        }
        async fn add_to_history(&self, _: UserId, _: &str, _: &str) -> Result<(), BackendError> {
            Err(BackendError::Collaborator("history offline".into()))
        }
        async fn clear_history(&self, _: UserId) -> Result<(), BackendError> {
            Err(BackendError::Collaborator("history offline".into()))
        }
        async fn ask_gpt(&self, _: &str, _: Option<UserId>) -> Result<String, BackendError> {
            Err(BackendError::Collaborator("model offline".into()))
        }
    }

    struct NoopStore;

    #[async_trait]
    impl VectorStore for NoopStore {
        async fn query(&self, _: &str, _: usize) -> Result<Vec<Passage>, BackendError> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct RecordingRetrieval {
        calls: Mutex<Vec<(Option<UserId>, String)>>,
    }

    #[async_trait]
    impl RetrievalClient for RecordingRetrieval {
        async fn answer(
            &self,
            _store: &dyn VectorStore,
            _bot: &dyn GenerationBot,
            user_id: Option<UserId>,
            query: &str,
        ) -> Result<String, BackendError> {
            self.calls.lock().unwrap().push((user_id, query.to_string()));
            Ok("A module groups code.".to_string())
        }
    }

    fn api_session() -> ApiSession {
        ApiSession::new("http://127.0.0.1:9", Duration::from_secs(5), RagRoute::Global).unwrap()
    }

    fn local_handles(bot: Arc<dyn GenerationBot>) -> BackendHandles {
        BackendHandles {
            retrieval: Some(Arc::new(RecordingRetrieval::default())),
            vector_store: Some(Arc::new(NoopStore)),
            generation: Some(bot),
            ..Default::default()
        }
    }

    #[test]
    fn no_handles_fails_initialization() {
        let err = Mediator::new(BackendHandles::default()).unwrap_err();
        assert!(matches!(err, MediatorError::Initialization(_)));
        assert!(err.to_string().contains("no usable backend supplied"));
    }

    #[test]
    fn generation_and_retrieval_select_local() {
        let m = Mediator::new(local_handles(Arc::new(RecordingBot::default()))).unwrap();
        assert_eq!(m.mode(), Mode::Local);
    }

    #[test]
    fn local_pair_wins_over_remote_session() {
        let mut handles = local_handles(Arc::new(RecordingBot::default()));
        handles.api = Some(api_session());
        assert_eq!(Mediator::new(handles).unwrap().mode(), Mode::Local);
    }

    #[test]
    fn remote_session_alone_selects_api() {
        let handles = BackendHandles { api: Some(api_session()), ..Default::default() };
        assert_eq!(Mediator::new(handles).unwrap().mode(), Mode::Api);
    }

    #[test]
    fn remote_session_with_retrieval_only_selects_api() {
        let handles = BackendHandles {
            api: Some(api_session()),
            retrieval: Some(Arc::new(RecordingRetrieval::default())),
            ..Default::default()
        };
        assert_eq!(Mediator::new(handles).unwrap().mode(), Mode::Api);
    }

    #[test]
    fn incomplete_local_pair_without_session_fails() {
        let only_bot = BackendHandles {
            generation: Some(Arc::new(RecordingBot::default())),
            vector_store: Some(Arc::new(NoopStore)),
            ..Default::default()
        };
        assert!(matches!(Mediator::new(only_bot), Err(MediatorError::Initialization(_))));

        let only_retrieval = BackendHandles {
            retrieval: Some(Arc::new(RecordingRetrieval::default())),
            ..Default::default()
        };
        assert!(matches!(Mediator::new(only_retrieval), Err(MediatorError::Initialization(_))));
    }

    #[tokio::test]
    async fn local_ask_gpt_delegates_once_verbatim() {
        let bot = Arc::new(RecordingBot::default());
        let m = Mediator::new(local_handles(bot.clone())).unwrap();

        let answer = m.ask_gpt("2+2?", 42).await.unwrap();

        assert_eq!(answer, "4");
        let asks = bot.asks.lock().unwrap();
        assert_eq!(asks.as_slice(), &[("2+2?".to_string(), Some(42))]);
    }

    #[tokio::test]
    async fn local_append_then_fetch_round_trips() {
        let m = Mediator::new(local_handles(Arc::new(RecordingBot::default()))).unwrap();

        m.add_to_history(5, ROLE_ASSISTANT, "earlier").await.unwrap();
        m.add_to_history(5, ROLE_USER, "hi").await.unwrap();
        let history = m.get_user_history(5).await.unwrap();

        assert_eq!(history.last(), Some(&HistoryEntry::new("user", "hi")));
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn local_clear_is_idempotent() {
        let m = Mediator::new(local_handles(Arc::new(RecordingBot::default()))).unwrap();
        m.add_to_history(9, ROLE_USER, "hello").await.unwrap();

        m.clear_history(9).await.unwrap();
        assert!(m.get_user_history(9).await.unwrap().is_empty());
        m.clear_history(9).await.unwrap();
        assert!(m.get_user_history(9).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn local_rag_passes_optional_user_through() {
        let retrieval = Arc::new(RecordingRetrieval::default());
        let handles = BackendHandles {
            retrieval: Some(retrieval.clone()),
            vector_store: Some(Arc::new(NoopStore)),
            generation: Some(Arc::new(RecordingBot::default())),
            ..Default::default()
        };
        let m = Mediator::new(handles).unwrap();

        let answer = m.rag_answer("what is a module?", None).await.unwrap();
        m.rag_answer("and a package?", Some(11)).await.unwrap();

        assert_eq!(answer, "A module groups code.");
        let calls = retrieval.calls.lock().unwrap();
        assert_eq!(calls[0], (None, "what is a module?".to_string()));
        assert_eq!(calls[1], (Some(11), "and a package?".to_string()));
    }

    #[tokio::test]
    async fn local_rag_without_vector_store_is_an_operation_error() {
        let mut handles = local_handles(Arc::new(RecordingBot::default()));
        handles.vector_store = None;
        let m = Mediator::new(handles).unwrap();

        let err = m.rag_answer("anything", None).await.unwrap_err();
        assert!(matches!(err, MediatorError::Operation(Operation::RagAnswer)));
        assert!(err.to_string().contains("rag_answer"));
    }

    #[tokio::test]
    async fn collaborator_failures_are_wrapped_with_operation() {
        let m = Mediator::new(local_handles(Arc::new(FailingBot))).unwrap();

        let err = m.ask_gpt("hello", 1).await.unwrap_err();
        match err {
            MediatorError::Backend { operation, source } => {
                assert_eq!(operation, Operation::AskGpt);
                assert!(matches!(source, BackendError::Collaborator(ref msg) if msg == "model offline"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = m.clear_history(1).await.unwrap_err();
        assert!(matches!(err, MediatorError::Backend { operation: Operation::ClearHistory, .. }));
    }
}
