//! Startup wiring — turns a resolved [`Config`] into the backend handles the
//! mediator is built from.
//!
//! Handles are built only for the sections that are enabled. The mediator
//! then decides the mode from whatever is present.

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::error::AppError;
use crate::llm::providers;
use crate::local::{ChatBot, MemoryVectorStore, RagClient};
use crate::mediator::{ApiSession, BackendHandles, GenerationBot, RetrievalClient, VectorStore};

pub fn backend_handles(config: &Config) -> Result<BackendHandles, AppError> {
    let mut handles = BackendHandles::default();

    if config.api.enabled {
        let base_url = config.api.base_url();
        let session = ApiSession::new(&base_url, config.api.timeout(), config.api.rag_route)
            .map_err(|e| AppError::Backend(format!("api session: {e}")))?;
        info!(%base_url, timeout_seconds = config.api.timeout_seconds, "remote session configured");
        handles.api = Some(session);
    }

    if config.local.enabled {
        let provider = providers::build(&config.llm, config.llm_api_key.clone())
            .map_err(|e| AppError::Backend(format!("llm provider: {e}")))?;
        info!(provider = provider.name(), "local generation backend configured");

        let bot: Arc<dyn GenerationBot> = Arc::new(ChatBot::new(
            provider,
            config.local.system_prompt.clone(),
            config.local.history_cap,
        ));
        let retrieval: Arc<dyn RetrievalClient> = Arc::new(RagClient::new(config.local.top_k));
        handles.generation = Some(bot);
        handles.retrieval = Some(retrieval);

        if let Some(dir) = &config.local.docs_dir {
            let store: Arc<dyn VectorStore> =
                Arc::new(MemoryVectorStore::from_dir(dir, config.local.chunk_size)?);
            handles.vector_store = Some(store);
        }
    }

    Ok(handles)
}
