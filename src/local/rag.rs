//! Retrieval client — searches the vector store and hands the passages to the
//! generation bot as context.
//!
//! The augmented prompt is sent one-shot so excerpts never enter a user's
//! history. With a user id, the plain question and the answer are recorded
//! afterwards.

use async_trait::async_trait;
use tracing::debug;

use crate::mediator::{
    BackendError, GenerationBot, Passage, RetrievalClient, UserId, VectorStore, ROLE_ASSISTANT,
    ROLE_USER,
};

/// Default number of passages pulled into the prompt.
const DEFAULT_TOP_K: usize = 5;

pub struct RagClient {
    top_k: usize,
}

impl Default for RagClient {
    fn default() -> Self {
        Self { top_k: DEFAULT_TOP_K }
    }
}

impl RagClient {
    pub fn new(top_k: usize) -> Self {
        Self { top_k: top_k.max(1) }
    }

    pub fn build_prompt(query: &str, passages: &[Passage]) -> String {
        if passages.is_empty() {
            return format!(
                "No documentation excerpts matched this question. \
                 Say so, then answer as best you can.\n\nQuestion: {query}"
            );
        }

        let mut prompt = String::from(
            "Answer the question using the documentation excerpts below. \
             If they do not contain the answer, say so.\n\n",
        );
        for (i, p) in passages.iter().enumerate() {
            prompt.push_str(&format!("[{}] ({})\n{}\n\n", i + 1, p.source, p.text.trim()));
        }
        prompt.push_str(&format!("Question: {query}"));
        prompt
    }
}

#[async_trait]
impl RetrievalClient for RagClient {
    async fn answer(
        &self,
        store: &dyn VectorStore,
        bot: &dyn GenerationBot,
        user_id: Option<UserId>,
        query: &str,
    ) -> Result<String, BackendError> {
        let passages = store.query(query, self.top_k).await?;
        debug!(hits = passages.len(), top_k = self.top_k, ?user_id, "retrieved passages");
        let prompt = Self::build_prompt(query, &passages);
        let answer = bot.ask_gpt(&prompt, None).await?;

        if let Some(id) = user_id {
            bot.add_to_history(id, ROLE_USER, query).await?;
            bot.add_to_history(id, ROLE_ASSISTANT, &answer).await?;
        }
        Ok(answer)
    }
}
