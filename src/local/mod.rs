//! In-process LOCAL backend: chat bot, vector store and retrieval client.
//!
//! These are ordinary implementations of the mediator's capability traits;
//! the mediator never sees the concrete types.

pub mod chat_bot;
pub mod rag;
pub mod vector_store;

pub use chat_bot::ChatBot;
pub use rag::RagClient;
pub use vector_store::{Document, MemoryVectorStore};
