//! ragbot — a chat front-end over two interchangeable backends.
//!
//! The [`mediator`] resolves, once at startup, whether questions go to an
//! in-process generation/retrieval backend ([`local`]) or to a remote HTTP
//! API, and exposes one interface for history and answering either way.
//! The binary entry point is `src/main.rs`.

pub mod bootstrap;
pub mod comms;
pub mod config;
pub mod error;
pub mod handlers;
pub mod llm;
pub mod local;
pub mod logger;
pub mod mediator;
