//! In-memory full-text vector store.
//!
//! Documents are split into Markdown-aware chunks and indexed into an SQLite
//! FTS5 table held in an in-memory connection. Queries are ranked with
//! `bm25(chunks)`; the negated rank is reported as the passage score, so
//! higher is better. The index is built once at startup and is read-only
//! afterwards.

use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{Connection, params};
use text_splitter::MarkdownSplitter;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::mediator::{BackendError, Passage, VectorStore};

const INDEXED_EXTENSIONS: &[&str] = &["md", "markdown", "txt"];

/// A source document before chunking.
#[derive(Debug, Clone)]
pub struct Document {
    pub source: String,
    pub text: String,
}

pub struct MemoryVectorStore {
    conn: Mutex<Connection>,
    chunks: usize,
}

impl MemoryVectorStore {
    /// Chunk and index `docs`. Empty chunks are skipped.
    pub fn build(docs: Vec<Document>, chunk_size: usize) -> Result<Self, AppError> {
        let mut conn = Connection::open_in_memory()
            .map_err(|e| AppError::Backend(format!("vector store: open: {e}")))?;
        conn.execute_batch(
            "CREATE VIRTUAL TABLE chunks USING fts5(
                source UNINDEXED,
                text
            );",
        )
        .map_err(|e| AppError::Backend(format!("vector store: initialize schema: {e}")))?;

        let splitter = MarkdownSplitter::new(chunk_size.max(1));
        let mut chunks = 0;
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Backend(format!("vector store: begin index tx: {e}")))?;
        for doc in &docs {
            for text in splitter.chunks(&doc.text).filter(|t| !t.trim().is_empty()) {
                tx.execute(
                    "INSERT INTO chunks (source, text) VALUES (?1, ?2)",
                    params![doc.source, text],
                )
                .map_err(|e| AppError::Backend(format!("vector store: insert chunk: {e}")))?;
                chunks += 1;
            }
        }
        tx.commit()
            .map_err(|e| AppError::Backend(format!("vector store: commit index tx: {e}")))?;

        debug!(documents = docs.len(), chunks, "vector store built");
        Ok(Self { conn: Mutex::new(conn), chunks })
    }

    /// Index every `.md` / `.txt` file under `dir` (recursively).
    pub fn from_dir(dir: &Path, chunk_size: usize) -> Result<Self, AppError> {
        let mut docs = Vec::new();
        collect_documents(dir, dir, &mut docs)?;
        if docs.is_empty() {
            warn!(dir = %dir.display(), "no documents found to index");
        }
        let store = Self::build(docs, chunk_size)?;
        info!(dir = %dir.display(), chunks = store.len(), "document index ready");
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.chunks
    }

    pub fn is_empty(&self) -> bool {
        self.chunks == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, BackendError> {
        self.conn
            .lock()
            .map_err(|_| BackendError::Collaborator("vector store lock poisoned".into()))
    }

    fn search(&self, q: &str, top_k: usize) -> Result<Vec<Passage>, BackendError> {
        let safe_query = match_any_query(q);
        if safe_query.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT source, text, bm25(chunks) AS rank
                 FROM chunks
                 WHERE chunks MATCH ?1
                 ORDER BY rank
                 LIMIT ?2",
            )
            .map_err(|e| BackendError::Collaborator(format!("vector store: prepare search: {e}")))?;

        let rows_result = stmt.query_map(params![safe_query, top_k as i64], |row| {
            let rank: f64 = row.get(2)?;
            Ok(Passage { source: row.get(0)?, text: row.get(1)?, score: (-rank) as f32 })
        });

        let rows = match rows_result {
            Ok(r) => r,
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("fts5: syntax error") {
                    warn!(error = %msg, "vector store: FTS5 syntax error, returning no passages");
                    return Ok(Vec::new());
                }
                return Err(BackendError::Collaborator(format!("vector store: search: {e}")));
            }
        };

        rows.map(|r| r.map_err(|e| BackendError::Collaborator(format!("vector store: search row: {e}"))))
            .collect()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn query(&self, q: &str, top_k: usize) -> Result<Vec<Passage>, BackendError> {
        self.search(q, top_k)
    }
}

/// Turn a free-form question into an FTS5 query matching any of its words.
///
/// Every token is quoted (inner quotes doubled) so FTS5 reads it as a
/// phrase, never as `AND` / `NOT` / `NEAR` syntax. Tokens without a single
/// alphanumeric character are dropped. Terms are joined with `OR` so a chunk
/// needs only one of them.
fn match_any_query(query: &str) -> String {
    query
        .split_whitespace()
        .filter(|tok| tok.chars().any(char::is_alphanumeric))
        .map(|tok| format!("\"{}\"", tok.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" OR ")
}

fn collect_documents(root: &Path, dir: &Path, out: &mut Vec<Document>) -> Result<(), AppError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| AppError::Backend(format!("cannot read docs dir {}: {e}", dir.display())))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            collect_documents(root, &path, out)?;
            continue;
        }
        let indexed = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| INDEXED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if !indexed {
            continue;
        }
        let text = fs::read_to_string(&path)
            .map_err(|e| AppError::Backend(format!("cannot read {}: {e}", path.display())))?;
        let source = path.strip_prefix(root).unwrap_or(path.as_path()).display().to_string();
        out.push(Document { source, text });
    }
    Ok(())
}
