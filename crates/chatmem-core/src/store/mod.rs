//! Collaborator abstractions for the ingest and retrieval pipelines.
//!
//! The core never talks to a database or an index directly. It reads
//! messages from a [`MessageSource`], tracks progress in a
//! [`CheckpointStore`], and writes and searches records through a
//! [`VectorStore`]. Implementations must be `Send + Sync` to work with async
//! runtimes.
//!
//! [`memory`] provides in-memory implementations for tests and previews.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Hit, Message, VectorRecord};

/// Reranking model used when a caller asks for reranking without naming one.
pub const DEFAULT_RERANK_MODEL: &str = "bge-reranker-v2-m3";

/// A reranking request forwarded to the vector store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rerank {
    pub model: String,
    pub top_n: usize,
    pub rank_fields: Vec<String>,
}

impl Rerank {
    /// Rerank on the chunk text, keeping at most `min(top_k, 5)` results.
    pub fn for_top_k(model: impl Into<String>, top_k: usize) -> Self {
        Self {
            model: model.into(),
            top_n: top_k.min(5),
            rank_fields: vec!["chunk_text".to_string()],
        }
    }
}

/// A similarity query against one namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    pub top_k: usize,
    /// Store-specific metadata filter, passed through untouched.
    pub filter: Option<serde_json::Value>,
    pub rerank: Option<Rerank>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, top_k: usize) -> Self {
        Self {
            text: text.into(),
            top_k,
            filter: None,
            rerank: None,
        }
    }
}

/// Source of conversation messages.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Messages with `timestamp >= since` (all messages when `since` is
    /// `None`), oldest first, at most `limit` of them.
    async fn fetch_messages(&self, since: Option<DateTime<Utc>>, limit: usize) -> Result<Vec<Message>>;
}

/// Persistence of the last processed message timestamp.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Latest recorded timestamp, if any run has completed.
    async fn last_processed(&self) -> Result<Option<DateTime<Utc>>>;

    /// Record that messages up to `ts` have been processed.
    async fn record_processed(&self, ts: DateTime<Utc>) -> Result<()>;
}

/// External vector index with integrated embedding.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace records by id.
    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<()>;

    /// Raw hits ranked by descending similarity.
    async fn search(&self, namespace: &str, query: &SearchQuery) -> Result<Vec<Hit>>;
}
