//! Retrieval pipeline: vector search → hit selection → result dedup.

use anyhow::{bail, Result};
use tracing::info;

use crate::dedup::dedupe_hits;
use crate::models::SelectedHit;
use crate::select::{select_hits, SelectParams};
use crate::store::{Rerank, SearchQuery, VectorStore};

/// Parameters for one query.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub namespace: String,
    pub top_k: usize,
    pub filter: Option<serde_json::Value>,
    /// Reranking model; no reranking when `None`.
    pub rerank_model: Option<String>,
    pub select: SelectParams,
}

impl QueryOptions {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            top_k: 12,
            filter: None,
            rerank_model: None,
            select: SelectParams::default(),
        }
    }
}

/// Outcome of one query.
#[derive(Debug, Clone)]
pub struct QueryReport {
    /// Hits returned by the store before selection.
    pub raw_hits: usize,
    pub hits: Vec<SelectedHit>,
}

/// Normalize query text: unify line endings and trim.
pub fn normalize_query(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n").trim().to_string()
}

/// Search `namespace` and return the selected, de-duplicated hits.
pub async fn run_query(vectors: &dyn VectorStore, text: &str, opts: &QueryOptions) -> Result<QueryReport> {
    let text = normalize_query(text);
    if text.is_empty() {
        bail!("query text is empty");
    }

    let query = SearchQuery {
        text,
        top_k: opts.top_k,
        filter: opts.filter.clone(),
        rerank: opts
            .rerank_model
            .as_ref()
            .map(|model| Rerank::for_top_k(model.as_str(), opts.top_k)),
    };
    let raw = vectors.search(&opts.namespace, &query).await?;
    let raw_hits = raw.len();

    let hits = dedupe_hits(select_hits(raw, &opts.select));
    info!(raw = raw_hits, selected = hits.len(), "query complete");
    Ok(QueryReport { raw_hits, hits })
}
