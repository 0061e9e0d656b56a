//! Client for a records-style vector index with integrated embedding.
//!
//! The index embeds `chunk_text` server-side, so the client only ships text
//! and metadata:
//!
//! - `POST {host}/records/namespaces/{ns}/upsert`: newline-delimited JSON,
//!   one record per line, in batches of `batch_size`.
//! - `POST {host}/records/namespaces/{ns}/search`: a text query with
//!   optional filter and rerank; hits come back under `result.hits`.
//!
//! Retry strategy (same as every HTTP call in this crate):
//! - HTTP 429 or 5xx → retry with exponential backoff (1s, 2s, 4s, …)
//! - HTTP 4xx (not 429) → fail immediately
//! - Network error → retry

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use chatmem_core::models::{Hit, VectorRecord};
use chatmem_core::store::{SearchQuery, VectorStore};

use crate::config::VectorStoreConfig;

/// Fields requested with every search.
pub const SEARCH_FIELDS: [&str; 9] = [
    "chunk_text",
    "session_id",
    "role",
    "chunk_ord",
    "start_ts",
    "hash",
    "simhash64",
    "len",
    "source",
];

/// HTTP client for the records API.
#[cfg_attr(test, derive(Debug))]
pub struct RecordsClient {
    client: reqwest::Client,
    host: String,
    api_key: Option<String>,
    batch_size: usize,
    max_retries: u32,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: SearchResult,
}

#[derive(Deserialize, Default)]
struct SearchResult {
    #[serde(default)]
    hits: Vec<Hit>,
}

impl RecordsClient {
    pub fn new(
        host: &str,
        api_key: Option<String>,
        batch_size: usize,
        max_retries: u32,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            api_key,
            batch_size: batch_size.max(1),
            max_retries,
        })
    }

    /// Build a client from config. The API key is read from the
    /// environment variable named by `api_key_env`.
    pub fn from_config(config: &VectorStoreConfig) -> Result<Self> {
        if !config.is_enabled() {
            bail!("No vector store configured. Set [vector_store] provider = \"records\" in config.");
        }
        let host = config
            .host
            .as_deref()
            .ok_or_else(|| anyhow!("vector_store.host required"))?;
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow!("{} not set", config.api_key_env))?;
        Self::new(
            host,
            Some(api_key),
            config.batch_size,
            config.max_retries,
            config.timeout_secs,
        )
    }

    fn url(&self, namespace: &str, action: &str) -> String {
        format!("{}/records/namespaces/{}/{}", self.host, namespace, action)
    }

    /// POST `body` to `url`, retrying rate limits, server errors, and
    /// network failures.
    async fn post(&self, url: &str, content_type: &str, body: String) -> Result<reqwest::Response> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                debug!(attempt, ?delay, "retrying vector store request");
                tokio::time::sleep(delay).await;
            }

            let mut request = self
                .client
                .post(url)
                .header("Content-Type", content_type)
                .body(body.clone());
            if let Some(key) = &self.api_key {
                request = request.header("Api-Key", key);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(%status, "vector store request failed, will retry");
                        last_err = Some(anyhow!("Vector store error {}: {}", status, body_text));
                        continue;
                    }

                    bail!("Vector store error {}: {}", status, body_text);
                }
                Err(e) => {
                    warn!(error = %e, "vector store request failed, will retry");
                    last_err = Some(e.into());
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("Vector store request failed after retries")))
    }
}

/// Serialize records as newline-delimited JSON.
pub fn to_ndjson(records: &[VectorRecord]) -> Result<String> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    Ok(out)
}

/// JSON body for a search request.
pub fn search_body(query: &SearchQuery) -> serde_json::Value {
    let mut q = serde_json::json!({
        "inputs": { "text": query.text },
        "top_k": query.top_k,
    });
    if let Some(filter) = &query.filter {
        q["filter"] = filter.clone();
    }

    let mut body = serde_json::json!({
        "query": q,
        "fields": SEARCH_FIELDS,
    });
    if let Some(rerank) = &query.rerank {
        body["rerank"] = serde_json::json!(rerank);
    }
    body
}

#[async_trait]
impl VectorStore for RecordsClient {
    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<()> {
        let url = self.url(namespace, "upsert");
        for batch in records.chunks(self.batch_size) {
            self.post(&url, "application/x-ndjson", to_ndjson(batch)?).await?;
            debug!(namespace, count = batch.len(), "upserted records");
        }
        Ok(())
    }

    async fn search(&self, namespace: &str, query: &SearchQuery) -> Result<Vec<Hit>> {
        let url = self.url(namespace, "search");
        let body = serde_json::to_string(&search_body(query))?;
        let response = self.post(&url, "application/json", body).await?;
        let parsed: SearchResponse = response.json().await?;
        Ok(parsed.result.hits)
    }
}
