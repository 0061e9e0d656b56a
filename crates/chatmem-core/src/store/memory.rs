//! In-memory collaborators for tests and offline previews.
//!
//! Uses `Vec` and `HashMap` behind `std::sync::RwLock` for thread safety.
//! [`InMemoryVectorStore`] has no embeddings: it scores records by the
//! Jaccard overlap of lowercase character bigrams with the query text.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Hit, HitFields, Message, VectorRecord};

use super::{CheckpointStore, MessageSource, SearchQuery, VectorStore};

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

/// Message source over a fixed list. Returns every role.
#[derive(Default)]
pub struct InMemoryMessages {
    messages: RwLock<Vec<Message>>,
}

impl InMemoryMessages {
    pub fn new(mut messages: Vec<Message>) -> Self {
        messages.sort_by_key(|m| m.timestamp);
        Self {
            messages: RwLock::new(messages),
        }
    }

    /// Append a message, keeping timestamp order.
    pub fn push(&self, message: Message) -> Result<()> {
        let mut messages = write(&self.messages)?;
        let at = messages.partition_point(|m| m.timestamp <= message.timestamp);
        messages.insert(at, message);
        Ok(())
    }
}

#[async_trait]
impl MessageSource for InMemoryMessages {
    async fn fetch_messages(&self, since: Option<DateTime<Utc>>, limit: usize) -> Result<Vec<Message>> {
        let messages = read(&self.messages)?;
        Ok(messages
            .iter()
            .filter(|m| since.map_or(true, |s| m.timestamp >= s))
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Checkpoint store keeping every recorded timestamp.
#[derive(Default)]
pub struct InMemoryCheckpoints {
    recorded: RwLock<Vec<DateTime<Utc>>>,
}

impl InMemoryCheckpoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every timestamp recorded so far, in call order.
    pub fn history(&self) -> Result<Vec<DateTime<Utc>>> {
        Ok(read(&self.recorded)?.clone())
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpoints {
    async fn last_processed(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(read(&self.recorded)?.iter().max().copied())
    }

    async fn record_processed(&self, ts: DateTime<Utc>) -> Result<()> {
        write(&self.recorded)?.push(ts);
        Ok(())
    }
}

/// Vector store keyed by namespace, then record id.
#[derive(Default)]
pub struct InMemoryVectorStore {
    namespaces: RwLock<HashMap<String, HashMap<String, VectorRecord>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records stored in `namespace`, sorted by id.
    pub fn records(&self, namespace: &str) -> Result<Vec<VectorRecord>> {
        let namespaces = read(&self.namespaces)?;
        let mut records: Vec<VectorRecord> = namespaces
            .get(namespace)
            .map(|ns| ns.values().cloned().collect())
            .unwrap_or_default();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }
}

fn bigrams(text: &str) -> HashSet<(char, char)> {
    let chars: Vec<char> = text.to_lowercase().chars().collect();
    chars.windows(2).map(|w| (w[0], w[1])).collect()
}

fn overlap_score(query: &HashSet<(char, char)>, text: &str) -> f64 {
    let doc = bigrams(text);
    let union = query.union(&doc).count();
    if union == 0 {
        return 0.0;
    }
    query.intersection(&doc).count() as f64 / union as f64
}

/// Equality filter over top-level metadata: `{"field": value}` or
/// `{"field": {"$eq": value}}`. Other operators never match.
fn matches_filter(fields: &serde_json::Value, filter: &serde_json::Value) -> bool {
    let Some(conditions) = filter.as_object() else {
        return true;
    };
    conditions.iter().all(|(key, cond)| {
        let expected = match cond.as_object() {
            Some(ops) => match ops.get("$eq") {
                Some(v) if ops.len() == 1 => v,
                _ => return false,
            },
            None => cond,
        };
        fields.get(key) == Some(expected)
    })
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<()> {
        let mut namespaces = write(&self.namespaces)?;
        let ns = namespaces.entry(namespace.to_string()).or_default();
        for record in records {
            ns.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn search(&self, namespace: &str, query: &SearchQuery) -> Result<Vec<Hit>> {
        let namespaces = read(&self.namespaces)?;
        let Some(ns) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let query_bigrams = bigrams(query.text.trim());
        let mut hits = Vec::new();
        for record in ns.values() {
            if let Some(filter) = &query.filter {
                if !matches_filter(&serde_json::to_value(record)?, filter) {
                    continue;
                }
            }
            let score = overlap_score(&query_bigrams, &record.text);
            if score > 0.0 {
                hits.push(Hit {
                    id: record.id.clone(),
                    raw_score: score,
                    fields: HitFields::from(record),
                });
            }
        }

        hits.sort_by(|a, b| {
            b.raw_score
                .partial_cmp(&a.raw_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        let limit = match &query.rerank {
            Some(rerank) => query.top_k.min(rerank.top_n),
            None => query.top_k,
        };
        hits.truncate(limit);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecordMetadata, Role};
    use crate::store::Rerank;
    use chrono::TimeZone;

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, minute, 0).unwrap()
    }

    fn message(minute: u32, content: &str) -> Message {
        Message {
            session_id: "s1".to_string(),
            timestamp: ts(minute),
            role: Role::User,
            content: content.to_string(),
        }
    }

    fn record(id: &str, text: &str, session: &str) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            text: text.to_string(),
            metadata: RecordMetadata {
                session_id: session.to_string(),
                ordinal: 0,
                start_timestamp: "2025-03-14T09:00:00Z".to_string(),
                exact_hash: format!("hash-{id}"),
                approx_fingerprint: "0000000000000000".to_string(),
                length: text.chars().count(),
                source: "chat".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_messages_since_and_limit() {
        let source = InMemoryMessages::new(vec![message(2, "b"), message(0, "a"), message(4, "c")]);
        source.push(message(3, "bb")).unwrap();

        let all = source.fetch_messages(None, 10).await.unwrap();
        let contents: Vec<&str> = all.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b", "bb", "c"]);

        let since = source.fetch_messages(Some(ts(2)), 2).await.unwrap();
        let contents: Vec<&str> = since.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["b", "bb"]);
    }

    #[tokio::test]
    async fn test_checkpoints_return_max() {
        let store = InMemoryCheckpoints::new();
        assert_eq!(store.last_processed().await.unwrap(), None);
        store.record_processed(ts(5)).await.unwrap();
        store.record_processed(ts(3)).await.unwrap();
        assert_eq!(store.last_processed().await.unwrap(), Some(ts(5)));
        assert_eq!(store.history().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_by_id() {
        let store = InMemoryVectorStore::new();
        store.upsert("ns", &[record("a", "first", "s1")]).await.unwrap();
        store.upsert("ns", &[record("a", "second", "s1")]).await.unwrap();
        let records = store.records("ns").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text, "second");
        assert!(store.records("other").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_ranks_by_overlap() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(
                "ns",
                &[
                    record("a", "User: the deploy script is flaky", "s1"),
                    record("b", "User: tomatoes in the greenhouse", "s1"),
                    record("c", "zzzz", "s1"),
                ],
            )
            .await
            .unwrap();

        let hits = store.search("ns", &SearchQuery::new("flaky deploy", 10)).await.unwrap();
        assert_eq!(hits[0].id, "a");
        assert!(hits.iter().all(|h| h.id != "c"));
        assert!(hits.windows(2).all(|w| w[0].raw_score >= w[1].raw_score));
        assert_eq!(hits[0].fields.session_id.as_deref(), Some("s1"));
    }

    #[tokio::test]
    async fn test_search_filter_and_rerank_limit() {
        let store = InMemoryVectorStore::new();
        let records: Vec<VectorRecord> = (0..8)
            .map(|i| record(&format!("r{i}"), "shared words here", if i % 2 == 0 { "even" } else { "odd" }))
            .collect();
        store.upsert("ns", &records).await.unwrap();

        let mut query = SearchQuery::new("shared words", 10);
        query.filter = Some(serde_json::json!({ "session_id": { "$eq": "even" } }));
        let hits = store.search("ns", &query).await.unwrap();
        assert_eq!(hits.len(), 4);
        assert!(hits.iter().all(|h| h.fields.session_id.as_deref() == Some("even")));

        let mut query = SearchQuery::new("shared words", 10);
        query.rerank = Some(Rerank::for_top_k("m", 10));
        assert_eq!(store.search("ns", &query).await.unwrap().len(), 5);
    }

    #[test]
    fn test_unsupported_filter_operator_matches_nothing() {
        let fields = serde_json::json!({ "session_id": "s1" });
        assert!(matches_filter(&fields, &serde_json::json!({ "session_id": "s1" })));
        assert!(!matches_filter(&fields, &serde_json::json!({ "session_id": { "$in": ["s1"] } })));
    }
}
