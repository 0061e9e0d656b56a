//! Data models that flow through the ingest and retrieval pipelines.
//!
//! Messages come from an external message source, are split into
//! [`TimedSentence`]s, grouped into [`Chunk`]s, fingerprinted, and written
//! to the vector store as [`VectorRecord`]s. At query time the vector store
//! returns raw [`Hit`]s which the selector turns into [`SelectedHit`]s.
//!
//! Record and hit field names on the wire (`chunk_text`, `chunk_ord`,
//! `start_ts`, `hash`, `simhash64`, `len`) are fixed so that records already
//! stored in an index remain readable.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Speaker of a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    User,
    Assistant,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Other(name) => name,
        }
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        match s {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            other => Role::Other(other.to_string()),
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        Role::from(s.as_str())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single conversation message, as returned by the message source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub session_id: String,
    #[serde(alias = "ts")]
    pub timestamp: DateTime<Utc>,
    pub role: Role,
    pub content: String,
}

/// One attributed sentence (`"Label: sentence"`) with its message timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedSentence {
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
}

/// A post-processed window of consecutive sentences.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    /// Timestamp of the chunk's first sentence.
    pub start_timestamp: DateTime<Utc>,
    /// Zero-based position within one chunking run.
    pub ordinal: usize,
    /// Session of the message that contributed the first sentence.
    pub session_id: String,
}

/// Exact and approximate content fingerprints of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    /// SHA-256 digest of the chunk text.
    pub exact_hash: [u8; 32],
    /// 64-bit simhash over character bigrams.
    pub approx: u64,
}

/// Metadata persisted next to each record in the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub session_id: String,
    #[serde(rename = "chunk_ord")]
    pub ordinal: usize,
    /// ISO-8601 start timestamp.
    #[serde(rename = "start_ts")]
    pub start_timestamp: String,
    /// Hex SHA-256 of the text.
    #[serde(rename = "hash")]
    pub exact_hash: String,
    /// Zero-padded 16-digit hex simhash.
    #[serde(rename = "simhash64")]
    pub approx_fingerprint: String,
    /// Character count of the text.
    #[serde(rename = "len")]
    pub length: usize,
    pub source: String,
}

/// A chunk ready to be upserted into the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "chunk_text")]
    pub text: String,
    #[serde(flatten)]
    pub metadata: RecordMetadata,
}

/// Fields returned with a search hit. Every field is optional because the
/// store only returns what was requested and older records may lack some.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HitFields {
    #[serde(rename = "chunk_text", default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(rename = "chunk_ord", default, skip_serializing_if = "Option::is_none")]
    pub ordinal: Option<i64>,
    #[serde(rename = "start_ts", default, skip_serializing_if = "Option::is_none")]
    pub start_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(rename = "hash", default, skip_serializing_if = "Option::is_none")]
    pub exact_hash: Option<String>,
    #[serde(rename = "simhash64", default, skip_serializing_if = "Option::is_none")]
    pub approx_fingerprint: Option<String>,
    #[serde(rename = "len", default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl From<&VectorRecord> for HitFields {
    fn from(record: &VectorRecord) -> Self {
        let meta = &record.metadata;
        Self {
            text: Some(record.text.clone()),
            session_id: Some(meta.session_id.clone()),
            role: None,
            ordinal: Some(meta.ordinal as i64),
            start_timestamp: Some(meta.start_timestamp.clone()),
            timestamp: None,
            exact_hash: Some(meta.exact_hash.clone()),
            approx_fingerprint: Some(meta.approx_fingerprint.clone()),
            length: Some(meta.length),
            source: Some(meta.source.clone()),
        }
    }
}

/// A raw similarity hit from the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(rename = "_score", alias = "score", default)]
    pub raw_score: f64,
    #[serde(default)]
    pub fields: HitFields,
}

/// A hit kept by the selector, with its composite score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedHit {
    #[serde(flatten)]
    pub hit: Hit,
    #[serde(rename = "composite")]
    pub composite_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_str() {
        assert_eq!(Role::from("user"), Role::User);
        assert_eq!(Role::from("assistant"), Role::Assistant);
        assert_eq!(Role::from("system"), Role::Other("system".to_string()));
        assert_eq!(Role::from("system").as_str(), "system");
    }

    #[test]
    fn test_message_accepts_ts_alias() {
        let json = r#"{"session_id":"s1","ts":"2025-03-14T09:05:00Z","role":"user","content":"hi"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.timestamp.to_rfc3339(), "2025-03-14T09:05:00+00:00");
    }

    #[test]
    fn test_hit_accepts_both_id_spellings() {
        let a: Hit = serde_json::from_str(r#"{"_id":"x","_score":0.5}"#).unwrap();
        let b: Hit = serde_json::from_str(r#"{"id":"x","score":0.5,"fields":{"chunk_ord":2}}"#).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.raw_score, b.raw_score);
        assert_eq!(b.fields.ordinal, Some(2));
    }

    #[test]
    fn test_record_wire_names() {
        let record = VectorRecord {
            id: "chat_20250314_090500_0000".to_string(),
            text: "User: hi".to_string(),
            metadata: RecordMetadata {
                session_id: "s1".to_string(),
                ordinal: 0,
                start_timestamp: "2025-03-14T09:05:00Z".to_string(),
                exact_hash: "ab".to_string(),
                approx_fingerprint: "00000000000000ff".to_string(),
                length: 8,
                source: "chat".to_string(),
            },
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["_id"], "chat_20250314_090500_0000");
        assert_eq!(value["chunk_text"], "User: hi");
        assert_eq!(value["chunk_ord"], 0);
        assert_eq!(value["simhash64"], "00000000000000ff");
        assert_eq!(value["len"], 8);
    }
}
