//! # chatmem core
//!
//! Conversation memory pipeline: sanitizing, sentence splitting,
//! sliding-window chunking, post-processing, fingerprinting, ingest-time
//! de-duplication, and retrieval-time hit selection.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem I/O. External
//! systems (message source, checkpoint store, vector index) are reached
//! through the async traits in [`store`]; [`store::memory`] provides
//! in-memory implementations.

pub mod chunk;
pub mod dedup;
pub mod fingerprint;
pub mod ingest;
pub mod models;
pub mod post_process;
pub mod query;
pub mod record;
pub mod sanitize;
pub mod select;
pub mod sentence;
pub mod store;
