//! # chatmem
//!
//! Conversation memory for AI assistants. Chat history is cut into
//! overlapping, timestamp-tagged chunks, fingerprinted, de-duplicated, and
//! upserted into an external vector index. At query time the raw similarity
//! hits are trimmed to a short, recent, de-duplicated context.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────┐   ┌──────────────┐
//! │  SQLite  │──▶│  chatmem-core        │──▶│ Vector index │
//! │ messages │   │ chunk+fingerprint+   │   │ (records API)│
//! └──────────┘   │ dedup                │   └──────┬───────┘
//!                └──────────────────────┘          │
//!                          ▲                       ▼
//!                ┌──────────────────────┐   ┌──────────────┐
//!                │ select + result dedup│◀──│   search     │
//!                └──────────────────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! chatmem init                          # create database
//! chatmem import history.jsonl          # load messages
//! chatmem chunk history.jsonl           # preview chunks
//! chatmem ingest --dry-run              # show what would be written
//! chatmem ingest                        # chunk and upsert new messages
//! chatmem query "flaky deploy script"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | Message source and checkpoint store |
//! | [`vector_client`] | Records API client |
//! | [`import`] | JSON-lines message import |
//! | [`chunk_cmd`] | Chunking preview |
//! | [`ingest`] | Ingest command |
//! | [`query`] | Query command |
//! | [`logging`] | `tracing` setup |

pub mod chunk_cmd;
pub mod config;
pub mod db;
pub mod import;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod query;
pub mod sqlite_store;
pub mod vector_client;
