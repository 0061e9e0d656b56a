//! TOML configuration.
//!
//! Only `[db]` is required; every other section falls back to the pipeline
//! defaults. See `config/chatmem.example.toml` for a full example.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use chatmem_core::chunk::{ChunkParams, RoleLabels};
use chatmem_core::select::SelectParams;
use chatmem_core::store::DEFAULT_RERANK_MODEL;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default = "default_ts_gap_minutes")]
    pub ts_gap_minutes: i64,
    #[serde(default = "default_user_label")]
    pub user_label: String,
    #[serde(default = "default_assistant_label")]
    pub assistant_label: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
            ts_gap_minutes: default_ts_gap_minutes(),
            user_label: default_user_label(),
            assistant_label: default_assistant_label(),
        }
    }
}

fn default_chunk_size() -> usize {
    200
}
fn default_overlap() -> usize {
    50
}
fn default_ts_gap_minutes() -> i64 {
    5
}
fn default_user_label() -> String {
    "User".to_string()
}
fn default_assistant_label() -> String {
    "Assistant".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DedupConfig {
    #[serde(default = "default_max_hamming")]
    pub max_hamming: u32,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            max_hamming: default_max_hamming(),
        }
    }
}

fn default_max_hamming() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_source_tag")]
    pub source_tag: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            source_tag: default_source_tag(),
        }
    }
}

fn default_limit() -> usize {
    1000
}
fn default_source_tag() -> String {
    "chat".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub rmin: usize,
    #[serde(default = "default_rmax")]
    pub rmax: usize,
    #[serde(default = "default_half_life_hours")]
    pub half_life_hours: f64,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_beta")]
    pub beta: f64,
    #[serde(default = "default_gamma")]
    pub gamma: f64,
    #[serde(default = "default_drop_knee")]
    pub drop_knee: f64,
    #[serde(default = "default_hard_clip")]
    pub hard_clip: f64,
    #[serde(default = "default_accept_floor")]
    pub accept_floor: f64,
    #[serde(default)]
    pub rerank: bool,
    #[serde(default = "default_rerank_model")]
    pub rerank_model: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            rmin: 0,
            rmax: default_rmax(),
            half_life_hours: default_half_life_hours(),
            alpha: default_alpha(),
            beta: default_beta(),
            gamma: default_gamma(),
            drop_knee: default_drop_knee(),
            hard_clip: default_hard_clip(),
            accept_floor: default_accept_floor(),
            rerank: false,
            rerank_model: default_rerank_model(),
        }
    }
}

fn default_top_k() -> usize {
    12
}
fn default_rmax() -> usize {
    3
}
fn default_half_life_hours() -> f64 {
    168.0
}
fn default_alpha() -> f64 {
    0.7
}
fn default_beta() -> f64 {
    0.25
}
fn default_gamma() -> f64 {
    0.2
}
fn default_drop_knee() -> f64 {
    0.25
}
fn default_hard_clip() -> f64 {
    0.01
}
fn default_accept_floor() -> f64 {
    0.35
}
fn default_rerank_model() -> String {
    DEFAULT_RERANK_MODEL.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorStoreConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            host: None,
            namespace: default_namespace(),
            api_key_env: default_api_key_env(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_namespace() -> String {
    "history".to_string()
}
fn default_api_key_env() -> String {
    "CHATMEM_VECTOR_API_KEY".to_string()
}
fn default_batch_size() -> usize {
    96
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

impl VectorStoreConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl Config {
    pub fn chunk_params(&self) -> ChunkParams {
        ChunkParams {
            chunk_size: self.chunking.chunk_size,
            overlap: self.chunking.overlap,
            ts_gap_minutes: self.chunking.ts_gap_minutes,
        }
    }

    pub fn role_labels(&self) -> RoleLabels {
        RoleLabels {
            user: self.chunking.user_label.clone(),
            assistant: self.chunking.assistant_label.clone(),
        }
    }

    pub fn select_params(&self) -> SelectParams {
        let r = &self.retrieval;
        SelectParams {
            rmin: r.rmin,
            rmax: r.rmax,
            half_life_hours: r.half_life_hours,
            alpha: r.alpha,
            beta: r.beta,
            gamma: r.gamma,
            drop_knee: r.drop_knee,
            hard_clip: r.hard_clip,
            accept_floor: r.accept_floor,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.ts_gap_minutes < 0 {
        anyhow::bail!("chunking.ts_gap_minutes must be >= 0");
    }
    let (user, assistant) = (
        config.chunking.user_label.trim(),
        config.chunking.assistant_label.trim(),
    );
    if user.is_empty() || assistant.is_empty() {
        anyhow::bail!("chunking.user_label and chunking.assistant_label must not be empty");
    }
    if user == assistant {
        anyhow::bail!(
            "chunking.user_label and chunking.assistant_label must differ (both '{}')",
            user
        );
    }

    if config.dedup.max_hamming > 64 {
        anyhow::bail!("dedup.max_hamming must be <= 64");
    }

    // Validate retrieval
    let r = &config.retrieval;
    if r.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if r.rmax < 1 {
        anyhow::bail!("retrieval.rmax must be >= 1");
    }
    if r.rmin > r.rmax {
        anyhow::bail!("retrieval.rmin ({}) must be <= retrieval.rmax ({})", r.rmin, r.rmax);
    }
    if r.half_life_hours <= 0.0 {
        anyhow::bail!("retrieval.half_life_hours must be > 0");
    }
    if r.hard_clip < 0.0 {
        anyhow::bail!("retrieval.hard_clip must be >= 0");
    }

    // Validate vector store
    let vs = &config.vector_store;
    if vs.batch_size < 1 {
        anyhow::bail!("vector_store.batch_size must be >= 1");
    }
    match vs.provider.as_str() {
        "disabled" => {}
        "records" => {
            if vs.host.as_deref().map_or(true, |h| h.trim().is_empty()) {
                anyhow::bail!("vector_store.host must be specified when provider is 'records'");
            }
        }
        other => anyhow::bail!(
            "Unknown vector store provider: '{}'. Must be disabled or records.",
            other
        ),
    }

    Ok(())
}
