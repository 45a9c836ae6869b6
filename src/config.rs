//! TOML configuration with `.env` / environment overrides.
//!
//! Every section has defaults, so a missing config file yields a working
//! setup (apart from the API key). The loaded [`Config`] is built once at
//! startup and passed by reference into each component's constructor.
//!
//! ```toml
//! [store]
//! persist_dir = "rag_db"
//!
//! [chunking]
//! chunk_size = 500
//! chunk_overlap = 50
//!
//! [retrieval]
//! top_k = 5
//! similarity_threshold = 0.7
//! metric = "l2"
//!
//! [embedding]
//! model = "BAAI/bge-m3"   # or a menu key: "1", "2", "3"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

use tutor_rag_core::chat::GenerationParams;
use tutor_rag_core::chunk::{TextSplitter, DEFAULT_SEPARATORS};
use tutor_rag_core::embedding::Metric;
use tutor_rag_core::search::RetrievalParams;

/// Environment variables consulted for the API key, in order.
pub const API_KEY_VARS: &[&str] = &["SILICONFLOW_API_KEY", "RAG_API_KEY"];
/// Environment variable overriding `embedding.model`.
pub const MODEL_VAR: &str = "RAG_EMBEDDING_MODEL";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub partitions: PartitionsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    /// Resolved from the environment, never read from the file.
    #[serde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Directory holding `index.sqlite` and `loaded_documents.json`.
    #[serde(default = "default_persist_dir")]
    pub persist_dir: PathBuf,
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
    /// Where `<stem>_splits.txt` reports go.
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
    #[serde(default = "default_true")]
    pub split_reports: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            persist_dir: default_persist_dir(),
            export_dir: default_export_dir(),
            report_dir: default_report_dir(),
            split_reports: true,
        }
    }
}

impl StoreConfig {
    pub fn index_path(&self) -> PathBuf {
        self.persist_dir.join("index.sqlite")
    }

    pub fn sources_path(&self) -> PathBuf {
        self.persist_dir.join("loaded_documents.json")
    }

    /// The split report directory, or `None` when reports are turned off.
    pub fn split_report_dir(&self) -> Option<&Path> {
        self.split_reports.then_some(self.report_dir.as_path())
    }
}

fn default_persist_dir() -> PathBuf {
    PathBuf::from("rag_db")
}
fn default_export_dir() -> PathBuf {
    PathBuf::from("exported_segments")
}
fn default_report_dir() -> PathBuf {
    PathBuf::from("splits")
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct PartitionsConfig {
    #[serde(default = "default_partitions_path")]
    pub path: PathBuf,
}

impl Default for PartitionsConfig {
    fn default() -> Self {
        Self {
            path: default_partitions_path(),
        }
    }
}

fn default_partitions_path() -> PathBuf {
    PathBuf::from("config/partitions.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_separators")]
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            separators: default_separators(),
        }
    }
}

impl ChunkingConfig {
    pub fn splitter(&self) -> Result<TextSplitter> {
        TextSplitter::with_separators(self.chunk_size, self.chunk_overlap, self.separators.clone())
    }
}

fn default_chunk_size() -> usize {
    500
}
fn default_chunk_overlap() -> usize {
    50
}
fn default_separators() -> Vec<String> {
    DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_metric")]
    pub metric: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            similarity_threshold: default_similarity_threshold(),
            metric: default_metric(),
        }
    }
}

impl RetrievalConfig {
    pub fn params(&self) -> Result<RetrievalParams> {
        Ok(RetrievalParams {
            top_k: self.top_k,
            similarity_threshold: self.similarity_threshold,
            metric: self.metric.parse::<Metric>()?,
        })
    }
}

fn default_top_k() -> usize {
    5
}
fn default_similarity_threshold() -> f32 {
    0.7
}
fn default_metric() -> String {
    "l2".to_string()
}

/// The short menu of supported embedding models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum EmbeddingModel {
    #[default]
    BgeLargeZh,
    BgeM3,
    M3eBase,
}

impl EmbeddingModel {
    pub const ALL: [EmbeddingModel; 3] = [
        EmbeddingModel::BgeLargeZh,
        EmbeddingModel::BgeM3,
        EmbeddingModel::M3eBase,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EmbeddingModel::BgeLargeZh => "BAAI/bge-large-zh-v1.5",
            EmbeddingModel::BgeM3 => "BAAI/bge-m3",
            EmbeddingModel::M3eBase => "moka-ai/m3e-base",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            EmbeddingModel::BgeLargeZh => "recommended, best quality",
            EmbeddingModel::BgeM3 => "multilingual",
            EmbeddingModel::M3eBase => "lightweight",
        }
    }

    /// The 1-based menu key (`"1"`, `"2"`, `"3"`).
    pub fn menu_key(&self) -> &'static str {
        match self {
            EmbeddingModel::BgeLargeZh => "1",
            EmbeddingModel::BgeM3 => "2",
            EmbeddingModel::M3eBase => "3",
        }
    }

    /// Resolve a menu key or a full model name.
    pub fn from_choice(choice: &str) -> Option<Self> {
        let choice = choice.trim();
        Self::ALL
            .into_iter()
            .find(|m| m.menu_key() == choice || m.name() == choice)
    }
}

impl fmt::Display for EmbeddingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<String> for EmbeddingModel {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        EmbeddingModel::from_choice(&value).ok_or_else(|| {
            format!(
                "unknown embedding model '{}'; expected one of: {}",
                value,
                EmbeddingModel::ALL
                    .iter()
                    .map(|m| m.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `siliconflow`, `openai`, or `disabled`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: EmbeddingModel,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: EmbeddingModel::default(),
            api_base: default_api_base(),
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "siliconflow".to_string()
}
fn default_api_base() -> String {
    "https://api.siliconflow.cn/v1".to_string()
}
fn default_batch_size() -> usize {
    32
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_chat_top_k")]
    pub top_k: u32,
    #[serde(default = "default_frequency_penalty")]
    pub frequency_penalty: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Keep only context sentences that mention a query term. Off by default,
    /// so whole segments are sent as context.
    #[serde(default)]
    pub focus_sentences: bool,
    #[serde(default = "default_out_of_scope_reply")]
    pub out_of_scope_reply: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_chat_model(),
            api_base: default_api_base(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_chat_top_k(),
            frequency_penalty: default_frequency_penalty(),
            timeout_secs: default_timeout_secs(),
            focus_sentences: false,
            out_of_scope_reply: default_out_of_scope_reply(),
        }
    }
}

impl ChatConfig {
    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            top_k: self.top_k,
            frequency_penalty: self.frequency_penalty,
        }
    }
}

fn default_chat_model() -> String {
    "Qwen/Qwen2.5-7B-Instruct".to_string()
}
fn default_max_tokens() -> u32 {
    512
}
fn default_temperature() -> f32 {
    0.7
}
fn default_top_p() -> f32 {
    0.7
}
fn default_chat_top_k() -> u32 {
    50
}
fn default_frequency_penalty() -> f32 {
    0.5
}
fn default_out_of_scope_reply() -> String {
    "Sorry, that is outside the scope of the knowledge base.".to_string()
}

/// Parse and validate config text without consulting the environment.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load the config file (defaults when it does not exist), then apply
/// environment overrides and validate.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    apply_env(&mut config)?;
    validate(&config)?;
    Ok(config)
}

fn apply_env(config: &mut Config) -> Result<()> {
    config.api_key = API_KEY_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|v| !v.trim().is_empty());

    if let Ok(model) = std::env::var(MODEL_VAR) {
        config.embedding.model = EmbeddingModel::try_from(model).map_err(anyhow::Error::msg)?;
    }
    Ok(())
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        bail!("chunking.chunk_overlap must be smaller than chunking.chunk_size");
    }

    if config.retrieval.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }
    if !(config.retrieval.similarity_threshold > 0.0) {
        bail!("retrieval.similarity_threshold must be > 0");
    }
    config.retrieval.metric.parse::<Metric>()?;

    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    for (section, provider) in [
        ("embedding", config.embedding.provider.as_str()),
        ("chat", config.chat.provider.as_str()),
    ] {
        match provider {
            "disabled" | "siliconflow" | "openai" => {}
            other => bail!(
                "Unknown {} provider: '{}'. Must be disabled, siliconflow, or openai.",
                section,
                other
            ),
        }
    }

    Ok(())
}
