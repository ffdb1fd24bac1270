use serde::{Deserialize, Serialize};

use repolens_index::{ChunkerConfig, ScoringWeights};

use crate::vault::Secret;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub chunking: ChunkerConfig,
    #[serde(default)]
    pub retrieval: RetrievalSettings,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}

fn default_embedding_model() -> Option<String> {
    Some("text-embedding-3-small".into())
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.1
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// `None` disables embedding; chunks are indexed without vectors. An
    /// absent key means the default model, `embedding_model = ""` means `None`.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            embedding_model: default_embedding_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

fn default_limit() -> usize {
    5
}

fn default_meta_min_results() -> usize {
    3
}

fn default_widen_cap() -> usize {
    8
}

fn default_neutral_score() -> f32 {
    1.0
}

fn default_embed_batch_size() -> usize {
    64
}

fn default_history_window() -> usize {
    6
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RetrievalSettings {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_meta_min_results")]
    pub meta_min_results: usize,
    #[serde(default = "default_widen_cap")]
    pub widen_cap: usize,
    #[serde(default = "default_neutral_score")]
    pub neutral_score: f32,
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,
    /// Prior messages included in each prompt.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    #[serde(default)]
    pub weights: ScoringWeights,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            meta_min_results: default_meta_min_results(),
            widen_cap: default_widen_cap(),
            neutral_score: default_neutral_score(),
            embed_batch_size: default_embed_batch_size(),
            history_window: default_history_window(),
            weights: ScoringWeights::default(),
        }
    }
}

impl RetrievalSettings {
    #[must_use]
    pub fn to_retrieval_config(&self) -> repolens_index::RetrievalConfig {
        repolens_index::RetrievalConfig {
            limit: self.limit,
            meta_min_results: self.meta_min_results,
            widen_cap: self.widen_cap,
            neutral_score: self.neutral_score,
            embed_batch_size: self.embed_batch_size,
        }
    }
}

fn default_max_file_bytes() -> u64 {
    1024 * 1024
}

fn default_github_api_url() -> String {
    "https://api.github.com".into()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LoaderConfig {
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: default_max_file_bytes(),
            github_api_url: default_github_api_url(),
        }
    }
}

fn default_llm_timeout() -> u64 {
    120
}

fn default_embedding_timeout() -> u64 {
    60
}

fn default_loader_timeout() -> u64 {
    300
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_llm_timeout")]
    pub llm_seconds: u64,
    #[serde(default = "default_embedding_timeout")]
    pub embedding_seconds: u64,
    #[serde(default = "default_loader_timeout")]
    pub loader_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            llm_seconds: default_llm_timeout(),
            embedding_seconds: default_embedding_timeout(),
            loader_seconds: default_loader_timeout(),
        }
    }
}

impl TimeoutConfig {
    #[must_use]
    pub fn to_backend_timeouts(self) -> repolens_index::BackendTimeouts {
        repolens_index::BackendTimeouts {
            loader: std::time::Duration::from_secs(self.loader_seconds),
            embedding: std::time::Duration::from_secs(self.embedding_seconds),
        }
    }
}

#[derive(Debug, Default)]
pub struct ResolvedSecrets {
    pub openai_api_key: Option<Secret>,
    pub github_token: Option<Secret>,
}
