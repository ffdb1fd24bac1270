mod env;
mod types;


pub use types::*;

use std::path::Path;

use anyhow::{Context, bail};

use crate::vault::{Secret, VaultProvider};

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the resulting values fail [`Config::validate`].
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        // TOML has no null; an empty model name is how the file turns embedding off.
        if config
            .llm
            .embedding_model
            .as_deref()
            .is_some_and(|m| m.trim().is_empty())
        {
            config.llm.embedding_model = None;
        }
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make chunking or retrieval degenerate.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid field.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chunking.max_tokens == 0 {
            bail!("chunking.max_tokens must be greater than 0");
        }
        if self.chunking.overlap_tokens >= self.chunking.max_tokens {
            bail!(
                "chunking.overlap_tokens ({}) must be less than chunking.max_tokens ({})",
                self.chunking.overlap_tokens,
                self.chunking.max_tokens
            );
        }
        if self.retrieval.limit == 0 {
            bail!("retrieval.limit must be greater than 0");
        }
        if self.retrieval.embed_batch_size == 0 {
            bail!("retrieval.embed_batch_size must be greater than 0");
        }
        let w = &self.retrieval.weights;
        if w.path_indicator < 0.0 || w.manifest < 0.0 || w.readme < 0.0 {
            bail!("retrieval.weights must be non-negative");
        }
        if self.llm.base_url.trim().is_empty() {
            bail!("llm.base_url must not be empty");
        }
        Ok(())
    }

    /// Resolve API credentials through the vault.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault backend fails.
    pub async fn resolve_secrets(&mut self, vault: &dyn VaultProvider) -> anyhow::Result<()> {
        if let Some(val) = vault.get_secret("REPOLENS_OPENAI_API_KEY").await? {
            self.secrets.openai_api_key = Some(Secret::new(val));
        }
        if let Some(val) = vault.get_secret("REPOLENS_GITHUB_TOKEN").await? {
            self.secrets.github_token = Some(Secret::new(val));
        }
        Ok(())
    }
}
