use super::Config;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_llm();
        self.apply_env_overrides_pipeline();
    }

    fn apply_env_overrides_llm(&mut self) {
        if let Ok(v) = std::env::var("REPOLENS_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("REPOLENS_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("REPOLENS_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = if v.trim().is_empty() { None } else { Some(v) };
        }
        if let Ok(v) = std::env::var("REPOLENS_LLM_MAX_TOKENS")
            && let Ok(n) = v.parse::<u32>()
        {
            self.llm.max_tokens = n;
        }
        if let Ok(v) = std::env::var("REPOLENS_LLM_TEMPERATURE")
            && let Ok(t) = v.parse::<f32>()
        {
            self.llm.temperature = t;
        }
        if let Ok(v) = std::env::var("REPOLENS_TIMEOUT_LLM")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.timeouts.llm_seconds = secs;
        }
        if let Ok(v) = std::env::var("REPOLENS_TIMEOUT_EMBEDDING")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.timeouts.embedding_seconds = secs;
        }
    }

    fn apply_env_overrides_pipeline(&mut self) {
        if let Ok(v) = std::env::var("REPOLENS_CHUNK_MAX_TOKENS")
            && let Ok(n) = v.parse::<usize>()
        {
            self.chunking.max_tokens = n;
        }
        if let Ok(v) = std::env::var("REPOLENS_CHUNK_OVERLAP_TOKENS")
            && let Ok(n) = v.parse::<usize>()
        {
            self.chunking.overlap_tokens = n;
        }
        if let Ok(v) = std::env::var("REPOLENS_RETRIEVAL_LIMIT")
            && let Ok(n) = v.parse::<usize>()
        {
            self.retrieval.limit = n;
        }
        if let Ok(v) = std::env::var("REPOLENS_HISTORY_WINDOW")
            && let Ok(n) = v.parse::<usize>()
        {
            self.retrieval.history_window = n;
        }
        if let Ok(v) = std::env::var("REPOLENS_EMBED_BATCH_SIZE")
            && let Ok(n) = v.parse::<usize>()
        {
            self.retrieval.embed_batch_size = n;
        }
        if let Ok(v) = std::env::var("REPOLENS_LOADER_MAX_FILE_BYTES")
            && let Ok(n) = v.parse::<u64>()
        {
            self.loader.max_file_bytes = n;
        }
        if let Ok(v) = std::env::var("REPOLENS_GITHUB_API_URL") {
            self.loader.github_api_url = v;
        }
        if let Ok(v) = std::env::var("REPOLENS_TIMEOUT_LOADER")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.timeouts.loader_seconds = secs;
        }
    }
}
