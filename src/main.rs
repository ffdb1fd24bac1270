//! `repolens`: ask questions about a code repository.
//!
//! ```bash
//! repolens ingest https://github.com/owner/repo --summary
//! repolens ask ./some/checkout "what language is this written in?"
//! repolens chat https://github.com/owner/repo
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use repolens_core::config::Config;
use repolens_core::vault::{EnvVaultProvider, VaultProvider};
use repolens_core::{AgentResponse, KnowledgeAgent};
use repolens_index::{ContentIndex, DefaultLoader, FsLoader, GithubLoader, KnowledgeBackend, Scorer};
use repolens_llm::openai::OpenAiProvider;
use repolens_memory::{ConversationId, ConversationStore};

const DEFAULT_CONFIG_PATH: &str = "config/repolens.toml";

#[derive(Parser)]
#[command(name = "repolens", version, about = "Ask questions about a code repository")]
struct Cli {
    /// Path to the TOML configuration file.
    ///
    /// Falls back to `REPOLENS_CONFIG`, then `config/repolens.toml`. A missing
    /// file means built-in defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load, chunk and index a repository, then print what was indexed.
    Ingest {
        /// GitHub URL or local directory.
        source: String,
        /// Also ask the model for a short repository summary.
        #[arg(long)]
        summary: bool,
    },
    /// Ingest a repository and answer one question about it.
    Ask {
        source: String,
        question: String,
        /// Print the answer and sources as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Ingest a repository and answer questions read from stdin.
    Chat { source: String },
}

type Agent = KnowledgeAgent<DefaultLoader, OpenAiProvider>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());
    let mut config = Config::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let vault: Box<dyn VaultProvider> = Box::new(EnvVaultProvider);
    config.resolve_secrets(vault.as_ref()).await?;
    tracing::debug!(
        config = %config_path.display(),
        model = %config.llm.model,
        embeddings = config.llm.embedding_model.is_some(),
        "configuration loaded"
    );

    let agent = build_agent(&config)?;

    match cli.command {
        Command::Ingest { source, summary } => run_ingest(&agent, &source, summary).await,
        Command::Ask {
            source,
            question,
            json,
        } => run_ask(&agent, &source, &question, json).await,
        Command::Chat { source } => run_chat(&agent, &source).await,
    }
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config_path(flag: Option<&Path>) -> PathBuf {
    if let Some(path) = flag {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("REPOLENS_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

fn create_provider(config: &Config) -> anyhow::Result<OpenAiProvider> {
    let api_key = match &config.secrets.openai_api_key {
        Some(key) => key.expose().to_owned(),
        // Local OpenAI-compatible servers usually accept any key.
        None if !config.llm.base_url.contains("api.openai.com") => String::new(),
        None => bail!("REPOLENS_OPENAI_API_KEY is not set"),
    };
    let client = repolens_llm::http::default_client(Duration::from_secs(config.timeouts.llm_seconds));
    Ok(OpenAiProvider::new(
        api_key,
        config.llm.base_url.clone(),
        config.llm.model.clone(),
        config.llm.max_tokens,
        config.llm.embedding_model.clone(),
    )
    .with_temperature(config.llm.temperature)
    .with_client(client))
}

fn create_loader(config: &Config) -> DefaultLoader {
    let token = config
        .secrets
        .github_token
        .as_ref()
        .map(|t| t.expose().to_owned());
    DefaultLoader {
        fs: FsLoader::new(config.loader.max_file_bytes),
        github: GithubLoader::new(
            config.loader.github_api_url.clone(),
            token,
            config.loader.max_file_bytes,
            Duration::from_secs(config.timeouts.loader_seconds),
        ),
    }
}

fn build_agent(config: &Config) -> anyhow::Result<Agent> {
    let provider = Arc::new(create_provider(config)?);
    let index = Arc::new(ContentIndex::new(Scorer::new(config.retrieval.weights)));
    let backend = KnowledgeBackend::new(index, create_loader(config), Arc::clone(&provider))
        .with_chunker(config.chunking)
        .with_retrieval(config.retrieval.to_retrieval_config())
        .with_timeouts(config.timeouts.to_backend_timeouts());
    Ok(KnowledgeAgent::new(Arc::new(backend), Arc::new(ConversationStore::new()), provider)
        .with_history_window(config.retrieval.history_window)
        .with_llm_timeout(Duration::from_secs(config.timeouts.llm_seconds)))
}

async fn run_ingest(agent: &Agent, source: &str, summary: bool) -> anyhow::Result<()> {
    let report = agent.backend().ingest_with_report(source).await?;
    println!("corpus:  {}", report.corpus_id);
    println!(
        "files:   {} indexed, {} skipped",
        report.files_loaded, report.files_skipped
    );
    println!("chunks:  {}", report.chunks_created);
    println!("elapsed: {} ms", report.duration_ms);
    if summary {
        println!("\n{}", agent.summarize(&report).await);
    }
    Ok(())
}

async fn run_ask(agent: &Agent, source: &str, question: &str, json: bool) -> anyhow::Result<()> {
    let corpus_id = agent.backend().ingest(source).await?;
    let response = agent.ask(&corpus_id, None, question).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response);
    }
    Ok(())
}

async fn run_chat(agent: &Agent, source: &str) -> anyhow::Result<()> {
    let report = agent.backend().ingest_with_report(source).await?;
    println!(
        "Indexed {} ({} files, {} chunks).",
        report.corpus_id, report.files_loaded, report.chunks_created
    );
    println!("{}\n", agent.summarize(&report).await);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut conversation: Option<ConversationId> = None;
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }
        match agent.ask(&report.corpus_id, conversation.clone(), question).await {
            Ok(response) => {
                conversation = Some(response.conversation_id.clone());
                print_response(&response);
            }
            Err(e) => eprintln!("error: {e:#}"),
        }
    }
    Ok(())
}

fn print_response(response: &AgentResponse) {
    println!("{}", response.answer);
    if !response.sources.is_empty() {
        println!("\nSources:");
        for s in &response.sources {
            println!("  {}:{}-{}", s.file_path, s.start_line, s.end_line);
        }
    }
    println!();
}
