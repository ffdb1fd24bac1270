//! Question answering over ingested repositories: prompt composition, the
//! knowledge agent, configuration and secret resolution.

pub mod agent;
pub mod config;
pub mod context;
pub mod vault;

pub use agent::{AgentError, AgentResponse, KnowledgeAgent, SourceReference};
pub use config::Config;
