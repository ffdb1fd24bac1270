mod error;

pub use error::AgentError;

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use repolens_index::{IngestReport, KnowledgeBackend, RetrievedChunk, SourceLoader};
use repolens_llm::{LlmError, LlmProvider, Message};
use repolens_memory::{ChatMessage, ConversationId, ConversationStore};

use crate::context::{MAX_HISTORY, compose_prompt, summary_prompt};

/// Answer recorded when the completion service returns nothing.
pub const EMPTY_ANSWER: &str = "I apologize, but I could not generate a response.";

pub const SUMMARY_FALLBACK: &str = "Repository summary generation failed";

const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(120);

/// A file region cited by an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReference {
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
}

impl From<&RetrievedChunk> for SourceReference {
    fn from(chunk: &RetrievedChunk) -> Self {
        Self {
            file_path: chunk.file_path.clone(),
            start_line: chunk.start_line,
            end_line: chunk.end_line,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentResponse {
    pub conversation_id: ConversationId,
    pub answer: String,
    pub sources: Vec<SourceReference>,
}

/// Runs question/answer turns against one backend and one conversation store.
pub struct KnowledgeAgent<L: SourceLoader, P: LlmProvider> {
    backend: Arc<KnowledgeBackend<L, P>>,
    conversations: Arc<ConversationStore>,
    provider: Arc<P>,
    history_window: usize,
    llm_timeout: Duration,
}

impl<L: SourceLoader, P: LlmProvider> KnowledgeAgent<L, P> {
    #[must_use]
    pub fn new(
        backend: Arc<KnowledgeBackend<L, P>>,
        conversations: Arc<ConversationStore>,
        provider: Arc<P>,
    ) -> Self {
        Self {
            backend,
            conversations,
            provider,
            history_window: MAX_HISTORY,
            llm_timeout: DEFAULT_LLM_TIMEOUT,
        }
    }

    /// Prior messages fed into each prompt, capped at [`MAX_HISTORY`].
    #[must_use]
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window.min(MAX_HISTORY);
        self
    }

    #[must_use]
    pub fn with_llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    #[must_use]
    pub fn backend(&self) -> &Arc<KnowledgeBackend<L, P>> {
        &self.backend
    }

    #[must_use]
    pub fn conversations(&self) -> &Arc<ConversationStore> {
        &self.conversations
    }

    /// Answer `question` about `corpus_id`, continuing `conversation_id` or
    /// starting a new conversation.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a blank question, `Memory` for an unknown
    /// conversation id, `CorpusMismatch` when that conversation belongs to
    /// another corpus, `Retrieval` when the index rejects the query, and
    /// `Llm` or `Timeout` when the completion call fails. The user message
    /// stays recorded when the completion fails.
    pub async fn ask(
        &self,
        corpus_id: &str,
        conversation_id: Option<ConversationId>,
        question: &str,
    ) -> Result<AgentResponse, AgentError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AgentError::InvalidInput("question must not be empty".into()));
        }
        let start = Instant::now();

        let conversation_id = match conversation_id {
            Some(id) => {
                let conversation = self.conversations.get(&id).await?;
                if conversation.corpus_id != corpus_id {
                    return Err(AgentError::CorpusMismatch {
                        conversation_id: conversation.id,
                        expected: conversation.corpus_id,
                        requested: corpus_id.to_owned(),
                    });
                }
                conversation.id
            }
            None => self.conversations.create(corpus_id).await.id,
        };

        let history = self
            .conversations
            .append_with_history(&conversation_id, ChatMessage::user(question), self.history_window)
            .await?;

        let chunks = self
            .backend
            .retrieve(corpus_id, question)
            .await
            .map_err(AgentError::Retrieval)?;
        tracing::debug!(
            corpus_id = %corpus_id,
            conversation_id = %conversation_id,
            history = history.len(),
            results = chunks.len(),
            "composing prompt"
        );

        let messages = compose_prompt(&chunks, &history, question);
        let answer = match self.complete(&messages).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) | Err(AgentError::Llm(LlmError::EmptyResponse { .. })) => EMPTY_ANSWER.to_owned(),
            Err(e) => {
                tracing::warn!(conversation_id = %conversation_id, "completion failed: {e:#}");
                return Err(e);
            }
        };

        self.conversations
            .append(&conversation_id, ChatMessage::assistant(answer.clone()))
            .await?;

        tracing::info!(
            corpus_id = %corpus_id,
            conversation_id = %conversation_id,
            sources = chunks.len(),
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "question answered"
        );

        Ok(AgentResponse {
            conversation_id,
            answer,
            sources: chunks.iter().map(SourceReference::from).collect(),
        })
    }

    /// Short description of an ingested repository. Never fails; a failed
    /// completion yields [`SUMMARY_FALLBACK`].
    pub async fn summarize(&self, report: &IngestReport) -> String {
        let prompt = summary_prompt(report.readme.as_deref(), &report.file_paths);
        match self.complete(&[Message::user(prompt)]).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_owned(),
            Ok(_) => {
                tracing::warn!(corpus_id = %report.corpus_id, "summary completion was empty");
                SUMMARY_FALLBACK.to_owned()
            }
            Err(e) => {
                tracing::warn!(corpus_id = %report.corpus_id, "summary generation failed: {e:#}");
                SUMMARY_FALLBACK.to_owned()
            }
        }
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, AgentError> {
        tokio::time::timeout(self.llm_timeout, self.provider.chat(messages))
            .await
            .map_err(|_| AgentError::Timeout {
                secs: self.llm_timeout.as_secs(),
            })?
            .map_err(AgentError::from)
    }
}

#[cfg(test)]
mod tests {
    use repolens_index::{ContentIndex, FsLoader, IndexError};
    use repolens_llm::Role;
    use repolens_llm::mock::MockProvider;
    use repolens_memory::{ChatRole, MemoryError};

    use super::*;
    use crate::context::NO_CONTEXT;

    struct Fixture {
        _dir: tempfile::TempDir,
        agent: KnowledgeAgent<FsLoader, MockProvider>,
        provider: Arc<MockProvider>,
        corpus_id: String,
    }

    async fn fixture(provider: MockProvider) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("go.mod"), "module example.com/demo\n\ngo 1.22\n").unwrap();
        std::fs::write(
            dir.path().join("main.go"),
            "package main\n\nimport \"fmt\"\n\nfunc main() {\n\tfmt.Println(\"hi\")\n}\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("README.md"), "# Demo\n\nA tiny demo service.\n").unwrap();

        let provider = Arc::new(provider);
        let backend = Arc::new(KnowledgeBackend::new(
            Arc::new(ContentIndex::default()),
            FsLoader::new(1024 * 1024),
            Arc::clone(&provider),
        ));
        let corpus_id = backend
            .ingest(dir.path().to_str().unwrap())
            .await
            .unwrap();
        let agent = KnowledgeAgent::new(backend, Arc::new(ConversationStore::new()), Arc::clone(&provider));
        Fixture {
            _dir: dir,
            agent,
            provider,
            corpus_id,
        }
    }

    #[tokio::test]
    async fn ask_answers_with_sources_and_records_turn() {
        let f = fixture(MockProvider::with_responses(vec!["It is written in Go.".into()])).await;
        let resp = f
            .agent
            .ask(&f.corpus_id, None, "what language is this written in?")
            .await
            .unwrap();

        assert_eq!(resp.answer, "It is written in Go.");
        assert!(!resp.sources.is_empty());
        assert!(
            resp.sources
                .iter()
                .any(|s| s.file_path == "go.mod" || s.file_path == "main.go")
        );

        let conv = f.agent.conversations().get(&resp.conversation_id).await.unwrap();
        assert_eq!(conv.corpus_id, f.corpus_id);
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(conv.messages[0].role, ChatRole::User);
        assert_eq!(conv.messages[1].content, "It is written in Go.");

        let prompt = &f.provider.requests()[0];
        assert_eq!(prompt.len(), 2);
        assert_eq!(prompt[0].role, Role::System);
        assert!(prompt[0].content.contains("[Source 1: "));
        assert_eq!(prompt[1].content, "what language is this written in?");
    }

    #[tokio::test]
    async fn follow_up_includes_prior_turn_but_not_itself() {
        let f = fixture(MockProvider::with_responses(vec!["first".into(), "second".into()])).await;
        let first = f.agent.ask(&f.corpus_id, None, "what is this?").await.unwrap();
        let second = f
            .agent
            .ask(&f.corpus_id, Some(first.conversation_id.clone()), "and the entry point?")
            .await
            .unwrap();
        assert_eq!(second.conversation_id, first.conversation_id);
        assert_eq!(second.answer, "second");

        let prompt = &f.provider.requests()[1];
        assert_eq!(prompt.len(), 4);
        assert_eq!(prompt[1], Message::user("what is this?"));
        assert_eq!(prompt[2], Message::assistant("first"));
        assert_eq!(prompt[3], Message::user("and the entry point?"));
        assert_eq!(f.agent.conversations().len().await, 1);
    }

    #[tokio::test]
    async fn history_window_is_capped() {
        let f = fixture(MockProvider::default()).await;
        let agent = f.agent.with_history_window(2);
        let first = agent.ask(&f.corpus_id, None, "q1").await.unwrap();
        let id = first.conversation_id;
        agent.ask(&f.corpus_id, Some(id.clone()), "q2").await.unwrap();
        agent.ask(&f.corpus_id, Some(id), "q3").await.unwrap();

        let prompt = &f.provider.requests()[2];
        assert_eq!(prompt.len(), 4);
        assert_eq!(prompt[1], Message::user("q2"));
        assert_eq!(prompt[3], Message::user("q3"));
    }

    #[tokio::test]
    async fn blank_question_is_rejected_without_side_effects() {
        let f = fixture(MockProvider::default()).await;
        let err = f.agent.ask(&f.corpus_id, None, "   ").await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidInput(_)));
        assert!(f.agent.conversations().is_empty().await);
        assert!(f.provider.requests().is_empty());
    }

    #[tokio::test]
    async fn unknown_conversation_is_not_found() {
        let f = fixture(MockProvider::default()).await;
        let err = f
            .agent
            .ask(&f.corpus_id, Some(ConversationId::from("missing")), "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Memory(MemoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn conversation_from_another_corpus_is_rejected() {
        let f = fixture(MockProvider::default()).await;
        let conv = f.agent.conversations().create("github-other-repo").await;
        let err = f
            .agent
            .ask(&f.corpus_id, Some(conv.id.clone()), "hello?")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AgentError::CorpusMismatch { ref expected, ref requested, .. }
                if expected == "github-other-repo" && *requested == f.corpus_id
        ));
        assert!(f.agent.conversations().get(&conv.id).await.unwrap().messages.is_empty());
        assert!(f.provider.requests().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_turns_send_each_question_once() {
        let f = fixture(MockProvider::default().with_delay(10)).await;
        let conv = f.agent.conversations().create(&f.corpus_id).await;
        let (a, b) = tokio::join!(
            f.agent.ask(&f.corpus_id, Some(conv.id.clone()), "first question"),
            f.agent.ask(&f.corpus_id, Some(conv.id.clone()), "second question"),
        );
        a.unwrap();
        b.unwrap();

        for prompt in f.provider.requests() {
            let question = &prompt.last().unwrap().content;
            assert_eq!(prompt.iter().filter(|m| &m.content == question).count(), 1);
        }
        assert_eq!(f.agent.conversations().recent(&conv.id, 10).await.len(), 4);
    }

    #[tokio::test]
    async fn unknown_corpus_still_calls_completion_with_marker() {
        let f = fixture(MockProvider::default()).await;
        let resp = f.agent.ask("github-nobody-nothing", None, "anything?").await.unwrap();
        assert!(resp.sources.is_empty());
        assert_eq!(resp.answer, "mock response");
        assert!(f.provider.requests()[0][0].content.contains(NO_CONTEXT));
    }

    #[tokio::test]
    async fn empty_completion_uses_fallback_answer() {
        let f = fixture(MockProvider::with_responses(vec!["  ".into()])).await;
        let resp = f.agent.ask(&f.corpus_id, None, "hello?").await.unwrap();
        assert_eq!(resp.answer, EMPTY_ANSWER);
    }

    #[tokio::test]
    async fn completion_failure_keeps_user_message() {
        let f = fixture(MockProvider::default()).await;
        let failing = Arc::new(MockProvider::failing());
        let agent = KnowledgeAgent::new(
            Arc::clone(f.agent.backend()),
            Arc::clone(f.agent.conversations()),
            failing,
        );
        let conv = agent.conversations().create(&f.corpus_id).await;
        let err = agent
            .ask(&f.corpus_id, Some(conv.id.clone()), "hello?")
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Llm(_)));
        let messages = agent.conversations().get(&conv.id).await.unwrap().messages;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, ChatRole::User);
    }

    #[tokio::test]
    async fn completion_timeout() {
        let f = fixture(MockProvider::default()).await;
        let slow = Arc::new(MockProvider::default().with_delay(200));
        let agent = KnowledgeAgent::new(
            Arc::clone(f.agent.backend()),
            Arc::clone(f.agent.conversations()),
            slow,
        )
        .with_llm_timeout(Duration::from_millis(20));
        let err = agent.ask(&f.corpus_id, None, "hello?").await.unwrap_err();
        assert!(matches!(err, AgentError::Timeout { .. }));
    }

    #[tokio::test]
    async fn retrieval_error_is_surfaced() {
        let f = fixture(MockProvider::default()).await;
        let err = f.agent.backend().retrieve(&f.corpus_id, "  ").await.unwrap_err();
        assert!(matches!(err, IndexError::InvalidInput(_)));
        let wrapped = AgentError::Retrieval(err);
        assert_eq!(wrapped.to_string(), "retrieval failed");
        assert!(std::error::Error::source(&wrapped).is_some());
    }

    #[tokio::test]
    async fn summarize_uses_readme_and_paths() {
        let f = fixture(MockProvider::with_responses(vec![" A Go demo service. ".into()])).await;
        let report = IngestReport {
            corpus_id: f.corpus_id.clone(),
            file_paths: vec!["go.mod".into(), "main.go".into()],
            readme: Some("# Demo".into()),
            ..IngestReport::default()
        };
        assert_eq!(f.agent.summarize(&report).await, "A Go demo service.");
        let prompt = &f.provider.requests()[0][0].content;
        assert!(prompt.contains("# Demo"));
        assert!(prompt.contains("main.go"));
    }

    #[tokio::test]
    async fn summarize_falls_back_on_failure() {
        let f = fixture(MockProvider::default()).await;
        let agent = KnowledgeAgent::new(
            Arc::clone(f.agent.backend()),
            Arc::clone(f.agent.conversations()),
            Arc::new(MockProvider::failing()),
        );
        let summary = agent.summarize(&IngestReport::default()).await;
        assert_eq!(summary, SUMMARY_FALLBACK);
    }
}
