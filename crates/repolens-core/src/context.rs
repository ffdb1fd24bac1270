use std::fmt::Write;

use repolens_index::RetrievedChunk;
use repolens_llm::Message;
use repolens_memory::ChatMessage;

/// Marker used in place of the context block when retrieval found nothing.
pub const NO_CONTEXT: &str = "No relevant context found.";

/// History messages included in a prompt.
pub const MAX_HISTORY: usize = 6;

const SUMMARY_FILE_LIMIT: usize = 20;

const INSTRUCTIONS: &str = "\
You are an assistant that answers questions strictly from the repository context provided below.\n\
\n\
Guidelines:\n\
1. Answer only from the context below.\n\
2. If the context does not contain the answer, say clearly that you do not have enough information.\n\
3. When referring to code or files, cite the file path and line numbers.\n\
4. Be concise but complete.\n\
5. When explaining code, walk through it step by step.\n\
6. Do not assume or add information that is not in the context.\n\
7. For questions about programming languages, look at file extensions (.java, .py, .js, .go, .rs), \
build files (pom.xml, package.json, go.mod, Cargo.toml) and syntax to decide which languages are used.\n\
8. For questions about technologies, examine configuration files, dependencies and code patterns.";

const CLOSING: &str = "\
Only use the context above. File extensions, build manifests and syntax patterns are \
sufficient evidence to identify the languages a repository uses.";

/// Render retrieved chunks as numbered, line-addressed sources.
#[must_use]
pub fn format_context(chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return NO_CONTEXT.to_owned();
    }
    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i > 0 {
            out.push_str("\n---\n\n");
        }
        let _ = writeln!(
            out,
            "[Source {}: {}:{}-{}]\n{}",
            i + 1,
            chunk.file_path,
            chunk.start_line,
            chunk.end_line,
            chunk.content
        );
    }
    out
}

#[must_use]
pub fn build_system_prompt(context: &str) -> String {
    format!("{INSTRUCTIONS}\n\nContext:\n{context}\n\n{CLOSING}")
}

/// System prompt with context, then at most [`MAX_HISTORY`] prior messages,
/// then the question.
#[must_use]
pub fn compose_prompt(chunks: &[RetrievedChunk], history: &[ChatMessage], question: &str) -> Vec<Message> {
    let skip = history.len().saturating_sub(MAX_HISTORY);
    let mut messages = Vec::with_capacity(history.len() - skip + 2);
    messages.push(Message::system(build_system_prompt(&format_context(chunks))));
    messages.extend(history[skip..].iter().map(Message::from));
    messages.push(Message::user(question));
    messages
}

/// Prompt asking for a short repository summary.
#[must_use]
pub fn summary_prompt(readme: Option<&str>, file_paths: &[String]) -> String {
    let readme = readme
        .filter(|r| !r.trim().is_empty())
        .unwrap_or("No README available");
    let mut prompt = format!(
        "Based on the following repository information, write a concise 2-3 sentence summary.\n\n\
         README content:\n{readme}\n\nFile structure:\n"
    );
    for path in file_paths.iter().take(SUMMARY_FILE_LIMIT) {
        prompt.push_str(path);
        prompt.push('\n');
    }
    if file_paths.len() > SUMMARY_FILE_LIMIT {
        prompt.push_str("... and more files\n");
    }
    prompt.push_str("\nDescribe what this repository is about and its main purpose.");
    prompt
}
