//! Source descriptors and loaders for local directories and GitHub repositories.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine as _;
use serde::Deserialize;

use crate::error::{IndexError, LoadError};

/// Directory names never descended into or loaded from.
pub const IGNORED_SEGMENTS: &[&str] = &[
    "node_modules",
    ".git",
    "dist",
    "build",
    "coverage",
    ".next",
    ".vscode",
    ".idea",
    "target",
    "bin",
    "obj",
    ".cache",
];

const TEXT_EXTENSIONS: &[&str] = &[
    "ts", "js", "tsx", "jsx", "py", "go", "rs", "java", "c", "cpp", "h", "hpp", "cc", "cs", "kt",
    "kts", "swift", "rb", "php", "md", "txt", "json", "yml", "yaml", "toml", "xml", "gradle",
    "html", "css", "scss", "less", "sh", "bash", "zsh", "sql", "graphql", "env", "gitignore",
    "dockerignore", "dockerfile", "mod", "sum",
];

const TEXT_FILENAMES: &[&str] = &["Makefile", "Dockerfile", "Gemfile", "Pipfile"];

/// Parsed form of a user-supplied source argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    GitHub { owner: String, repo: String },
    Local { root: PathBuf },
}

impl SourceDescriptor {
    /// Parse a GitHub URL or an existing local directory.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidInput`] for blank input, a GitHub URL
    /// without owner and repository, or a path that is not a directory.
    pub fn parse(input: &str) -> crate::Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(IndexError::InvalidInput("source is empty".into()));
        }

        if let Some(idx) = input.find("github.com/") {
            let rest = &input[idx + "github.com/".len()..];
            let rest = rest.split(['?', '#']).next().unwrap_or_default();
            let mut parts = rest.split('/').filter(|s| !s.is_empty());
            let owner = parts.next();
            let repo = parts.next().map(|r| r.strip_suffix(".git").unwrap_or(r));
            return match (owner, repo) {
                (Some(owner), Some(repo)) if !repo.is_empty() => Ok(Self::GitHub {
                    owner: owner.to_owned(),
                    repo: repo.to_owned(),
                }),
                _ => Err(IndexError::InvalidInput(format!(
                    "invalid GitHub URL: {input}"
                ))),
            };
        }

        let path = Path::new(input);
        if !path.is_dir() {
            return Err(IndexError::InvalidInput(format!(
                "not a GitHub URL or directory: {input}"
            )));
        }
        let root = std::fs::canonicalize(path)?;
        Ok(Self::Local { root })
    }

    /// Canonical corpus id for this source.
    #[must_use]
    pub fn corpus_id(&self) -> String {
        match self {
            Self::GitHub { owner, repo } => format!("github-{owner}-{repo}"),
            Self::Local { root } => {
                let hash = blake3::hash(root.to_string_lossy().as_bytes()).to_hex();
                format!("local-{}", &hash[..16])
            }
        }
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GitHub { owner, repo } => write!(f, "https://github.com/{owner}/{repo}"),
            Self::Local { root } => write!(f, "{}", root.display()),
        }
    }
}

/// One loaded text file, path relative to the source root with `/` separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

/// Everything a loader produced for one source.
#[derive(Debug, Clone, Default)]
pub struct LoadedSource {
    pub files: Vec<SourceFile>,
    pub readme: Option<String>,
    /// Text files dropped because they were too large or not valid UTF-8.
    pub skipped: usize,
}

/// Produces the text files of a source.
pub trait SourceLoader: Send + Sync {
    /// Load every text file of `source`.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read at all. Individual
    /// undecodable files are skipped, not reported as errors.
    fn load(
        &self,
        source: &SourceDescriptor,
    ) -> impl Future<Output = Result<LoadedSource, LoadError>> + Send;
}

/// Whether any path segment is an ignored directory name.
#[must_use]
pub fn is_ignored(rel_path: &str) -> bool {
    rel_path
        .split(['/', '\\'])
        .any(|seg| IGNORED_SEGMENTS.contains(&seg))
}

/// Whether a path looks like a text file worth indexing.
#[must_use]
pub fn is_text_file(rel_path: &str) -> bool {
    let filename = rel_path.rsplit(['/', '\\']).next().unwrap_or(rel_path);
    if TEXT_FILENAMES.contains(&filename) {
        return true;
    }
    let Some((_, ext)) = filename.rsplit_once('.') else {
        return false;
    };
    let ext = ext.to_ascii_lowercase();
    TEXT_EXTENSIONS.contains(&ext.as_str())
}

fn is_readme_name(filename: &str) -> bool {
    filename.to_ascii_lowercase().starts_with("readme")
}

/// Loads a local directory, honouring `.gitignore` and skipping hidden files.
#[derive(Debug, Clone)]
pub struct FsLoader {
    max_file_bytes: u64,
}

impl FsLoader {
    #[must_use]
    pub fn new(max_file_bytes: u64) -> Self {
        Self { max_file_bytes }
    }

    async fn load_dir(&self, root: &Path) -> Result<LoadedSource, LoadError> {
        if !tokio::fs::metadata(root).await.is_ok_and(|m| m.is_dir()) {
            return Err(LoadError::Unsupported(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        let walk_root = root.to_path_buf();
        let walked = tokio::task::spawn_blocking(move || walk_dir(&walk_root))
            .await
            .map_err(|e| LoadError::Io(std::io::Error::other(format!("directory walk failed: {e}"))))?;

        let loaded = self.read_walked(walked).await;
        tracing::info!(
            root = %root.display(),
            files = loaded.files.len(),
            skipped = loaded.skipped,
            "local source loaded"
        );
        Ok(loaded)
    }

    /// Read walked files; unreadable, oversized and non-UTF-8 files are skipped.
    async fn read_walked(&self, walked: Vec<WalkedFile>) -> LoadedSource {
        let mut loaded = LoadedSource::default();
        for file in walked {
            if file.size > self.max_file_bytes {
                tracing::debug!(file = %file.rel_path, size = file.size, "skipping oversized file");
                loaded.skipped += 1;
                continue;
            }

            let bytes = match tokio::fs::read(&file.path).await {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(file = %file.rel_path, "skipping unreadable file: {e}");
                    loaded.skipped += 1;
                    continue;
                }
            };
            let content = match String::from_utf8(bytes) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(file = %file.rel_path, "skipping undecodable file: {e}");
                    loaded.skipped += 1;
                    continue;
                }
            };

            if loaded.readme.is_none() && !file.rel_path.contains('/') && is_readme_name(&file.rel_path) {
                loaded.readme = Some(content.clone());
            }
            loaded.files.push(SourceFile {
                path: file.rel_path,
                content,
            });
        }
        loaded
    }
}

#[derive(Debug)]
struct WalkedFile {
    path: PathBuf,
    rel_path: String,
    size: u64,
}

/// Blocking walk of `root` in file-name order, keeping candidate text files only.
fn walk_dir(root: &Path) -> Vec<WalkedFile> {
    ignore::WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .require_git(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build()
        .flatten()
        .filter(|e| e.file_type().is_some_and(|ft| ft.is_file()))
        .filter_map(|entry| {
            let rel_path = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            if is_ignored(&rel_path) || !is_text_file(&rel_path) {
                return None;
            }
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            Some(WalkedFile {
                path: entry.into_path(),
                rel_path,
                size,
            })
        })
        .collect()
}

impl SourceLoader for FsLoader {
    async fn load(&self, source: &SourceDescriptor) -> Result<LoadedSource, LoadError> {
        match source {
            SourceDescriptor::Local { root } => self.load_dir(root).await,
            SourceDescriptor::GitHub { .. } => Err(LoadError::Unsupported(format!(
                "filesystem loader cannot load {source}"
            ))),
        }
    }
}

/// Loads a repository through the GitHub contents API.
#[derive(Clone)]
pub struct GithubLoader {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
    max_file_bytes: u64,
}

impl fmt::Debug for GithubLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubLoader")
            .field("api_url", &self.api_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("max_file_bytes", &self.max_file_bytes)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct ContentItem {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    download_url: Option<String>,
}

#[derive(Deserialize)]
struct ReadmeResponse {
    content: String,
}

impl GithubLoader {
    #[must_use]
    pub fn new(mut api_url: String, token: Option<String>, max_file_bytes: u64, timeout: Duration) -> Self {
        while api_url.ends_with('/') {
            api_url.pop();
        }
        Self {
            client: repolens_llm::http::default_client(timeout),
            api_url,
            token,
            max_file_bytes,
        }
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let req = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github.v3+json");
        match &self.token {
            Some(token) => req.header("Authorization", format!("Bearer {token}")),
            None => req,
        }
    }

    async fn list_dir(&self, owner: &str, repo: &str, path: &str) -> Result<Vec<ContentItem>, LoadError> {
        let url = format!("{}/repos/{owner}/{repo}/contents/{path}", self.api_url);
        let response = self.request(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status {
                url,
                status: status.as_u16(),
            });
        }
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn fetch_file(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        let response = self.request(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn fetch_readme(&self, owner: &str, repo: &str) -> Option<String> {
        let url = format!("{}/repos/{owner}/{repo}/readme", self.api_url);
        let response = self.request(&url).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        let body: ReadmeResponse = response.json().await.ok()?;
        decode_base64_text(&body.content).ok()
    }

    async fn load_repo(&self, owner: &str, repo: &str) -> Result<LoadedSource, LoadError> {
        let mut loaded = LoadedSource::default();
        let mut pending = vec![String::new()];

        while let Some(dir) = pending.pop() {
            let mut items = self.list_dir(owner, repo, &dir).await?;
            items.sort_by(|a, b| a.path.cmp(&b.path));
            // directories are pushed in reverse so they pop in path order
            for item in items.iter().rev().filter(|i| i.kind == "dir") {
                if !is_ignored(&item.path) {
                    pending.push(item.path.clone());
                }
            }

            for item in items.into_iter().filter(|i| i.kind == "file") {
                if is_ignored(&item.path) || !is_text_file(&item.path) {
                    continue;
                }
                if item.size > self.max_file_bytes {
                    loaded.skipped += 1;
                    continue;
                }
                let Some(url) = item.download_url.as_deref() else {
                    continue;
                };
                let bytes = match self.fetch_file(url).await {
                    Ok(b) => b,
                    Err(e) => {
                        tracing::warn!(file = %item.path, "skipping file that failed to download: {e}");
                        loaded.skipped += 1;
                        continue;
                    }
                };
                match String::from_utf8(bytes) {
                    Ok(content) => loaded.files.push(SourceFile {
                        path: item.path,
                        content,
                    }),
                    Err(e) => {
                        tracing::warn!(file = %item.path, "skipping undecodable file: {e}");
                        loaded.skipped += 1;
                    }
                }
            }
        }

        loaded.readme = self.fetch_readme(owner, repo).await;
        tracing::info!(
            owner,
            repo,
            files = loaded.files.len(),
            skipped = loaded.skipped,
            "GitHub source loaded"
        );
        Ok(loaded)
    }
}

impl SourceLoader for GithubLoader {
    async fn load(&self, source: &SourceDescriptor) -> Result<LoadedSource, LoadError> {
        match source {
            SourceDescriptor::GitHub { owner, repo } => self.load_repo(owner, repo).await,
            SourceDescriptor::Local { .. } => Err(LoadError::Unsupported(format!(
                "GitHub loader cannot load {source}"
            ))),
        }
    }
}

fn decode_base64_text(encoded: &str) -> Result<String, LoadError> {
    let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(cleaned)
        .map_err(|e| LoadError::Decode {
            path: "README".into(),
            reason: e.to_string(),
        })?;
    String::from_utf8(bytes).map_err(|e| LoadError::Decode {
        path: "README".into(),
        reason: e.to_string(),
    })
}

/// Dispatches to the filesystem or GitHub loader by descriptor variant.
#[derive(Debug, Clone)]
pub struct DefaultLoader {
    pub fs: FsLoader,
    pub github: GithubLoader,
}

impl SourceLoader for DefaultLoader {
    async fn load(&self, source: &SourceDescriptor) -> Result<LoadedSource, LoadError> {
        match source {
            SourceDescriptor::Local { .. } => self.fs.load(source).await,
            SourceDescriptor::GitHub { .. } => self.github.load(source).await,
        }
    }
}
