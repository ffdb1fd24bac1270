//! In-memory content index keyed by corpus and chunk id.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

use crate::chunker::Chunk;
use crate::scorer::{QueryProfile, Scorer};

/// A chunk returned from a search, with its transient score.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub id: String,
    pub content: String,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub corpus_id: String,
    pub score: f32,
}

impl RetrievedChunk {
    #[must_use]
    pub fn from_chunk(chunk: &Chunk, score: f32) -> Self {
        Self {
            id: chunk.id.clone(),
            content: chunk.content.clone(),
            file_path: chunk.file_path.clone(),
            start_line: chunk.start_line,
            end_line: chunk.end_line,
            corpus_id: chunk.corpus_id.clone(),
            score,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    chunk: Chunk,
}

type Shard = HashMap<String, Entry>;

/// Chunks grouped by corpus. Search is a linear scan.
///
/// Each corpus lives behind its own `Arc`, so a [`CorpusSnapshot`] stays on
/// the generation it was taken from while writers publish new ones.
#[derive(Debug, Default)]
pub struct ContentIndex {
    shards: RwLock<HashMap<String, Arc<Shard>>>,
    next_seq: AtomicU64,
    scorer: Scorer,
}

impl ContentIndex {
    #[must_use]
    pub fn new(scorer: Scorer) -> Self {
        Self {
            shards: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
            scorer,
        }
    }

    fn seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Upsert chunks by id. An overwritten id keeps its original position.
    pub async fn insert(&self, chunks: Vec<Chunk>) {
        let mut shards = self.shards.write().await;
        for chunk in chunks {
            let shard = Arc::make_mut(shards.entry(chunk.corpus_id.clone()).or_default());
            upsert(shard, chunk, || self.seq());
        }
    }

    /// Atomically swap the whole chunk set of `corpus_id`.
    ///
    /// An empty `chunks` removes the corpus.
    pub async fn replace_corpus(&self, corpus_id: &str, chunks: Vec<Chunk>) {
        let mut shard = Shard::with_capacity(chunks.len());
        for mut chunk in chunks {
            chunk.corpus_id = corpus_id.to_owned();
            upsert(&mut shard, chunk, || self.seq());
        }

        let mut shards = self.shards.write().await;
        if shard.is_empty() {
            shards.remove(corpus_id);
        } else {
            shards.insert(corpus_id.to_owned(), Arc::new(shard));
        }
    }

    /// Rank chunks of every corpus against `query`.
    pub async fn search(&self, query: &str, limit: usize) -> Vec<RetrievedChunk> {
        let profile = QueryProfile::analyze(query);
        let shards = self.shards.read().await;
        rank(&self.scorer, &profile, shards.values().map(Arc::as_ref), limit)
    }

    /// Rank chunks of one corpus against `query`.
    pub async fn search_corpus(&self, corpus_id: &str, query: &str, limit: usize) -> Vec<RetrievedChunk> {
        let profile = QueryProfile::analyze(query);
        let shards = self.shards.read().await;
        rank(
            &self.scorer,
            &profile,
            shards.get(corpus_id).map(Arc::as_ref).into_iter(),
            limit,
        )
    }

    /// The current generation of `corpus_id`, or `None` when it holds no chunks.
    pub async fn snapshot(&self, corpus_id: &str) -> Option<CorpusSnapshot> {
        let shards = self.shards.read().await;
        shards
            .get(corpus_id)
            .filter(|s| !s.is_empty())
            .map(|shard| CorpusSnapshot {
                shard: Arc::clone(shard),
                scorer: self.scorer,
            })
    }

    /// All chunks of `corpus_id` in insertion order.
    pub async fn list_by_corpus(&self, corpus_id: &str) -> Vec<Chunk> {
        let shards = self.shards.read().await;
        shards
            .get(corpus_id)
            .map(|shard| in_order(shard).into_iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Remove every chunk of `corpus_id`. Returns the number removed.
    pub async fn delete_by_corpus(&self, corpus_id: &str) -> usize {
        self.shards
            .write()
            .await
            .remove(corpus_id)
            .map_or(0, |s| s.len())
    }

    /// Total number of indexed chunks.
    pub async fn len(&self) -> usize {
        self.shards.read().await.values().map(|s| s.len()).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of chunks in `corpus_id`; 0 when it was never ingested.
    pub async fn corpus_len(&self, corpus_id: &str) -> usize {
        self.shards.read().await.get(corpus_id).map_or(0, |s| s.len())
    }

    /// Ids of every non-empty corpus, sorted.
    pub async fn corpus_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.shards.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    #[must_use]
    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }
}

/// One corpus frozen at the moment [`ContentIndex::snapshot`] was called.
#[derive(Debug, Clone)]
pub struct CorpusSnapshot {
    shard: Arc<Shard>,
    scorer: Scorer,
}

impl CorpusSnapshot {
    #[must_use]
    pub fn len(&self) -> usize {
        self.shard.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shard.is_empty()
    }

    /// Rank this generation's chunks against an analyzed query.
    #[must_use]
    pub fn search(&self, profile: &QueryProfile, limit: usize) -> Vec<RetrievedChunk> {
        rank(&self.scorer, profile, std::iter::once(self.shard.as_ref()), limit)
    }

    /// Chunks in insertion order.
    #[must_use]
    pub fn chunks(&self) -> Vec<&Chunk> {
        in_order(&self.shard)
    }
}

fn rank<'a>(
    scorer: &Scorer,
    profile: &QueryProfile,
    shards: impl Iterator<Item = &'a Shard>,
    limit: usize,
) -> Vec<RetrievedChunk> {
    let mut scored: Vec<(f32, u64, &Chunk)> = shards
        .flat_map(HashMap::values)
        .filter_map(|e| {
            let score = scorer.score(profile, &e.chunk.file_path, &e.chunk.content);
            (score > 0.0).then_some((score, e.seq, &e.chunk))
        })
        .collect();

    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
    scored.truncate(limit);

    tracing::debug!(query_meta = profile.is_meta(), results = scored.len(), "index search");

    scored
        .into_iter()
        .map(|(score, _, chunk)| RetrievedChunk::from_chunk(chunk, score))
        .collect()
}

fn in_order(shard: &Shard) -> Vec<&Chunk> {
    let mut entries: Vec<&Entry> = shard.values().collect();
    entries.sort_by_key(|e| e.seq);
    entries.into_iter().map(|e| &e.chunk).collect()
}

fn upsert(shard: &mut Shard, chunk: Chunk, next_seq: impl FnOnce() -> u64) {
    if let Some(existing) = shard.get_mut(&chunk.id) {
        existing.chunk = chunk;
    } else {
        shard.insert(
            chunk.id.clone(),
            Entry {
                seq: next_seq(),
                chunk,
            },
        );
    }
}
