//! Deterministic relevance scoring: lexical overlap plus language and file-type boosts.

use serde::{Deserialize, Serialize};

use crate::languages::{LanguageProfile, is_manifest, is_readme, languages_in_query};

/// Added per language indicator found in the file path.
pub const PATH_INDICATOR_WEIGHT: f32 = 10.0;
/// Added per manifest name in the path, meta queries only.
pub const MANIFEST_WEIGHT: f32 = 15.0;
/// Added for README paths, meta queries only.
pub const README_WEIGHT: f32 = 8.0;

/// Tunable boost weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Default: [`PATH_INDICATOR_WEIGHT`].
    pub path_indicator: f32,
    /// Default: [`MANIFEST_WEIGHT`].
    pub manifest: f32,
    /// Default: [`README_WEIGHT`].
    pub readme: f32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            path_indicator: PATH_INDICATOR_WEIGHT,
            manifest: MANIFEST_WEIGHT,
            readme: README_WEIGHT,
        }
    }
}

/// A query pre-processed once per search.
#[derive(Debug)]
pub struct QueryProfile {
    tokens: Vec<String>,
    languages: Vec<&'static LanguageProfile>,
    meta: bool,
}

impl QueryProfile {
    #[must_use]
    pub fn analyze(query: &str) -> Self {
        let lower = query.to_lowercase();
        let tokens = lower
            .split_whitespace()
            .filter(|t| t.chars().count() > 2)
            .map(str::to_owned)
            .collect();
        let languages = languages_in_query(&lower);
        let meta = lower.contains("language") || lower.contains("written in") || !languages.is_empty();
        Self {
            tokens,
            languages,
            meta,
        }
    }

    /// Whether the query asks which language or technology is used.
    #[must_use]
    pub fn is_meta(&self) -> bool {
        self.meta
    }

    /// Languages the query names explicitly.
    #[must_use]
    pub fn languages(&self) -> &[&'static LanguageProfile] {
        &self.languages
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Scorer {
    weights: ScoringWeights,
}

impl Scorer {
    #[must_use]
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    #[must_use]
    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Score one chunk against an analyzed query. Always `>= 0`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn score(&self, query: &QueryProfile, file_path: &str, content: &str) -> f32 {
        let path = file_path.to_lowercase();
        let content = content.to_lowercase();

        let lexical: usize = query
            .tokens
            .iter()
            .map(|t| content.matches(t.as_str()).count())
            .sum();

        let mut language = 0.0f32;
        for lang in &query.languages {
            language += lang.indicator_hits(&path) as f32 * self.weights.path_indicator;
            language += lang.keyword_hits(&content) as f32 * lang.keyword_weight;
        }

        let mut file_type = 0.0f32;
        if query.meta {
            if is_manifest(&path) {
                file_type += crate::languages::MANIFESTS
                    .iter()
                    .filter(|m| path.contains(*m))
                    .count() as f32
                    * self.weights.manifest;
            }
            if is_readme(&path) {
                file_type += self.weights.readme;
            }
        }

        lexical as f32 + language + file_type
    }
}
