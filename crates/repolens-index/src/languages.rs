//! Language/technology table used by the relevance scorer and retrieval widening.

/// One row of the language table.
#[derive(Debug)]
pub struct LanguageProfile {
    /// Lower-case name as it appears in a query.
    pub name: &'static str,
    /// Path fragments that suggest a file belongs to this language.
    /// Every entry is matched as a plain substring of the lower-cased path.
    pub indicators: &'static [&'static str],
    /// Content fragments that suggest this language.
    pub keywords: &'static [&'static str],
    /// Score added per keyword present in a chunk.
    pub keyword_weight: f32,
}

impl LanguageProfile {
    /// Whether `path_lower` ends with one of this language's file extensions.
    ///
    /// Used for retrieval widening only; scoring goes through [`Self::indicator_hits`].
    #[must_use]
    pub fn has_extension(&self, path_lower: &str) -> bool {
        self.indicators
            .iter()
            .filter(|i| i.starts_with('.'))
            .any(|ext| path_lower.ends_with(ext))
    }

    /// Number of indicators found anywhere in `path_lower`.
    ///
    /// `.js` counts for `package.json` and `.h` for `index.html`.
    #[must_use]
    pub fn indicator_hits(&self, path_lower: &str) -> usize {
        self.indicators
            .iter()
            .filter(|i| path_lower.contains(*i))
            .count()
    }

    /// Number of keywords present in `content_lower`.
    #[must_use]
    pub fn keyword_hits(&self, content_lower: &str) -> usize {
        self.keywords
            .iter()
            .filter(|k| content_lower.contains(*k))
            .count()
    }
}

/// Keyword weight for Java, Python, Go and Rust.
pub const STRONG_KEYWORD_WEIGHT: f32 = 5.0;
/// Keyword weight for JavaScript and TypeScript, whose keywords are common elsewhere.
pub const WEAK_KEYWORD_WEIGHT: f32 = 3.0;
/// Languages without a keyword list.
pub const NO_KEYWORD_WEIGHT: f32 = 0.0;

const JS_KEYWORDS: &[&str] = &["function ", "const ", "let ", "var ", "export ", "import "];

pub const LANGUAGES: &[LanguageProfile] = &[
    LanguageProfile {
        name: "java",
        indicators: &[".java", "pom.xml", "build.gradle", "gradle.build", ".gradle"],
        keywords: &["public class", "package ", "import ", "public static void main"],
        keyword_weight: STRONG_KEYWORD_WEIGHT,
    },
    LanguageProfile {
        name: "javascript",
        indicators: &[".js", ".jsx", "package.json", "npm", "node"],
        keywords: JS_KEYWORDS,
        keyword_weight: WEAK_KEYWORD_WEIGHT,
    },
    LanguageProfile {
        name: "typescript",
        indicators: &[".ts", ".tsx", "tsconfig.json"],
        keywords: JS_KEYWORDS,
        keyword_weight: WEAK_KEYWORD_WEIGHT,
    },
    LanguageProfile {
        name: "python",
        indicators: &[".py", ".pyx", "requirements.txt", "setup.py", "pipfile"],
        keywords: &["def ", "class ", "import ", "from ", "if __name__"],
        keyword_weight: STRONG_KEYWORD_WEIGHT,
    },
    LanguageProfile {
        name: "csharp",
        indicators: &[".cs", ".csproj", ".sln", ".net"],
        keywords: &[],
        keyword_weight: NO_KEYWORD_WEIGHT,
    },
    LanguageProfile {
        name: "c++",
        indicators: &[".cpp", ".hpp", ".cc", ".cxx"],
        keywords: &[],
        keyword_weight: NO_KEYWORD_WEIGHT,
    },
    LanguageProfile {
        name: "c",
        indicators: &[".c", ".h"],
        keywords: &[],
        keyword_weight: NO_KEYWORD_WEIGHT,
    },
    LanguageProfile {
        name: "go",
        indicators: &[".go", "go.mod", "go.sum"],
        keywords: &["package ", "func ", "import (", ":= "],
        keyword_weight: STRONG_KEYWORD_WEIGHT,
    },
    LanguageProfile {
        name: "rust",
        indicators: &[".rs", "cargo.toml", "cargo.lock"],
        keywords: &["fn ", "let mut ", "impl ", "use crate::", "pub struct "],
        keyword_weight: STRONG_KEYWORD_WEIGHT,
    },
    LanguageProfile {
        name: "php",
        indicators: &[".php", "composer.json"],
        keywords: &[],
        keyword_weight: NO_KEYWORD_WEIGHT,
    },
    LanguageProfile {
        name: "ruby",
        indicators: &[".rb", "gemfile"],
        keywords: &[],
        keyword_weight: NO_KEYWORD_WEIGHT,
    },
    LanguageProfile {
        name: "swift",
        indicators: &[".swift"],
        keywords: &[],
        keyword_weight: NO_KEYWORD_WEIGHT,
    },
    LanguageProfile {
        name: "kotlin",
        indicators: &[".kt", ".kts"],
        keywords: &[],
        keyword_weight: NO_KEYWORD_WEIGHT,
    },
];

/// Build and dependency manifests that reveal a project's language.
pub const MANIFESTS: &[&str] = &[
    "pom.xml",
    "build.gradle",
    "package.json",
    "tsconfig.json",
    "requirements.txt",
    "cargo.toml",
    "go.mod",
];

/// Languages whose name occurs anywhere in `query_lower`.
///
/// Plain substring match: `golang` finds Go, `javascript` also finds Java,
/// and any query containing the letter `c` finds C.
#[must_use]
pub fn languages_in_query(query_lower: &str) -> Vec<&'static LanguageProfile> {
    LANGUAGES
        .iter()
        .filter(|lang| query_lower.contains(lang.name))
        .collect()
}

/// Whether `path_lower` names a manifest.
#[must_use]
pub fn is_manifest(path_lower: &str) -> bool {
    MANIFESTS.iter().any(|m| path_lower.contains(m))
}

/// Whether `path_lower` looks like a README.
#[must_use]
pub fn is_readme(path_lower: &str) -> bool {
    path_lower.contains("readme")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(query: &str) -> Vec<&'static str> {
        languages_in_query(query).iter().map(|l| l.name).collect()
    }

    #[test]
    fn detects_names_as_substrings() {
        assert_eq!(names("is this written in go?"), vec!["go"]);
        assert_eq!(names("golang repo"), vec!["go"]);
        assert_eq!(names("java or python"), vec!["java", "python"]);
        assert!(names("any c++ here").contains(&"c++"));
    }

    #[test]
    fn substring_false_positives_are_kept() {
        assert_eq!(names("javascript"), vec!["java", "javascript", "c"]);
        assert_eq!(names("how does the code work"), vec!["c"]);
        assert!(names("what is this").is_empty());
    }

    #[test]
    fn indicators_match_anywhere_in_path() {
        let js = LANGUAGES.iter().find(|l| l.name == "javascript").unwrap();
        // ".js" inside ".json" plus "package.json"
        assert_eq!(js.indicator_hits("web/package.json"), 2);

        let c = LANGUAGES.iter().find(|l| l.name == "c").unwrap();
        assert_eq!(c.indicator_hits("index.html"), 1);
        assert!(c.has_extension("src/main.c"));
        assert!(!c.has_extension("index.html"));
    }

    #[test]
    fn go_mod_hits_go_indicators() {
        let go = LANGUAGES.iter().find(|l| l.name == "go").unwrap();
        assert_eq!(go.indicator_hits("go.mod"), 1);
        assert_eq!(go.indicator_hits("cmd/main.go"), 1);
    }

    #[test]
    fn keyword_hits_count_distinct_keywords() {
        let py = LANGUAGES.iter().find(|l| l.name == "python").unwrap();
        assert_eq!(py.keyword_hits("import os\ndef main():\n    pass"), 2);
    }

    #[test]
    fn manifest_and_readme() {
        assert!(is_manifest("cargo.toml"));
        assert!(is_manifest("web/package.json"));
        assert!(!is_manifest("src/lib.rs"));
        assert!(is_readme("docs/readme.md"));
    }
}
