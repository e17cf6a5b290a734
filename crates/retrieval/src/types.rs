//! Retrieval pipeline type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Language of a document or query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Language {
    Chinese,
    English,
    Other(String),
}

impl Language {
    /// Language code used on the wire (translation targets, corpus records).
    pub fn code(&self) -> &str {
        match self {
            Language::Chinese => "zh",
            Language::English => "en",
            Language::Other(code) => code,
        }
    }

    /// Script-based guess. Kana means Japanese and Hangul means Korean, then
    /// Han characters mean Chinese. Everything else falls back to English,
    /// so callers should prefer a language reported by a translation provider.
    pub fn detect(text: &str) -> Language {
        let is_kana = |c: char| matches!(c as u32, 0x3040..=0x30FF | 0x31F0..=0x31FF);
        let is_hangul = |c: char| {
            matches!(c as u32, 0x1100..=0x11FF | 0x3130..=0x318F | 0xAC00..=0xD7AF)
        };
        let is_han = |c: char| {
            matches!(c as u32,
                0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xF900..=0xFAFF | 0x20000..=0x2A6DF)
        };

        if text.chars().any(is_kana) {
            Language::Other("ja".to_string())
        } else if text.chars().any(is_hangul) {
            Language::Other("ko".to_string())
        } else if text.chars().any(is_han) {
            Language::Chinese
        } else {
            Language::English
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        if normalized.is_empty() {
            return Err("language code cannot be empty".to_string());
        }
        Ok(match normalized.as_str() {
            "zh" | "zh-tw" | "zh-cn" | "zh-hant" | "zh-hans" | "cn" | "chinese" => {
                Language::Chinese
            }
            "en" | "en-us" | "en-gb" | "english" => Language::English,
            _ => Language::Other(normalized),
        })
    }
}

impl TryFrom<String> for Language {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Language> for String {
    fn from(language: Language) -> Self {
        language.code().to_string()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Fixed-length vector representation of a text.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f64>);

impl Embedding {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn dimensions(&self) -> usize {
        self.0.len()
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn into_values(self) -> Vec<f64> {
        self.0
    }

    /// Euclidean norm.
    pub fn norm(&self) -> f64 {
        crate::similarity::norm(&self.0)
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|v| *v == 0.0)
    }
}

impl From<Vec<f64>> for Embedding {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self(values.into_iter().map(f64::from).collect())
    }
}

/// A corpus document. Immutable once imported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier derived from the source URL
    pub id: String,
    pub title: String,
    pub url: String,
    /// Raw text or HTML body
    pub content: String,
    pub embedding: Embedding,
    pub source_language: Language,
}

/// A query turned into a vector. Request-scoped.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryVector {
    pub text: String,
    pub language: Language,
    pub embedding: Embedding,
}

/// Where a candidate's score came from. Scores of different kinds are not
/// comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreKind {
    /// Cosine similarity in `[-1, 1]`
    Cosine,
    /// Raw distance reported by a nearest-neighbor index
    IndexDistance,
}

/// One retriever hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub document_id: String,
    pub similarity_score: f64,
    pub origin_language: Language,
    pub score_kind: ScoreKind,
}

/// Which retrieval pass first produced a merged candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalPass {
    Primary,
    Secondary,
}

/// A deduplicated candidate after cross-lingual merging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedCandidate {
    pub document_id: String,
    /// Highest score seen for this document (normalized under the
    /// `normalized` merge policy)
    pub score: f64,
    /// Every language whose pass returned this document, in pass order
    pub origin_languages: Vec<Language>,
    pub pass: RetrievalPass,
}

/// One document section of a context block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub document_id: String,
    pub title: String,
    pub url: String,
    pub content: String,
    /// Whether `content` was cut to fit the budget
    pub truncated: bool,
}

/// The rendered, bounded context handed to the generator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContextBlock {
    pub entries: Vec<ContextEntry>,
    pub text: String,
}

impl ContextBlock {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Size of the rendered text in Unicode scalar values.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}
