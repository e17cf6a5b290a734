//! Context assembly.
//!
//! Renders merged candidates into the block of text handed to the generator:
//!
//! ```text
//! Title: <title>
//! Source: <url>
//! Content:
//! <content>
//! ```
//!
//! Sections are separated by one blank line, in candidate order, and the
//! total stays within a character budget.

use crate::config::{ContextConfig, OverflowPolicy};
use crate::store::DocumentLookup;
use crate::types::{ContextBlock, ContextEntry, Document, MergedCandidate};
use lingua_core::AppResult;
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

const SECTION_SEPARATOR: &str = "\n\n";
const ELLIPSIS: char = '…';

#[derive(Debug, Clone, PartialEq)]
pub struct ContextAssembler {
    max_chars: Option<usize>,
    overflow: OverflowPolicy,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(&ContextConfig::default())
    }
}

impl ContextAssembler {
    pub fn new(config: &ContextConfig) -> Self {
        Self {
            max_chars: config.max_chars,
            overflow: config.overflow,
        }
    }

    /// No budget: every available document is included in full.
    pub fn unbounded() -> Self {
        Self {
            max_chars: None,
            overflow: OverflowPolicy::Truncate,
        }
    }

    /// Render `candidates` in order, skipping ids the lookup does not know.
    ///
    /// Deterministic: the same inputs always yield the same block.
    pub fn assemble(
        &self,
        candidates: &[MergedCandidate],
        lookup: &dyn DocumentLookup,
    ) -> AppResult<ContextBlock> {
        let mut entries = Vec::new();
        let mut text = String::new();
        let mut used = 0usize;

        for candidate in candidates {
            let Some(document) = lookup.lookup(&candidate.document_id)? else {
                debug!(
                    "Skipping candidate '{}': not in corpus",
                    candidate.document_id
                );
                continue;
            };

            let separator = if entries.is_empty() { "" } else { SECTION_SEPARATOR };
            let section = render_section(&document.title, &document.url, &document.content);
            let needed = separator.chars().count() + section.chars().count();

            let fits = self.max_chars.map_or(true, |max| used + needed <= max);
            if fits {
                text.push_str(separator);
                text.push_str(&section);
                used += needed;
                entries.push(entry(&document, document.content.clone(), false));
                continue;
            }

            // `fits` is only false when a budget is set.
            let max = self.max_chars.unwrap_or(usize::MAX);
            if self.overflow == OverflowPolicy::Truncate {
                let header = render_section(&document.title, &document.url, "");
                let fixed = separator.chars().count() + header.chars().count() + 1;
                if let Some(room) = max.checked_sub(used + fixed) {
                    let cut = cut_at_grapheme(&document.content, room);
                    if !cut.trim().is_empty() {
                        let content = format!("{}{}", cut, ELLIPSIS);
                        text.push_str(separator);
                        text.push_str(&header);
                        text.push_str(&content);
                        entries.push(entry(&document, content, true));
                    }
                }
            }

            debug!(
                "Context budget of {} chars reached at '{}' ({:?})",
                max, candidate.document_id, self.overflow
            );
            break;
        }

        Ok(ContextBlock {
            entries,
            text: text.trim().to_string(),
        })
    }
}

fn render_section(title: &str, url: &str, content: &str) -> String {
    format!("Title: {}\nSource: {}\nContent:\n{}", title, url, content)
}

fn entry(document: &Document, content: String, truncated: bool) -> ContextEntry {
    ContextEntry {
        document_id: document.id.clone(),
        title: document.title.clone(),
        url: document.url.clone(),
        content,
        truncated,
    }
}

/// Longest prefix of whole grapheme clusters holding at most `max_chars`
/// Unicode scalar values.
fn cut_at_grapheme(text: &str, max_chars: usize) -> &str {
    let mut chars = 0;
    let mut end = 0;
    for (offset, grapheme) in text.grapheme_indices(true) {
        let width = grapheme.chars().count();
        if chars + width > max_chars {
            break;
        }
        chars += width;
        end = offset + grapheme.len();
    }
    &text[..end]
}
