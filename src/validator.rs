//! Cross-language item count validation.
//!
//! Every active language must hold the same number of repeated items as the
//! primary language. The validator only reads the form; it never fixes it.

use crate::form::FormTree;
use crate::i18n::LanguageRegistry;
use crate::schema::SectionSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Item count of one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageCount {
    pub language: String,
    pub count: usize,
}

impl LanguageCount {
    pub fn new(language: &str, count: usize) -> Self {
        Self {
            language: language.to_string(),
            count,
        }
    }
}

/// Result of a count check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountReport {
    pub ok: bool,
    /// One entry per active language, primary first
    pub counts: Vec<LanguageCount>,
}

impl CountReport {
    /// Item count of the primary language.
    pub fn expected(&self) -> Option<usize> {
        self.counts.first().map(|c| c.count)
    }

    /// Languages whose count differs from the primary language.
    pub fn mismatches(&self) -> Vec<LanguageCount> {
        let Some(expected) = self.expected() else {
            return Vec::new();
        };
        self.counts
            .iter()
            .filter(|c| c.count != expected)
            .cloned()
            .collect()
    }
}

/// Validator for the equal-count invariant.
pub struct CountValidator;

impl CountValidator {
    /// Check that every active language has the primary language's item count.
    ///
    /// Scalar-only sections are always valid. Languages missing from the form
    /// count as zero items.
    pub fn validate(
        form: &FormTree,
        languages: &LanguageRegistry,
        schema: &SectionSchema,
    ) -> CountReport {
        let counts: Vec<LanguageCount> = languages
            .active()
            .iter()
            .map(|lang| LanguageCount::new(lang.code(), form.item_count(lang.code())))
            .collect();

        if !schema.has_repeated() {
            return CountReport { ok: true, counts };
        }

        let ok = match counts.first() {
            Some(primary) => counts.iter().all(|c| c.count == primary.count),
            None => true,
        };

        if !ok {
            warn!(
                "Item count mismatch across languages: {}",
                counts
                    .iter()
                    .map(|c| format!("{}={}", c.language, c.count))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        CountReport { ok, counts }
    }
}
