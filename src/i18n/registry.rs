//! Language registry: the active language set of one editor.
//!
//! Built from the backend's language records and the subsection's language
//! ids. The first active language is the primary language: the authoritative
//! source for shared fields.

use crate::i18n::Language;

/// Ordered set of active languages for a section editor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageRegistry {
    languages: Vec<Language>,
}

impl LanguageRegistry {
    /// Build the registry from all known language records.
    ///
    /// Keeps records that are active and listed in `language_ids`, in record
    /// order. An empty `language_ids` yields an empty registry (a no-op editor).
    pub fn from_records(records: &[Language], language_ids: &[String]) -> Self {
        let languages = records
            .iter()
            .filter(|lang| lang.is_active && language_ids.iter().any(|id| *id == lang.id))
            .cloned()
            .collect();
        Self { languages }
    }

    /// Build the registry from records that are already filtered and ordered.
    pub fn new(languages: Vec<Language>) -> Self {
        Self {
            languages: languages.into_iter().filter(|lang| lang.is_active).collect(),
        }
    }

    /// All active languages, primary first.
    pub fn active(&self) -> &[Language] {
        &self.languages
    }

    /// The primary (first active) language.
    pub fn primary(&self) -> Option<&Language> {
        self.languages.first()
    }

    /// Active languages other than the primary.
    pub fn secondary(&self) -> impl Iterator<Item = &Language> {
        self.languages.iter().skip(1)
    }

    /// Get a language by its short code.
    pub fn get_by_code(&self, code: &str) -> Option<&Language> {
        self.languages.iter().find(|lang| lang.code() == code)
    }

    /// Get a language by its backend id.
    pub fn get_by_id(&self, id: &str) -> Option<&Language> {
        self.languages.iter().find(|lang| lang.id == id)
    }

    /// Check whether `code` is the primary language.
    pub fn is_primary(&self, code: &str) -> bool {
        self.primary().map(|lang| lang.code() == code).unwrap_or(false)
    }

    /// Backend ids of all active languages, primary first.
    pub fn ids(&self) -> Vec<String> {
        self.languages.iter().map(|lang| lang.id.clone()).collect()
    }

    /// Short codes of all active languages, primary first.
    pub fn codes(&self) -> Vec<&str> {
        self.languages.iter().map(|lang| lang.code()).collect()
    }

    pub fn len(&self) -> usize {
        self.languages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }
}
