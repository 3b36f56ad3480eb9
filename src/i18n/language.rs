//! Language record: the backend's description of one content language.
//!
//! Languages are read-only input to the sync engine. The form tree is keyed
//! by the short code (`languageID`), the backend by the record id.

use serde::{Deserialize, Serialize};

/// A content language as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Language {
    /// Backend record id (referenced by translations and subsections)
    #[serde(alias = "_id")]
    pub id: String,

    /// Short language code (e.g., "en", "ar")
    #[serde(rename = "languageID")]
    pub language_id: String,

    /// Whether the language is enabled for editing
    #[serde(default = "default_active")]
    pub is_active: bool,

    /// Whether the backend marks this as its default language
    #[serde(default)]
    pub is_default: bool,
}

fn default_active() -> bool {
    true
}

impl Language {
    /// Create an active language record.
    ///
    /// # Example
    /// ```ignore
    /// let english = Language::new("lang-en", "en");
    /// ```
    pub fn new(id: &str, code: &str) -> Self {
        Self {
            id: id.to_string(),
            language_id: code.to_string(),
            is_active: true,
            is_default: false,
        }
    }

    /// Get the short language code used as the form tree key.
    pub fn code(&self) -> &str {
        &self.language_id
    }

    /// Mark the record as inactive.
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Mark the record as the backend default.
    pub fn default_language(mut self) -> Self {
        self.is_default = true;
        self
    }
}
