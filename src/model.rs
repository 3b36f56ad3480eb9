//! Backend data model: `SubSection → ContentElement → ContentTranslation`.
//!
//! These are the shapes the content API returns from the complete-by-slug
//! lookup. Field names follow the API's camelCase JSON.

use crate::i18n::Language;
use serde::{Deserialize, Serialize};

/// Storage type of a content element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Text,
    Image,
    Boolean,
}

/// Structured identity of an element: which item and which field it holds.
///
/// Elements written by this crate always carry the tag. Elements without one
/// are identified by decoding their name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementTag {
    /// `None` for section-wide (scalar) fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_index: Option<usize>,
    pub field_id: String,
}

impl ElementTag {
    pub fn item(index: usize, field_id: &str) -> Self {
        Self {
            item_index: Some(index),
            field_id: field_id.to_string(),
        }
    }

    pub fn scalar(field_id: &str) -> Self {
        Self {
            item_index: None,
            field_id: field_id.to_string(),
        }
    }
}

/// Language reference on a translation: either a bare id or the populated record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LanguageRef {
    Id(String),
    Embedded(Language),
}

impl LanguageRef {
    pub fn id(&self) -> &str {
        match self {
            LanguageRef::Id(id) => id,
            LanguageRef::Embedded(language) => &language.id,
        }
    }

    /// Whether this reference points at `language` (by id, or by code when embedded).
    pub fn matches(&self, language: &Language) -> bool {
        match self {
            LanguageRef::Id(id) => *id == language.id,
            LanguageRef::Embedded(embedded) => {
                embedded.id == language.id || embedded.language_id == language.language_id
            }
        }
    }
}

/// Language-specific value of one content element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentTranslation {
    #[serde(alias = "_id")]
    pub id: String,
    pub content: String,
    pub language: LanguageRef,
    #[serde(default)]
    pub content_element: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// A single named slot of a subsection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentElement {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub element_type: ElementType,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub parent: String,
    #[serde(default)]
    pub default_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ElementTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub translations: Vec<ContentTranslation>,
}

impl ContentElement {
    /// The active translation for `language`, if any.
    pub fn translation_for(&self, language: &Language) -> Option<&ContentTranslation> {
        self.translations
            .iter()
            .find(|t| t.is_active && t.language.matches(language))
    }

    /// Default content, treating an empty string as absent.
    pub fn default_content(&self) -> Option<&str> {
        self.default_content.as_deref().filter(|c| !c.is_empty())
    }
}

/// The backend aggregate for one editor instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubSection {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(alias = "name")]
    pub slug: String,
    #[serde(default, alias = "section")]
    pub parent_section_id: Option<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default, alias = "contentElements")]
    pub elements: Vec<ContentElement>,
}
