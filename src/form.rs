//! Per-language form tree.
//!
//! The tree is what an editor binds its inputs to: for each language code, the
//! section-wide scalar fields and the array of repeated items. Serialized it
//! looks like `{"en": {"items": [{"title": "..", "url": ".."}]}, "ar": {...}}`.

use crate::error::FormError;
use crate::model::ElementTag;
use crate::schema::{SectionSchema, ValueType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Value of one form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Text(String),
}

impl FieldValue {
    /// Empty value for a field of the given type.
    pub fn empty(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Boolean => FieldValue::Flag(false),
            _ => FieldValue::Text(String::new()),
        }
    }

    /// Parse stored translation content into a form value.
    pub fn from_content(content: &str, value_type: ValueType) -> Self {
        match value_type {
            ValueType::Boolean => FieldValue::Flag(content.trim().eq_ignore_ascii_case("true")),
            _ => FieldValue::Text(content.to_string()),
        }
    }

    /// Render the value as translation content.
    pub fn to_content(&self) -> String {
        match self {
            FieldValue::Flag(flag) => flag.to_string(),
            FieldValue::Text(text) => text.clone(),
        }
    }

    /// Blank text counts as missing; flags are never blank.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Flag(_) => false,
            FieldValue::Text(text) => text.trim().is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            FieldValue::Flag(_) => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Flag(value)
    }
}

/// One repeated item: field id → value.
pub type Item = IndexMap<String, FieldValue>;

/// Form state of one language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageForm {
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub scalars: IndexMap<String, FieldValue>,
    #[serde(default)]
    pub items: Vec<Item>,
}

/// Location of a field inside a language.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    Item { index: usize, field: String },
    Scalar { field: String },
}

impl Slot {
    pub fn field(&self) -> &str {
        match self {
            Slot::Item { field, .. } | Slot::Scalar { field } => field,
        }
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            Slot::Item { index, .. } => Some(*index),
            Slot::Scalar { .. } => None,
        }
    }

    /// Structured element tag for this slot.
    pub fn tag(&self) -> ElementTag {
        match self {
            Slot::Item { index, field } => ElementTag::item(*index, field),
            Slot::Scalar { field } => ElementTag::scalar(field),
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Item { index, field } => write!(f, "{}.{}", index, field),
            Slot::Scalar { field } => write!(f, "{}", field),
        }
    }
}

/// A field address: `"<lang>.<index>.<field>"` or `"<lang>.<field>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    pub language: String,
    pub slot: Slot,
}

impl FieldPath {
    pub fn item(language: &str, index: usize, field: &str) -> Self {
        Self {
            language: language.to_string(),
            slot: Slot::Item {
                index,
                field: field.to_string(),
            },
        }
    }

    pub fn scalar(language: &str, field: &str) -> Self {
        Self {
            language: language.to_string(),
            slot: Slot::Scalar {
                field: field.to_string(),
            },
        }
    }

    /// Same slot in another language.
    pub fn in_language(&self, language: &str) -> Self {
        Self {
            language: language.to_string(),
            slot: self.slot.clone(),
        }
    }
}

impl FromStr for FieldPath {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(FormError::InvalidPath(s.to_string()));
        }
        match parts.as_slice() {
            [language, field] => Ok(FieldPath::scalar(language, field)),
            [language, index, field] => {
                let index = index
                    .parse()
                    .map_err(|_| FormError::InvalidPath(s.to_string()))?;
                Ok(FieldPath::item(language, index, field))
            }
            _ => Err(FormError::InvalidPath(s.to_string())),
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.language, self.slot)
    }
}

/// The whole editor state: language code → language form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormTree {
    languages: IndexMap<String, LanguageForm>,
}

impl FormTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_language(&mut self, code: &str, form: LanguageForm) {
        self.languages.insert(code.to_string(), form);
    }

    pub fn language(&self, code: &str) -> Option<&LanguageForm> {
        self.languages.get(code)
    }

    pub fn language_mut(&mut self, code: &str) -> Option<&mut LanguageForm> {
        self.languages.get_mut(code)
    }

    pub fn languages(&self) -> impl Iterator<Item = (&str, &LanguageForm)> {
        self.languages.iter().map(|(code, form)| (code.as_str(), form))
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }

    /// Number of repeated items for `code` (0 when the language is absent).
    pub fn item_count(&self, code: &str) -> usize {
        self.languages.get(code).map(|f| f.items.len()).unwrap_or(0)
    }

    pub fn get(&self, path: &FieldPath) -> Option<&FieldValue> {
        let form = self.languages.get(&path.language)?;
        match &path.slot {
            Slot::Item { index, field } => form.items.get(*index)?.get(field),
            Slot::Scalar { field } => form.scalars.get(field),
        }
    }

    /// Write a single slot. The item must exist; the field need not.
    pub fn set(&mut self, path: &FieldPath, value: FieldValue) -> Result<(), FormError> {
        let form = self
            .languages
            .get_mut(&path.language)
            .ok_or_else(|| FormError::UnknownLanguage(path.language.clone()))?;
        match &path.slot {
            Slot::Item { index, field } => {
                let count = form.items.len();
                let item = form.items.get_mut(*index).ok_or_else(|| FormError::ItemOutOfRange {
                    language: path.language.clone(),
                    index: *index,
                    count,
                })?;
                item.insert(field.clone(), value);
            }
            Slot::Scalar { field } => {
                form.scalars.insert(field.clone(), value);
            }
        }
        Ok(())
    }

    /// Append one item to a single language only.
    ///
    /// This breaks the equal-count invariant on purpose; editors use
    /// [`FormTree::add_item`] instead.
    pub fn push_item(&mut self, code: &str, item: Item) -> Result<(), FormError> {
        let form = self
            .languages
            .get_mut(code)
            .ok_or_else(|| FormError::UnknownLanguage(code.to_string()))?;
        form.items.push(item);
        Ok(())
    }

    /// Append an empty item to every language and return its index.
    pub fn add_item(&mut self, schema: &SectionSchema) -> usize {
        let template: Item = schema
            .repeated_fields()
            .map(|field| (field.id.clone(), FieldValue::empty(field.value_type)))
            .collect();
        for form in self.languages.values_mut() {
            form.items.push(template.clone());
        }
        self.languages
            .values()
            .next()
            .map(|f| f.items.len().saturating_sub(1))
            .unwrap_or(0)
    }

    /// Remove the item at `index` from every language that has it.
    pub fn remove_item(&mut self, index: usize) -> Result<(), FormError> {
        if let Some((code, form)) = self.languages.iter().find(|(_, f)| index >= f.items.len()) {
            return Err(FormError::ItemOutOfRange {
                language: code.clone(),
                index,
                count: form.items.len(),
            });
        }
        for form in self.languages.values_mut() {
            form.items.remove(index);
        }
        Ok(())
    }
}
