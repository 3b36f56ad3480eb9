//! Section schema, per-language validation rules and default form values.

use crate::form::{FieldValue, FormTree, LanguageForm, Slot};
use crate::i18n::{Language, LanguageRegistry};
use crate::model::ElementType;
use crate::naming::NamingCodec;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// What a field holds. Determines the element type and whether the field is
/// shared across languages by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    Text,
    Url,
    /// Link-type selectors and other enumerations
    Select,
    Boolean,
    Image,
}

impl ValueType {
    pub fn element_type(self) -> ElementType {
        match self {
            ValueType::Boolean => ElementType::Boolean,
            ValueType::Image => ElementType::Image,
            ValueType::Text | ValueType::Url | ValueType::Select => ElementType::Text,
        }
    }

    pub fn shared_by_default(self) -> bool {
        !matches!(self, ValueType::Text)
    }
}

/// Default content of a freshly created image element, until the first upload.
pub const IMAGE_PLACEHOLDER: &str = "image-placeholder";

/// Whether a field lives once per section or once per repeated item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Scalar,
    #[default]
    Repeated,
}

/// Declaration of one editor field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub id: String,
    /// Display name used in element names; defaults to the capitalized id
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub kind: FieldKind,
    #[serde(default)]
    pub value_type: ValueType,
    /// Overrides the value type's default sharing
    #[serde(default)]
    pub shared: Option<bool>,
    /// Other display names found in stored element names
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl FieldSpec {
    pub fn new(id: &str, value_type: ValueType) -> Self {
        Self {
            id: id.to_string(),
            label: None,
            required: false,
            kind: FieldKind::Repeated,
            value_type,
            shared: None,
            aliases: Vec::new(),
        }
    }

    pub fn text(id: &str) -> Self {
        Self::new(id, ValueType::Text)
    }

    pub fn url(id: &str) -> Self {
        Self::new(id, ValueType::Url)
    }

    pub fn select(id: &str) -> Self {
        Self::new(id, ValueType::Select)
    }

    pub fn boolean(id: &str) -> Self {
        Self::new(id, ValueType::Boolean)
    }

    pub fn image(id: &str) -> Self {
        Self::new(id, ValueType::Image)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn scalar(mut self) -> Self {
        self.kind = FieldKind::Scalar;
        self
    }

    pub fn shared(mut self, shared: bool) -> Self {
        self.shared = Some(shared);
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    /// Display name, e.g. `"Url"` for id `"url"`.
    pub fn label(&self) -> String {
        if let Some(label) = &self.label {
            return label.clone();
        }
        let mut chars = self.id.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    pub fn is_shared(&self) -> bool {
        self.shared.unwrap_or_else(|| self.value_type.shared_by_default())
    }

    pub fn is_scalar(&self) -> bool {
        self.kind == FieldKind::Scalar
    }

    /// `defaultContent` of a newly created element for this field.
    pub fn default_content(&self) -> &'static str {
        match self.value_type {
            ValueType::Boolean => "false",
            ValueType::Image => IMAGE_PLACEHOLDER,
            ValueType::Text | ValueType::Url | ValueType::Select => "",
        }
    }

    /// Whether a decoded field name refers to this field.
    pub fn matches_name(&self, name: &str) -> bool {
        let name = name.trim();
        name.eq_ignore_ascii_case(&self.label())
            || name.eq_ignore_ascii_case(&self.id)
            || self.aliases.iter().any(|alias| alias == name)
    }
}

/// Field layout of one section editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionSchema {
    /// Item label used in element names ("Item", "Hero", "Footer Block", ...)
    pub item_label: String,
    pub fields: Vec<FieldSpec>,
}

impl SectionSchema {
    pub fn new(item_label: &str, fields: Vec<FieldSpec>) -> Self {
        Self {
            item_label: item_label.to_string(),
            fields,
        }
    }

    /// Codec for this schema's item label with the default legacy patterns.
    pub fn codec(&self) -> NamingCodec {
        NamingCodec::new(&self.item_label)
    }

    pub fn field(&self, id: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.id == id)
    }

    pub fn repeated_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| !f.is_scalar())
    }

    pub fn scalar_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.is_scalar())
    }

    pub fn fields_per_item(&self) -> usize {
        self.repeated_fields().count()
    }

    pub fn scalar_count(&self) -> usize {
        self.scalar_fields().count()
    }

    pub fn has_repeated(&self) -> bool {
        self.fields_per_item() > 0
    }

    /// Repeated field referred to by a decoded element name.
    pub fn repeated_field_for_name(&self, name: &str) -> Option<&FieldSpec> {
        self.repeated_fields().find(|f| f.matches_name(name))
    }

    /// Scalar field whose element is stored under exactly `name`.
    pub fn scalar_field_for_name(&self, name: &str) -> Option<&FieldSpec> {
        self.scalar_fields().find(|f| f.matches_name(name))
    }

    /// Field declaration behind a form slot, checking the slot kind.
    pub fn field_for_slot(&self, slot: &Slot) -> Option<&FieldSpec> {
        let field = self.field(slot.field())?;
        match slot {
            Slot::Item { .. } if !field.is_scalar() => Some(field),
            Slot::Scalar { .. } if field.is_scalar() => Some(field),
            _ => None,
        }
    }

    /// Element order of a slot: scalars first, then items field by field.
    pub fn order_of(&self, slot: &Slot) -> Option<i64> {
        match slot {
            Slot::Scalar { field } => self
                .scalar_fields()
                .position(|f| f.id == *field)
                .map(|p| p as i64),
            Slot::Item { index, field } => {
                let position = self.repeated_fields().position(|f| f.id == *field)?;
                Some((self.scalar_count() + index * self.fields_per_item() + position) as i64)
            }
        }
    }

    /// Canonical element name of a slot.
    pub fn element_name(&self, codec: &NamingCodec, slot: &Slot) -> Option<String> {
        let field = self.field_for_slot(slot)?;
        Some(match slot {
            Slot::Item { index, .. } => codec.encode(*index, &field.label()),
            Slot::Scalar { .. } => field.label(),
        })
    }
}

/// One schema violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub path: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(path: &str, message: &str) -> Self {
        Self {
            path: path.to_string(),
            message: message.to_string(),
        }
    }
}

/// Validation rules of one language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageRules {
    /// Repeated sections need at least one item
    pub require_items: bool,
    pub required_item_fields: Vec<String>,
    pub required_scalars: Vec<String>,
    pub url_fields: Vec<String>,
}

/// Executable validation schema keyed by language code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationSchema {
    languages: IndexMap<String, LanguageRules>,
}

const URL_PREFIXES: [&str; 5] = ["http://", "https://", "/", "mailto:", "tel:"];

impl ValidationSchema {
    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }

    pub fn rules(&self, code: &str) -> Option<&LanguageRules> {
        self.languages.get(code)
    }

    pub fn language_codes(&self) -> impl Iterator<Item = &str> {
        self.languages.keys().map(|k| k.as_str())
    }

    /// Check a form against the rules. An empty result means valid.
    pub fn validate(&self, form: &FormTree) -> Vec<FieldIssue> {
        let mut issues = Vec::new();

        for (code, rules) in &self.languages {
            let Some(language_form) = form.language(code) else {
                issues.push(FieldIssue::new(code, "language is missing from the form"));
                continue;
            };

            for field in &rules.required_scalars {
                if language_form.scalars.get(field).map_or(true, FieldValue::is_blank) {
                    issues.push(FieldIssue::new(&format!("{}.{}", code, field), "is required"));
                }
            }

            if rules.require_items && language_form.items.is_empty() {
                issues.push(FieldIssue::new(
                    &format!("{}.items", code),
                    "at least one item is required",
                ));
            }

            for (index, item) in language_form.items.iter().enumerate() {
                for field in &rules.required_item_fields {
                    if item.get(field).map_or(true, FieldValue::is_blank) {
                        issues.push(FieldIssue::new(
                            &format!("{}.{}.{}", code, index, field),
                            "is required",
                        ));
                    }
                }
                for field in &rules.url_fields {
                    if let Some(url) = item.get(field).and_then(FieldValue::as_str) {
                        if !url.trim().is_empty() && !is_link(url) {
                            issues.push(FieldIssue::new(
                                &format!("{}.{}.{}", code, index, field),
                                "must be an absolute URL, a path, mailto: or tel: link",
                            ));
                        }
                    }
                }
            }

            for field in &rules.url_fields {
                if let Some(url) = language_form.scalars.get(field).and_then(FieldValue::as_str) {
                    if !url.trim().is_empty() && !is_link(url) {
                        issues.push(FieldIssue::new(
                            &format!("{}.{}", code, field),
                            "must be an absolute URL, a path, mailto: or tel: link",
                        ));
                    }
                }
            }
        }

        issues
    }
}

fn is_link(value: &str) -> bool {
    let value = value.trim();
    URL_PREFIXES.iter().any(|prefix| value.starts_with(prefix))
}

/// Build the validation schema and the default form for a section.
///
/// Each active language gets the same rules and starts with one empty item
/// (repeated sections) or empty scalars. No language ids means an empty
/// schema and an empty form.
pub fn build_schema_and_defaults(
    language_ids: &[String],
    languages: &[Language],
    schema: &SectionSchema,
) -> (ValidationSchema, FormTree) {
    let registry = LanguageRegistry::from_records(languages, language_ids);
    build_for_registry(&registry, schema)
}

pub fn build_for_registry(
    registry: &LanguageRegistry,
    schema: &SectionSchema,
) -> (ValidationSchema, FormTree) {
    let mut validation = ValidationSchema::default();
    let mut defaults = FormTree::new();

    for language in registry.active() {
        let rules = LanguageRules {
            require_items: schema.has_repeated(),
            required_item_fields: schema
                .repeated_fields()
                .filter(|f| f.required)
                .map(|f| f.id.clone())
                .collect(),
            required_scalars: schema
                .scalar_fields()
                .filter(|f| f.required)
                .map(|f| f.id.clone())
                .collect(),
            url_fields: schema
                .fields
                .iter()
                .filter(|f| f.value_type == ValueType::Url)
                .map(|f| f.id.clone())
                .collect(),
        };
        validation.languages.insert(language.code().to_string(), rules);
        defaults.insert_language(language.code(), default_language_form(schema));
    }

    (validation, defaults)
}

/// Empty scalars plus one empty item (for repeated sections).
pub fn default_language_form(schema: &SectionSchema) -> LanguageForm {
    let scalars = schema
        .scalar_fields()
        .map(|f| (f.id.clone(), FieldValue::empty(f.value_type)))
        .collect();
    let items = if schema.has_repeated() {
        vec![schema
            .repeated_fields()
            .map(|f| (f.id.clone(), FieldValue::empty(f.value_type)))
            .collect()]
    } else {
        Vec::new()
    };
    LanguageForm { scalars, items }
}
