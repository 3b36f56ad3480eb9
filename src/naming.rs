//! Element naming codec.
//!
//! Repeated-item elements are stored under display names of the form
//! `"<Label> <n> - <Field>"` where `n` is the one-based item index. Older data
//! uses other spellings, so decoding falls back to a list of legacy patterns.
//! Elements written by this crate also carry an [`ElementTag`](crate::model::ElementTag);
//! name decoding is only needed for elements that predate it.

use regex::Regex;
use std::sync::OnceLock;

/// Result of decoding an element name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedName {
    /// Zero-based item index
    pub index: usize,
    /// Field display name as written in the element name
    pub field_name: String,
}

/// A fallback naming scheme.
///
/// The regex must define the named groups `index` and `field`.
#[derive(Debug, Clone)]
pub struct LegacyPattern {
    regex: Regex,
    one_based: bool,
}

impl LegacyPattern {
    pub fn new(pattern: &str, one_based: bool) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            one_based,
        })
    }

    fn decode(&self, name: &str) -> Option<DecodedName> {
        let caps = self.regex.captures(name)?;
        let raw: usize = caps.name("index")?.as_str().parse().ok()?;
        let index = if self.one_based { raw.checked_sub(1)? } else { raw };
        let field_name = caps.name("field")?.as_str().trim();
        if field_name.is_empty() {
            return None;
        }
        Some(DecodedName {
            index,
            field_name: field_name.to_string(),
        })
    }
}

static DEFAULT_LEGACY: OnceLock<Vec<LegacyPattern>> = OnceLock::new();

/// Legacy schemes seen in stored data, tried in order after the canonical one.
///
/// - `"<any label> <n> - <Field>"` (item label renamed since the data was written)
/// - `"عنصر <n> - <Field>"` (Arabic item label)
/// - `"<Field> <n>"`
pub fn default_legacy_patterns() -> &'static [LegacyPattern] {
    DEFAULT_LEGACY.get_or_init(|| {
        [
            (r"^(?P<label>.+?)\s+(?P<index>\d+)\s*-\s*(?P<field>.+)$", true),
            (r"^عنصر\s*(?P<index>\d+)\s*-\s*(?P<field>.+)$", true),
            (r"^(?P<field>.+?)\s+(?P<index>\d+)$", true),
        ]
        .iter()
        .map(|(pattern, one_based)| {
            LegacyPattern::new(pattern, *one_based).expect("built-in legacy pattern is valid")
        })
        .collect()
    })
}

/// Encode an element name: `"<Label> <index+1> - <FieldName>"`.
pub fn encode(item_label: &str, index: usize, field_name: &str) -> String {
    format!("{} {} - {}", item_label, index + 1, field_name)
}

/// Codec bound to one item label.
#[derive(Debug, Clone)]
pub struct NamingCodec {
    item_label: String,
    canonical: Regex,
    legacy: Vec<LegacyPattern>,
}

impl NamingCodec {
    /// Create a codec with the default legacy patterns.
    pub fn new(item_label: &str) -> Self {
        let pattern = format!(
            r"^{} (?P<index>\d+) - (?P<field>.+)$",
            regex::escape(item_label)
        );
        Self {
            item_label: item_label.to_string(),
            canonical: Regex::new(&pattern).expect("escaped item label is a valid pattern"),
            legacy: default_legacy_patterns().to_vec(),
        }
    }

    /// Replace the legacy fallback list.
    pub fn with_legacy_patterns(mut self, patterns: Vec<LegacyPattern>) -> Self {
        self.legacy = patterns;
        self
    }

    /// Append a legacy fallback pattern.
    pub fn push_legacy_pattern(&mut self, pattern: LegacyPattern) {
        self.legacy.push(pattern);
    }

    pub fn item_label(&self) -> &str {
        &self.item_label
    }

    pub fn encode(&self, index: usize, field_name: &str) -> String {
        encode(&self.item_label, index, field_name)
    }

    /// Decode a stored name. Canonical pattern first, then legacy ones in order.
    ///
    /// Never fails loudly: a name matching no pattern returns `None`.
    pub fn decode(&self, name: &str) -> Option<DecodedName> {
        if let Some(decoded) = self.decode_canonical(name) {
            return Some(decoded);
        }
        self.legacy.iter().find_map(|pattern| pattern.decode(name))
    }

    /// Whether `name` is exactly in canonical form.
    pub fn is_canonical(&self, name: &str) -> bool {
        self.decode_canonical(name).is_some()
    }

    fn decode_canonical(&self, name: &str) -> Option<DecodedName> {
        let caps = self.canonical.captures(name)?;
        let index = caps["index"].parse::<usize>().ok()?.checked_sub(1)?;
        Some(DecodedName {
            index,
            field_name: caps["field"].to_string(),
        })
    }
}
