use crate::i18n::Language;
use crate::schema::SectionSchema;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct Config {
    // Content API
    pub backend_api_url: String,
    pub backend_api_token: Option<String>,
    pub request_timeout_secs: u64,

    // Editor definition
    pub section_definition_file: String,

    // Save / sync tuning
    pub translation_batch_size: usize,
    pub sync_debounce_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            backend_api_url: std::env::var("BACKEND_API_URL").context("BACKEND_API_URL not set")?,
            backend_api_token: std::env::var("BACKEND_API_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),

            section_definition_file: std::env::var("SECTION_DEFINITION_FILE")
                .unwrap_or_else(|_| "data/section.json".to_string()),

            translation_batch_size: std::env::var("TRANSLATION_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            sync_debounce_ms: std::env::var("SYNC_DEBOUNCE_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
        };

        if config.translation_batch_size == 0 {
            bail!("TRANSLATION_BATCH_SIZE must be at least 1");
        }

        Ok(config)
    }
}

/// Everything needed to run one section editor outside the dashboard.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionDefinition {
    /// Subsection slug the editor saves under
    pub slug: String,
    pub parent_section_id: Option<String>,
    /// All known language records
    pub languages: Vec<Language>,
    /// Ids of the languages this subsection is edited in
    pub language_ids: Vec<String>,
    pub schema: SectionSchema,
}

impl SectionDefinition {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read section definition at {}", path.display()))?;
        let definition: SectionDefinition = serde_json::from_str(&content)
            .with_context(|| format!("Invalid section definition in {}", path.display()))?;

        if definition.schema.fields.is_empty() {
            bail!("Section definition '{}' declares no fields", definition.slug);
        }
        Ok(definition)
    }
}
