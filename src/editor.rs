//! Section editor facade.
//!
//! Owns one subsection's form tree together with everything needed to keep it
//! consistent: the language set, the schema, the shared-field sync engine and
//! the images waiting for upload. A UI binds its inputs to [`SectionEditor::form`]
//! and routes every mutation through the editor.

use crate::backend::{ContentBackend, ImageFile};
use crate::config::{Config, SectionDefinition};
use crate::error::{EditorError, FormError, SaveError};
use crate::form::{FieldPath, FieldValue, FormTree, Slot};
use crate::i18n::LanguageRegistry;
use crate::loader::load_from_backend;
use crate::metrics::SaveMetrics;
use crate::naming::NamingCodec;
use crate::reconcile::{PendingImages, RemovalOutcome, SaveOutcome, SaveReconciler, DEFAULT_BATCH_SIZE};
use crate::schema::{build_for_registry, FieldIssue, SectionSchema, ValidationSchema, ValueType};
use crate::sync::{self, FieldEdit, SyncEngine};
use crate::validator::{CountValidator, LanguageCount};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Lifecycle of an editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorState {
    /// Holding the default form; nothing fetched yet
    Unloaded,
    Loading,
    Ready,
    Saving,
}

/// Combined count and schema check of a form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormValidation {
    pub ok: bool,
    pub counts: Vec<LanguageCount>,
    pub mismatches: Vec<LanguageCount>,
    pub issues: Vec<FieldIssue>,
}

/// Validate `form` for `languages` without an editor.
pub fn validate(form: &FormTree, languages: &LanguageRegistry, schema: &SectionSchema) -> FormValidation {
    let (validation, _) = build_for_registry(languages, schema);
    validate_with(form, languages, schema, &validation)
}

fn validate_with(
    form: &FormTree,
    languages: &LanguageRegistry,
    schema: &SectionSchema,
    validation: &ValidationSchema,
) -> FormValidation {
    let report = CountValidator::validate(form, languages, schema);
    let issues = validation.validate(form);
    FormValidation {
        ok: report.ok && issues.is_empty(),
        mismatches: report.mismatches(),
        counts: report.counts,
        issues,
    }
}

pub struct SectionEditor<B: ContentBackend> {
    backend: B,
    slug: String,
    parent_section_id: Option<String>,
    schema: SectionSchema,
    codec: NamingCodec,
    languages: LanguageRegistry,
    validation: ValidationSchema,
    form: FormTree,
    sync: SyncEngine,
    images: PendingImages,
    metrics: SaveMetrics,
    batch_size: usize,
    state: EditorState,
    sub_section_id: Option<String>,
}

impl<B: ContentBackend> SectionEditor<B> {
    /// Editor for `definition`, starting from the default form.
    pub fn new(backend: B, definition: SectionDefinition) -> Self {
        let languages = LanguageRegistry::from_records(&definition.languages, &definition.language_ids);
        let (validation, defaults) = build_for_registry(&languages, &definition.schema);
        let codec = definition.schema.codec();
        let sync = SyncEngine::new(definition.schema.clone(), languages.clone());

        Self {
            backend,
            slug: definition.slug,
            parent_section_id: definition.parent_section_id,
            schema: definition.schema,
            codec,
            languages,
            validation,
            form: defaults,
            sync,
            images: PendingImages::new(),
            metrics: SaveMetrics::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            state: EditorState::Unloaded,
            sub_section_id: None,
        }
    }

    /// Apply the batch size and debounce from `config`.
    pub fn with_config(self, config: &Config) -> Self {
        self.with_batch_size(config.translation_batch_size)
            .with_debounce(Duration::from_millis(config.sync_debounce_ms))
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.sync = SyncEngine::new(self.schema.clone(), self.languages.clone()).with_debounce(debounce);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn form(&self) -> &FormTree {
        &self.form
    }

    pub fn state(&self) -> EditorState {
        self.state
    }

    pub fn languages(&self) -> &LanguageRegistry {
        &self.languages
    }

    pub fn schema(&self) -> &SectionSchema {
        &self.schema
    }

    pub fn metrics(&self) -> &SaveMetrics {
        &self.metrics
    }

    pub fn pending_images(&self) -> &PendingImages {
        &self.images
    }

    /// Id of the stored subsection, once loaded or saved.
    pub fn sub_section_id(&self) -> Option<&str> {
        self.sub_section_id.as_deref()
    }

    /// Fetch the subsection and rebuild the form from it.
    ///
    /// Pending edits and images are discarded.
    pub async fn load(&mut self) -> Result<&FormTree, EditorError> {
        self.state = EditorState::Loading;
        let loaded = self.fetch_form().await;

        match loaded {
            Ok((form, sub_section_id)) => {
                self.form = form;
                self.sub_section_id = sub_section_id;
                self.sync.reset();
                self.images = PendingImages::new();
                self.state = EditorState::Ready;

                let report = CountValidator::validate(&self.form, &self.languages, &self.schema);
                info!(
                    "Loaded '{}' ({} languages, counts ok: {})",
                    self.slug,
                    self.languages.len(),
                    report.ok
                );
                Ok(&self.form)
            }
            Err(e) => {
                self.state = EditorState::Unloaded;
                Err(e)
            }
        }
    }

    async fn fetch_form(&self) -> Result<(FormTree, Option<String>), EditorError> {
        let payload = self.backend.get_complete_by_sub_section_slug(&self.slug).await?;
        let form = load_from_backend(payload.as_ref(), &self.languages, &self.schema, &self.codec)?;
        Ok((form, payload.map(|s| s.id)))
    }

    /// Replace the whole form, e.g. with one restored from a draft.
    ///
    /// Pending edits are discarded; pending images are kept.
    pub fn replace_form(&mut self, form: FormTree) {
        self.sync.reset();
        self.form = form;
    }

    pub fn validate(&self) -> FormValidation {
        validate_with(&self.form, &self.languages, &self.schema, &self.validation)
    }

    /// Apply a user edit. Shared fields edited in the primary language are
    /// mirrored once the debounce elapses (see [`SectionEditor::flush_due`]).
    pub fn edit(&mut self, path: FieldPath, value: impl Into<FieldValue>) -> Result<(), FormError> {
        self.sync.push(FieldEdit::new(path, value));
        self.sync.process(&mut self.form, Instant::now()).map(|_| ())
    }

    /// When the next debounced propagation is due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.sync.next_deadline()
    }

    /// Run the propagations whose debounce has elapsed.
    pub fn flush_due(&mut self) -> usize {
        self.sync.flush_due(&mut self.form, Instant::now())
    }

    /// Set a field and mirror it right away, bypassing the debounce.
    pub fn sync_shared_field(&mut self, path: &FieldPath, value: impl Into<FieldValue>) -> Result<usize, FormError> {
        sync::sync_shared_field(&mut self.form, path, value.into(), &self.schema, &self.languages)
    }

    /// Append an empty item to every language.
    pub fn add_item(&mut self) -> usize {
        let index = self.form.add_item(&self.schema);
        let report = CountValidator::validate(&self.form, &self.languages, &self.schema);
        if !report.ok {
            warn!("Item counts still differ after adding item {}", index);
        }
        index
    }

    /// Remove item `index` from every language.
    ///
    /// When the subsection is already stored, its elements are deleted and
    /// later items renumbered right away so stored indices stay contiguous.
    pub async fn remove_item(&mut self, index: usize) -> Result<RemovalOutcome, EditorError> {
        self.form.remove_item(index)?;
        self.sync.item_removed(index);

        if self.sub_section_id.is_none() {
            self.images.shift_down(index);
            return Ok(RemovalOutcome::default());
        }

        let reconciler = SaveReconciler::new(&self.backend, &self.slug, &self.schema, &self.codec, &self.languages)
            .with_metrics(&self.metrics);
        let outcome = reconciler.remove_item_at(index, &mut self.images).await?;
        Ok(outcome)
    }

    /// Queue a local image for upload on the next save.
    pub fn attach_image(&mut self, slot: Slot, file: ImageFile) -> Result<(), FormError> {
        let is_image = self
            .schema
            .field_for_slot(&slot)
            .is_some_and(|f| f.value_type == ValueType::Image);
        if !is_image {
            return Err(FormError::UnknownField(slot.to_string()));
        }
        if let Slot::Item { index, .. } = slot {
            let count = self.languages.primary().map(|l| self.form.item_count(l.code())).unwrap_or(0);
            if index >= count {
                return Err(FormError::ItemOutOfRange {
                    language: self.languages.primary().map(|l| l.code().to_string()).unwrap_or_default(),
                    index,
                    count,
                });
            }
        }
        self.images.insert(slot, file);
        Ok(())
    }

    /// Flush pending propagations and persist the form.
    ///
    /// On success the form is replaced by the reloaded one and uploaded
    /// images are dropped from the queue. Failed uploads stay queued.
    pub async fn save(&mut self) -> Result<SaveOutcome, EditorError> {
        if self.state == EditorState::Saving {
            return Err(SaveError::SaveInProgress.into());
        }
        self.sync.flush_all(&mut self.form);
        self.state = EditorState::Saving;

        let mut reconciler = SaveReconciler::new(&self.backend, &self.slug, &self.schema, &self.codec, &self.languages)
            .with_parent_section(self.parent_section_id.as_deref())
            .with_batch_size(self.batch_size)
            .with_metrics(&self.metrics);
        let result = reconciler.save(&self.form, &self.images).await;

        self.state = EditorState::Ready;
        let outcome = result?;
        self.form = outcome.form.clone();
        self.sub_section_id = Some(outcome.sub_section_id.clone());
        for slot in &outcome.uploaded {
            self.images.remove(slot);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::InMemoryBackend;
    use crate::i18n::Language;
    use crate::schema::FieldSpec;

    fn definition() -> SectionDefinition {
        SectionDefinition {
            slug: "links".to_string(),
            parent_section_id: Some("sec-1".to_string()),
            languages: vec![
                Language::new("lang-en", "en"),
                Language::new("lang-ar", "ar"),
                Language::new("lang-fr", "fr").inactive(),
            ],
            language_ids: vec!["lang-en".to_string(), "lang-ar".to_string(), "lang-fr".to_string()],
            schema: SectionSchema::new(
                "Item",
                vec![FieldSpec::text("title"), FieldSpec::url("url"), FieldSpec::image("icon")],
            ),
        }
    }

    fn editor() -> SectionEditor<InMemoryBackend> {
        SectionEditor::new(InMemoryBackend::new(), definition())
    }

    // ==================== Lifecycle Tests ====================

    #[tokio::test]
    async fn test_load_without_stored_data_gives_defaults() {
        let mut editor = editor();
        assert_eq!(editor.state(), EditorState::Unloaded);

        let form = editor.load().await.unwrap();
        assert_eq!(form.item_count("en"), 1);
        assert_eq!(form.item_count("ar"), 1);
        assert!(form.language("fr").is_none());
        assert_eq!(editor.state(), EditorState::Ready);
        assert!(editor.sub_section_id().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let mut editor = editor();
        editor.load().await.unwrap();
        editor.edit(FieldPath::item("en", 0, "title"), "Docs").unwrap();
        editor.edit(FieldPath::item("ar", 0, "title"), "المستندات").unwrap();
        editor.edit(FieldPath::item("en", 0, "url"), "https://docs.example").unwrap();

        let outcome = editor.save().await.unwrap();
        assert!(outcome.ok());
        let saved = editor.form().clone();
        assert_eq!(saved.get(&FieldPath::item("ar", 0, "url")), Some(&"https://docs.example".into()));

        editor.load().await.unwrap();
        assert_eq!(editor.form(), &saved);
        assert_eq!(editor.metrics().saves(), 1);
    }

    // ==================== Sync Tests ====================

    #[tokio::test(start_paused = true)]
    async fn test_shared_edit_propagates_after_debounce() {
        let mut editor = editor();
        editor.edit(FieldPath::item("en", 0, "url"), "https://a").unwrap();
        assert_eq!(editor.form().get(&FieldPath::item("ar", 0, "url")), Some(&"".into()));

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(editor.flush_due(), 1);
        assert_eq!(editor.form().get(&FieldPath::item("ar", 0, "url")), Some(&"https://a".into()));
        assert!(editor.next_deadline().is_none());
    }

    #[test]
    fn test_sync_shared_field_is_immediate() {
        let mut editor = editor();
        let written = editor.sync_shared_field(&FieldPath::item("en", 0, "url"), "/contact").unwrap();
        assert_eq!(written, 1);
        assert_eq!(editor.form().get(&FieldPath::item("ar", 0, "url")), Some(&"/contact".into()));
    }

    // ==================== Validation Tests ====================

    #[test]
    fn test_validate_reports_mismatch() {
        let mut editor = editor();
        editor.form.push_item("en", Default::default()).unwrap();

        let validation = editor.validate();
        assert!(!validation.ok);
        assert_eq!(validation.counts, vec![LanguageCount::new("en", 2), LanguageCount::new("ar", 1)]);
        assert_eq!(validation.mismatches, vec![LanguageCount::new("ar", 1)]);
    }

    #[test]
    fn test_validate_reports_bad_url() {
        let mut editor = editor();
        editor.sync_shared_field(&FieldPath::item("en", 0, "url"), "docs.example").unwrap();

        let validation = editor.validate();
        assert!(!validation.ok);
        assert_eq!(validation.issues.len(), 2);
        assert_eq!(validation.issues[0].path, "en.0.url");
    }

    // ==================== Item Tests ====================

    #[tokio::test]
    async fn test_remove_item_deletes_stored_elements() {
        let mut editor = editor();
        editor.load().await.unwrap();
        editor.add_item();
        editor.edit(FieldPath::item("en", 1, "title"), "Second").unwrap();
        editor.save().await.unwrap();

        let outcome = editor.remove_item(0).await.unwrap();
        assert_eq!(outcome, RemovalOutcome { deleted: 3, renamed: 3 });
        assert_eq!(editor.form().item_count("ar"), 1);

        editor.load().await.unwrap();
        assert_eq!(editor.form().item_count("en"), 1);
        assert_eq!(editor.form().get(&FieldPath::item("en", 0, "title")), Some(&"Second".into()));
    }

    #[tokio::test]
    async fn test_remove_item_before_first_save_is_local() {
        let mut editor = editor();
        editor.add_item();
        let outcome = editor.remove_item(1).await.unwrap();
        assert_eq!(outcome, RemovalOutcome::default());
        assert_eq!(editor.form().item_count("en"), 1);
    }

    #[test]
    fn test_attach_image_checks_slot() {
        let mut editor = editor();
        let file = ImageFile::new("a.png", "image/png", vec![]);

        assert!(editor
            .attach_image(Slot::Item { index: 0, field: "icon".to_string() }, file.clone())
            .is_ok());
        assert!(matches!(
            editor.attach_image(Slot::Item { index: 0, field: "title".to_string() }, file.clone()),
            Err(FormError::UnknownField(_))
        ));
        assert!(matches!(
            editor.attach_image(Slot::Item { index: 4, field: "icon".to_string() }, file),
            Err(FormError::ItemOutOfRange { index: 4, .. })
        ));
        assert_eq!(editor.pending_images().len(), 1);
    }

    #[tokio::test]
    async fn test_save_uploads_and_clears_pending_image() {
        let mut editor = editor();
        editor
            .attach_image(
                Slot::Item { index: 0, field: "icon".to_string() },
                ImageFile::new("icon.svg", "image/svg+xml", vec![1]),
            )
            .unwrap();

        let outcome = editor.save().await.unwrap();
        assert_eq!(outcome.uploaded.len(), 1);
        assert!(editor.pending_images().is_empty());
        let icon = editor.form().get(&FieldPath::item("ar", 0, "icon")).unwrap().to_content();
        assert!(icon.ends_with("/icon.svg"));
    }
}
