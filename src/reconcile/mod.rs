//! Save path: form tree → backend mutations.
//!
//! A save runs `Idle → Validating → Reconciling → Uploading → Finalizing →
//! Idle`, or ends in `Failed`. Nothing reaches the backend before validation
//! passes. Later phases are not rolled back when an earlier one committed:
//! every stored element is looked up by its slot before anything is created,
//! so re-running a failed save converges instead of duplicating elements.

mod images;
mod renumber;

pub use images::PendingImages;
pub use renumber::RemovalOutcome;

use crate::backend::{ContentBackend, ElementUpdate, NewContentElement, NewSubSection, SubSectionUpdate, TranslationUpsert};
use crate::error::{SaveError, UploadError, ValidationFailure};
use crate::form::{FieldPath, FieldValue, FormTree, Slot};
use crate::grouper::group_elements;
use crate::i18n::LanguageRegistry;
use crate::loader::load_from_backend;
use crate::metrics::SaveMetrics;
use crate::model::SubSection;
use crate::naming::NamingCodec;
use crate::schema::{build_for_registry, SectionSchema, ValidationSchema, ValueType};
use crate::validator::CountValidator;
use futures::future::join_all;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, error, info, warn};

/// Translation rows per bulk upsert request.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Where a save currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SavePhase {
    #[default]
    Idle,
    Validating,
    Reconciling,
    Uploading,
    Finalizing,
    Failed,
}

impl fmt::Display for SavePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SavePhase::Idle => "idle",
            SavePhase::Validating => "validating",
            SavePhase::Reconciling => "reconciling",
            SavePhase::Uploading => "uploading",
            SavePhase::Finalizing => "finalizing",
            SavePhase::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Result of a completed save.
#[derive(Debug, Clone)]
pub struct SaveOutcome {
    pub sub_section_id: String,
    pub created: usize,
    /// Elements renamed, reordered or retagged
    pub updated: usize,
    pub deleted: usize,
    pub batches_committed: usize,
    /// Slots whose pending image was uploaded
    pub uploaded: Vec<Slot>,
    pub upload_failures: Vec<UploadError>,
    /// Form rebuilt from the stored state after the save
    pub form: FormTree,
}

impl SaveOutcome {
    /// Whether everything, uploads included, went through.
    pub fn ok(&self) -> bool {
        self.upload_failures.is_empty()
    }
}

/// Stored element a form slot is written to.
#[derive(Debug, Clone)]
struct Target {
    slot: Slot,
    element_id: String,
}

/// Element writes decided during `Reconciling` and applied in `Finalizing`.
#[derive(Debug, Default)]
struct Plan {
    targets: Vec<Target>,
    /// Existing elements whose name, order or tag is not canonical
    normalize: Vec<(String, ElementUpdate)>,
    /// Decoded elements outside the form's slots
    orphans: Vec<(Slot, String)>,
    created: usize,
}

/// Writes a form tree to one subsection.
pub struct SaveReconciler<'a, B: ContentBackend + ?Sized> {
    backend: &'a B,
    slug: &'a str,
    parent_section_id: Option<&'a str>,
    schema: &'a SectionSchema,
    codec: &'a NamingCodec,
    languages: &'a LanguageRegistry,
    validation: ValidationSchema,
    batch_size: usize,
    metrics: Option<&'a SaveMetrics>,
    phase: SavePhase,
}

impl<'a, B: ContentBackend + ?Sized> SaveReconciler<'a, B> {
    pub fn new(
        backend: &'a B,
        slug: &'a str,
        schema: &'a SectionSchema,
        codec: &'a NamingCodec,
        languages: &'a LanguageRegistry,
    ) -> Self {
        let (validation, _) = build_for_registry(languages, schema);
        Self {
            backend,
            slug,
            parent_section_id: None,
            schema,
            codec,
            languages,
            validation,
            batch_size: DEFAULT_BATCH_SIZE,
            metrics: None,
            phase: SavePhase::Idle,
        }
    }

    /// Parent section used when the subsection has to be created.
    pub fn with_parent_section(mut self, parent_section_id: Option<&'a str>) -> Self {
        self.parent_section_id = parent_section_id;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_metrics(mut self, metrics: &'a SaveMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn phase(&self) -> SavePhase {
        self.phase
    }

    /// Persist `form` and return the reloaded form.
    ///
    /// Upload failures are reported in the outcome and do not fail the save.
    ///
    /// Items are written by form position: item `i` goes to the elements of
    /// the `i`-th stored bucket. A middle item dropped from the form without
    /// [`SaveReconciler::remove_item_at`] therefore moves the values of later
    /// items into earlier elements and deletes the trailing ones. The stored
    /// layout stays contiguous, but element ids of the later items are not
    /// kept; removing through `remove_item_at` keeps them.
    pub async fn save(&mut self, form: &FormTree, images: &PendingImages) -> Result<SaveOutcome, SaveError> {
        self.record(SaveMetrics::record_save);

        match self.run(form, images).await {
            Ok(outcome) => {
                self.phase = SavePhase::Idle;
                info!(
                    "Saved '{}': {} created, {} updated, {} deleted, {} translation batches",
                    self.slug, outcome.created, outcome.updated, outcome.deleted, outcome.batches_committed
                );
                Ok(outcome)
            }
            Err(e) => {
                error!("Save of '{}' failed during {}: {}", self.slug, self.phase, e);
                self.phase = SavePhase::Failed;
                self.record(SaveMetrics::record_failure);
                Err(e)
            }
        }
    }

    async fn run(&mut self, form: &FormTree, images: &PendingImages) -> Result<SaveOutcome, SaveError> {
        self.enter(SavePhase::Validating);
        self.validate(form)?;

        self.enter(SavePhase::Reconciling);
        let sub_section = self.ensure_sub_section().await?;
        let plan = self.reconcile_elements(&sub_section, form).await?;

        self.enter(SavePhase::Uploading);
        let mut working = form.clone();
        let (uploaded, upload_failures) = self.upload_images(&plan.targets, images, &mut working).await;

        self.enter(SavePhase::Finalizing);
        let batches_committed = self.write_translations(&plan.targets, &working).await?;

        for (slot, element_id) in &plan.orphans {
            debug!("Deleting orphaned element {} ({})", element_id, slot);
            self.backend
                .delete_content_element(element_id)
                .await
                .map_err(SaveError::backend(SavePhase::Finalizing, batches_committed))?;
            self.record(SaveMetrics::record_deleted);
        }

        for (element_id, update) in &plan.normalize {
            self.backend
                .update_content_element(element_id, update.clone())
                .await
                .map_err(SaveError::backend(SavePhase::Finalizing, batches_committed))?;
            self.record(SaveMetrics::record_updated);
        }

        let refreshed = self
            .backend
            .get_complete_by_sub_section_slug(self.slug)
            .await
            .map_err(SaveError::backend(SavePhase::Finalizing, batches_committed))?;
        let reloaded = load_from_backend(refreshed.as_ref(), self.languages, self.schema, self.codec)?;

        Ok(SaveOutcome {
            sub_section_id: sub_section.id,
            created: plan.created,
            updated: plan.normalize.len(),
            deleted: plan.orphans.len(),
            batches_committed,
            uploaded,
            upload_failures,
            form: reloaded,
        })
    }

    fn enter(&mut self, phase: SavePhase) {
        debug!("Save of '{}': {} → {}", self.slug, self.phase, phase);
        self.phase = phase;
    }

    fn record(&self, counter: fn(&SaveMetrics)) {
        if let Some(metrics) = self.metrics {
            counter(metrics);
        }
    }

    fn validate(&self, form: &FormTree) -> Result<(), SaveError> {
        if self.languages.is_empty() {
            return Err(SaveError::NoActiveLanguages);
        }

        let report = CountValidator::validate(form, self.languages, self.schema);
        let issues = self.validation.validate(form);
        if report.ok && issues.is_empty() {
            return Ok(());
        }

        Err(SaveError::Validation(ValidationFailure {
            mismatched: report.mismatches(),
            counts: report.counts,
            issues,
        }))
    }

    /// Fetch the subsection, creating it on first save. An existing one gets
    /// its language set refreshed.
    async fn ensure_sub_section(&self) -> Result<SubSection, SaveError> {
        let failed = || SaveError::backend(SavePhase::Reconciling, 0);
        let languages = self.languages.ids();

        match self
            .backend
            .get_complete_by_sub_section_slug(self.slug)
            .await
            .map_err(failed())?
        {
            Some(mut sub_section) => {
                if sub_section.languages != languages {
                    self.backend
                        .update_sub_section(
                            &sub_section.id,
                            SubSectionUpdate {
                                languages: languages.clone(),
                            },
                        )
                        .await
                        .map_err(failed())?;
                    sub_section.languages = languages;
                }
                Ok(sub_section)
            }
            None => {
                info!("Creating subsection '{}'", self.slug);
                self.backend
                    .create_sub_section(NewSubSection {
                        name: self.slug.to_string(),
                        slug: self.slug.to_string(),
                        parent_section_id: self.parent_section_id.map(str::to_string),
                        languages,
                        is_active: true,
                    })
                    .await
                    .map_err(failed())
            }
        }
    }

    /// Every slot the form occupies: scalars, then items field by field.
    fn slots(&self, form: &FormTree) -> Vec<Slot> {
        let item_count = self
            .languages
            .active()
            .iter()
            .map(|language| form.item_count(language.code()))
            .max()
            .unwrap_or(0);

        let scalars = self.schema.scalar_fields().map(|field| Slot::Scalar {
            field: field.id.clone(),
        });
        let items = (0..item_count).flat_map(|index| {
            self.schema.repeated_fields().map(move |field| Slot::Item {
                index,
                field: field.id.clone(),
            })
        });
        scalars.chain(items).collect()
    }

    /// Map every form slot to a stored element, creating missing ones in
    /// order, and work out which stored elements are left over.
    async fn reconcile_elements(&self, sub_section: &SubSection, form: &FormTree) -> Result<Plan, SaveError> {
        let grouped = group_elements(&sub_section.elements, self.schema, self.codec)?;
        let mut plan = Plan::default();

        for slot in self.slots(form) {
            let (Some(field), Some(name), Some(order)) = (
                self.schema.field_for_slot(&slot),
                self.schema.element_name(self.codec, &slot),
                self.schema.order_of(&slot),
            ) else {
                continue;
            };
            let tag = slot.tag();

            if let Some(element) = grouped.element_at_position(&slot) {
                let update = renumber::normalization(element, &name, order, &tag);
                if !update.is_empty() {
                    plan.normalize.push((element.id.clone(), update));
                }
                plan.targets.push(Target {
                    slot,
                    element_id: element.id.clone(),
                });
                continue;
            }

            debug!("Creating element '{}' (order {})", name, order);
            let element = self
                .backend
                .create_content_element(NewContentElement {
                    name,
                    element_type: field.value_type.element_type(),
                    parent: sub_section.id.clone(),
                    order,
                    default_content: field.default_content().to_string(),
                    metadata: Some(tag),
                })
                .await
                .map_err(SaveError::backend(SavePhase::Reconciling, 0))?;
            self.record(SaveMetrics::record_created);
            plan.created += 1;
            plan.targets.push(Target {
                slot,
                element_id: element.id,
            });
        }

        let processed: HashSet<&str> = plan.targets.iter().map(|t| t.element_id.as_str()).collect();
        plan.orphans = grouped
            .slots()
            .filter(|(_, element)| !processed.contains(element.id.as_str()))
            .map(|(slot, element)| (slot, element.id.clone()))
            .collect();

        for element in &grouped.skipped {
            warn!(
                "Leaving element '{}' ({}) in place: it maps to no field of this section",
                element.name, element.id
            );
        }

        Ok(plan)
    }

    /// Upload pending images concurrently. A successful upload writes the
    /// returned URL into the slot for every language.
    async fn upload_images(
        &self,
        targets: &[Target],
        images: &PendingImages,
        form: &mut FormTree,
    ) -> (Vec<Slot>, Vec<UploadError>) {
        let backend = self.backend;
        let uploads = images.iter().filter_map(|(slot, file)| {
            let is_image = self
                .schema
                .field_for_slot(slot)
                .is_some_and(|f| f.value_type == ValueType::Image);
            let target = targets.iter().find(|t| t.slot == *slot);
            let Some(target) = target.filter(|_| is_image) else {
                warn!("Dropping pending image for {}: no image element at that slot", slot);
                return None;
            };

            let slot = slot.clone();
            let element_id = target.element_id.clone();
            let file = file.clone();
            Some(async move {
                let result = backend.upload_element_image(&element_id, file).await;
                (slot, element_id, result)
            })
        });

        let mut uploaded = Vec::new();
        let mut failures = Vec::new();
        for (slot, element_id, result) in join_all(uploads).await {
            match result {
                Ok(image) => {
                    for language in self.languages.active() {
                        let path = FieldPath {
                            language: language.code().to_string(),
                            slot: slot.clone(),
                        };
                        if let Err(e) = form.set(&path, FieldValue::Text(image.image_url.clone())) {
                            warn!("Could not store uploaded image URL at {}: {}", path, e);
                        }
                    }
                    uploaded.push(slot);
                }
                Err(e) => {
                    warn!("Image upload for {} failed: {}", slot, e);
                    self.record(SaveMetrics::record_upload_failure);
                    failures.push(UploadError {
                        element_id,
                        slot: slot.to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        (uploaded, failures)
    }

    /// One row per (active language × target) with the form's current value.
    fn translation_rows(&self, targets: &[Target], form: &FormTree) -> Vec<TranslationUpsert> {
        let mut rows = Vec::with_capacity(targets.len() * self.languages.len());
        for language in self.languages.active() {
            for target in targets {
                let field = self.schema.field_for_slot(&target.slot);
                // Shared fields store the primary language's value everywhere
                let source = match (field.is_some_and(|f| f.is_shared()), self.languages.primary()) {
                    (true, Some(primary)) => primary,
                    _ => language,
                };
                let path = FieldPath {
                    language: source.code().to_string(),
                    slot: target.slot.clone(),
                };
                let content = match form.get(&path) {
                    Some(value) => value.to_content(),
                    None => field
                        .map(|f| FieldValue::empty(f.value_type).to_content())
                        .unwrap_or_default(),
                };
                rows.push(TranslationUpsert {
                    content,
                    language: language.id.clone(),
                    content_element: target.element_id.clone(),
                    is_active: true,
                });
            }
        }
        rows
    }

    /// Submit translation rows in sequential batches. Returns the number of
    /// committed batches; a failed batch leaves the earlier ones in place.
    async fn write_translations(&self, targets: &[Target], form: &FormTree) -> Result<usize, SaveError> {
        let rows = self.translation_rows(targets, form);
        let mut committed = 0;

        for batch in rows.chunks(self.batch_size) {
            self.backend
                .bulk_upsert_translations(batch.to_vec())
                .await
                .map_err(SaveError::backend(SavePhase::Finalizing, committed))?;
            committed += 1;
            self.record(SaveMetrics::record_batch);
        }

        debug!("Wrote {} translations in {} batches", rows.len(), committed);
        Ok(committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{BackendCall, InMemoryBackend};
    use crate::backend::ImageFile;
    use crate::error::BackendError;
    use crate::i18n::Language;
    use crate::model::{ContentElement, ElementTag, ElementType};
    use crate::schema::FieldSpec;

    fn registry() -> LanguageRegistry {
        LanguageRegistry::new(vec![Language::new("lang-en", "en"), Language::new("lang-ar", "ar")])
    }

    fn schema() -> SectionSchema {
        SectionSchema::new(
            "Item",
            vec![
                FieldSpec::text("title").required(),
                FieldSpec::url("url"),
                FieldSpec::image("photo"),
            ],
        )
    }

    fn form_with_items(titles: &[(&str, &str)]) -> FormTree {
        let schema = schema();
        let mut form = FormTree::new();
        form.insert_language("en", Default::default());
        form.insert_language("ar", Default::default());
        for (index, (en, ar)) in titles.iter().enumerate() {
            form.add_item(&schema);
            form.set(&FieldPath::item("en", index, "title"), (*en).into()).unwrap();
            form.set(&FieldPath::item("ar", index, "title"), (*ar).into()).unwrap();
        }
        form
    }

    fn element_names(backend: &InMemoryBackend) -> Vec<(String, i64)> {
        let mut elements: Vec<(String, i64)> = backend
            .snapshot("items")
            .map(|s| s.elements.into_iter().map(|e| (e.name, e.order)).collect())
            .unwrap_or_default();
        elements.sort_by_key(|(_, order)| *order);
        elements
    }

    async fn save(backend: &InMemoryBackend, form: &FormTree) -> Result<SaveOutcome, SaveError> {
        let schema = schema();
        let codec = schema.codec();
        let languages = registry();
        SaveReconciler::new(backend, "items", &schema, &codec, &languages)
            .with_parent_section(Some("sec-1"))
            .save(form, &PendingImages::new())
            .await
    }

    // ==================== Phase Tests ====================

    #[test]
    fn test_phase_display() {
        assert_eq!(SavePhase::Finalizing.to_string(), "finalizing");
        assert_eq!(SavePhase::default(), SavePhase::Idle);
    }

    // ==================== Validation Tests ====================

    #[tokio::test]
    async fn test_count_mismatch_blocks_save_without_backend_calls() {
        let backend = InMemoryBackend::new();
        let mut form = form_with_items(&[("One", "واحد")]);
        form.push_item("en", Default::default()).unwrap();

        let err = save(&backend, &form).await.unwrap_err();
        match err {
            SaveError::Validation(failure) => {
                assert_eq!(failure.mismatched.len(), 1);
                assert_eq!(failure.mismatched[0].language, "ar");
            }
            other => panic!("Expected validation failure, got {:?}", other),
        }
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_blank_required_field_blocks_save() {
        let backend = InMemoryBackend::new();
        let form = form_with_items(&[("", "")]);

        let err = save(&backend, &form).await.unwrap_err();
        assert!(matches!(err, SaveError::Validation(ref f) if f.issues.len() == 2));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_no_languages_rejected() {
        let backend = InMemoryBackend::new();
        let schema = schema();
        let codec = schema.codec();
        let languages = LanguageRegistry::default();
        let mut reconciler = SaveReconciler::new(&backend, "items", &schema, &codec, &languages);

        let err = reconciler.save(&FormTree::new(), &PendingImages::new()).await.unwrap_err();
        assert!(matches!(err, SaveError::NoActiveLanguages));
        assert_eq!(reconciler.phase(), SavePhase::Failed);
    }

    // ==================== Reconcile Tests ====================

    #[tokio::test]
    async fn test_first_save_creates_sub_section_and_elements() {
        let backend = InMemoryBackend::new();
        let form = form_with_items(&[("One", "واحد"), ("Two", "اثنان")]);

        let outcome = save(&backend, &form).await.unwrap();

        assert_eq!(outcome.created, 6);
        assert_eq!(outcome.deleted, 0);
        assert_eq!(
            element_names(&backend),
            vec![
                ("Item 1 - Title".to_string(), 0),
                ("Item 1 - Url".to_string(), 1),
                ("Item 1 - Photo".to_string(), 2),
                ("Item 2 - Title".to_string(), 3),
                ("Item 2 - Url".to_string(), 4),
                ("Item 2 - Photo".to_string(), 5),
            ]
        );
        let stored = backend.snapshot("items").unwrap();
        assert_eq!(stored.parent_section_id.as_deref(), Some("sec-1"));
        assert_eq!(stored.languages, vec!["lang-en".to_string(), "lang-ar".to_string()]);

        let photo = stored.elements.iter().find(|e| e.name == "Item 1 - Photo").unwrap();
        assert_eq!(photo.element_type, ElementType::Image);
        assert_eq!(photo.default_content.as_deref(), Some(crate::schema::IMAGE_PLACEHOLDER));
        assert_eq!(photo.metadata, Some(ElementTag::item(0, "photo")));

        assert_eq!(outcome.form, form);
    }

    #[tokio::test]
    async fn test_second_save_updates_in_place() {
        let backend = InMemoryBackend::new();
        let mut form = form_with_items(&[("One", "واحد")]);
        save(&backend, &form).await.unwrap();

        form.set(&FieldPath::item("en", 0, "title"), "Changed".into()).unwrap();
        backend.clear_calls();
        let outcome = save(&backend, &form).await.unwrap();

        assert_eq!(outcome.created, 0);
        assert_eq!(outcome.updated, 0);
        assert_eq!(
            outcome.form.get(&FieldPath::item("en", 0, "title")),
            Some(&"Changed".into())
        );
        assert!(!backend
            .calls()
            .iter()
            .any(|c| matches!(c, BackendCall::CreateElement { .. } | BackendCall::CreateSubSection { .. })));
    }

    #[tokio::test]
    async fn test_removed_trailing_items_are_deleted() {
        let backend = InMemoryBackend::new();
        let form = form_with_items(&[("One", "1"), ("Two", "2"), ("Three", "3")]);
        save(&backend, &form).await.unwrap();

        let mut shorter = form.clone();
        shorter.remove_item(1).unwrap();
        let outcome = save(&backend, &shorter).await.unwrap();

        assert_eq!(outcome.deleted, 3);
        assert_eq!(element_names(&backend).len(), 6);
        assert_eq!(outcome.form.item_count("en"), 2);
        assert_eq!(
            outcome.form.get(&FieldPath::item("en", 1, "title")),
            Some(&"Three".into())
        );
    }

    #[tokio::test]
    async fn test_translation_batches_of_batch_size() {
        let backend = InMemoryBackend::new();
        // 3 items x 3 fields x 2 languages = 18 rows
        let form = form_with_items(&[("One", "1"), ("Two", "2"), ("Three", "3")]);
        let schema = schema();
        let codec = schema.codec();
        let languages = registry();
        let metrics = SaveMetrics::new();

        let outcome = SaveReconciler::new(&backend, "items", &schema, &codec, &languages)
            .with_batch_size(5)
            .with_metrics(&metrics)
            .save(&form, &PendingImages::new())
            .await
            .unwrap();

        assert_eq!(outcome.batches_committed, 4);
        let rows: Vec<usize> = backend
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                BackendCall::BulkUpsert { rows } => Some(rows),
                _ => None,
            })
            .collect();
        assert_eq!(rows, vec![5, 5, 5, 3]);
        assert_eq!(metrics.translation_batches(), 4);
        assert_eq!(metrics.elements_created(), 9);
        assert_eq!(metrics.saves(), 1);
    }

    #[tokio::test]
    async fn test_failed_batch_reports_committed_batches() {
        let backend = InMemoryBackend::new();
        let form = form_with_items(&[("One", "1"), ("Two", "2"), ("Three", "3")]);
        backend.fail_translation_batch(1);

        let schema = schema();
        let codec = schema.codec();
        let languages = registry();
        let mut reconciler =
            SaveReconciler::new(&backend, "items", &schema, &codec, &languages).with_batch_size(10);
        let err = reconciler.save(&form, &PendingImages::new()).await.unwrap_err();

        match err {
            SaveError::Backend {
                phase,
                committed_batches,
                source,
            } => {
                assert_eq!(phase, SavePhase::Finalizing);
                assert_eq!(committed_batches, 1);
                assert!(matches!(source, BackendError::Status { status: 500, .. }));
            }
            other => panic!("Expected backend failure, got {:?}", other),
        }
        assert_eq!(reconciler.phase(), SavePhase::Failed);
    }

    #[tokio::test]
    async fn test_legacy_names_are_normalized() {
        let legacy = |id: &str, name: &str, order: i64| ContentElement {
            id: id.to_string(),
            name: name.to_string(),
            element_type: ElementType::Text,
            order,
            parent: "sub-legacy".to_string(),
            default_content: None,
            metadata: None,
            image_url: None,
            translations: vec![],
        };
        let backend = InMemoryBackend::new().with_sub_section(SubSection {
            id: "sub-legacy".to_string(),
            slug: "items".to_string(),
            parent_section_id: None,
            languages: vec!["lang-en".to_string(), "lang-ar".to_string()],
            elements: vec![legacy("old-title", "عنصر 1 - Title", 7), legacy("old-url", "Url 1", 9)],
        });
        let form = form_with_items(&[("One", "1")]);

        let outcome = save(&backend, &form).await.unwrap();

        assert_eq!(outcome.created, 1);
        assert_eq!(outcome.updated, 2);
        let stored = backend.snapshot("items").unwrap();
        let title = stored.elements.iter().find(|e| e.id == "old-title").unwrap();
        assert_eq!(title.name, "Item 1 - Title");
        assert_eq!(title.order, 0);
        assert_eq!(title.metadata, Some(ElementTag::item(0, "title")));
        let url = stored.elements.iter().find(|e| e.id == "old-url").unwrap();
        assert_eq!(url.name, "Item 1 - Url");
        assert_eq!(url.order, 1);
    }

    #[tokio::test]
    async fn test_unknown_elements_are_left_in_place() {
        let backend = InMemoryBackend::new().with_sub_section(SubSection {
            id: "sub-1".to_string(),
            slug: "items".to_string(),
            parent_section_id: None,
            languages: vec![],
            elements: vec![ContentElement {
                id: "mystery".to_string(),
                name: "Something else entirely".to_string(),
                element_type: ElementType::Text,
                order: 99,
                parent: "sub-1".to_string(),
                default_content: None,
                metadata: None,
                image_url: None,
                translations: vec![],
            }],
        });
        let form = form_with_items(&[("One", "1")]);

        let outcome = save(&backend, &form).await.unwrap();

        assert_eq!(outcome.deleted, 0);
        let stored = backend.snapshot("items").unwrap();
        assert!(stored.elements.iter().any(|e| e.id == "mystery"));
        // Language set refreshed on an existing subsection
        assert_eq!(stored.languages.len(), 2);
        assert!(backend
            .calls()
            .contains(&BackendCall::UpdateSubSection { id: "sub-1".to_string() }));
    }

    #[tokio::test]
    async fn test_gapped_stored_items_map_by_position() {
        let stored = |id: &str, name: &str, order: i64| ContentElement {
            id: id.to_string(),
            name: name.to_string(),
            element_type: ElementType::Text,
            order,
            parent: "sub-1".to_string(),
            default_content: None,
            metadata: None,
            image_url: None,
            translations: vec![],
        };
        let backend = InMemoryBackend::new().with_sub_section(SubSection {
            id: "sub-1".to_string(),
            slug: "items".to_string(),
            parent_section_id: None,
            languages: vec!["lang-en".to_string(), "lang-ar".to_string()],
            elements: vec![stored("a", "Item 1 - Title", 0), stored("b", "Item 3 - Title", 6)],
        });
        let form = form_with_items(&[("One", "1"), ("Two", "2")]);

        let outcome = save(&backend, &form).await.unwrap();

        assert_eq!(outcome.deleted, 0);
        // url and photo of both items
        assert_eq!(outcome.created, 4);
        let stored = backend.snapshot("items").unwrap();
        let second = stored.elements.iter().find(|e| e.id == "b").unwrap();
        assert_eq!(second.name, "Item 2 - Title");
        assert_eq!(second.order, 3);
        assert_eq!(second.metadata, Some(ElementTag::item(1, "title")));
        assert_eq!(outcome.form.get(&FieldPath::item("ar", 1, "title")), Some(&"2".into()));
    }

    // ==================== Translation Row Tests ====================

    #[tokio::test]
    async fn test_shared_field_rows_use_primary_value() {
        let backend = InMemoryBackend::new();
        let mut form = form_with_items(&[("One", "1")]);
        form.set(&FieldPath::item("en", 0, "url"), "https://x".into()).unwrap();
        form.set(&FieldPath::item("ar", 0, "url"), "https://other".into()).unwrap();

        save(&backend, &form).await.unwrap();

        let stored = backend.snapshot("items").unwrap();
        let url = stored.elements.iter().find(|e| e.name == "Item 1 - Url").unwrap();
        let mut contents: Vec<(String, String)> = url
            .translations
            .iter()
            .map(|t| (t.language.id().to_string(), t.content.clone()))
            .collect();
        contents.sort();
        assert_eq!(
            contents,
            vec![
                ("lang-ar".to_string(), "https://x".to_string()),
                ("lang-en".to_string(), "https://x".to_string()),
            ]
        );

        // Text fields keep their own value per language
        let title = stored.elements.iter().find(|e| e.name == "Item 1 - Title").unwrap();
        assert!(title.translations.iter().any(|t| t.content == "1"));
    }

    // ==================== Upload Tests ====================

    #[tokio::test]
    async fn test_uploaded_url_written_to_every_language() {
        let backend = InMemoryBackend::new();
        let form = form_with_items(&[("One", "1")]);
        let schema = schema();
        let codec = schema.codec();
        let languages = registry();
        let mut images = PendingImages::new();
        let slot = Slot::Item {
            index: 0,
            field: "photo".to_string(),
        };
        images.insert(slot.clone(), ImageFile::new("hero.png", "image/png", vec![0u8; 4]));

        let outcome = SaveReconciler::new(&backend, "items", &schema, &codec, &languages)
            .save(&form, &images)
            .await
            .unwrap();

        assert!(outcome.ok());
        assert_eq!(outcome.uploaded, vec![slot]);
        let en = outcome.form.get(&FieldPath::item("en", 0, "photo")).cloned();
        let ar = outcome.form.get(&FieldPath::item("ar", 0, "photo")).cloned();
        assert_eq!(en, ar);
        assert!(en.unwrap().to_content().ends_with("/hero.png"));
    }

    #[tokio::test]
    async fn test_upload_failure_does_not_block_text() {
        let backend = InMemoryBackend::new();
        backend.fail_all_uploads();
        let form = form_with_items(&[("One", "1")]);
        let schema = schema();
        let codec = schema.codec();
        let languages = registry();
        let metrics = SaveMetrics::new();
        let mut images = PendingImages::new();
        images.insert(
            Slot::Item {
                index: 0,
                field: "photo".to_string(),
            },
            ImageFile::new("hero.png", "image/png", vec![]),
        );

        let outcome = SaveReconciler::new(&backend, "items", &schema, &codec, &languages)
            .with_metrics(&metrics)
            .save(&form, &images)
            .await
            .unwrap();

        assert!(!outcome.ok());
        assert_eq!(outcome.upload_failures.len(), 1);
        assert_eq!(outcome.upload_failures[0].slot, "0.photo");
        assert_eq!(outcome.form.get(&FieldPath::item("ar", 0, "title")), Some(&"1".into()));
        assert_eq!(metrics.upload_failures(), 1);
        assert_eq!(metrics.failures(), 0);
    }
}
