//! In-process content backend.
//!
//! Behaves like the content API (ids, upserts, cascading deletes) and records
//! every call. Failures can be injected per operation to exercise partial
//! saves.

use crate::backend::{
    ContentBackend, ElementUpdate, ImageFile, NewContentElement, NewSubSection, SubSectionUpdate,
    TranslationUpsert, UploadedImage,
};
use crate::error::BackendError;
use crate::model::{ContentElement, ContentTranslation, LanguageRef, SubSection};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

/// A recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    CreateSubSection { slug: String },
    UpdateSubSection { id: String },
    GetComplete { slug: String },
    CreateElement { name: String, order: i64 },
    UpdateElement { id: String, update: ElementUpdate },
    DeleteElement { id: String },
    BulkUpsert { rows: usize },
    UploadImage { element_id: String },
}

#[derive(Debug, Default)]
struct Failures {
    /// Zero-based index of the bulk upsert call that fails
    translation_batch: Option<usize>,
    /// Element creations that succeed before creation starts failing
    element_creations_before_failure: Option<usize>,
    upload_elements: HashSet<String>,
    fail_all_uploads: bool,
}

#[derive(Debug, Default)]
struct State {
    sub_sections: Vec<SubSection>,
    next_id: u64,
    calls: Vec<BackendCall>,
    bulk_calls: usize,
    element_creations: usize,
    failures: Failures,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn element_mut(&mut self, id: &str) -> Option<&mut ContentElement> {
        self.sub_sections
            .iter_mut()
            .flat_map(|s| s.elements.iter_mut())
            .find(|e| e.id == id)
    }
}

/// [`ContentBackend`] holding everything in memory.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an existing subsection.
    pub fn with_sub_section(self, sub_section: SubSection) -> Self {
        self.lock().sub_sections.push(sub_section);
        self
    }

    /// Make the `n`-th (zero-based) bulk translation upsert fail.
    pub fn fail_translation_batch(&self, n: usize) {
        self.lock().failures.translation_batch = Some(n);
    }

    /// Let `n` element creations succeed, then fail the rest.
    pub fn fail_element_creation_after(&self, n: usize) {
        self.lock().failures.element_creations_before_failure = Some(n);
    }

    /// Make image uploads for `element_id` fail.
    pub fn fail_upload_for(&self, element_id: &str) {
        self.lock().failures.upload_elements.insert(element_id.to_string());
    }

    pub fn fail_all_uploads(&self) {
        self.lock().failures.fail_all_uploads = true;
    }

    /// Remove every injected failure.
    pub fn clear_failures(&self) {
        self.lock().failures = Failures::default();
    }

    /// Current stored state of a subsection.
    pub fn snapshot(&self, slug: &str) -> Option<SubSection> {
        self.lock().sub_sections.iter().find(|s| s.slug == slug).cloned()
    }

    /// Every call made so far.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not wedge the rest of the suite
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ContentBackend for InMemoryBackend {
    async fn create_sub_section(&self, data: NewSubSection) -> Result<SubSection, BackendError> {
        let mut state = self.lock();
        state.calls.push(BackendCall::CreateSubSection {
            slug: data.slug.clone(),
        });
        if state.sub_sections.iter().any(|s| s.slug == data.slug) {
            return Err(BackendError::Rejected {
                operation: "create subsection",
                message: format!("slug '{}' already exists", data.slug),
            });
        }
        let sub_section = SubSection {
            id: state.next_id("sub"),
            slug: data.slug,
            parent_section_id: data.parent_section_id,
            languages: data.languages,
            elements: Vec::new(),
        };
        state.sub_sections.push(sub_section.clone());
        Ok(sub_section)
    }

    async fn update_sub_section(&self, id: &str, data: SubSectionUpdate) -> Result<(), BackendError> {
        let mut state = self.lock();
        state.calls.push(BackendCall::UpdateSubSection { id: id.to_string() });
        let sub_section = state
            .sub_sections
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| BackendError::NotFound {
                operation: "update subsection",
                kind: "subsection",
                id: id.to_string(),
            })?;
        sub_section.languages = data.languages;
        Ok(())
    }

    async fn get_complete_by_sub_section_slug(
        &self,
        slug: &str,
    ) -> Result<Option<SubSection>, BackendError> {
        let mut state = self.lock();
        state.calls.push(BackendCall::GetComplete {
            slug: slug.to_string(),
        });
        let mut sub_section = state.sub_sections.iter().find(|s| s.slug == slug).cloned();
        if let Some(sub_section) = sub_section.as_mut() {
            sub_section.elements.sort_by_key(|e| e.order);
        }
        Ok(sub_section)
    }

    async fn create_content_element(
        &self,
        data: NewContentElement,
    ) -> Result<ContentElement, BackendError> {
        let mut state = self.lock();
        state.calls.push(BackendCall::CreateElement {
            name: data.name.clone(),
            order: data.order,
        });
        if let Some(limit) = state.failures.element_creations_before_failure {
            if state.element_creations >= limit {
                return Err(BackendError::Status {
                    operation: "create content element",
                    status: 500,
                    body: "injected failure".to_string(),
                });
            }
        }
        state.element_creations += 1;

        let element = ContentElement {
            id: state.next_id("el"),
            name: data.name,
            element_type: data.element_type,
            order: data.order,
            parent: data.parent.clone(),
            default_content: Some(data.default_content),
            metadata: data.metadata,
            image_url: None,
            translations: Vec::new(),
        };
        let sub_section = state
            .sub_sections
            .iter_mut()
            .find(|s| s.id == data.parent)
            .ok_or_else(|| BackendError::NotFound {
                operation: "create content element",
                kind: "subsection",
                id: data.parent.clone(),
            })?;
        sub_section.elements.push(element.clone());
        Ok(element)
    }

    async fn update_content_element(&self, id: &str, data: ElementUpdate) -> Result<(), BackendError> {
        let mut state = self.lock();
        state.calls.push(BackendCall::UpdateElement {
            id: id.to_string(),
            update: data.clone(),
        });
        let element = state.element_mut(id).ok_or_else(|| BackendError::NotFound {
            operation: "update content element",
            kind: "content element",
            id: id.to_string(),
        })?;
        if let Some(name) = data.name {
            element.name = name;
        }
        if let Some(order) = data.order {
            element.order = order;
        }
        if let Some(metadata) = data.metadata {
            element.metadata = Some(metadata);
        }
        Ok(())
    }

    async fn delete_content_element(&self, id: &str) -> Result<(), BackendError> {
        let mut state = self.lock();
        state.calls.push(BackendCall::DeleteElement { id: id.to_string() });
        for sub_section in state.sub_sections.iter_mut() {
            if let Some(position) = sub_section.elements.iter().position(|e| e.id == id) {
                // Translations go with their element
                sub_section.elements.remove(position);
                return Ok(());
            }
        }
        Err(BackendError::NotFound {
            operation: "delete content element",
            kind: "content element",
            id: id.to_string(),
        })
    }

    async fn bulk_upsert_translations(
        &self,
        translations: Vec<TranslationUpsert>,
    ) -> Result<(), BackendError> {
        let mut state = self.lock();
        state.calls.push(BackendCall::BulkUpsert {
            rows: translations.len(),
        });
        let call = state.bulk_calls;
        state.bulk_calls += 1;
        if state.failures.translation_batch == Some(call) {
            return Err(BackendError::Status {
                operation: "bulk upsert translations",
                status: 500,
                body: "injected failure".to_string(),
            });
        }

        for row in translations {
            let id = state.next_id("tr");
            let element = state
                .element_mut(&row.content_element)
                .ok_or_else(|| BackendError::NotFound {
                    operation: "bulk upsert translations",
                    kind: "content element",
                    id: row.content_element.clone(),
                })?;
            match element
                .translations
                .iter_mut()
                .find(|t| t.language.id() == row.language)
            {
                Some(existing) => {
                    existing.content = row.content;
                    existing.is_active = row.is_active;
                }
                None => element.translations.push(ContentTranslation {
                    id,
                    content: row.content,
                    language: LanguageRef::Id(row.language),
                    content_element: row.content_element,
                    is_active: row.is_active,
                }),
            }
        }
        Ok(())
    }

    async fn upload_element_image(
        &self,
        element_id: &str,
        file: ImageFile,
    ) -> Result<UploadedImage, BackendError> {
        let mut state = self.lock();
        state.calls.push(BackendCall::UploadImage {
            element_id: element_id.to_string(),
        });
        if state.failures.fail_all_uploads || state.failures.upload_elements.contains(element_id) {
            return Err(BackendError::Status {
                operation: "upload element image",
                status: 413,
                body: "injected failure".to_string(),
            });
        }
        let image_url = format!("https://cdn.local/{}/{}", element_id, file.file_name);
        let element = state.element_mut(element_id).ok_or_else(|| BackendError::NotFound {
            operation: "upload element image",
            kind: "content element",
            id: element_id.to_string(),
        })?;
        element.image_url = Some(image_url.clone());
        Ok(UploadedImage { image_url })
    }
}
