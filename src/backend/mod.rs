//! Content backend contract.
//!
//! The sync engine only needs these eight calls. `http` talks to the content
//! API; `memory` keeps everything in process for tests and dry runs.

pub mod http;
pub mod memory;

use crate::error::BackendError;
use crate::model::{ContentElement, ElementTag, ElementType, SubSection};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Payload for creating a subsection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubSection {
    pub name: String,
    pub slug: String,
    #[serde(rename = "section")]
    pub parent_section_id: Option<String>,
    pub languages: Vec<String>,
    pub is_active: bool,
}

/// Partial subsection update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubSectionUpdate {
    pub languages: Vec<String>,
}

/// Payload for creating a content element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContentElement {
    pub name: String,
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub parent: String,
    pub order: i64,
    pub default_content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ElementTag>,
}

/// Partial element update: rename, reorder, retag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ElementTag>,
}

impl ElementUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.order.is_none() && self.metadata.is_none()
    }
}

/// One row of a bulk translation upsert, unique per (element, language).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationUpsert {
    pub content: String,
    pub language: String,
    pub content_element: String,
    pub is_active: bool,
}

/// A local image waiting to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(file_name: &str, content_type: &str, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub image_url: String,
}

/// Calls the sync engine makes against the content store.
#[async_trait]
pub trait ContentBackend: Send + Sync {
    async fn create_sub_section(&self, data: NewSubSection) -> Result<SubSection, BackendError>;

    async fn update_sub_section(&self, id: &str, data: SubSectionUpdate) -> Result<(), BackendError>;

    /// The subsection with all elements and their translations, `None` if
    /// nothing has been saved under `slug` yet.
    async fn get_complete_by_sub_section_slug(
        &self,
        slug: &str,
    ) -> Result<Option<SubSection>, BackendError>;

    async fn create_content_element(
        &self,
        data: NewContentElement,
    ) -> Result<ContentElement, BackendError>;

    async fn update_content_element(&self, id: &str, data: ElementUpdate) -> Result<(), BackendError>;

    async fn delete_content_element(&self, id: &str) -> Result<(), BackendError>;

    async fn bulk_upsert_translations(
        &self,
        translations: Vec<TranslationUpsert>,
    ) -> Result<(), BackendError>;

    async fn upload_element_image(
        &self,
        element_id: &str,
        file: ImageFile,
    ) -> Result<UploadedImage, BackendError>;
}
