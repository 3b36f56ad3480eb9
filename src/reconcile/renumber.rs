//! Deletion-renumbering: keep stored item indices contiguous from 0.

use super::{PendingImages, SavePhase, SaveReconciler};
use crate::backend::{ContentBackend, ElementUpdate};
use crate::error::SaveError;
use crate::form::Slot;
use crate::grouper::group_elements;
use crate::metrics::SaveMetrics;
use crate::model::{ContentElement, ElementTag};
use tracing::{debug, info};

/// What [`SaveReconciler::remove_item_at`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalOutcome {
    pub deleted: usize,
    pub renamed: usize,
}

/// Fields of `element` that differ from its canonical name, order and tag.
pub(super) fn normalization(element: &ContentElement, name: &str, order: i64, tag: &ElementTag) -> ElementUpdate {
    ElementUpdate {
        name: (element.name != name).then(|| name.to_string()),
        order: (element.order != order).then_some(order),
        metadata: (element.metadata.as_ref() != Some(tag)).then(|| tag.clone()),
    }
}

impl<'a, B: ContentBackend + ?Sized> SaveReconciler<'a, B> {
    /// Delete item `index` from the stored subsection.
    ///
    /// `index` is a form position. Stored buckets are ranked in ascending
    /// order, so gaps in the stored indices map to the same items the loader
    /// shows. Every element of the removed bucket is deleted; elements of later
    /// buckets get the canonical name, order and tag of their new position,
    /// lowest position first. Pending images shift down with them. Nothing
    /// happens in the backend when the subsection has not been saved yet.
    pub async fn remove_item_at(
        &self,
        index: usize,
        images: &mut PendingImages,
    ) -> Result<RemovalOutcome, SaveError> {
        images.shift_down(index);

        let failed = || SaveError::backend(SavePhase::Reconciling, 0);
        let Some(sub_section) = self
            .backend
            .get_complete_by_sub_section_slug(self.slug)
            .await
            .map_err(failed())?
        else {
            debug!("Subsection '{}' not saved yet, nothing to remove", self.slug);
            return Ok(RemovalOutcome::default());
        };

        let grouped = group_elements(&sub_section.elements, self.schema, self.codec)?;
        let stored: Vec<usize> = grouped.indices().collect();
        let mut outcome = RemovalOutcome::default();

        let Some(removed) = stored.get(index) else {
            debug!("Item {} of '{}' is not stored, nothing to remove", index, self.slug);
            return Ok(outcome);
        };

        if let Some(fields) = grouped.items.get(removed) {
            for element in fields.values() {
                self.backend.delete_content_element(&element.id).await.map_err(failed())?;
                self.record(SaveMetrics::record_deleted);
                outcome.deleted += 1;
            }
        }

        for (position, stored_index) in stored.iter().enumerate().skip(index + 1) {
            let Some(fields) = grouped.items.get(stored_index) else {
                continue;
            };
            for (field, element) in fields {
                let slot = Slot::Item {
                    index: position - 1,
                    field: field.clone(),
                };
                let (Some(name), Some(order)) =
                    (self.schema.element_name(self.codec, &slot), self.schema.order_of(&slot))
                else {
                    continue;
                };
                let update = normalization(element, &name, order, &slot.tag());
                if update.is_empty() {
                    continue;
                }
                self.backend
                    .update_content_element(&element.id, update)
                    .await
                    .map_err(failed())?;
                self.record(SaveMetrics::record_updated);
                outcome.renamed += 1;
            }
        }

        info!(
            "Removed item {} from '{}': {} elements deleted, {} renamed",
            index, self.slug, outcome.deleted, outcome.renamed
        );
        Ok(outcome)
    }
}
