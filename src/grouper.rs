//! Partition a flat element list by repeated-item index.

use crate::error::LoadError;
use crate::form::Slot;
use crate::model::ContentElement;
use crate::naming::NamingCodec;
use crate::schema::SectionSchema;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Stored elements keyed by the slot they hold.
#[derive(Debug, Default)]
pub struct GroupedElements<'a> {
    /// Item index → (field id → element), in insertion order
    pub items: BTreeMap<usize, IndexMap<String, &'a ContentElement>>,
    /// Scalar field id → element
    pub scalars: IndexMap<String, &'a ContentElement>,
    /// Elements whose name matched no pattern or no declared field
    pub skipped: Vec<&'a ContentElement>,
}

impl<'a> GroupedElements<'a> {
    pub fn element(&self, slot: &Slot) -> Option<&'a ContentElement> {
        match slot {
            Slot::Item { index, field } => self.items.get(index)?.get(field).copied(),
            Slot::Scalar { field } => self.scalars.get(field).copied(),
        }
    }

    /// Element at a form slot. Item slots address the `index`-th stored
    /// bucket, the same compaction the loader applies.
    pub fn element_at_position(&self, slot: &Slot) -> Option<&'a ContentElement> {
        match slot {
            Slot::Item { index, field } => self.items.values().nth(*index)?.get(field).copied(),
            Slot::Scalar { field } => self.scalars.get(field).copied(),
        }
    }

    /// Stored item indices in ascending order (may have gaps).
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.items.keys().copied()
    }

    /// Every grouped element with the slot it was decoded to.
    pub fn slots(&self) -> impl Iterator<Item = (Slot, &'a ContentElement)> + '_ {
        let scalars = self
            .scalars
            .iter()
            .map(|(field, element)| (Slot::Scalar { field: field.clone() }, *element));
        let items = self.items.iter().flat_map(|(index, fields)| {
            fields.iter().map(move |(field, element)| {
                (
                    Slot::Item {
                        index: *index,
                        field: field.clone(),
                    },
                    *element,
                )
            })
        });
        scalars.chain(items)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.scalars.is_empty()
    }
}

/// Work out which slot an element holds.
///
/// Structured tags win; otherwise scalar labels are matched exactly and item
/// names are decoded with the codec.
pub fn slot_of(element: &ContentElement, schema: &SectionSchema, codec: &NamingCodec) -> Option<Slot> {
    if let Some(tag) = &element.metadata {
        let field = schema.field(&tag.field_id)?;
        return match (tag.item_index, field.is_scalar()) {
            (Some(index), false) => Some(Slot::Item {
                index,
                field: field.id.clone(),
            }),
            (None, true) => Some(Slot::Scalar {
                field: field.id.clone(),
            }),
            _ => None,
        };
    }

    if let Some(field) = schema.scalar_field_for_name(&element.name) {
        return Some(Slot::Scalar {
            field: field.id.clone(),
        });
    }

    let decoded = codec.decode(&element.name)?;
    let field = schema.repeated_field_for_name(&decoded.field_name)?;
    Some(Slot::Item {
        index: decoded.index,
        field: field.id.clone(),
    })
}

/// Group elements by item index.
///
/// Undecodable elements are skipped and logged. Two elements mapping to the
/// same slot is a collision and aborts the load.
pub fn group_elements<'a>(
    elements: &'a [ContentElement],
    schema: &SectionSchema,
    codec: &NamingCodec,
) -> Result<GroupedElements<'a>, LoadError> {
    let mut grouped = GroupedElements::default();

    for element in elements {
        let Some(slot) = slot_of(element, schema, codec) else {
            warn!(
                "Skipping element '{}' ({}): name matches no known field",
                element.name, element.id
            );
            grouped.skipped.push(element);
            continue;
        };

        let bucket = match &slot {
            Slot::Item { index, .. } => grouped.items.entry(*index).or_default(),
            Slot::Scalar { .. } => &mut grouped.scalars,
        };

        if let Some(existing) = bucket.get(slot.field()) {
            return Err(LoadError::NameCollision {
                index: slot.index(),
                field_id: slot.field().to_string(),
                first: existing.name.clone(),
                second: element.name.clone(),
            });
        }
        bucket.insert(slot.field().to_string(), element);
    }

    debug!(
        "Grouped {} elements into {} items and {} scalars ({} skipped)",
        elements.len(),
        grouped.items.len(),
        grouped.scalars.len(),
        grouped.skipped.len()
    );

    Ok(grouped)
}
