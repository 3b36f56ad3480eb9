use crate::backend::ImageFile;
use crate::form::Slot;
use std::collections::BTreeMap;

/// Local image files waiting for the next save, keyed by the slot they fill.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingImages {
    files: BTreeMap<Slot, ImageFile>,
}

impl PendingImages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a file to `slot`, replacing any earlier one.
    pub fn insert(&mut self, slot: Slot, file: ImageFile) -> Option<ImageFile> {
        self.files.insert(slot, file)
    }

    pub fn get(&self, slot: &Slot) -> Option<&ImageFile> {
        self.files.get(slot)
    }

    pub fn remove(&mut self, slot: &Slot) -> Option<ImageFile> {
        self.files.remove(slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Slot, &ImageFile)> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Item `index` was removed: drop its files and move the ones above it
    /// down by one.
    pub fn shift_down(&mut self, index: usize) {
        let files = std::mem::take(&mut self.files);
        self.files = files
            .into_iter()
            .filter_map(|(slot, file)| match slot {
                Slot::Item { index: i, .. } if i == index => None,
                Slot::Item { index: i, field } if i > index => {
                    Some((Slot::Item { index: i - 1, field }, file))
                }
                other => Some((other, file)),
            })
            .collect();
    }
}
