//! Primary-language propagation of shared fields.
//!
//! Shared fields (URLs, link types, toggles, images) are edited in the
//! primary language and mirrored into every other active language. Edits are
//! events processed one at a time from a queue; mirrored writes go straight
//! into the tree and never re-enter the queue, so propagation cannot trigger
//! itself. Rapid edits to the same slot coalesce under a trailing-edge
//! debounce.

use crate::error::FormError;
use crate::form::{FieldPath, FieldValue, FormTree, Slot};
use crate::i18n::LanguageRegistry;
use crate::schema::SectionSchema;
use indexmap::IndexMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

/// Default trailing-edge debounce for shared-field propagation.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// One user edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEdit {
    pub path: FieldPath,
    pub value: FieldValue,
}

impl FieldEdit {
    pub fn new(path: FieldPath, value: impl Into<FieldValue>) -> Self {
        Self {
            path,
            value: value.into(),
        }
    }
}

/// Whether an edit at `path` must be mirrored to the other languages.
pub fn propagates(path: &FieldPath, schema: &SectionSchema, languages: &LanguageRegistry) -> bool {
    languages.is_primary(&path.language)
        && schema
            .field_for_slot(&path.slot)
            .map(|f| f.is_shared())
            .unwrap_or(false)
}

/// Write `value` into the same slot of every non-primary language.
///
/// Returns the number of languages written.
pub fn mirror(
    form: &mut FormTree,
    slot: &Slot,
    value: &FieldValue,
    languages: &LanguageRegistry,
) -> Result<usize, FormError> {
    let mut written = 0;
    for language in languages.secondary() {
        let target = FieldPath {
            language: language.code().to_string(),
            slot: slot.clone(),
        };
        form.set(&target, value.clone())?;
        written += 1;
    }
    Ok(written)
}

/// Set a field and, for shared fields edited in the primary language, mirror
/// it immediately (one propagation cycle, no debounce).
pub fn sync_shared_field(
    form: &mut FormTree,
    path: &FieldPath,
    value: FieldValue,
    schema: &SectionSchema,
    languages: &LanguageRegistry,
) -> Result<usize, FormError> {
    if schema.field_for_slot(&path.slot).is_none() {
        return Err(FormError::UnknownField(path.slot.field().to_string()));
    }
    form.set(path, value.clone())?;
    if !propagates(path, schema, languages) {
        return Ok(0);
    }
    mirror(form, &path.slot, &value, languages)
}

#[derive(Debug, Clone)]
struct PendingPropagation {
    value: FieldValue,
    due: Instant,
}

/// Queue-driven propagation engine with per-slot debounce.
#[derive(Debug)]
pub struct SyncEngine {
    schema: SectionSchema,
    languages: LanguageRegistry,
    debounce: Duration,
    queue: VecDeque<FieldEdit>,
    pending: IndexMap<Slot, PendingPropagation>,
}

impl SyncEngine {
    pub fn new(schema: SectionSchema, languages: LanguageRegistry) -> Self {
        Self {
            schema,
            languages,
            debounce: DEFAULT_DEBOUNCE,
            queue: VecDeque::new(),
            pending: IndexMap::new(),
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Enqueue an edit for the next `process` call.
    pub fn push(&mut self, edit: FieldEdit) {
        self.queue.push_back(edit);
    }

    /// Apply queued edits one at a time.
    ///
    /// Each edit is written to its own slot immediately. Shared primary edits
    /// schedule a propagation `debounce` after `now`, replacing any pending
    /// propagation of the same slot. A failing edit is dropped and the rest of
    /// the queue still runs; the first error is returned.
    pub fn process(&mut self, form: &mut FormTree, now: Instant) -> Result<usize, FormError> {
        let mut processed = 0;
        let mut first_error = None;

        while let Some(edit) = self.queue.pop_front() {
            match self.apply(form, edit, now) {
                Ok(()) => processed += 1,
                Err(e) => {
                    warn!("Dropping edit: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(processed),
        }
    }

    fn apply(&mut self, form: &mut FormTree, edit: FieldEdit, now: Instant) -> Result<(), FormError> {
        if self.schema.field_for_slot(&edit.path.slot).is_none() {
            return Err(FormError::UnknownField(edit.path.slot.field().to_string()));
        }
        form.set(&edit.path, edit.value.clone())?;

        if propagates(&edit.path, &self.schema, &self.languages) {
            self.pending.insert(
                edit.path.slot,
                PendingPropagation {
                    value: edit.value,
                    due: now + self.debounce,
                },
            );
        }
        Ok(())
    }

    /// Earliest pending propagation deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.due).min()
    }

    /// Drop every queued edit and pending propagation.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.pending.clear();
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty() || !self.queue.is_empty()
    }

    /// Propagate every slot whose debounce has elapsed at `now`.
    ///
    /// Returns the number of slots propagated.
    pub fn flush_due(&mut self, form: &mut FormTree, now: Instant) -> usize {
        let due: Vec<Slot> = self
            .pending
            .iter()
            .filter(|(_, p)| p.due <= now)
            .map(|(slot, _)| slot.clone())
            .collect();

        let mut flushed = 0;
        for slot in due {
            if let Some(pending) = self.pending.shift_remove(&slot) {
                self.propagate(form, &slot, &pending.value);
                flushed += 1;
            }
        }
        flushed
    }

    /// Process the queue and propagate everything now, ignoring the debounce.
    pub fn flush_all(&mut self, form: &mut FormTree) -> usize {
        if let Err(e) = self.process(form, Instant::now()) {
            warn!("Edit failed during flush: {}", e);
        }
        let pending: Vec<(Slot, PendingPropagation)> = self.pending.drain(..).collect();
        for (slot, propagation) in &pending {
            self.propagate(form, slot, &propagation.value);
        }
        pending.len()
    }

    /// Drop queued edits and pending propagations for item `index` and shift
    /// the ones above it down, after the item was removed from the form.
    pub fn item_removed(&mut self, index: usize) {
        self.queue.retain(|edit| edit.path.slot.index() != Some(index));
        for edit in self.queue.iter_mut() {
            if let Slot::Item { index: i, .. } = &mut edit.path.slot {
                if *i > index {
                    *i -= 1;
                }
            }
        }

        self.pending = self
            .pending
            .drain(..)
            .filter_map(|(slot, pending)| match slot {
                Slot::Item { index: i, .. } if i == index => None,
                Slot::Item { index: i, field } if i > index => {
                    Some((Slot::Item { index: i - 1, field }, pending))
                }
                other => Some((other, pending)),
            })
            .collect();
    }

    fn propagate(&self, form: &mut FormTree, slot: &Slot, value: &FieldValue) {
        match mirror(form, slot, value, &self.languages) {
            Ok(written) => debug!("Propagated {} to {} languages", slot, written),
            // The item may have been removed while the propagation was pending
            Err(e) => warn!("Skipping propagation of {}: {}", slot, e),
        }
    }
}

/// Drive a [`SyncEngine`] from a channel of edits until the sender closes.
///
/// Pending propagations are flushed when the channel closes. Returns the
/// engine so the caller can reuse it.
pub async fn run_sync_loop(
    mut engine: SyncEngine,
    form: Arc<Mutex<FormTree>>,
    mut edits: mpsc::UnboundedReceiver<FieldEdit>,
) -> SyncEngine {
    loop {
        let deadline = engine.next_deadline();
        tokio::select! {
            edit = edits.recv() => match edit {
                Some(edit) => {
                    engine.push(edit);
                    let mut form = form.lock().await;
                    if let Err(e) = engine.process(&mut form, Instant::now()) {
                        warn!("Edit rejected: {}", e);
                    }
                }
                None => {
                    let mut form = form.lock().await;
                    engine.flush_all(&mut form);
                    break;
                }
            },
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                let mut form = form.lock().await;
                engine.flush_due(&mut form, Instant::now());
            }
        }
    }
    engine
}
