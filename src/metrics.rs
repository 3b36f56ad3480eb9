//! Save metrics.
//!
//! Counters for save attempts and the backend mutations they issued.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters accumulated across the saves of one editor.
#[derive(Debug, Default)]
pub struct SaveMetrics {
    /// Save attempts that reached the backend or failed validation
    saves: AtomicUsize,

    /// Save attempts that ended in an error
    failures: AtomicUsize,

    elements_created: AtomicUsize,
    elements_updated: AtomicUsize,
    elements_deleted: AtomicUsize,

    /// Bulk translation upserts that committed
    translation_batches: AtomicUsize,

    upload_failures: AtomicUsize,
}

impl SaveMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_save(&self) {
        self.saves.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_created(&self) {
        self.elements_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_updated(&self) {
        self.elements_updated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deleted(&self) {
        self.elements_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch(&self) {
        self.translation_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upload_failure(&self) {
        self.upload_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn elements_created(&self) -> usize {
        self.elements_created.load(Ordering::Relaxed)
    }

    pub fn elements_updated(&self) -> usize {
        self.elements_updated.load(Ordering::Relaxed)
    }

    pub fn elements_deleted(&self) -> usize {
        self.elements_deleted.load(Ordering::Relaxed)
    }

    pub fn translation_batches(&self) -> usize {
        self.translation_batches.load(Ordering::Relaxed)
    }

    pub fn upload_failures(&self) -> usize {
        self.upload_failures.load(Ordering::Relaxed)
    }

    /// Snapshot of all counters.
    pub fn report(&self) -> MetricsReport {
        let saves = self.saves();
        let failures = self.failures();
        let success_rate = if saves > 0 {
            (saves.saturating_sub(failures) as f64 / saves as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            generated_at: Utc::now(),
            saves,
            failures,
            success_rate,
            elements_created: self.elements_created(),
            elements_updated: self.elements_updated(),
            elements_deleted: self.elements_deleted(),
            translation_batches: self.translation_batches(),
            upload_failures: self.upload_failures(),
        }
    }
}

/// Serializable snapshot of [`SaveMetrics`].
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub generated_at: DateTime<Utc>,
    pub saves: usize,
    pub failures: usize,

    /// Successful saves as a percentage (0-100)
    pub success_rate: f64,

    pub elements_created: usize,
    pub elements_updated: usize,
    pub elements_deleted: usize,
    pub translation_batches: usize,
    pub upload_failures: usize,
}
