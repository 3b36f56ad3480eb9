//! Error types for loading, editing and saving section content.

use crate::reconcile::SavePhase;
use crate::schema::FieldIssue;
use crate::validator::LanguageCount;
use std::fmt;
use thiserror::Error;

/// Failure talking to the content backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport-level failure (connection refused, timeout, ...).
    #[error("{operation}: request failed: {source}")]
    Request {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a non-success status.
    #[error("{operation}: backend returned {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// The response body did not have the expected shape.
    #[error("{operation}: unexpected response: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },

    /// A referenced record does not exist.
    #[error("{operation}: {kind} '{id}' not found")]
    NotFound {
        operation: &'static str,
        kind: &'static str,
        id: String,
    },

    /// The backend refused the call for another reason.
    #[error("{operation}: {message}")]
    Rejected {
        operation: &'static str,
        message: String,
    },
}

impl BackendError {
    /// Whether repeating the same request could succeed (429, 5xx, transport errors).
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Request { .. } => true,
            BackendError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Fatal conditions while turning stored elements into a form tree.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoadError {
    /// Two stored elements claim the same `(index, field)` slot.
    #[error(
        "elements '{first}' and '{second}' both map to item {index:?}, field '{field_id}'"
    )]
    NameCollision {
        index: Option<usize>,
        field_id: String,
        first: String,
        second: String,
    },
}

/// Invalid operation on a form tree.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("invalid field path '{0}'")]
    InvalidPath(String),

    #[error("language '{0}' is not part of the form")]
    UnknownLanguage(String),

    #[error("field '{0}' is not declared in the section schema")]
    UnknownField(String),

    #[error("item {index} out of range for language '{language}' ({count} items)")]
    ItemOutOfRange {
        language: String,
        index: usize,
        count: usize,
    },
}

/// Image upload failure. Reported with the save outcome, never fatal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("image upload for element '{element_id}' ({slot}) failed: {message}")]
pub struct UploadError {
    pub element_id: String,
    pub slot: String,
    pub message: String,
}

/// Why the form may not be saved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationFailure {
    /// Item counts of every active language
    pub counts: Vec<LanguageCount>,
    /// Languages whose count differs from the primary language
    pub mismatched: Vec<LanguageCount>,
    /// Schema violations
    pub issues: Vec<FieldIssue>,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.mismatched.is_empty() {
            let counts = self
                .counts
                .iter()
                .map(|c| format!("{}={}", c.language, c.count))
                .collect::<Vec<_>>()
                .join(", ");
            parts.push(format!("item counts differ across languages ({})", counts));
        }
        if !self.issues.is_empty() {
            let issues = self
                .issues
                .iter()
                .map(|i| format!("{}: {}", i.path, i.message))
                .collect::<Vec<_>>()
                .join("; ");
            parts.push(format!("invalid fields ({})", issues));
        }
        write!(f, "{}", parts.join(", "))
    }
}

/// Failure of one save attempt.
#[derive(Debug, Error)]
pub enum SaveError {
    /// Nothing was sent to the backend.
    #[error("validation failed: {0}")]
    Validation(ValidationFailure),

    /// Earlier phases may have been applied; the save can be re-run.
    #[error("{phase} failed after {committed_batches} committed translation batches: {source}")]
    Backend {
        phase: SavePhase,
        committed_batches: usize,
        #[source]
        source: BackendError,
    },

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("no active languages configured for this section")]
    NoActiveLanguages,

    /// A previous save was interrupted; reload before saving again.
    #[error("a save is already in progress")]
    SaveInProgress,
}

/// Failure of an editor operation.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Form(#[from] FormError),

    #[error(transparent)]
    Save(#[from] SaveError),
}

impl SaveError {
    pub(crate) fn backend(phase: SavePhase, committed_batches: usize) -> impl FnOnce(BackendError) -> SaveError {
        move |source| SaveError::Backend {
            phase,
            committed_batches,
            source,
        }
    }
}
