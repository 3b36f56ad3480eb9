//! Content languages.
//!
//! # Architecture
//!
//! - `language`: the backend's language record
//! - `registry`: the ordered active-language set of one editor, with its
//!   primary language
//!
//! # Example
//!
//! ```rust,ignore
//! use section_sync::i18n::{Language, LanguageRegistry};
//!
//! let records = vec![Language::new("lang-en", "en"), Language::new("lang-ar", "ar")];
//! let registry = LanguageRegistry::from_records(&records, &["lang-en".into(), "lang-ar".into()]);
//! assert_eq!(registry.primary().unwrap().code(), "en");
//! ```

mod language;
mod registry;

pub use language::Language;
pub use registry::LanguageRegistry;
