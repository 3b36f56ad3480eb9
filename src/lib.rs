//! Reconciliation between multi-language section editors and a
//! `SubSection → ContentElement → ContentTranslation` content backend.
//!
//! Load path: stored subsection → [`grouper`] → [`resolver`] → [`form::FormTree`].
//! Edit path: [`sync::SyncEngine`] keeps shared fields equal across languages
//! and [`validator::CountValidator`] keeps item counts equal. Save path:
//! [`reconcile::SaveReconciler`] turns the form back into element and
//! translation mutations. [`editor::SectionEditor`] ties the three together.

pub mod backend;
pub mod config;
pub mod editor;
pub mod error;
pub mod form;
pub mod grouper;
pub mod i18n;
pub mod loader;
pub mod metrics;
pub mod model;
pub mod naming;
pub mod reconcile;
pub mod resolver;
pub mod retry;
pub mod schema;
pub mod sync;
pub mod validator;
