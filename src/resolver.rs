//! Resolve the displayed content of an element for one language.
//!
//! Resolution order is strict: active translation, then the element's
//! default content, then the caller's fallback.

use crate::i18n::Language;
use crate::model::ContentElement;

/// Resolve `element` for `language`.
///
/// With `force_primary`, a non-primary language reads the primary language's
/// translation instead of its own. Shared fields use this so every language
/// shows the canonical value.
pub fn resolve(
    element: Option<&ContentElement>,
    language: &Language,
    primary: &Language,
    fallback: &str,
    force_primary: bool,
) -> String {
    let Some(element) = element else {
        return fallback.to_string();
    };

    let lookup = if force_primary && language.id != primary.id {
        primary
    } else {
        language
    };

    if let Some(translation) = element.translation_for(lookup) {
        return translation.content.clone();
    }

    element
        .default_content()
        .map(str::to_string)
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentTranslation, ElementType, LanguageRef};

    fn en() -> Language {
        Language::new("lang-en", "en")
    }

    fn ar() -> Language {
        Language::new("lang-ar", "ar")
    }

    fn translation(language: &str, content: &str) -> ContentTranslation {
        ContentTranslation {
            id: format!("tr-{}", language),
            content: content.to_string(),
            language: LanguageRef::Id(language.to_string()),
            content_element: "el-1".to_string(),
            is_active: true,
        }
    }

    fn element(translations: Vec<ContentTranslation>, default_content: Option<&str>) -> ContentElement {
        ContentElement {
            id: "el-1".to_string(),
            name: "Item 1 - Title".to_string(),
            element_type: ElementType::Text,
            order: 0,
            parent: "sub-1".to_string(),
            default_content: default_content.map(str::to_string),
            metadata: None,
            image_url: None,
            translations,
        }
    }

    // ==================== Three-Tier Tests ====================

    #[test]
    fn test_translation_present_default_present() {
        let el = element(vec![translation("lang-en", "Hello")], Some("Default"));
        assert_eq!(resolve(Some(&el), &en(), &en(), "fb", false), "Hello");
    }

    #[test]
    fn test_translation_present_default_absent() {
        let el = element(vec![translation("lang-en", "Hello")], None);
        assert_eq!(resolve(Some(&el), &en(), &en(), "fb", false), "Hello");
    }

    #[test]
    fn test_translation_absent_default_present() {
        let el = element(vec![translation("lang-ar", "مرحبا")], Some("Default"));
        assert_eq!(resolve(Some(&el), &en(), &en(), "fb", false), "Default");
    }

    #[test]
    fn test_translation_absent_default_absent() {
        let el = element(vec![], None);
        assert_eq!(resolve(Some(&el), &en(), &en(), "fb", false), "fb");

        let empty_default = element(vec![], Some(""));
        assert_eq!(resolve(Some(&empty_default), &en(), &en(), "fb", false), "fb");
    }

    #[test]
    fn test_missing_element_returns_fallback() {
        assert_eq!(resolve(None, &ar(), &en(), "fallback", true), "fallback");
    }

    #[test]
    fn test_empty_translation_content_wins_over_default() {
        let el = element(vec![translation("lang-en", "")], Some("Default"));
        assert_eq!(resolve(Some(&el), &en(), &en(), "fb", false), "");
    }

    // ==================== Force Primary Tests ====================

    #[test]
    fn test_force_primary_reads_primary_translation() {
        let el = element(
            vec![translation("lang-en", "https://x"), translation("lang-ar", "https://old")],
            None,
        );
        assert_eq!(resolve(Some(&el), &ar(), &en(), "", true), "https://x");
        assert_eq!(resolve(Some(&el), &ar(), &en(), "", false), "https://old");
    }

    #[test]
    fn test_force_primary_on_primary_language_is_plain_lookup() {
        let el = element(vec![translation("lang-en", "https://x")], None);
        assert_eq!(resolve(Some(&el), &en(), &en(), "", true), "https://x");
    }

    #[test]
    fn test_force_primary_falls_back_to_default() {
        let el = element(vec![translation("lang-ar", "https://ar")], Some("https://default"));
        assert_eq!(resolve(Some(&el), &ar(), &en(), "", true), "https://default");
    }

    #[test]
    fn test_inactive_translation_is_ignored() {
        let mut inactive = translation("lang-en", "Hidden");
        inactive.is_active = false;
        let el = element(vec![inactive], Some("Default"));
        assert_eq!(resolve(Some(&el), &en(), &en(), "fb", false), "Default");
    }
}
