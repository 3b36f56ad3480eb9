//! Load path: stored subsection → per-language form tree.

use crate::error::LoadError;
use crate::form::{FieldValue, FormTree, Item, LanguageForm, Slot};
use crate::grouper::{group_elements, GroupedElements};
use crate::i18n::{Language, LanguageRegistry};
use crate::model::SubSection;
use crate::naming::NamingCodec;
use crate::resolver::resolve;
use crate::schema::{build_for_registry, FieldSpec, SectionSchema, IMAGE_PLACEHOLDER};
use tracing::{debug, info};

/// Build the form tree for a stored subsection.
///
/// `None` (nothing saved yet) and a subsection without any item elements both
/// produce the default form. Stored item indices are compacted: a gap in the
/// stored data does not produce an empty item.
pub fn load_from_backend(
    payload: Option<&SubSection>,
    languages: &LanguageRegistry,
    schema: &SectionSchema,
    codec: &NamingCodec,
) -> Result<FormTree, LoadError> {
    let (_, defaults) = build_for_registry(languages, schema);

    let Some(sub_section) = payload else {
        debug!("No stored subsection, using defaults");
        return Ok(defaults);
    };

    let Some(primary) = languages.primary() else {
        return Ok(FormTree::new());
    };

    let grouped = group_elements(&sub_section.elements, schema, codec)?;
    let use_default_items = grouped.items.is_empty();

    let mut form = FormTree::new();
    for language in languages.active() {
        let mut language_form = LanguageForm::default();

        for field in schema.scalar_fields() {
            let slot = Slot::Scalar {
                field: field.id.clone(),
            };
            let value = resolve_field(&grouped, &slot, field, language, primary);
            language_form.scalars.insert(field.id.clone(), value);
        }

        if use_default_items {
            language_form.items = defaults
                .language(language.code())
                .map(|f| f.items.clone())
                .unwrap_or_default();
        } else {
            for index in grouped.indices() {
                let item: Item = schema
                    .repeated_fields()
                    .map(|field| {
                        let slot = Slot::Item {
                            index,
                            field: field.id.clone(),
                        };
                        (
                            field.id.clone(),
                            resolve_field(&grouped, &slot, field, language, primary),
                        )
                    })
                    .collect();
                language_form.items.push(item);
            }
        }

        form.insert_language(language.code(), language_form);
    }

    info!(
        "Loaded subsection '{}' ({} elements, {} items, {} languages)",
        sub_section.slug,
        sub_section.elements.len(),
        grouped.items.len(),
        languages.len()
    );

    Ok(form)
}

fn resolve_field(
    grouped: &GroupedElements<'_>,
    slot: &Slot,
    field: &FieldSpec,
    language: &Language,
    primary: &Language,
) -> FieldValue {
    let fallback = FieldValue::empty(field.value_type).to_content();
    let content = resolve(
        grouped.element(slot),
        language,
        primary,
        &fallback,
        field.is_shared(),
    );
    if content == IMAGE_PLACEHOLDER {
        return FieldValue::empty(field.value_type);
    }
    FieldValue::from_content(&content, field.value_type)
}
