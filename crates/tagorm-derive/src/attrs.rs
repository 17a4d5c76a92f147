//! Attribute parsing for the Entity derive macro.
//!
//! Struct level: `#[orm(table = "...")]`.
//! Field level: `#[tag(key = "...", ...)]` and `#[orm(skip)]`.

use syn::{DeriveInput, Field, LitStr, Result};

/// Parsed field-level attributes.
#[derive(Default)]
pub(crate) struct FieldAttrs {
    pub skip: bool,
    /// `(tag key, raw tag)` in declaration order.
    pub tags: Vec<(String, String)>,
}

/// Extract the table name from the struct-level `#[orm(table = "...")]`.
pub(crate) fn table_name(input: &DeriveInput) -> Result<String> {
    let mut table = None;
    for attr in &input.attrs {
        if !attr.path().is_ident("orm") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let value: LitStr = meta.value()?.parse()?;
                table = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported orm attribute, expected `table = \"...\"`"))
            }
        })?;
    }

    match table {
        Some(table) if !table.is_empty() => Ok(table),
        _ => Err(syn::Error::new_spanned(
            &input.ident,
            "Entity requires #[orm(table = \"table_name\")]",
        )),
    }
}

pub(crate) fn field_attrs(field: &Field) -> Result<FieldAttrs> {
    let mut parsed = FieldAttrs::default();
    for attr in &field.attrs {
        if attr.path().is_ident("orm") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    parsed.skip = true;
                    Ok(())
                } else {
                    Err(meta.error("unsupported orm field attribute, expected `skip`"))
                }
            })?;
        } else if attr.path().is_ident("tag") {
            attr.parse_nested_meta(|meta| {
                let Some(key) = meta.path.get_ident().map(ToString::to_string) else {
                    return Err(meta.error("tag key must be a plain identifier"));
                };
                if parsed.tags.iter().any(|(k, _)| *k == key) {
                    return Err(meta.error(format!("duplicate tag key `{key}`")));
                }
                let value: LitStr = meta.value()?.parse()?;
                parsed.tags.push((key, value.value()));
                Ok(())
            })?;
        }
    }
    Ok(parsed)
}
