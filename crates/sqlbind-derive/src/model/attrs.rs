//! Attribute parsing for the Model derive macro.
//!
//! Handles struct-level and field-level `#[orm(...)]` attributes.

use syn::ext::IdentExt;
use syn::{Attribute, Result};

pub(super) const HOOK_KINDS: [&str; 4] = [
    "before_drop_table",
    "after_drop_table",
    "before_truncate_table",
    "after_truncate_table",
];

/// Struct-level attributes, merged over every `#[orm(...)]` on the type.
#[derive(Default)]
pub(super) struct StructAttr {
    pub table: Option<String>,
    pub hooks: Vec<syn::Ident>,
}

impl syn::parse::Parse for StructAttr {
    fn parse(input: syn::parse::ParseStream) -> Result<Self> {
        let mut attr = StructAttr::default();

        loop {
            if input.is_empty() {
                break;
            }

            let ident: syn::Ident = input.parse()?;
            if ident == "table" {
                let _: syn::Token![=] = input.parse()?;
                let value: syn::LitStr = input.parse()?;
                attr.table = Some(value.value());
            } else if ident == "hooks" {
                let content;
                syn::parenthesized!(content in input);
                let kinds = content.parse_terminated(syn::Ident::parse_any, syn::Token![,])?;
                for kind in kinds {
                    if !HOOK_KINDS.iter().any(|k| kind == k) {
                        return Err(syn::Error::new(
                            kind.span(),
                            format!("unknown hook `{kind}`, expected one of: {}", HOOK_KINDS.join(", ")),
                        ));
                    }
                    attr.hooks.push(kind);
                }
            } else {
                return Err(syn::Error::new(
                    ident.span(),
                    format!("unknown orm attribute `{ident}` on struct"),
                ));
            }

            if input.peek(syn::Token![,]) {
                let _: syn::Token![,] = input.parse()?;
            } else {
                break;
            }
        }

        Ok(attr)
    }
}

/// Field-level attributes.
#[derive(Default)]
pub(super) struct FieldAttr {
    pub column: Option<String>,
    pub nested: bool,
    pub skip: bool,
}

impl syn::parse::Parse for FieldAttr {
    fn parse(input: syn::parse::ParseStream) -> Result<Self> {
        let mut attr = FieldAttr::default();

        loop {
            if input.is_empty() {
                break;
            }

            let ident: syn::Ident = input.parse()?;
            if ident == "nested" {
                attr.nested = true;
            } else if ident == "skip" {
                attr.skip = true;
            } else if ident == "column" {
                let _: syn::Token![=] = input.parse()?;
                let value: syn::LitStr = input.parse()?;
                if value.value().is_empty() {
                    return Err(syn::Error::new(value.span(), "column name cannot be empty"));
                }
                attr.column = Some(value.value());
            } else {
                return Err(syn::Error::new(
                    ident.span(),
                    format!("unknown orm attribute `{ident}` on field"),
                ));
            }

            if input.peek(syn::Token![,]) {
                let _: syn::Token![,] = input.parse()?;
            } else {
                break;
            }
        }

        Ok(attr)
    }
}

/// Merge every `#[orm(...)]` on the struct.
pub(super) fn struct_attr(attrs: &[Attribute]) -> Result<StructAttr> {
    let mut merged = StructAttr::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("orm")) {
        let parsed: StructAttr = attr.parse_args()?;
        if parsed.table.is_some() {
            merged.table = parsed.table;
        }
        merged.hooks.extend(parsed.hooks);
    }
    Ok(merged)
}

/// Merge every `#[orm(...)]` on a field.
pub(super) fn field_attr(attrs: &[Attribute]) -> Result<FieldAttr> {
    let mut merged = FieldAttr::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("orm")) {
        let parsed: FieldAttr = attr.parse_args()?;
        merged.nested |= parsed.nested;
        merged.skip |= parsed.skip;
        if parsed.column.is_some() {
            merged.column = parsed.column;
        }
    }
    Ok(merged)
}
