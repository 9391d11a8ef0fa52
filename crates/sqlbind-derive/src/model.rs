//! Model derive macro implementation
//!
//! Generates three impls for a struct with named fields:
//!
//! - `Model`: a `TableModel` descriptor with one setter per column, the nested
//!   record fields, the default table and the hook table
//! - `ScanRow`: binds one row through the descriptor
//! - `Destination`: lets the struct itself be a single-row destination

mod attrs;

use crate::common::syn_types::option_inner;
use heck::{ToSnakeCase, ToUpperCamelCase};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use std::collections::HashSet;
use syn::ext::IdentExt;
use syn::{Data, DeriveInput, Fields, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Model cannot be derived for generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Model can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Model can only be derived for structs",
            ));
        }
    };

    let struct_attr = attrs::struct_attr(&input.attrs)?;

    let mut seen = HashSet::new();
    let mut steps = Vec::new();

    for field in fields {
        let attr = attrs::field_attr(&field.attrs)?;
        if attr.skip {
            continue;
        }

        let Some(field_ident) = field.ident.as_ref() else {
            continue;
        };
        let column = attr
            .column
            .clone()
            .unwrap_or_else(|| field_ident.unraw().to_string().to_snake_case());

        if !seen.insert(column.clone()) {
            return Err(syn::Error::new_spanned(
                field,
                format!("duplicate column `{column}`"),
            ));
        }

        let field_ty = &field.ty;
        let fn_ident = format_ident!("__sqlbind_{}", field_ident.unraw());

        if attr.nested {
            match option_inner(field_ty) {
                Some(inner) => steps.push(quote! {
                    .nested_optional::<#inner>(#column, {
                        #[allow(non_snake_case)]
                        fn #fn_ident(m: &mut #name) -> &mut #field_ty {
                            &mut m.#field_ident
                        }
                        #fn_ident
                    })
                }),
                None => steps.push(quote! {
                    .nested_value::<#field_ty>(#column, {
                        #[allow(non_snake_case)]
                        fn #fn_ident(m: &mut #name) -> &mut #field_ty {
                            &mut m.#field_ident
                        }
                        #fn_ident
                    })
                }),
            }
        } else {
            steps.push(quote! {
                .column(#column, {
                    #[allow(non_snake_case)]
                    fn #fn_ident(
                        m: &mut #name,
                        column: &str,
                        value: &::sqlbind::value::Value,
                    ) -> ::sqlbind::error::OrmResult<()> {
                        ::sqlbind::model::set_field(&mut m.#field_ident, column, value)
                    }
                    #fn_ident
                })
            });
        }
    }

    let table = struct_attr.table.as_ref().map(|t| quote! { .table(#t) });

    let hooks = if struct_attr.hooks.is_empty() {
        None
    } else {
        let setters = struct_attr.hooks.iter().map(|kind| {
            let hook_trait = format_ident!("{}Hook", kind.to_string().to_upper_camel_case());
            quote! {
                .#kind(<#name as ::sqlbind::hooks::#hook_trait>::#kind)
            }
        });
        Some(quote! {
            .hooks(::sqlbind::hooks::HookTable::new() #(#setters)*)
        })
    };

    let type_name = name.to_string();

    Ok(quote! {
        impl ::sqlbind::model::Model for #name {
            fn build_table_model() -> ::sqlbind::model::TableModel<Self> {
                ::sqlbind::model::TableModel::<#name>::builder(#type_name)
                    #table
                    #(#steps)*
                    #hooks
                    .build()
            }
        }

        impl ::sqlbind::binder::ScanRow for #name {
            const SHAPE: ::sqlbind::binder::Shape = ::sqlbind::binder::Shape::Record;

            fn scan_row(
                &mut self,
                row: &::sqlbind::binder::RowRef<'_>,
            ) -> ::sqlbind::error::OrmResult<()> {
                ::sqlbind::binder::bind_record(self, row)
            }
        }

        impl ::sqlbind::binder::Destination for #name {
            fn shape(&self) -> ::sqlbind::binder::Shape {
                ::sqlbind::binder::Shape::Record
            }

            fn bind_row(
                &mut self,
                row: &::sqlbind::binder::RowRef<'_>,
            ) -> ::sqlbind::error::OrmResult<()> {
                ::sqlbind::binder::bind_record(self, row)
            }
        }
    })
}
