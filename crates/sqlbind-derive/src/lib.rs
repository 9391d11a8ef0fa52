//! Derive macros for sqlbind
//!
//! Provides `#[derive(Model)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod common;
mod model;

/// Derive `Model`, `ScanRow` and `Destination` for a struct with named fields.
///
/// # Example
///
/// ```ignore
/// use sqlbind::Model;
///
/// #[derive(Default, Model)]
/// #[orm(table = "users", hooks(before_drop_table))]
/// struct User {
///     id: i64,
///     #[orm(column = "email_address")]
///     email: Option<String>,
///     #[orm(nested)]
///     profile: Option<Profile>,
///     #[orm(skip)]
///     cache: Vec<u8>,
/// }
/// ```
///
/// # Attributes
///
/// - `#[orm(table = "name")]` - Default target table for DROP / TRUNCATE
/// - `#[orm(hooks(before_drop_table, after_drop_table, before_truncate_table, after_truncate_table))]`
///   - Register the matching hook trait impls of the type
/// - `#[orm(column = "name")]` - Map field to a different column name
/// - `#[orm(nested)]` - Field is itself a `Model`, filled from `field__column` cells
/// - `#[orm(skip)]` - Field is never bound and keeps its default
#[proc_macro_derive(Model, attributes(orm))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    model::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
