//! Table models: cached column-to-field descriptors for destination types.
//!
//! A [`TableModel`] is built once per type through [`Model::build_table_model`]
//! (normally generated by `#[derive(Model)]`) and memoized process-wide in a
//! type-keyed registry. Later binds only read it.

use crate::error::{OrmError, OrmResult};
use crate::hooks::HookTable;
use crate::value::{FromValue, Value};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{OnceLock, PoisonError, RwLock};

/// Separator between a nested field's name and its sub-columns (`sub__str`).
pub const NESTED_SEPARATOR: &str = "__";

/// A struct that can receive rows column by column.
pub trait Model: Default + Send + Sync + 'static {
    /// Build the descriptor. Called at most a handful of times per process; use
    /// [`Model::table_model`] to get the cached copy.
    fn build_table_model() -> TableModel<Self>;

    /// Cached descriptor for this type.
    fn table_model() -> &'static TableModel<Self> {
        describe::<Self>()
    }
}

/// Assigns one raw cell to a field.
pub type Setter<T> = fn(&mut T, &str, &Value) -> OrmResult<()>;

/// `(column, value)` pairs with the nested prefix already stripped.
pub type Cells<'a> = [(&'a str, &'a Value)];

type NestedBind<T> = Box<dyn Fn(&mut T, &Cells<'_>) -> OrmResult<()> + Send + Sync>;

/// How a nested record field is materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nesting {
    /// `Option<N>`: allocated only when at least one sub-column is non-null.
    Optional,
    /// `N`: always present, sub-columns assigned when selected.
    Value,
}

struct ColumnMapping<T> {
    name: &'static str,
    set: Setter<T>,
}

struct NestedMapping<T> {
    field: &'static str,
    prefix: String,
    nesting: Nesting,
    has_column: fn(&str) -> bool,
    bind: NestedBind<T>,
}

/// Immutable column descriptor for `T`.
pub struct TableModel<T> {
    type_name: &'static str,
    table: Option<&'static str>,
    columns: Vec<ColumnMapping<T>>,
    index: HashMap<&'static str, usize>,
    nested: Vec<NestedMapping<T>>,
    hooks: HookTable,
}

impl<T> fmt::Debug for TableModel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableModel")
            .field("type_name", &self.type_name)
            .field("table", &self.table)
            .field("columns", &self.columns.iter().map(|c| c.name).collect::<Vec<_>>())
            .field(
                "nested",
                &self
                    .nested
                    .iter()
                    .map(|n| (n.field, n.nesting))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<T: Model> TableModel<T> {
    /// Start a descriptor for `T`, reported in errors as `type_name`.
    pub fn builder(type_name: &'static str) -> TableModelBuilder<T> {
        TableModelBuilder {
            model: TableModel {
                type_name,
                table: None,
                columns: Vec::new(),
                index: HashMap::new(),
                nested: Vec::new(),
                hooks: HookTable::new(),
            },
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn table(&self) -> Option<&'static str> {
        self.table
    }

    pub fn hooks(&self) -> &HookTable {
        &self.hooks
    }

    /// Direct column names, in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.name)
    }

    /// Whether `column` maps to a field, directly or through a nested record.
    pub fn has_column(&self, column: &str) -> bool {
        if self.index.contains_key(column) {
            return true;
        }
        self.nested.iter().any(|n| {
            column
                .strip_prefix(n.prefix.as_str())
                .is_some_and(|rest| (n.has_column)(rest))
        })
    }

    fn route<'c>(&self, column: &'c str) -> Option<Route<'c>> {
        if let Some(&i) = self.index.get(column) {
            return Some(Route::Direct(i));
        }
        self.nested.iter().enumerate().find_map(|(i, n)| {
            let rest = column.strip_prefix(n.prefix.as_str())?;
            (n.has_column)(rest).then_some(Route::Nested(i, rest))
        })
    }

    /// Assign every cell to its field.
    ///
    /// A cell without a mapping fails with [`OrmError::UnknownColumn`]; nothing is
    /// silently dropped.
    pub fn bind_cells(&self, target: &mut T, cells: &Cells<'_>) -> OrmResult<()> {
        let mut grouped: Vec<Vec<(&str, &Value)>> = vec![Vec::new(); self.nested.len()];
        for &(column, value) in cells {
            match self.route(column) {
                Some(Route::Direct(i)) => (self.columns[i].set)(target, column, value)?,
                Some(Route::Nested(i, rest)) => grouped[i].push((rest, value)),
                None => return Err(OrmError::unknown_column(column, self.type_name)),
            }
        }
        for (nested, cells) in self.nested.iter().zip(&grouped) {
            if !cells.is_empty() {
                (nested.bind)(target, cells)?;
            }
        }
        Ok(())
    }

    /// Bind one row given as parallel column and value slices.
    pub fn bind_row(&self, target: &mut T, columns: &[String], values: &[Value]) -> OrmResult<()> {
        let cells: Vec<(&str, &Value)> = columns
            .iter()
            .map(String::as_str)
            .zip(values.iter())
            .collect();
        self.bind_cells(target, &cells)
    }
}

enum Route<'c> {
    Direct(usize),
    Nested(usize, &'c str),
}

/// Incremental constructor for [`TableModel`].
pub struct TableModelBuilder<T> {
    model: TableModel<T>,
}

impl<T: Model> TableModelBuilder<T> {
    pub fn table(mut self, name: &'static str) -> Self {
        self.model.table = Some(name);
        self
    }

    /// Map `name` to a field through `set`. A later mapping for the same name wins.
    pub fn column(mut self, name: &'static str, set: Setter<T>) -> Self {
        let idx = self.model.columns.len();
        self.model.columns.push(ColumnMapping { name, set });
        self.model.index.insert(name, idx);
        self
    }

    /// Map an `Option<N>` field whose columns are prefixed with `field__`.
    pub fn nested_optional<N: Model>(
        self,
        field: &'static str,
        access: fn(&mut T) -> &mut Option<N>,
    ) -> Self {
        let bind: NestedBind<T> = Box::new(move |target, cells| {
            if cells.iter().all(|(_, v)| v.is_null()) {
                return Ok(());
            }
            let inner = access(target).get_or_insert_with(N::default);
            N::table_model().bind_cells(inner, cells)
        });
        self.push_nested::<N>(field, Nesting::Optional, bind)
    }

    /// Map an always-present `N` field whose columns are prefixed with `field__`.
    pub fn nested_value<N: Model>(self, field: &'static str, access: fn(&mut T) -> &mut N) -> Self {
        let bind: NestedBind<T> =
            Box::new(move |target, cells| N::table_model().bind_cells(access(target), cells));
        self.push_nested::<N>(field, Nesting::Value, bind)
    }

    fn push_nested<N: Model>(mut self, field: &'static str, nesting: Nesting, bind: NestedBind<T>) -> Self {
        self.model.nested.push(NestedMapping {
            field,
            prefix: format!("{field}{NESTED_SEPARATOR}"),
            nesting,
            has_column: has_column_of::<N>,
            bind,
        });
        self
    }

    pub fn hooks(mut self, hooks: HookTable) -> Self {
        self.model.hooks = hooks;
        self
    }

    pub fn build(self) -> TableModel<T> {
        tracing::trace!(
            target: "sqlbind.model",
            model = self.model.type_name,
            columns = self.model.columns.len(),
            nested = self.model.nested.len(),
            "built table model"
        );
        self.model
    }
}

fn has_column_of<N: Model>(column: &str) -> bool {
    N::table_model().has_column(column)
}

/// Assign a cell to a field of any [`FromValue`] type. Used by generated setters.
pub fn set_field<F: FromValue>(field: &mut F, column: &str, value: &Value) -> OrmResult<()> {
    *field = F::from_value(column, value)?;
    Ok(())
}

type Registry = RwLock<HashMap<TypeId, &'static (dyn Any + Send + Sync)>>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Return the cached descriptor for `T`, building it on first use.
///
/// Two callers racing on an uncached type may both build; the first insert wins and
/// the other copy is dropped. Both are equivalent.
pub fn describe<T: Model>() -> &'static TableModel<T> {
    let id = TypeId::of::<T>();

    let cached = registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&id)
        .copied();
    if let Some(model) = cached.and_then(|m| m.downcast_ref::<TableModel<T>>()) {
        return model;
    }

    // Built outside the lock: construction may describe nested types.
    let built = T::build_table_model();

    let mut map = registry().write().unwrap_or_else(PoisonError::into_inner);
    let stored: &'static (dyn Any + Send + Sync) = *map.entry(id).or_insert_with(|| {
        let leaked: &'static TableModel<T> = Box::leak(Box::new(built));
        leaked as &'static (dyn Any + Send + Sync)
    });
    drop(map);

    match stored.downcast_ref::<TableModel<T>>() {
        Some(model) => model,
        None => Box::leak(Box::new(T::build_table_model())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default, PartialEq)]
    struct Sub {
        str: String,
    }

    impl Model for Sub {
        fn build_table_model() -> TableModel<Self> {
            TableModel::<Self>::builder("Sub")
                .column("str", |m, c, v| set_field(&mut m.str, c, v))
                .build()
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Outer {
        num: i64,
        sub: Option<Sub>,
        always: Sub,
    }

    impl Model for Outer {
        fn build_table_model() -> TableModel<Self> {
            TableModel::<Self>::builder("Outer")
                .table("outers")
                .column("num", |m, c, v| set_field(&mut m.num, c, v))
                .nested_optional::<Sub>("sub", |m| &mut m.sub)
                .nested_value::<Sub>("always", |m| &mut m.always)
                .build()
        }
    }

    static BUILDS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Default)]
    struct Counted;

    impl Model for Counted {
        fn build_table_model() -> TableModel<Self> {
            BUILDS.fetch_add(1, Ordering::SeqCst);
            TableModel::<Self>::builder("Counted").build()
        }
    }

    fn bind(cells: &[(&str, Value)]) -> OrmResult<Outer> {
        let cells: Vec<(&str, &Value)> = cells.iter().map(|(c, v)| (*c, v)).collect();
        let mut out = Outer::default();
        Outer::table_model().bind_cells(&mut out, &cells)?;
        Ok(out)
    }

    #[test]
    fn describe_is_memoized() {
        let first: *const TableModel<Counted> = Counted::table_model();
        let second: *const TableModel<Counted> = Counted::table_model();
        assert_eq!(first, second);
        assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn describe_is_safe_under_concurrent_first_use() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| Outer::table_model() as *const TableModel<Outer> as usize))
            .collect();
        let ptrs: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ptrs.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn has_column_walks_nested_prefixes() {
        let model = Outer::table_model();
        assert!(model.has_column("num"));
        assert!(model.has_column("sub__str"));
        assert!(!model.has_column("sub__missing"));
        assert!(!model.has_column("str"));
        assert_eq!(model.table(), Some("outers"));
    }

    #[test]
    fn optional_nested_is_allocated_only_with_data() {
        let out = bind(&[("num", Value::Int(10)), ("sub__str", Value::Text("hello".into()))]).unwrap();
        assert_eq!(out.num, 10);
        assert_eq!(out.sub, Some(Sub { str: "hello".into() }));

        let absent = bind(&[("num", Value::Int(10))]).unwrap();
        assert_eq!(absent.sub, None);

        let null = bind(&[("num", Value::Int(10)), ("sub__str", Value::Null)]).unwrap();
        assert_eq!(null.sub, None);
    }

    #[test]
    fn value_nested_is_always_present() {
        let out = bind(&[("always__str", Value::Text("x".into()))]).unwrap();
        assert_eq!(out.always.str, "x");
        let zero = bind(&[("always__str", Value::Null)]).unwrap();
        assert_eq!(zero.always, Sub::default());
    }

    #[test]
    fn unknown_column_names_column_and_type() {
        let err = bind(&[("num", Value::Int(1)), ("bogus", Value::Int(2))]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "sqlbind: Outer does not have column \"bogus\""
        );
    }
}
