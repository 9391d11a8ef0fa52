//! Copies cursor rows into caller-supplied destinations.
//!
//! Every destination reports a [`Shape`] once per bind call. Single-row shapes read
//! the first row and report [`OrmError::NoRows`] when there is none; multi-row shapes
//! drain the cursor and accept zero rows.
//!
//! | destination                          | shape                |
//! |--------------------------------------|----------------------|
//! | `i64`, `String`, `Option<T>`, ...    | `Scalar`             |
//! | `HashMap<String, Value>`             | `GenericMap`         |
//! | `#[derive(Model)]` struct            | `Record`             |
//! | `Vec<_>` of any of the above         | `SliceOf*`           |
//! | `(&mut Vec<A>, &mut Vec<B>, ...)`    | `MultiScalarColumns` |
//! | `()`                                 | `Nil` (always fails) |

use crate::conn::Cursor;
use crate::ctx::QueryCtx;
use crate::error::{OrmError, OrmResult};
use crate::model::Model;
use crate::value::{FromValue, Json, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// Destination classification, resolved once per bind call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Nil,
    Scalar,
    SliceOfScalar,
    GenericMap,
    SliceOfGenericMap,
    Record,
    SliceOfRecord,
    MultiScalarColumns,
}

impl Shape {
    /// Whether the shape consumes every row rather than exactly one.
    pub fn is_multi_row(self) -> bool {
        matches!(
            self,
            Shape::SliceOfScalar
                | Shape::SliceOfGenericMap
                | Shape::SliceOfRecord
                | Shape::MultiScalarColumns
        )
    }

    /// Shape of a `Vec` whose elements have this shape.
    pub fn slice_of(self) -> Shape {
        match self {
            Shape::Scalar => Shape::SliceOfScalar,
            Shape::GenericMap => Shape::SliceOfGenericMap,
            Shape::Record => Shape::SliceOfRecord,
            _ => Shape::Nil,
        }
    }
}

/// One cursor position: column names and values side by side.
#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> RowRef<'a> {
    pub fn new(columns: &'a [String], values: &'a [Value]) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &'a [String] {
        self.columns
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Value)> + use<'a> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }

    /// The row's only cell; scalars accept nothing else.
    pub fn single(&self) -> OrmResult<(&'a str, &'a Value)> {
        match (self.columns, self.values) {
            ([column], [value]) => Ok((column.as_str(), value)),
            _ => Err(OrmError::ColumnCount {
                columns: self.columns.len(),
                destinations: 1,
            }),
        }
    }

    /// A one-column view of column `i`.
    pub fn column(&self, i: usize) -> OrmResult<RowRef<'a>> {
        match (self.columns.get(i..=i), self.values.get(i..=i)) {
            (Some(columns), Some(values)) => Ok(RowRef { columns, values }),
            _ => Err(OrmError::ColumnCount {
                columns: self.columns.len(),
                destinations: i + 1,
            }),
        }
    }
}

/// A value that can be filled from one row. Element type of sequence destinations.
pub trait ScanRow: Send {
    /// `Scalar`, `GenericMap` or `Record`.
    const SHAPE: Shape;

    fn scan_row(&mut self, row: &RowRef<'_>) -> OrmResult<()>;
}

/// Anything a query result can be bound into.
pub trait Destination: Send {
    fn shape(&self) -> Shape;

    /// Called once with the selected columns before any row is bound.
    fn begin(&mut self, columns: &[String]) -> OrmResult<()> {
        let _ = columns;
        Ok(())
    }

    fn bind_row(&mut self, row: &RowRef<'_>) -> OrmResult<()>;
}

impl<D: Destination + ?Sized> Destination for &mut D {
    fn shape(&self) -> Shape {
        (**self).shape()
    }

    fn begin(&mut self, columns: &[String]) -> OrmResult<()> {
        (**self).begin(columns)
    }

    fn bind_row(&mut self, row: &RowRef<'_>) -> OrmResult<()> {
        (**self).bind_row(row)
    }
}

/// The absent destination.
impl Destination for () {
    fn shape(&self) -> Shape {
        Shape::Nil
    }

    fn bind_row(&mut self, _row: &RowRef<'_>) -> OrmResult<()> {
        Err(OrmError::NilModel)
    }
}

/// Sequence destinations grow by one element per row. Existing contents are cleared
/// when binding starts.
impl<T: ScanRow + Default> Destination for Vec<T> {
    fn shape(&self) -> Shape {
        T::SHAPE.slice_of()
    }

    fn begin(&mut self, _columns: &[String]) -> OrmResult<()> {
        self.clear();
        Ok(())
    }

    fn bind_row(&mut self, row: &RowRef<'_>) -> OrmResult<()> {
        let mut item = T::default();
        item.scan_row(row)?;
        self.push(item);
        Ok(())
    }
}

macro_rules! single_row_destination {
    () => {
        fn shape(&self) -> Shape {
            <Self as ScanRow>::SHAPE
        }

        fn bind_row(&mut self, row: &RowRef<'_>) -> OrmResult<()> {
            <Self as ScanRow>::scan_row(self, row)
        }
    };
}

macro_rules! scalar_destination {
    ($($t:ty),* $(,)?) => {$(
        impl ScanRow for $t {
            const SHAPE: Shape = Shape::Scalar;

            fn scan_row(&mut self, row: &RowRef<'_>) -> OrmResult<()> {
                let (column, value) = row.single()?;
                *self = <$t as FromValue>::from_value(column, value)?;
                Ok(())
            }
        }

        impl Destination for $t {
            single_row_destination!();
        }
    )*};
}

scalar_destination!(
    i8,
    i16,
    i32,
    i64,
    isize,
    u8,
    u16,
    u32,
    u64,
    usize,
    f32,
    f64,
    bool,
    String,
    Value,
    serde_json::Value,
    uuid::Uuid,
    NaiveDate,
    NaiveTime,
    NaiveDateTime,
    DateTime<Utc>,
);

/// `NULL` leaves the option unset.
impl<T: FromValue + Send> ScanRow for Option<T> {
    const SHAPE: Shape = Shape::Scalar;

    fn scan_row(&mut self, row: &RowRef<'_>) -> OrmResult<()> {
        let (column, value) = row.single()?;
        *self = Option::<T>::from_value(column, value)?;
        Ok(())
    }
}

impl<T: FromValue + Send> Destination for Option<T> {
    single_row_destination!();
}

impl<T: DeserializeOwned + Default + Send> ScanRow for Json<T> {
    const SHAPE: Shape = Shape::Scalar;

    fn scan_row(&mut self, row: &RowRef<'_>) -> OrmResult<()> {
        let (column, value) = row.single()?;
        *self = Json::<T>::from_value(column, value)?;
        Ok(())
    }
}

impl<T: DeserializeOwned + Default + Send> Destination for Json<T> {
    single_row_destination!();
}

/// One entry per column, keyed by column name, holding the driver's native value.
impl ScanRow for HashMap<String, Value> {
    const SHAPE: Shape = Shape::GenericMap;

    fn scan_row(&mut self, row: &RowRef<'_>) -> OrmResult<()> {
        self.clear();
        self.extend(row.iter().map(|(c, v)| (c.to_string(), v.clone())));
        Ok(())
    }
}

impl Destination for HashMap<String, Value> {
    single_row_destination!();
}

macro_rules! multi_column_destination {
    ($count:expr; $($name:ident : $idx:tt),+) => {
        /// Column `i` of every row goes to sequence `i`.
        impl<$($name: ScanRow + Default),+> Destination for ($(&mut Vec<$name>,)+) {
            fn shape(&self) -> Shape {
                Shape::MultiScalarColumns
            }

            fn begin(&mut self, columns: &[String]) -> OrmResult<()> {
                if columns.len() != $count {
                    return Err(OrmError::ColumnCount {
                        columns: columns.len(),
                        destinations: $count,
                    });
                }
                $( self.$idx.clear(); )+
                Ok(())
            }

            fn bind_row(&mut self, row: &RowRef<'_>) -> OrmResult<()> {
                $(
                    let mut item = <$name>::default();
                    item.scan_row(&row.column($idx)?)?;
                    self.$idx.push(item);
                )+
                Ok(())
            }
        }
    };
}

multi_column_destination!(2; A: 0, B: 1);
multi_column_destination!(3; A: 0, B: 1, C: 2);
multi_column_destination!(4; A: 0, B: 1, C: 2, D: 3);
multi_column_destination!(5; A: 0, B: 1, C: 2, D: 3, E: 4);
multi_column_destination!(6; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);

/// Bind a row into a model through its cached descriptor. Used by generated code.
pub fn bind_record<T: Model>(target: &mut T, row: &RowRef<'_>) -> OrmResult<()> {
    T::table_model().bind_row(target, row.columns(), row.values())
}

/// Bind the cursor into `dest`, then release the cursor whatever the outcome.
///
/// On a mid-scan failure a sequence destination keeps the rows bound so far.
pub async fn bind<C, D>(mut cursor: C, ctx: &QueryCtx, dest: &mut D) -> OrmResult<()>
where
    C: Cursor,
    D: Destination + ?Sized,
{
    let result = bind_cursor(&mut cursor, ctx, dest).await;
    cursor.release();
    result
}

async fn bind_cursor<C, D>(cursor: &mut C, ctx: &QueryCtx, dest: &mut D) -> OrmResult<()>
where
    C: Cursor,
    D: Destination + ?Sized,
{
    let shape = dest.shape();
    if shape == Shape::Nil {
        return Err(OrmError::NilModel);
    }

    let columns = cursor.columns().to_vec();
    dest.begin(&columns)?;

    if shape.is_multi_row() {
        while cursor.advance(ctx).await? {
            dest.bind_row(&RowRef::new(&columns, cursor.values()))?;
        }
        return Ok(());
    }

    if !cursor.advance(ctx).await? {
        return Err(OrmError::NoRows);
    }
    dest.bind_row(&RowRef::new(&columns, cursor.values()))
}

/// Bind the cursor's current row without advancing or releasing it.
pub fn scan_current<C, D>(cursor: &C, dest: &mut D) -> OrmResult<()>
where
    C: Cursor,
    D: Destination + ?Sized,
{
    if dest.shape() == Shape::Nil {
        return Err(OrmError::NilModel);
    }
    let columns = cursor.columns();
    let values = cursor.values();
    if values.is_empty() && !columns.is_empty() {
        return Err(OrmError::NoRows);
    }
    dest.begin(columns)?;
    dest.bind_row(&RowRef::new(columns, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conn::VecCursor;
    use std::sync::atomic::Ordering;

    fn ints(column: &str, nums: &[i64]) -> VecCursor {
        VecCursor::new([column], nums.iter().map(|n| vec![Value::Int(*n)]).collect())
    }

    #[tokio::test]
    async fn scalar_takes_first_row() {
        let mut n = 0i32;
        bind(ints("num", &[3, 2]), &QueryCtx::new(), &mut n).await.unwrap();
        assert_eq!(n, 3);
    }

    #[tokio::test]
    async fn scalar_with_zero_rows_is_no_rows() {
        let mut n = 0i64;
        let err = bind(ints("num", &[]), &QueryCtx::new(), &mut n).await.unwrap_err();
        assert!(err.is_no_rows());
    }

    #[tokio::test]
    async fn scalar_requires_one_column() {
        let cur = VecCursor::new(["a", "b"], vec![vec![Value::Int(1), Value::Int(2)]]);
        let mut n = 0i64;
        let err = bind(cur, &QueryCtx::new(), &mut n).await.unwrap_err();
        assert!(matches!(err, OrmError::ColumnCount { columns: 2, destinations: 1 }));
    }

    #[tokio::test]
    async fn sequence_preserves_order_and_releases() {
        let cur = ints("num", &[3, 2, 1]);
        let released = cur.release_flag();
        let mut out: Vec<i64> = vec![99];
        bind(cur, &QueryCtx::new(), &mut out).await.unwrap();
        assert_eq!(out, [3, 2, 1]);
        assert!(released.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn empty_sequence_is_not_an_error() {
        let mut out: Vec<String> = Vec::new();
        bind(ints("num", &[]), &QueryCtx::new(), &mut out).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn nil_destination_fails_and_releases() {
        let cur = ints("num", &[1]);
        let released = cur.release_flag();
        let err = bind(cur, &QueryCtx::new(), &mut ()).await.unwrap_err();
        assert!(err.is_nil_model());
        assert_eq!(err.to_string(), "sqlbind: Model(nil)");
        assert!(released.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn generic_map_keeps_native_types() {
        let cur = VecCursor::new(
            ["num", "str"],
            vec![vec![Value::Int(1), Value::Text("a".into())]],
        );
        let mut m: HashMap<String, Value> = HashMap::new();
        bind(cur, &QueryCtx::new(), &mut m).await.unwrap();
        assert_eq!(m["num"], Value::Int(1));
        assert_eq!(m["str"], Value::Text("a".into()));
    }

    #[tokio::test]
    async fn multi_column_lock_step() {
        let cur = VecCursor::new(
            ["num", "str"],
            vec![
                vec![Value::Int(1), Value::Text("a".into())],
                vec![Value::Int(2), Value::Text("b".into())],
                vec![Value::Int(3), Value::Null],
            ],
        );
        let mut nums: Vec<i64> = Vec::new();
        let mut strs: Vec<Option<String>> = Vec::new();
        bind(cur, &QueryCtx::new(), &mut (&mut nums, &mut strs)).await.unwrap();
        assert_eq!(nums, [1, 2, 3]);
        assert_eq!(strs, [Some("a".into()), Some("b".into()), None]);
    }

    #[tokio::test]
    async fn multi_column_count_mismatch() {
        let mut a: Vec<i64> = Vec::new();
        let mut b: Vec<i64> = Vec::new();
        let mut c: Vec<i64> = Vec::new();
        let cur = VecCursor::new(["x", "y"], vec![]);
        let err = bind(cur, &QueryCtx::new(), &mut (&mut a, &mut b, &mut c))
            .await
            .unwrap_err();
        assert!(matches!(err, OrmError::ColumnCount { columns: 2, destinations: 3 }));
    }

    #[tokio::test]
    async fn partial_failure_keeps_bound_prefix() {
        let cur = VecCursor::new(
            ["num"],
            vec![
                vec![Value::Int(1)],
                vec![Value::Text("x".into())],
                vec![Value::Int(3)],
            ],
        );
        let mut out: Vec<i64> = Vec::new();
        assert!(bind(cur, &QueryCtx::new(), &mut out).await.is_err());
        assert_eq!(out, [1]);
    }

    #[tokio::test]
    async fn cancelled_context_aborts_scan() {
        let ctx = QueryCtx::new();
        ctx.cancel();
        let mut out: Vec<i64> = Vec::new();
        let err = bind(ints("num", &[1]), &ctx, &mut out).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn scan_current_reads_one_row_at_a_time() {
        let ctx = QueryCtx::new();
        let mut cur = ints("num", &[1, 2]);
        let mut seen = Vec::new();
        while cur.advance(&ctx).await.unwrap() {
            let mut n = 0i64;
            scan_current(&cur, &mut n).unwrap();
            seen.push(n);
        }
        cur.release();
        assert_eq!(seen, [1, 2]);
    }
}
