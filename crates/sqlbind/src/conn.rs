//! Connection and cursor contracts consumed by builders and the binder.

use crate::ctx::QueryCtx;
use crate::error::{OrmError, OrmResult};
use crate::value::Value;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A scoped handle over the rows of one executed query.
///
/// Callers must [`release`](Cursor::release) the cursor on every exit path. The
/// bulk binding helpers do this themselves.
pub trait Cursor: Send {
    /// Selected column names, in select-list order.
    fn columns(&self) -> &[String];

    /// Move to the next row. Returns `false` once the rows are exhausted.
    fn advance(&mut self, ctx: &QueryCtx) -> impl Future<Output = OrmResult<bool>> + Send;

    /// Raw values of the current row. Empty before the first `advance`.
    fn values(&self) -> &[Value];

    /// Close the result set. Idempotent.
    fn release(&mut self);
}

/// Something that can run SQL text.
pub trait Connection: Send + Sync {
    type Cursor: Cursor;

    /// Run a statement and return the number of affected rows.
    fn execute(&self, sql: &str, ctx: &QueryCtx) -> impl Future<Output = OrmResult<u64>> + Send;

    /// Run a query and open a cursor over its rows.
    fn query(
        &self,
        sql: &str,
        ctx: &QueryCtx,
    ) -> impl Future<Output = OrmResult<Self::Cursor>> + Send;
}

impl<C: Connection> Connection for &C {
    type Cursor = C::Cursor;

    fn execute(&self, sql: &str, ctx: &QueryCtx) -> impl Future<Output = OrmResult<u64>> + Send {
        (**self).execute(sql, ctx)
    }

    fn query(
        &self,
        sql: &str,
        ctx: &QueryCtx,
    ) -> impl Future<Output = OrmResult<Self::Cursor>> + Send {
        (**self).query(sql, ctx)
    }
}

/// An in-memory cursor over pre-materialized rows.
///
/// Used by drivers that buffer their results and by tests.
#[derive(Debug, Clone, Default)]
pub struct VecCursor {
    columns: Vec<String>,
    pending: VecDeque<Vec<Value>>,
    current: Vec<Value>,
    released: Arc<AtomicBool>,
}

impl VecCursor {
    pub fn new<I, S>(columns: I, rows: Vec<Vec<Value>>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            pending: rows.into(),
            current: Vec::new(),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether `release` has been called on this cursor.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Shared flag that flips when the cursor is released, observable after the
    /// cursor itself has been moved into a binder.
    pub fn release_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.released)
    }
}

impl Cursor for VecCursor {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn advance(&mut self, ctx: &QueryCtx) -> OrmResult<bool> {
        ctx.check()?;
        if self.is_released() {
            return Err(OrmError::Other("sqlbind: cursor already released".into()));
        }
        match self.pending.pop_front() {
            Some(row) => {
                if row.len() != self.columns.len() {
                    return Err(OrmError::Other(format!(
                        "sqlbind: cursor row has {} values for {} columns",
                        row.len(),
                        self.columns.len()
                    )));
                }
                self.current = row;
                Ok(true)
            }
            None => {
                self.current.clear();
                Ok(false)
            }
        }
    }

    fn values(&self) -> &[Value] {
        &self.current
    }

    fn release(&mut self) {
        self.pending.clear();
        self.current.clear();
        self.released.store(true, Ordering::Release);
    }
}
