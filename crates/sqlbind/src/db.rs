//! Entry point tying a connection to a dialect and configuration.

use crate::binder::{self, Destination};
use crate::config::DbConfig;
use crate::conn::{Connection, Cursor};
use crate::ctx::QueryCtx;
use crate::dialect::{Dialect, Formatter};
use crate::error::OrmResult;
use crate::query::base::{log_statement, to_values};
use crate::query::{
    DropTableQuery, Operation, SelectQuery, TruncateTableQuery, ValuesQuery,
};
use crate::value::ToValue;
use std::future::Future;

/// A connection plus the settings every builder created from it shares.
///
/// ```ignore
/// let db = Db::with_config(client, DbConfig::new().with_query_timeout(Duration::from_secs(5)));
/// let nums: Vec<i64> = Vec::new();
/// db.new_select()
///     .table_expr("generate_series(1, 3) AS t(num)", &[])
///     .order_expr("num DESC", &[])
///     .scan(&QueryCtx::new(), &mut nums)
///     .await?;
/// ```
#[derive(Debug)]
pub struct Db<C> {
    conn: C,
    config: DbConfig,
}

impl<C: Connection> Db<C> {
    pub fn new(conn: C) -> Self {
        Self::with_config(conn, DbConfig::default())
    }

    pub fn with_config(conn: C, config: DbConfig) -> Self {
        Self { conn, config }
    }

    pub fn conn(&self) -> &C {
        &self.conn
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn dialect(&self) -> Dialect {
        self.config.dialect
    }

    pub fn formatter(&self) -> Formatter {
        Formatter::new(self.config.dialect)
    }

    pub fn into_inner(self) -> C {
        self.conn
    }

    // ==================== Builders ====================

    pub fn new_select(&self) -> SelectQuery<'_, C> {
        SelectQuery::new(&self.conn, &self.config)
    }

    pub fn new_values(&self) -> ValuesQuery {
        ValuesQuery::new(self.formatter())
    }

    pub fn new_drop_table(&self) -> DropTableQuery<'_, C> {
        DropTableQuery::new(&self.conn, &self.config)
    }

    pub fn new_truncate_table(&self) -> TruncateTableQuery<'_, C> {
        TruncateTableQuery::new(&self.conn, &self.config)
    }

    // ==================== Row scanning ====================

    /// Bind the cursor's current row into `dest` without advancing or releasing it.
    pub fn scan_row<R, D>(&self, cursor: &R, dest: &mut D) -> OrmResult<()>
    where
        R: Cursor,
        D: Destination + ?Sized,
    {
        binder::scan_current(cursor, dest)
    }

    /// Bind every remaining row into `dest` and release the cursor.
    pub async fn scan_rows<R, D>(&self, cursor: R, ctx: &QueryCtx, dest: &mut D) -> OrmResult<()>
    where
        R: Cursor,
        D: Destination + ?Sized,
    {
        binder::bind(cursor, ctx, dest).await
    }

    // ==================== Raw statements ====================

    fn render_raw(&self, sql: &str, args: &[&dyn ToValue]) -> OrmResult<String> {
        let values = to_values(args)?;
        self.formatter().render(sql, &values)
    }

    /// Render `sql` with `?` arguments and execute it.
    pub fn exec_raw(
        &self,
        ctx: &QueryCtx,
        sql: &str,
        args: &[&dyn ToValue],
    ) -> impl Future<Output = OrmResult<u64>> + Send {
        let rendered = self.render_raw(sql, args);
        let ctx = ctx.clone().with_default_timeout(self.config.query_timeout);
        async move {
            let sql = rendered?;
            log_statement(&self.config, Operation::Raw, None, &sql);
            self.conn.execute(&sql, &ctx).await
        }
    }

    /// Render `sql` with `?` arguments and open a cursor over its rows.
    pub fn query_raw(
        &self,
        ctx: &QueryCtx,
        sql: &str,
        args: &[&dyn ToValue],
    ) -> impl Future<Output = OrmResult<C::Cursor>> + Send {
        let rendered = self.render_raw(sql, args);
        let ctx = ctx.clone().with_default_timeout(self.config.query_timeout);
        async move {
            let sql = rendered?;
            log_statement(&self.config, Operation::Raw, None, &sql);
            self.conn.query(&sql, &ctx).await
        }
    }
}
