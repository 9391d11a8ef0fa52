use super::base::BaseQuery;
use super::{Operation, Query};
use crate::binder::{self, Destination, Shape};
use crate::config::DbConfig;
use crate::conn::Connection;
use crate::ctx::QueryCtx;
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::ident::{Ident, IntoIdent};
use crate::model::Model;
use crate::value::ToValue;

/// SELECT builder.
///
/// Clauses render in a fixed order regardless of call order:
/// `WITH … SELECT … FROM … WHERE … ORDER BY … LIMIT … OFFSET …`.
pub struct SelectQuery<'a, C> {
    base: BaseQuery<'a, C>,
    ctes: Vec<String>,
    columns: Vec<String>,
    wheres: Vec<String>,
    orders: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl<'a, C: Connection> SelectQuery<'a, C> {
    pub(crate) fn new(conn: &'a C, config: &'a DbConfig) -> Self {
        Self {
            base: BaseQuery::new(conn, config),
            ctes: Vec::new(),
            columns: Vec::new(),
            wheres: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn conn(mut self, conn: &'a C) -> Self {
        self.base.conn = conn;
        self
    }

    /// Bind a model; its table becomes the default FROM target.
    pub fn model<T: Model>(mut self) -> Self {
        self.base.bind_model::<T>();
        self
    }

    // ==================== WITH ====================

    /// Add `"name" [(cols)] AS (<query>)`. The sub-query is rendered immediately.
    pub fn with(mut self, name: &str, query: &dyn Query) -> Self {
        if self.base.is_failed() {
            return self;
        }
        let Some(ident) = self.base.take(Ident::parse(name)) else {
            return self;
        };
        let Some(body) = self.base.take(query.to_sql()) else {
            return self;
        };

        let mut cte = String::new();
        self.base.fmter.append_ident(&mut cte, &ident);
        let columns = query.cte_columns();
        if !columns.is_empty() {
            cte.push_str(" (");
            for (i, column) in columns.iter().enumerate() {
                if i > 0 {
                    cte.push_str(", ");
                }
                match self.base.take(Ident::raw(column.as_str())) {
                    Some(col) => self.base.fmter.append_ident(&mut cte, &col),
                    None => return self,
                }
            }
            cte.push(')');
        }
        cte.push_str(" AS (");
        cte.push_str(&body);
        cte.push(')');
        self.ctes.push(cte);
        self
    }

    // ==================== FROM ====================

    pub fn table(mut self, name: impl IntoIdent) -> Self {
        self.base.add_table(name);
        self
    }

    pub fn table_expr(mut self, sql: &str, args: &[&dyn ToValue]) -> Self {
        self.base.add_table_expr(sql, args);
        self
    }

    // ==================== SELECT list ====================

    pub fn column(mut self, name: impl IntoIdent) -> Self {
        if self.base.is_failed() {
            return self;
        }
        if let Some(ident) = self.base.take(name.into_ident()) {
            let mut col = String::new();
            self.base.fmter.append_ident(&mut col, &ident);
            self.columns.push(col);
        }
        self
    }

    pub fn column_expr(mut self, sql: &str, args: &[&dyn ToValue]) -> Self {
        if let Some(expr) = self.base.render_expr(sql, args) {
            self.columns.push(expr);
        }
        self
    }

    // ==================== WHERE / ORDER / LIMIT ====================

    /// Add a predicate. Multiple predicates are AND-ed.
    pub fn where_expr(mut self, sql: &str, args: &[&dyn ToValue]) -> Self {
        if let Some(expr) = self.base.render_expr(sql, args) {
            self.wheres.push(expr);
        }
        self
    }

    pub fn order_expr(mut self, sql: &str, args: &[&dyn ToValue]) -> Self {
        if let Some(expr) = self.base.render_expr(sql, args) {
            self.orders.push(expr);
        }
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    // ==================== Rendering ====================

    fn append_with(&self, sql: &mut String) {
        if self.ctes.is_empty() {
            return;
        }
        sql.push_str("WITH ");
        sql.push_str(&self.ctes.join(", "));
        sql.push(' ');
    }

    fn append_from_where(&self, sql: &mut String) -> OrmResult<()> {
        if self.base.has_targets() {
            sql.push_str(" FROM ");
            self.base.append_tables(sql)?;
        }
        for (i, w) in self.wheres.iter().enumerate() {
            sql.push_str(if i == 0 { " WHERE (" } else { " AND (" });
            sql.push_str(w);
            sql.push(')');
        }
        Ok(())
    }

    fn append_limit_offset(&self, sql: &mut String) {
        match (self.limit, self.offset) {
            (Some(limit), _) => {
                sql.push_str(&format!(" LIMIT {limit}"));
            }
            // MySQL and SQLite accept OFFSET only after LIMIT.
            (None, Some(_)) => match self.base.fmter.dialect() {
                Dialect::MySql => sql.push_str(" LIMIT 18446744073709551615"),
                Dialect::Sqlite => sql.push_str(" LIMIT -1"),
                Dialect::Postgres => {}
            },
            (None, None) => {}
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
    }

    fn build_sql(&self) -> OrmResult<String> {
        self.base.check()?;

        let mut sql = String::new();
        self.append_with(&mut sql);
        sql.push_str("SELECT ");
        if self.columns.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.columns.join(", "));
        }
        self.append_from_where(&mut sql)?;
        if !self.orders.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.orders.join(", "));
        }
        self.append_limit_offset(&mut sql);
        Ok(sql)
    }

    /// The statement `count` runs: ordering, limit and offset are dropped.
    pub fn to_count_sql(&self) -> OrmResult<String> {
        self.base.check()?;

        let mut sql = String::new();
        self.append_with(&mut sql);
        sql.push_str("SELECT count(*)");
        self.append_from_where(&mut sql)?;
        Ok(sql)
    }

    // ==================== Execution ====================

    /// Open a cursor for row-by-row scanning. The caller must release it.
    pub async fn rows(&self, ctx: &QueryCtx) -> OrmResult<C::Cursor> {
        let sql = self.build_sql()?;
        self.base.log_sql(Operation::Select, &sql);
        self.base.conn.query(&sql, &self.base.ctx_for(ctx)).await
    }

    /// Run the query and bind the result into `dest`.
    pub async fn scan<D>(&self, ctx: &QueryCtx, dest: &mut D) -> OrmResult<()>
    where
        D: Destination + ?Sized,
    {
        if dest.shape() == Shape::Nil {
            return Err(OrmError::NilModel);
        }
        let ctx = self.base.ctx_for(ctx);
        let sql = self.build_sql()?;
        self.base.log_sql(Operation::Select, &sql);
        let cursor = self.base.conn.query(&sql, &ctx).await?;
        binder::bind(cursor, &ctx, dest).await
    }

    /// Number of rows matched, ignoring limit and offset.
    pub async fn count(&self, ctx: &QueryCtx) -> OrmResult<i64> {
        let ctx = self.base.ctx_for(ctx);
        let sql = self.to_count_sql()?;
        self.base.log_sql(Operation::Select, &sql);
        let cursor = self.base.conn.query(&sql, &ctx).await?;
        let mut n = 0i64;
        binder::bind(cursor, &ctx, &mut n).await?;
        Ok(n)
    }

    /// Run the statement for its side effects.
    pub async fn exec(&self, ctx: &QueryCtx) -> OrmResult<u64> {
        let sql = self.build_sql()?;
        self.base.log_sql(Operation::Select, &sql);
        self.base.conn.execute(&sql, &self.base.ctx_for(ctx)).await
    }
}

impl<C: Connection> Query for SelectQuery<'_, C> {
    fn operation(&self) -> Operation {
        Operation::Select
    }

    fn dialect(&self) -> Dialect {
        self.base.fmter.dialect()
    }

    fn model_type(&self) -> Option<&'static str> {
        self.base.model_type()
    }

    fn to_sql(&self) -> OrmResult<String> {
        self.build_sql()
    }
}
