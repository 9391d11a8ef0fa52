use super::base::{BaseQuery, exec_with_hooks};
use super::drop_table::Cascade;
use super::{Operation, Query};
use crate::config::DbConfig;
use crate::conn::Connection;
use crate::ctx::QueryCtx;
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::ident::IntoIdent;
use crate::model::Model;
use crate::value::ToValue;

/// `TRUNCATE TABLE <targets> [RESTART IDENTITY] [CASCADE|RESTRICT]`
///
/// Dialects without `TRUNCATE` get `DELETE FROM <target>`, which takes one table.
pub struct TruncateTableQuery<'a, C> {
    base: BaseQuery<'a, C>,
    restart_identity: bool,
    cascade: Cascade,
}

impl<'a, C: Connection> TruncateTableQuery<'a, C> {
    pub(crate) fn new(conn: &'a C, config: &'a DbConfig) -> Self {
        Self {
            base: BaseQuery::new(conn, config),
            restart_identity: false,
            cascade: Cascade::None,
        }
    }

    pub fn conn(mut self, conn: &'a C) -> Self {
        self.base.conn = conn;
        self
    }

    pub fn model<T: Model>(mut self) -> Self {
        self.base.bind_model::<T>();
        self
    }

    pub fn table(mut self, name: impl IntoIdent) -> Self {
        self.base.add_table(name);
        self
    }

    pub fn table_expr(mut self, sql: &str, args: &[&dyn ToValue]) -> Self {
        self.base.add_table_expr(sql, args);
        self
    }

    /// Reset sequences owned by the truncated tables (Postgres only).
    pub fn restart_identity(mut self) -> Self {
        self.restart_identity = true;
        self
    }

    pub fn cascade(mut self) -> Self {
        self.cascade = Cascade::Cascade;
        self
    }

    pub fn restrict(mut self) -> Self {
        self.cascade = Cascade::Restrict;
        self
    }

    fn build_sql(&self) -> OrmResult<String> {
        self.base.check()?;
        let dialect = self.base.fmter.dialect();

        if !dialect.supports_truncate() {
            if self.base.tables.len() > 1 {
                return Err(OrmError::validation(format!(
                    "sqlbind: {} can only empty one table per statement",
                    dialect.name()
                )));
            }
            let mut sql = String::from("DELETE FROM ");
            self.base.append_tables(&mut sql)?;
            return Ok(sql);
        }

        let mut sql = String::from("TRUNCATE TABLE ");
        self.base.append_tables(&mut sql)?;
        if self.restart_identity && dialect.supports_restart_identity() {
            sql.push_str(" RESTART IDENTITY");
        }
        if dialect == Dialect::Postgres {
            self.cascade.append(&mut sql);
        }
        Ok(sql)
    }

    pub async fn exec(&self, ctx: &QueryCtx) -> OrmResult<u64> {
        exec_with_hooks(self, &self.base, ctx).await
    }
}

impl<C: Connection> Query for TruncateTableQuery<'_, C> {
    fn operation(&self) -> Operation {
        Operation::TruncateTable
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
