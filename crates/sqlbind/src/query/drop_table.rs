use super::base::{BaseQuery, exec_with_hooks};
use super::{Operation, Query};
use crate::config::DbConfig;
use crate::conn::Connection;
use crate::ctx::QueryCtx;
use crate::dialect::Dialect;
use crate::error::OrmResult;
use crate::ident::IntoIdent;
use crate::model::Model;
use crate::value::ToValue;

/// Trailing dependency clause shared by `DROP TABLE` and `TRUNCATE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Cascade {
    #[default]
    None,
    Cascade,
    Restrict,
}

impl Cascade {
    pub(crate) fn append(self, buf: &mut String) {
        match self {
            Cascade::None => {}
            Cascade::Cascade => buf.push_str(" CASCADE"),
            Cascade::Restrict => buf.push_str(" RESTRICT"),
        }
    }
}

/// `DROP TABLE [IF EXISTS] <targets> [CASCADE|RESTRICT]`
///
/// ```ignore
/// db.new_drop_table()
///     .model::<User>()
///     .if_exists()
///     .cascade()
///     .exec(&QueryCtx::new())
///     .await?;
/// ```
pub struct DropTableQuery<'a, C> {
    base: BaseQuery<'a, C>,
    if_exists: bool,
    cascade: Cascade,
}

impl<'a, C: Connection> DropTableQuery<'a, C> {
    pub(crate) fn new(conn: &'a C, config: &'a DbConfig) -> Self {
        Self {
            base: BaseQuery::new(conn, config),
            if_exists: false,
            cascade: Cascade::None,
        }
    }

    /// Run on a different connection.
    pub fn conn(mut self, conn: &'a C) -> Self {
        self.base.conn = conn;
        self
    }

    /// Bind a model: its table is the default target and its hooks run on `exec`.
    pub fn model<T: Model>(mut self) -> Self {
        self.base.bind_model::<T>();
        self
    }

    /// Add a target table. Call repeatedly for several tables.
    pub fn table(mut self, name: impl IntoIdent) -> Self {
        self.base.add_table(name);
        self
    }

    /// Add a raw target expression with `?` arguments.
    pub fn table_expr(mut self, sql: &str, args: &[&dyn ToValue]) -> Self {
        self.base.add_table_expr(sql, args);
        self
    }

    pub fn if_exists(mut self) -> Self {
        self.if_exists = true;
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

        let mut sql = String::from("DROP TABLE ");
        if self.if_exists {
            sql.push_str("IF EXISTS ");
        }
        self.base.append_tables(&mut sql)?;
        if self.base.fmter.dialect().supports_table_cascade() {
            self.cascade.append(&mut sql);
        }
        Ok(sql)
    }

    /// Run hooks and the statement. Returns the affected-row count reported by the driver.
    pub async fn exec(&self, ctx: &QueryCtx) -> OrmResult<u64> {
        exec_with_hooks(self, &self.base, ctx).await
    }
}

impl<C: Connection> Query for DropTableQuery<'_, C> {
    fn operation(&self) -> Operation {
        Operation::DropTable
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
