use crate::config::DbConfig;
use crate::conn::Connection;
use crate::ctx::QueryCtx;
use crate::dialect::Formatter;
use crate::error::{OrmError, OrmResult};
use crate::hooks::{self, HookTable};
use crate::ident::{Ident, IntoIdent};
use crate::model::Model;
use crate::query::{Operation, Query};
use crate::value::{ToValue, Value};

/// Model bound to a builder with `model::<T>()`.
#[derive(Debug, Clone)]
pub(crate) struct ModelInfo {
    pub type_name: &'static str,
    pub table: Option<Ident>,
    pub hooks: &'static HookTable,
}

/// A statement target: a quoted identifier or a pre-rendered expression.
#[derive(Debug, Clone)]
pub(crate) enum TableRef {
    Ident(Ident),
    Expr(String),
}

/// State shared by every builder bound to a connection.
pub(crate) struct BaseQuery<'a, C> {
    pub conn: &'a C,
    pub config: &'a DbConfig,
    pub fmter: Formatter,
    pub model: Option<ModelInfo>,
    pub tables: Vec<TableRef>,
    err: Option<OrmError>,
}

pub(crate) fn to_values(args: &[&dyn ToValue]) -> OrmResult<Vec<Value>> {
    args.iter().map(|a| a.to_value()).collect()
}

impl<'a, C: Connection> BaseQuery<'a, C> {
    pub fn new(conn: &'a C, config: &'a DbConfig) -> Self {
        Self {
            conn,
            config,
            fmter: Formatter::new(config.dialect),
            model: None,
            tables: Vec::new(),
            err: None,
        }
    }

    /// Record `err` unless an earlier error is already recorded.
    pub fn set_err(&mut self, err: OrmError) {
        if self.err.is_none() {
            self.err = Some(err);
        }
    }

    pub fn is_failed(&self) -> bool {
        self.err.is_some()
    }

    /// The sticky error, replayed.
    pub fn check(&self) -> OrmResult<()> {
        match &self.err {
            Some(err) => Err(err.replay()),
            None => Ok(()),
        }
    }

    /// Keep the value of `res`, or record its error.
    pub fn take<T>(&mut self, res: OrmResult<T>) -> Option<T> {
        match res {
            Ok(v) => Some(v),
            Err(err) => {
                self.set_err(err);
                None
            }
        }
    }

    /// Render a fragment with its arguments now; the text is stored, not the args.
    pub fn render_expr(&mut self, sql: &str, args: &[&dyn ToValue]) -> Option<String> {
        if self.is_failed() {
            return None;
        }
        let rendered = to_values(args).and_then(|values| self.fmter.render(sql, &values));
        self.take(rendered)
    }

    pub fn add_table(&mut self, name: impl IntoIdent) {
        if self.is_failed() {
            return;
        }
        if let Some(ident) = self.take(name.into_ident()) {
            self.tables.push(TableRef::Ident(ident));
        }
    }

    pub fn add_table_expr(&mut self, sql: &str, args: &[&dyn ToValue]) {
        if let Some(expr) = self.render_expr(sql, args) {
            self.tables.push(TableRef::Expr(expr));
        }
    }

    pub fn bind_model<T: Model>(&mut self) {
        if self.is_failed() {
            return;
        }
        let model = T::table_model();
        let table = match model.table() {
            Some(name) => self.take(Ident::parse(name)),
            None => None,
        };
        self.model = Some(ModelInfo {
            type_name: model.type_name(),
            table,
            hooks: model.hooks(),
        });
    }

    pub fn hooks(&self) -> Option<&'static HookTable> {
        self.model.as_ref().map(|m| m.hooks)
    }

    pub fn model_type(&self) -> Option<&'static str> {
        self.model.as_ref().map(|m| m.type_name)
    }

    pub fn has_targets(&self) -> bool {
        !self.tables.is_empty() || self.model.as_ref().is_some_and(|m| m.table.is_some())
    }

    fn append_table_ref(&self, buf: &mut String, t: &TableRef) {
        match t {
            TableRef::Ident(ident) => self.fmter.append_ident(buf, ident),
            TableRef::Expr(expr) => buf.push_str(expr),
        }
    }

    /// Append the explicit targets, falling back to the model's table.
    pub fn append_tables(&self, buf: &mut String) -> OrmResult<()> {
        if self.tables.is_empty() {
            return match self.model.as_ref().and_then(|m| m.table.as_ref()) {
                Some(ident) => {
                    self.fmter.append_ident(buf, ident);
                    Ok(())
                }
                None => Err(OrmError::validation("sqlbind: statement has no target table")),
            };
        }
        for (i, t) in self.tables.iter().enumerate() {
            if i > 0 {
                buf.push_str(", ");
            }
            self.append_table_ref(buf, t);
        }
        Ok(())
    }

    /// Context with the configured default timeout applied.
    pub fn ctx_for(&self, ctx: &QueryCtx) -> QueryCtx {
        ctx.clone().with_default_timeout(self.config.query_timeout)
    }

    pub fn log_sql(&self, op: Operation, sql: &str) {
        log_statement(self.config, op, self.model_type(), sql);
    }
}

/// Emit a rendered statement under the `sqlbind.sql` target, if enabled.
pub(crate) fn log_statement(
    config: &DbConfig,
    op: Operation,
    model: Option<&'static str>,
    sql: &str,
) {
    if !config.log_sql {
        return;
    }
    tracing::debug!(
        target: "sqlbind.sql",
        operation = op.as_str(),
        model = model.unwrap_or("-"),
        dialect = config.dialect.name(),
        sql = %config.loggable(sql),
        "executing statement"
    );
}

/// Run a mutating statement: pre-hook, render and execute, post-hook.
///
/// A failing pre-hook means nothing is executed. A failing post-hook is returned
/// even though the statement has been applied; no compensation is attempted.
pub(crate) async fn exec_with_hooks<Q, C>(
    query: &Q,
    base: &BaseQuery<'_, C>,
    ctx: &QueryCtx,
) -> OrmResult<u64>
where
    Q: Query,
    C: Connection,
{
    base.check()?;
    let hooks = base.hooks();

    hooks::run_before(hooks, query, ctx)?;

    let sql = query.to_sql()?;
    base.log_sql(query.operation(), &sql);
    let affected = base.conn.execute(&sql, &base.ctx_for(ctx)).await?;

    hooks::run_after(hooks, query, ctx)?;
    Ok(affected)
}
