//! Lifecycle hooks around schema-mutating statements.
//!
//! A model opts into hooks by implementing one of the capability traits below and
//! listing it in `#[orm(hooks(...))]`. The derive records a function pointer for
//! each listed capability in the model's [`HookTable`] when its descriptor is built,
//! so dispatch is a field read, not a per-call type check.
//!
//! # Hooks are synchronous
//!
//! A hook is a plain `fn` run inline on the executing task. It cannot `.await`, so
//! it must not issue queries or other I/O. Use it to validate the statement, check
//! `ctx` (for example [`QueryCtx::is_cancelled`]) or record in-memory state, and
//! return an error to veto (before) or report (after). Follow-up statements belong
//! in the caller, after `exec` returns.
//!
//! ```ignore
//! #[derive(Model, Default)]
//! #[orm(table = "users", hooks(before_drop_table))]
//! struct User { id: i64 }
//!
//! impl BeforeDropTableHook for User {
//!     fn before_drop_table(query: &dyn Query, ctx: &QueryCtx) -> OrmResult<()> {
//!         tracing::info!(sql = ?query.to_sql(), "dropping users");
//!         Ok(())
//!     }
//! }
//! ```

use crate::ctx::QueryCtx;
use crate::error::OrmResult;
use crate::query::{Operation, Query};

/// Signature shared by every hook: the active builder plus the caller's context.
///
/// Synchronous; see the module docs.
pub type HookFn = fn(&dyn Query, &QueryCtx) -> OrmResult<()>;

pub trait BeforeDropTableHook {
    fn before_drop_table(query: &dyn Query, ctx: &QueryCtx) -> OrmResult<()>;
}

pub trait AfterDropTableHook {
    fn after_drop_table(query: &dyn Query, ctx: &QueryCtx) -> OrmResult<()>;
}

pub trait BeforeTruncateTableHook {
    fn before_truncate_table(query: &dyn Query, ctx: &QueryCtx) -> OrmResult<()>;
}

pub trait AfterTruncateTableHook {
    fn after_truncate_table(query: &dyn Query, ctx: &QueryCtx) -> OrmResult<()>;
}

/// Hook capabilities of one model type. Empty by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct HookTable {
    before_drop_table: Option<HookFn>,
    after_drop_table: Option<HookFn>,
    before_truncate_table: Option<HookFn>,
    after_truncate_table: Option<HookFn>,
}

impl HookTable {
    pub const fn new() -> Self {
        Self {
            before_drop_table: None,
            after_drop_table: None,
            before_truncate_table: None,
            after_truncate_table: None,
        }
    }

    pub const fn before_drop_table(mut self, hook: HookFn) -> Self {
        self.before_drop_table = Some(hook);
        self
    }

    pub const fn after_drop_table(mut self, hook: HookFn) -> Self {
        self.after_drop_table = Some(hook);
        self
    }

    pub const fn before_truncate_table(mut self, hook: HookFn) -> Self {
        self.before_truncate_table = Some(hook);
        self
    }

    pub const fn after_truncate_table(mut self, hook: HookFn) -> Self {
        self.after_truncate_table = Some(hook);
        self
    }

    pub fn before(&self, op: Operation) -> Option<HookFn> {
        match op {
            Operation::DropTable => self.before_drop_table,
            Operation::TruncateTable => self.before_truncate_table,
            Operation::Select | Operation::Values | Operation::Raw => None,
        }
    }

    pub fn after(&self, op: Operation) -> Option<HookFn> {
        match op {
            Operation::DropTable => self.after_drop_table,
            Operation::TruncateTable => self.after_truncate_table,
            Operation::Select | Operation::Values | Operation::Raw => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.before_drop_table.is_none()
            && self.after_drop_table.is_none()
            && self.before_truncate_table.is_none()
            && self.after_truncate_table.is_none()
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Before,
    After,
}

impl Phase {
    fn as_str(self) -> &'static str {
        match self {
            Phase::Before => "before",
            Phase::After => "after",
        }
    }
}

fn dispatch(
    hooks: Option<&HookTable>,
    phase: Phase,
    query: &dyn Query,
    ctx: &QueryCtx,
) -> OrmResult<()> {
    let op = query.operation();
    let hook = hooks.and_then(|h| match phase {
        Phase::Before => h.before(op),
        Phase::After => h.after(op),
    });
    let Some(hook) = hook else {
        return Ok(());
    };

    let model = query.model_type().unwrap_or("-");
    tracing::trace!(
        target: "sqlbind.hooks",
        phase = phase.as_str(),
        operation = op.as_str(),
        model,
        "invoking hook"
    );
    hook(query, ctx).inspect_err(|err| {
        tracing::debug!(
            target: "sqlbind.hooks",
            phase = phase.as_str(),
            operation = op.as_str(),
            model,
            error = %err,
            "hook failed"
        );
    })
}

/// Run the pre-execution hook for the query's operation, if the model has one.
pub(crate) fn run_before(
    hooks: Option<&HookTable>,
    query: &dyn Query,
    ctx: &QueryCtx,
) -> OrmResult<()> {
    dispatch(hooks, Phase::Before, query, ctx)
}

/// Run the post-execution hook. Its error reaches the caller even though the
/// statement has already been applied.
pub(crate) fn run_after(
    hooks: Option<&HookTable>,
    query: &dyn Query,
    ctx: &QueryCtx,
) -> OrmResult<()> {
    dispatch(hooks, Phase::After, query, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::error::OrmError;

    struct Fake(Operation);

    impl Query for Fake {
        fn operation(&self) -> Operation {
            self.0
        }
        fn dialect(&self) -> Dialect {
            Dialect::Postgres
        }
        fn model_type(&self) -> Option<&'static str> {
            Some("Fake")
        }
        fn to_sql(&self) -> OrmResult<String> {
            Ok(String::new())
        }
    }

    fn fail(_: &dyn Query, _: &QueryCtx) -> OrmResult<()> {
        Err(OrmError::hook("nope"))
    }

    fn pass(_: &dyn Query, _: &QueryCtx) -> OrmResult<()> {
        Ok(())
    }

    #[test]
    fn lookup_is_keyed_by_operation() {
        let table = HookTable::new().before_drop_table(fail).after_truncate_table(pass);
        assert!(table.before(Operation::DropTable).is_some());
        assert!(table.after(Operation::DropTable).is_none());
        assert!(table.before(Operation::TruncateTable).is_none());
        assert!(table.after(Operation::TruncateTable).is_some());
        assert!(table.before(Operation::Select).is_none());
        assert!(HookTable::default().is_empty());
    }

    #[test]
    fn dispatch_runs_only_matching_hook() {
        let ctx = QueryCtx::new();
        let table = HookTable::new().before_drop_table(fail);

        let err = run_before(Some(&table), &Fake(Operation::DropTable), &ctx).unwrap_err();
        assert!(matches!(err, OrmError::Hook(ref m) if m == "nope"));

        assert!(run_before(Some(&table), &Fake(Operation::TruncateTable), &ctx).is_ok());
        assert!(run_after(Some(&table), &Fake(Operation::DropTable), &ctx).is_ok());
        assert!(run_before(None, &Fake(Operation::DropTable), &ctx).is_ok());
    }
}
