//! Statement builders.
//!
//! Builders are single-owner accumulators: each method consumes and returns the
//! builder. The first invalid input (malformed identifier, bad argument) is recorded
//! as a sticky error; later mutations are ignored and every render or execute
//! returns that error without producing SQL.

pub(crate) mod base;
mod drop_table;
mod select;
mod truncate_table;
mod values;


pub use drop_table::DropTableQuery;
pub use select::SelectQuery;
pub use truncate_table::TruncateTableQuery;
pub use values::ValuesQuery;

use crate::dialect::Dialect;
use crate::error::OrmResult;

/// Kind of statement a builder produces. Hooks are keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Select,
    Values,
    DropTable,
    TruncateTable,
    Raw,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Select => "select",
            Operation::Values => "values",
            Operation::DropTable => "drop_table",
            Operation::TruncateTable => "truncate_table",
            Operation::Raw => "raw",
        }
    }
}

/// Object-safe view of a builder, handed to hooks.
pub trait Query: Send + Sync {
    fn operation(&self) -> Operation;

    fn dialect(&self) -> Dialect;

    /// Name of the bound model type, if any.
    fn model_type(&self) -> Option<&'static str>;

    /// Render the statement. Idempotent; fails with the sticky error if one is set.
    fn to_sql(&self) -> OrmResult<String>;

    /// Column list to declare when the query is used as a CTE body.
    fn cte_columns(&self) -> Vec<String> {
        Vec::new()
    }
}
