//! # sqlbind
//!
//! Statement builders and a generic result binder for relational databases.
//!
//! - **Builders** compose clauses in a fixed order and render dialect-correct SQL.
//!   The first invalid input is kept as a sticky error that every later render or
//!   execute returns.
//! - **Binder** copies a result cursor into whatever the caller hands it: a scalar,
//!   a `Vec`, a `HashMap<String, Value>`, a `#[derive(Model)]` struct (with nested
//!   records), or several column vectors at once.
//! - **Hooks** let a model run code before and after `DROP TABLE` / `TRUNCATE`.
//!
//! ```ignore
//! use sqlbind::prelude::*;
//!
//! #[derive(Debug, Default, Model)]
//! struct Row {
//!     num: i64,
//!     #[orm(nested)]
//!     sub: Option<Sub>,
//! }
//!
//! #[derive(Debug, Default, Model)]
//! struct Sub {
//!     str: String,
//! }
//!
//! let db = Db::new(sqlbind::pg::connect("postgres://postgres@localhost/test").await?);
//! let ctx = QueryCtx::new();
//!
//! let mut row = Row::default();
//! db.new_select()
//!     .column_expr("10 AS num, 'hello' AS sub__str", &[])
//!     .scan(&ctx, &mut row)
//!     .await?;
//!
//! db.new_drop_table().table("users").if_exists().cascade().exec(&ctx).await?;
//! ```

pub mod binder;
pub mod config;
pub mod conn;
pub mod ctx;
pub mod db;
pub mod dialect;
pub mod error;
pub mod hooks;
pub mod ident;
pub mod model;
pub mod pg;
pub mod prelude;
pub mod query;
pub mod value;

#[cfg(feature = "pool")]
pub mod pool;

pub use binder::{Destination, RowRef, ScanRow, Shape};
pub use config::DbConfig;
pub use conn::{Connection, Cursor, VecCursor};
pub use ctx::QueryCtx;
pub use db::Db;
pub use dialect::{Dialect, Formatter};
pub use error::{OrmError, OrmResult};
pub use hooks::{
    AfterDropTableHook, AfterTruncateTableHook, BeforeDropTableHook, BeforeTruncateTableHook,
    HookFn, HookTable,
};
pub use ident::{Ident, IntoIdent};
pub use model::{Model, Nesting, TableModel, TableModelBuilder};
pub use query::{
    DropTableQuery, Operation, Query, SelectQuery, TruncateTableQuery, ValuesQuery,
};
pub use value::{FromValue, Json, ToValue, Value};

#[cfg(feature = "pool")]
pub use pool::create_pool;

#[cfg(feature = "derive")]
pub use sqlbind_derive::Model;

/// Token type accepted by [`QueryCtx::with_cancel`].
pub use tokio_util::sync::CancellationToken;
