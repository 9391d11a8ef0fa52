//! Common imports:
//!
//! ```ignore
//! use sqlbind::prelude::*;
//! ```

pub use crate::{
    Connection, Cursor, Db, DbConfig, Destination, Dialect, Json, Model, OrmError, OrmResult,
    Query, QueryCtx, ToValue, Value,
};
pub use crate::{AfterDropTableHook, AfterTruncateTableHook, BeforeDropTableHook, BeforeTruncateTableHook};

#[cfg(feature = "pool")]
pub use crate::create_pool;
