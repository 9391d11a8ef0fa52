use crate::dialect::Dialect;
use std::time::Duration;

/// Default byte budget for SQL text in log events.
pub const DEFAULT_MAX_SQL_LOG_LEN: usize = 2048;

/// Settings shared by every statement built from a [`Db`](crate::Db).
///
/// ```ignore
/// use std::time::Duration;
/// use sqlbind::{DbConfig, Dialect};
///
/// let config = DbConfig::new()
///     .with_dialect(Dialect::Postgres)
///     .with_query_timeout(Duration::from_secs(5))
///     .enable_sql_logging();
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Dialect used to quote identifiers and render literals.
    pub dialect: Dialect,
    /// Deadline applied to a [`QueryCtx`](crate::QueryCtx) that carries none. `None` means no timeout.
    pub query_timeout: Option<Duration>,
    /// Emit rendered SQL at DEBUG under the `sqlbind.sql` target.
    pub log_sql: bool,
    /// Truncate logged SQL to this many bytes. `None` logs the full text.
    pub max_sql_log_len: Option<usize>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::Postgres,
            query_timeout: None,
            log_sql: true,
            max_sql_log_len: Some(DEFAULT_MAX_SQL_LOG_LEN),
        }
    }
}

impl DbConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Set the default query timeout.
    ///
    /// Statements whose context already has a deadline keep it.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    pub fn enable_sql_logging(mut self) -> Self {
        self.log_sql = true;
        self
    }

    pub fn disable_sql_logging(mut self) -> Self {
        self.log_sql = false;
        self
    }

    pub fn with_max_sql_log_len(mut self, max_bytes: usize) -> Self {
        self.max_sql_log_len = Some(max_bytes);
        self
    }

    pub fn without_sql_log_limit(mut self) -> Self {
        self.max_sql_log_len = None;
        self
    }

    /// SQL text as it should appear in log events.
    pub(crate) fn loggable<'a>(&self, sql: &'a str) -> &'a str {
        match self.max_sql_log_len {
            Some(max) => truncate_sql_bytes(sql, max),
            None => sql,
        }
    }
}

/// Truncate to at most `max_bytes`, backing off to a char boundary.
pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}
