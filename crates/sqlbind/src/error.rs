//! Error types for sqlbind

use std::time::Duration;
use thiserror::Error;

/// Result type alias for sqlbind operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for building, executing and binding statements
#[derive(Debug, Error)]
pub enum OrmError {
    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error reported by the driver
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// A single-row destination received zero rows
    #[error("sqlbind: no rows in result set")]
    NoRows,

    /// The destination is absent
    #[error("sqlbind: Model(nil)")]
    NilModel,

    /// A selected column has no mapping on the destination type
    #[error("sqlbind: {type_name} does not have column {column:?}")]
    UnknownColumn {
        column: String,
        type_name: &'static str,
    },

    /// Selected column count does not match the destination count
    #[error("sqlbind: got {columns} columns, but {destinations} destinations")]
    ColumnCount { columns: usize, destinations: usize },

    /// Value decode/coercion error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Malformed builder input (identifier, fragment, argument)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error raised by a lifecycle hook
    #[error("Hook error: {0}")]
    Hook(String),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// The caller cancelled the operation
    #[error("Query cancelled")]
    Cancelled,

    /// Query timeout error
    #[error("Query timeout after {0:?}")]
    Timeout(Duration),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an unknown-column error naming the destination type
    pub fn unknown_column(column: impl Into<String>, type_name: &'static str) -> Self {
        Self::UnknownColumn {
            column: column.into(),
            type_name,
        }
    }

    /// Create a hook error
    pub fn hook(message: impl Into<String>) -> Self {
        Self::Hook(message.into())
    }

    /// Copy of a builder's sticky error, so every render reports the same failure.
    ///
    /// Driver errors cannot be cloned and are carried over as [`OrmError::Other`].
    pub(crate) fn replay(&self) -> Self {
        match self {
            Self::Connection(m) => Self::Connection(m.clone()),
            Self::NoRows => Self::NoRows,
            Self::NilModel => Self::NilModel,
            Self::UnknownColumn { column, type_name } => Self::UnknownColumn {
                column: column.clone(),
                type_name,
            },
            Self::ColumnCount {
                columns,
                destinations,
            } => Self::ColumnCount {
                columns: *columns,
                destinations: *destinations,
            },
            Self::Decode { column, message } => Self::Decode {
                column: column.clone(),
                message: message.clone(),
            },
            Self::Validation(m) => Self::Validation(m.clone()),
            Self::Serialization(m) => Self::Serialization(m.clone()),
            Self::Hook(m) => Self::Hook(m.clone()),
            #[cfg(feature = "pool")]
            Self::Pool(m) => Self::Pool(m.clone()),
            Self::Cancelled => Self::Cancelled,
            Self::Timeout(d) => Self::Timeout(*d),
            Self::Query(_) | Self::Other(_) => Self::Other(self.to_string()),
        }
    }

    /// Check if this is the "no rows" condition
    pub fn is_no_rows(&self) -> bool {
        matches!(self, Self::NoRows)
    }

    /// Check if this is the absent-destination error
    pub fn is_nil_model(&self) -> bool {
        matches!(self, Self::NilModel)
    }

    /// Check if this is an unknown-column error
    pub fn is_unknown_column(&self) -> bool {
        matches!(self, Self::UnknownColumn { .. })
    }

    /// Check if the operation was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for OrmError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_model_message_is_fixed() {
        assert_eq!(OrmError::NilModel.to_string(), "sqlbind: Model(nil)");
    }

    #[test]
    fn unknown_column_names_column_and_type() {
        let err = OrmError::unknown_column("unknown_column", "Model");
        assert!(err.is_unknown_column());
        assert_eq!(
            err.to_string(),
            "sqlbind: Model does not have column \"unknown_column\""
        );
    }

    #[test]
    fn predicates_are_distinct() {
        assert!(OrmError::NoRows.is_no_rows());
        assert!(!OrmError::NoRows.is_nil_model());
        assert!(OrmError::Cancelled.is_cancelled());
        assert!(OrmError::Timeout(Duration::from_millis(5)).is_timeout());
    }
}
