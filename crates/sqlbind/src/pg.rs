//! [`Connection`] for tokio-postgres clients.
//!
//! Rows are streamed through `query_raw`; each cell is converted to a [`Value`]
//! according to its column type. When a [`QueryCtx`] is cancelled or expires while
//! a statement or fetch is in flight, a best-effort server-side cancel is sent.

use crate::conn::{Connection, Cursor};
use crate::ctx::QueryCtx;
use crate::error::{OrmError, OrmResult};
use crate::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures_util::StreamExt;
use std::pin::Pin;
use tokio_postgres::types::{FromSql, ToSql, Type};
use tokio_postgres::{CancelToken, Client, NoTls, Row, RowStream};

fn no_params() -> std::iter::Empty<&'static (dyn ToSql + Sync)> {
    std::iter::empty()
}

/// Ask the server to abandon whatever the connection is running.
fn spawn_cancel(token: CancelToken) {
    tokio::spawn(async move {
        if let Err(err) = token.cancel_query(NoTls).await {
            tracing::debug!(target: "sqlbind.sql", error = %err, "cancel request failed");
        }
    });
}

fn cancel_if_aborted<T>(result: &OrmResult<T>, token: impl FnOnce() -> CancelToken) {
    if let Err(OrmError::Cancelled | OrmError::Timeout(_)) = result {
        spawn_cancel(token());
    }
}

async fn execute(client: &Client, sql: &str, ctx: &QueryCtx) -> OrmResult<u64> {
    let result = ctx
        .run(async { client.execute(sql, &[]).await.map_err(OrmError::from) })
        .await;
    cancel_if_aborted(&result, || client.cancel_token());
    result
}

async fn query(client: &Client, sql: &str, ctx: &QueryCtx) -> OrmResult<PgCursor> {
    let opened = ctx
        .run(async {
            let stmt = client.prepare(sql).await?;
            let stream = client.query_raw(&stmt, no_params()).await?;
            Ok::<_, OrmError>((stmt, stream))
        })
        .await;
    cancel_if_aborted(&opened, || client.cancel_token());
    let (stmt, stream) = opened?;

    Ok(PgCursor {
        columns: stmt.columns().iter().map(|c| c.name().to_string()).collect(),
        types: stmt.columns().iter().map(|c| c.type_().clone()).collect(),
        stream: Some(Box::pin(stream)),
        current: Vec::new(),
        cancel: client.cancel_token(),
    })
}

/// Cursor over a streaming Postgres result.
pub struct PgCursor {
    columns: Vec<String>,
    types: Vec<Type>,
    stream: Option<Pin<Box<RowStream>>>,
    current: Vec<Value>,
    cancel: CancelToken,
}

impl std::fmt::Debug for PgCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgCursor")
            .field("columns", &self.columns)
            .field("released", &self.stream.is_none())
            .finish()
    }
}

impl PgCursor {
    fn decode_row(&self, row: &Row) -> OrmResult<Vec<Value>> {
        self.types
            .iter()
            .zip(&self.columns)
            .enumerate()
            .map(|(i, (ty, column))| decode_cell(row, i, ty, column))
            .collect()
    }
}

impl Cursor for PgCursor {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn advance(&mut self, ctx: &QueryCtx) -> OrmResult<bool> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(OrmError::Other("sqlbind: cursor already released".into()));
        };
        let mut stream = stream.as_mut();
        let next = ctx
            .run(async move { stream.next().await.transpose().map_err(OrmError::from) })
            .await;
        cancel_if_aborted(&next, || self.cancel.clone());

        match next? {
            Some(row) => {
                self.current = self.decode_row(&row)?;
                Ok(true)
            }
            None => {
                self.current.clear();
                Ok(false)
            }
        }
    }

    fn values(&self) -> &[Value] {
        &self.current
    }

    fn release(&mut self) {
        self.stream = None;
        self.current.clear();
    }
}

macro_rules! decode_as {
    ($row:expr, $i:expr, $ty:expr, $column:expr; $($t:ty => $wrap:expr),+ $(,)?) => {
        $(
            if <$t as FromSql<'_>>::accepts($ty) {
                let cell: Option<$t> = $row
                    .try_get($i)
                    .map_err(|e| OrmError::decode($column, e.to_string()))?;
                return Ok(cell.map($wrap).unwrap_or(Value::Null));
            }
        )+
    };
}

fn decode_cell(row: &Row, i: usize, ty: &Type, column: &str) -> OrmResult<Value> {
    decode_as!(row, i, ty, column;
        bool => Value::Bool,
        i16 => |v| Value::Int(i64::from(v)),
        i32 => |v| Value::Int(i64::from(v)),
        i64 => Value::Int,
        u32 => |v| Value::Int(i64::from(v)),
        i8 => |v| Value::Int(i64::from(v)),
        f32 => |v| Value::Float(f64::from(v)),
        f64 => Value::Float,
        String => Value::Text,
        Vec<u8> => Value::Bytes,
        serde_json::Value => Value::Json,
        uuid::Uuid => Value::Uuid,
        NaiveDate => Value::Date,
        NaiveTime => Value::Time,
        NaiveDateTime => Value::Timestamp,
        DateTime<Utc> => Value::TimestampTz,
        rust_decimal::Decimal => |d| Value::Text(d.to_string()),
        Vec<Option<bool>> => json_array,
        Vec<Option<i16>> => json_array,
        Vec<Option<i32>> => json_array,
        Vec<Option<i64>> => json_array,
        Vec<Option<f32>> => json_array,
        Vec<Option<f64>> => json_array,
        Vec<Option<String>> => json_array,
        Fallback => |f| f.0,
    );
    Err(OrmError::decode(
        column,
        format!("unsupported column type {}", ty.name()),
    ))
}

/// One-dimensional arrays surface as JSON arrays; `NULL` elements stay `null`.
fn json_array<T: Into<serde_json::Value>>(items: Vec<Option<T>>) -> Value {
    Value::Json(serde_json::Value::Array(
        items
            .into_iter()
            .map(|item| item.map_or(serde_json::Value::Null, Into::into))
            .collect(),
    ))
}

/// Any other type: its wire bytes as text when they are UTF-8 (enums, domains over
/// text), raw bytes otherwise.
struct Fallback(Value);

impl<'a> FromSql<'a> for Fallback {
    fn from_sql(
        _ty: &Type,
        raw: &'a [u8],
    ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(Fallback(match std::str::from_utf8(raw) {
            Ok(text) => Value::Text(text.to_string()),
            Err(_) => Value::Bytes(raw.to_vec()),
        }))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

impl Connection for Client {
    type Cursor = PgCursor;

    async fn execute(&self, sql: &str, ctx: &QueryCtx) -> OrmResult<u64> {
        execute(self, sql, ctx).await
    }

    async fn query(&self, sql: &str, ctx: &QueryCtx) -> OrmResult<PgCursor> {
        query(self, sql, ctx).await
    }
}

#[cfg(feature = "pool")]
impl Connection for deadpool_postgres::Client {
    type Cursor = PgCursor;

    async fn execute(&self, sql: &str, ctx: &QueryCtx) -> OrmResult<u64> {
        let client: &Client = self;
        execute(client, sql, ctx).await
    }

    async fn query(&self, sql: &str, ctx: &QueryCtx) -> OrmResult<PgCursor> {
        let client: &Client = self;
        query(client, sql, ctx).await
    }
}

/// Open a `NoTls` connection and drive it on a background task.
pub async fn connect(database_url: &str) -> OrmResult<Client> {
    let (client, connection) = tokio_postgres::connect(database_url, NoTls)
        .await
        .map_err(|e| OrmError::Connection(e.to_string()))?;
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            tracing::warn!(target: "sqlbind.sql", error = %err, "postgres connection closed");
        }
    });
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_reads_utf8_as_text_and_rest_as_bytes() {
        let text = Fallback::from_sql(&Type::UNKNOWN, b"happy").unwrap();
        assert_eq!(text.0, Value::Text("happy".into()));

        let bytes = Fallback::from_sql(&Type::UNKNOWN, &[0xff, 0x00]).unwrap();
        assert_eq!(bytes.0, Value::Bytes(vec![0xff, 0x00]));
        assert!(<Fallback as FromSql<'_>>::accepts(&Type::INTERVAL));
    }

    #[test]
    fn numeric_and_arrays_have_decoders() {
        assert!(<rust_decimal::Decimal as FromSql<'_>>::accepts(&Type::NUMERIC));
        assert!(<Vec<Option<i32>> as FromSql<'_>>::accepts(&Type::INT4_ARRAY));
        assert_eq!(
            json_array(vec![Some(1i64), None, Some(3)]),
            Value::Json(serde_json::json!([1, null, 3]))
        );
    }
}
