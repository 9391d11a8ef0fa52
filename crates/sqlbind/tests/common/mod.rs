#![allow(dead_code)]

use sqlbind::{Connection, OrmResult, QueryCtx, VecCursor};
use std::sync::Mutex;

/// Records statements and replays queued cursors in order.
#[derive(Default)]
pub struct SpyConn {
    executed: Mutex<Vec<String>>,
    queried: Mutex<Vec<String>>,
    cursors: Mutex<Vec<VecCursor>>,
}

impl SpyConn {
    pub fn with_rows(cursor: VecCursor) -> Self {
        let spy = Self::default();
        spy.push_rows(cursor);
        spy
    }

    pub fn push_rows(&self, cursor: VecCursor) {
        self.cursors.lock().unwrap().insert(0, cursor);
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn queried(&self) -> Vec<String> {
        self.queried.lock().unwrap().clone()
    }
}

impl Connection for SpyConn {
    type Cursor = VecCursor;

    async fn execute(&self, sql: &str, ctx: &QueryCtx) -> OrmResult<u64> {
        ctx.check()?;
        self.executed.lock().unwrap().push(sql.to_string());
        Ok(0)
    }

    async fn query(&self, sql: &str, ctx: &QueryCtx) -> OrmResult<VecCursor> {
        ctx.check()?;
        self.queried.lock().unwrap().push(sql.to_string());
        Ok(self.cursors.lock().unwrap().pop().unwrap_or_default())
    }
}

/// Install a test subscriber once so `RUST_LOG=sqlbind=trace` shows statements.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
