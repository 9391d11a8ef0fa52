//! Pooled Postgres connections.
//!
//! `deadpool_postgres::Client` implements [`Connection`](crate::Connection), so a
//! checked-out client can back a [`Db`](crate::Db) directly:
//!
//! ```ignore
//! let pool = sqlbind::create_pool("postgres://postgres@localhost/test", 8)?;
//! let db = Db::new(pool.get().await?);
//! ```

use crate::error::{OrmError, OrmResult};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::NoTls;

/// Build a `NoTls` pool of at most `max_size` connections.
pub fn create_pool(database_url: &str, max_size: usize) -> OrmResult<Pool> {
    let pg_config: tokio_postgres::Config = database_url
        .parse()
        .map_err(|e: tokio_postgres::Error| OrmError::Connection(e.to_string()))?;

    let manager = Manager::from_config(
        pg_config,
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );
    Pool::builder(manager)
        .max_size(max_size)
        .build()
        .map_err(|e| OrmError::Pool(e.to_string()))
}
