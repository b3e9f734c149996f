//! Bounded SQLite connection pool and schema bootstrap.
//!
//! spec.md's resource model (§5) describes a Postgres-style bounded pool
//! (`maxOpen`, `maxIdle`, `connMaxLifetime`, `connMaxIdleTime`). No Postgres
//! driver or pooling crate appears anywhere in the retrieval corpus, so this
//! implements the same sizing semantics over `rusqlite` with a hand-rolled
//! pool: a `tokio::sync::Semaphore` bounds the number of open connections,
//! and a free-list of idle connections (guarded by `parking_lot::Mutex`) is
//! reused across checkouts subject to `maxIdle`/`connMaxIdleTime`. See
//! DESIGN.md for the open-question resolution.

pub mod schema;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_open: usize,
    pub max_idle: usize,
    pub conn_max_lifetime: Duration,
    pub conn_max_idle_time: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_open: 25,
            max_idle: 5,
            conn_max_lifetime: Duration::from_secs(5 * 60),
            conn_max_idle_time: Duration::from_secs(60),
        }
    }
}

impl PoolConfig {
    /// Validate and clamp per spec §5: `maxIdle` is clamped to `maxOpen`.
    pub fn validated(mut self) -> Self {
        if self.max_open == 0 {
            self.max_open = 1;
        }
        if self.max_idle > self.max_open {
            self.max_idle = self.max_open;
        }
        self
    }
}

struct IdleConnection {
    conn: Connection,
    opened_at: Instant,
    idle_since: Instant,
}

struct PoolInner {
    path: String,
    config: PoolConfig,
    idle: Mutex<Vec<IdleConnection>>,
    semaphore: Arc<Semaphore>,
}

/// A bounded pool of SQLite connections to a single database file (or
/// `:memory:`/temp path in tests).
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

/// A leased connection. Returned to the idle free-list on drop unless it has
/// exceeded `conn_max_lifetime`, in which case it is closed instead.
pub struct PooledConnection {
    conn: Option<Connection>,
    opened_at: Instant,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledConnection {
    type Target = Connection;
    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection taken")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection taken")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };

        let now = Instant::now();
        if now.duration_since(self.opened_at) >= self.pool.config.conn_max_lifetime {
            return; // let it close
        }

        let mut idle = self.pool.idle.lock();
        if idle.len() < self.pool.config.max_idle {
            idle.push(IdleConnection {
                conn,
                opened_at: self.opened_at,
                idle_since: now,
            });
        }
        // else: drop the connection, it closes on scope exit
    }
}

impl Pool {
    pub fn new(path: impl Into<String>, config: PoolConfig) -> Result<Self> {
        let config = config.validated();
        let inner = PoolInner {
            path: path.into(),
            semaphore: Arc::new(Semaphore::new(config.max_open)),
            config,
            idle: Mutex::new(Vec::new()),
        };
        let pool = Self {
            inner: Arc::new(inner),
        };
        {
            let conn = pool.open_connection()?;
            schema::initialize(&conn).context("failed to initialize schema")?;
        }
        Ok(pool)
    }

    fn open_connection(&self) -> Result<Connection> {
        let conn = Connection::open(&self.inner.path)
            .with_context(|| format!("failed to open database at {}", self.inner.path))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(conn)
    }

    /// Acquire a connection, blocking (asynchronously) until one of
    /// `max_open` slots is free.
    pub async fn get(&self) -> Result<PooledConnection> {
        let permit = self
            .inner
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .context("connection pool semaphore closed")?;

        let now = Instant::now();
        let reusable = {
            let mut idle = self.inner.idle.lock();
            idle.iter()
                .position(|c| {
                    now.duration_since(c.idle_since) < self.inner.config.conn_max_idle_time
                        && now.duration_since(c.opened_at) < self.inner.config.conn_max_lifetime
                })
                .map(|i| idle.remove(i))
        };

        let (conn, opened_at) = match reusable {
            Some(idle_conn) => (idle_conn.conn, idle_conn.opened_at),
            None => (self.open_connection()?, now),
        };

        Ok(PooledConnection {
            conn: Some(conn),
            opened_at,
            pool: self.inner.clone(),
            _permit: permit,
        })
    }

    pub fn config(&self) -> PoolConfig {
        self.inner.config.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_idle_clamped_to_max_open() {
        let config = PoolConfig {
            max_open: 3,
            max_idle: 10,
            ..PoolConfig::default()
        }
        .validated();
        assert_eq!(config.max_idle, 3);
    }

    #[tokio::test]
    async fn acquires_and_releases_connections() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let pool = Pool::new(
            tmp.path().to_str().unwrap().to_string(),
            PoolConfig {
                max_open: 2,
                max_idle: 2,
                ..PoolConfig::default()
            },
        )
        .unwrap();

        let a = pool.get().await.unwrap();
        let b = pool.get().await.unwrap();
        drop(a);
        drop(b);

        let c = pool.get().await.unwrap();
        drop(c);
    }
}
