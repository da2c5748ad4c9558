//! Bounded DB connection pool with health checks, retries, and bulk writes
//! (spec §4.10).
//!
//! Hand-rolled rather than pulled from a pooling crate, using an explicit
//! `ArrayQueue`-backed free list over bringing in an external pool
//! manager.

use crossbeam_queue::ArrayQueue;
use log::{error, warn};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::db::schema;
use crate::error::PoolError;

#[derive(Debug, Default)]
pub struct PoolStats {
    pub created: AtomicU64,
    pub borrowed: AtomicU64,
    pub returned: AtomicU64,
    pub failed_health_checks: AtomicU64,
    pub health_checks: AtomicU64,
}

pub struct ConnectionPool {
    path: PathBuf,
    idle: ArrayQueue<Connection>,
    stats: PoolStats,
    borrow_timeout: Duration,
}

/// RAII handle; returns the connection to the pool on drop.
pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    conn: Option<Connection>,
}

impl<'a> std::ops::Deref for PooledConnection<'a> {
    type Target = Connection;
    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl<'a> Drop for PooledConnection<'a> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let _ = self.pool.idle.push(conn);
            self.pool.stats.returned.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl ConnectionPool {
    /// Opens `size` connections up front (spec §4.10, fixed-size pool 5..10).
    pub fn new(path: impl AsRef<Path>, size: usize, borrow_timeout: Duration) -> rusqlite::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let idle = ArrayQueue::new(size.clamp(5, 10));
        let stats = PoolStats::default();
        for _ in 0..idle.capacity() {
            let conn = Connection::open(&path)?;
            schema::ensure_schema(&conn)?;
            let _ = idle.push(conn);
            stats.created.fetch_add(1, Ordering::Relaxed);
        }
        Ok(Self {
            path,
            idle,
            stats,
            borrow_timeout,
        })
    }

    fn open_fresh(&self) -> rusqlite::Result<Connection> {
        let conn = Connection::open(&self.path)?;
        schema::ensure_schema(&conn)?;
        self.stats.created.fetch_add(1, Ordering::Relaxed);
        Ok(conn)
    }

    /// Borrows a connection, running a trivial health probe first;
    /// connections that fail the probe are discarded and replaced.
    pub fn borrow(&self) -> Result<PooledConnection<'_>, PoolError> {
        let deadline = Instant::now() + self.borrow_timeout;
        loop {
            if let Some(conn) = self.idle.pop() {
                self.stats.health_checks.fetch_add(1, Ordering::Relaxed);
                if conn.execute_batch("SELECT 1").is_ok() {
                    self.stats.borrowed.fetch_add(1, Ordering::Relaxed);
                    return Ok(PooledConnection {
                        pool: self,
                        conn: Some(conn),
                    });
                }
                self.stats.failed_health_checks.fetch_add(1, Ordering::Relaxed);
                warn!("pooled connection failed health probe, discarding");
                match self.open_fresh() {
                    Ok(fresh) => {
                        self.stats.borrowed.fetch_add(1, Ordering::Relaxed);
                        return Ok(PooledConnection {
                            pool: self,
                            conn: Some(fresh),
                        });
                    }
                    Err(e) => {
                        error!("failed to open replacement connection: {e}");
                    }
                }
            }
            if Instant::now() >= deadline {
                return Err(PoolError::BorrowTimeout(self.borrow_timeout));
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    /// Runs `op` with a borrowed connection, retrying transient failures
    /// with exponential backoff (base 0.1s, factor 2x, up to 3 attempts).
    pub fn with_retry<T>(
        &self,
        mut op: impl FnMut(&Connection) -> Result<T, PoolError>,
    ) -> Result<T, PoolError> {
        let mut backoff = Duration::from_millis(100);
        let mut last_err = None;
        for attempt in 0..3 {
            let conn = self.borrow()?;
            match op(&conn) {
                Ok(v) => return Ok(v),
                Err(PoolError::NonTransient(msg)) => {
                    return Err(PoolError::NonTransient(msg));
                }
                Err(e) => {
                    warn!("transient DB error on attempt {attempt}: {e}");
                    last_err = Some(e);
                    std::thread::sleep(backoff);
                    backoff *= 2;
                }
            }
        }
        Err(last_err.unwrap_or_else(|| PoolError::Transient("exhausted retries".into())))
    }

    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }
}
