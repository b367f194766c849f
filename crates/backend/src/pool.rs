//! Fixed-capacity pools of backend connections.
//!
//! A connection is handed out as a [`PooledConnection`] guard and goes back
//! to the pool when the guard is dropped, on every exit path.
//!
//! ## Exhaustion
//!
//! When every connection is checked out, `acquire` either waits up to a
//! configured timeout for one to come back or fails immediately, depending
//! on the pool's [`ExhaustionPolicy`]. Both failures surface as
//! [`BackendError::Exhausted`].

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, warn};

use crate::connection::BackendConnection;
use crate::error::{BackendError, BackendResult};
use crate::query::QueryParams;
use crate::record::BinaryRecord;

/// Default wait for a connection when a pool is exhausted.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// What `acquire` does when no connection is free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustionPolicy {
    /// Wait up to `timeout` for a connection to be released
    Wait { timeout: Duration },
    /// Fail immediately
    FailFast,
}

impl Default for ExhaustionPolicy {
    fn default() -> Self {
        ExhaustionPolicy::Wait {
            timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }
}

/// Counters for one pool.
///
/// All fields are atomic for lock-free reads from health endpoints.
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Total successful checkouts
    pub checkouts: AtomicU64,
    /// Total connections returned
    pub checkins: AtomicU64,
    /// Total acquires that gave up on an exhausted pool
    pub exhausted: AtomicU64,
}

/// Point-in-time view of a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolSnapshot {
    pub name: String,
    pub capacity: usize,
    pub available: usize,
    pub outstanding: usize,
    pub checkouts: u64,
    pub checkins: u64,
    pub exhausted: u64,
}

/// A named, fixed-capacity set of connections to one backend.
pub struct BackendPool {
    name: String,
    connections: Vec<Box<dyn BackendConnection>>,
    /// Slots of connections not currently checked out
    idle: Mutex<Vec<usize>>,
    permits: Semaphore,
    outstanding: AtomicUsize,
    policy: ExhaustionPolicy,
    stats: PoolStats,
}

impl BackendPool {
    /// Create a pool owning `connections`. Capacity is fixed from here on.
    pub fn new(
        name: impl Into<String>,
        connections: Vec<Box<dyn BackendConnection>>,
        policy: ExhaustionPolicy,
    ) -> Self {
        let capacity = connections.len();
        Self {
            name: name.into(),
            idle: Mutex::new((0..capacity).rev().collect()),
            permits: Semaphore::new(capacity),
            connections,
            outstanding: AtomicUsize::new(0),
            policy,
            stats: PoolStats::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.connections.len()
    }

    pub fn policy(&self) -> ExhaustionPolicy {
        self.policy
    }

    /// Number of connections currently checked out.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            name: self.name.clone(),
            capacity: self.capacity(),
            available: self.available(),
            outstanding: self.outstanding(),
            checkouts: self.stats.checkouts.load(Ordering::Relaxed),
            checkins: self.stats.checkins.load(Ordering::Relaxed),
            exhausted: self.stats.exhausted.load(Ordering::Relaxed),
        }
    }

    /// Check out a connection for exclusive use.
    pub async fn acquire(&self) -> BackendResult<PooledConnection<'_>> {
        let started = Instant::now();
        let permit = match self.policy {
            ExhaustionPolicy::FailFast => self.permits.try_acquire().ok(),
            ExhaustionPolicy::Wait { timeout } => {
                match tokio::time::timeout(timeout, self.permits.acquire()).await {
                    Ok(Ok(permit)) => Some(permit),
                    Ok(Err(_)) => return Err(BackendError::PoolClosed(self.name.clone())),
                    Err(_) => None,
                }
            }
        };

        let Some(permit) = permit else {
            let waited_ms = started.elapsed().as_millis() as u64;
            self.stats.exhausted.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("backend_exhausted_total", "pool" => self.name.clone()).increment(1);
            warn!(pool = %self.name, capacity = self.capacity(), waited_ms, "Backend pool exhausted");
            return Err(BackendError::Exhausted {
                pool: self.name.clone(),
                waited_ms,
            });
        };

        let slot = self
            .idle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop()
            .ok_or_else(|| BackendError::PoolClosed(self.name.clone()))?;

        self.outstanding.fetch_add(1, Ordering::SeqCst);
        self.stats.checkouts.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("backend_checkouts_total", "pool" => self.name.clone()).increment(1);
        debug!(pool = %self.name, slot, outstanding = self.outstanding(), "Connection checked out");

        Ok(PooledConnection {
            pool: self,
            slot,
            _permit: permit,
        })
    }

    /// Return a connection. Equivalent to dropping the guard.
    pub fn release(&self, conn: PooledConnection<'_>) {
        debug_assert!(std::ptr::eq(conn.pool, self), "connection released to the wrong pool");
        drop(conn);
    }

    fn check_in(&self, slot: usize) {
        self.idle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(slot);
        let _ = self
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)));
        self.stats.checkins.fetch_add(1, Ordering::Relaxed);
        debug!(pool = %self.name, slot, outstanding = self.outstanding(), "Connection checked in");
    }
}

impl std::fmt::Debug for BackendPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendPool")
            .field("name", &self.name)
            .field("capacity", &self.capacity())
            .field("outstanding", &self.outstanding())
            .field("policy", &self.policy)
            .finish()
    }
}

/// A checked-out connection. Returned to its pool on drop.
pub struct PooledConnection<'a> {
    pool: &'a BackendPool,
    slot: usize,
    // Dropped after `Drop::drop` has put the slot back on the idle list.
    _permit: SemaphorePermit<'a>,
}

impl<'a> PooledConnection<'a> {
    pub fn connection(&self) -> &dyn BackendConnection {
        self.pool.connections[self.slot].as_ref()
    }

    pub fn pool_name(&self) -> &str {
        &self.pool.name
    }

    /// Text query with timing metrics.
    pub async fn text_query(&self, params: &QueryParams) -> BackendResult<Vec<String>> {
        let started = Instant::now();
        let result = self.connection().text_query(params).await;
        self.record_query(params, started, result.is_ok());
        result
    }

    /// Binary query with timing metrics.
    pub async fn binary_query(&self, params: &QueryParams) -> BackendResult<Option<BinaryRecord>> {
        let started = Instant::now();
        let result = self.connection().binary_query(params).await;
        self.record_query(params, started, result.is_ok());
        result
    }

    fn record_query(&self, params: &QueryParams, started: Instant, ok: bool) {
        let elapsed = started.elapsed();
        metrics::histogram!(
            "backend_query_seconds",
            "pool" => self.pool.name.clone(),
            "action" => params.action().to_string()
        )
        .record(elapsed.as_secs_f64());
        if !ok {
            metrics::counter!("backend_query_errors_total", "pool" => self.pool.name.clone()).increment(1);
        }
        debug!(
            pool = %self.pool.name,
            source = %params.source(),
            action = %params.action(),
            elapsed_ms = elapsed.as_millis() as u64,
            ok,
            "Backend query"
        );
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        self.pool.check_in(self.slot);
    }
}
