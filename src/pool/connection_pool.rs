//! Connection Pool
//!
//! Fixed-size async pool of backing-store connections with scoped acquisition.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use super::connector::{ConnectionFactory, SqliteConnector};
use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};

/// Idle connections plus lifetime bookkeeping, guarded together so a
/// returning connection can never slip into a pool that is closing.
struct Slots<C> {
    idle: VecDeque<C>,
    /// Connections that exist (idle or lent out)
    open: usize,
    closed: bool,
}

struct Shared<F: ConnectionFactory> {
    factory: F,
    slots: Mutex<Slots<F::Connection>>,
    /// One permit per idle connection
    permits: Arc<Semaphore>,
    max_connections: usize,
    initialized: AtomicBool,
    init_lock: tokio::sync::Mutex<()>,
}

impl<F: ConnectionFactory> Shared<F> {
    /// Opens every connection and publishes them to the pool.
    async fn initialize(self: Arc<Self>) -> PoolResult<()> {
        let _guard = self.init_lock.lock().await;
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        let closed = self.slots.lock().closed;
        if closed {
            return Err(PoolError::Closed);
        }

        let shared = Arc::clone(&self);
        let count = self.max_connections;
        let opened = tokio::task::spawn_blocking(move || {
            let mut conns = Vec::with_capacity(count);
            for _ in 0..count {
                match shared.factory.connect() {
                    Ok(conn) => conns.push(conn),
                    Err(e) => {
                        for conn in conns {
                            shared.factory.close(conn);
                        }
                        return Err(PoolError::Connect(e));
                    }
                }
            }
            Ok(conns)
        })
        .await
        .map_err(|e| PoolError::Connect(Box::new(e)))??;

        let rejected = {
            let mut slots = self.slots.lock();
            if slots.closed {
                Some(opened)
            } else {
                slots.open = opened.len();
                slots.idle.extend(opened);
                None
            }
        };
        if let Some(opened) = rejected {
            for conn in opened {
                self.factory.close(conn);
            }
            return Err(PoolError::Closed);
        }

        self.permits.add_permits(count);
        self.initialized.store(true, Ordering::Release);

        info!(max_connections = count, "Connection pool initialized");
        Ok(())
    }

    /// Takes a connection back from a guard.
    fn release(&self, conn: F::Connection) {
        let mut slots = self.slots.lock();
        if slots.closed {
            slots.open -= 1;
            drop(slots);
            self.factory.close(conn);
            debug!("Closed connection returned after pool shutdown");
        } else {
            slots.idle.push_back(conn);
        }
    }
}

/// Point-in-time view of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub max_connections: usize,
    pub idle: usize,
    pub in_use: usize,
    pub closed: bool,
}

// == Connection Pool ==
/// Bounded pool that lends out at most `max_connections` connections.
///
/// Cloning is cheap; clones share the same connections.
pub struct ConnectionPool<F: ConnectionFactory> {
    shared: Arc<Shared<F>>,
    acquire_timeout: Option<Duration>,
}

impl<F: ConnectionFactory> Clone for ConnectionPool<F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            acquire_timeout: self.acquire_timeout,
        }
    }
}

impl<F: ConnectionFactory> std::fmt::Debug for ConnectionPool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("status", &self.status())
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

impl ConnectionPool<SqliteConnector> {
    /// Creates a SQLite pool from configuration. Nothing is opened until
    /// [`initialize`](Self::initialize) or the first acquire.
    pub fn from_config(config: &PoolConfig) -> Self {
        Self::new(
            SqliteConnector::new(config.backing_path.clone())
                .with_busy_timeout(config.busy_timeout),
            config.max_connections,
        )
        .with_acquire_timeout(config.acquire_timeout)
    }
}

impl<F: ConnectionFactory> ConnectionPool<F> {
    // == Constructor ==
    /// Creates a pool that will hold `max_connections` connections from `factory`.
    pub fn new(factory: F, max_connections: usize) -> Self {
        let max_connections = max_connections.max(1);
        Self {
            shared: Arc::new(Shared {
                factory,
                slots: Mutex::new(Slots {
                    idle: VecDeque::with_capacity(max_connections),
                    open: 0,
                    closed: false,
                }),
                permits: Arc::new(Semaphore::new(0)),
                max_connections,
                initialized: AtomicBool::new(false),
                init_lock: tokio::sync::Mutex::new(()),
            }),
            acquire_timeout: None,
        }
    }

    /// Bounds how long [`acquire`](Self::acquire) waits. `None` waits indefinitely.
    pub fn with_acquire_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn factory(&self) -> &F {
        &self.shared.factory
    }

    pub fn max_connections(&self) -> usize {
        self.shared.max_connections
    }

    // == Initialize ==
    /// Opens all `max_connections` connections. Later calls are no-ops.
    ///
    /// If any connection fails to open, the ones already opened are closed
    /// and the error is returned; the pool stays uninitialized.
    ///
    /// The opening runs on its own task. A caller that stops waiting does
    /// not interrupt it, and the connections still land in the pool.
    pub async fn initialize(&self) -> PoolResult<()> {
        if self.shared.initialized.load(Ordering::Acquire) {
            return Ok(());
        }

        tokio::spawn(Arc::clone(&self.shared).initialize())
            .await
            .map_err(|e| PoolError::Connect(Box::new(e)))?
    }

    // == Acquire ==
    /// Borrows a connection, waiting for one to be released if all are in use.
    ///
    /// The connection goes back to the pool when the returned guard is dropped,
    /// whichever way the holder's scope ends. Dropping this future while it
    /// waits gives up the wait without affecting any connection.
    ///
    /// The acquire timeout covers the whole call, including opening the
    /// connections on first use.
    pub async fn acquire(&self) -> PoolResult<PooledConnection<F>> {
        let Some(timeout) = self.acquire_timeout else {
            return self.acquire_unbounded().await;
        };

        match tokio::time::timeout(timeout, self.acquire_unbounded()).await {
            Ok(result) => result,
            Err(_) => {
                warn!(?timeout, "Timed out waiting for a pooled connection");
                Err(PoolError::Timeout(timeout))
            }
        }
    }

    async fn acquire_unbounded(&self) -> PoolResult<PooledConnection<F>> {
        self.initialize().await?;

        let permit = Arc::clone(&self.shared.permits)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        let conn = {
            let mut slots = self.shared.slots.lock();
            if slots.closed {
                None
            } else {
                slots.idle.pop_front()
            }
        };

        match conn {
            Some(conn) => Ok(PooledConnection {
                conn: Some(conn),
                shared: Arc::clone(&self.shared),
                _permit: permit,
            }),
            None => Err(PoolError::Closed),
        }
    }

    /// Borrows a connection only if one is free right now.
    pub fn try_acquire(&self) -> PoolResult<Option<PooledConnection<F>>> {
        let permit = match Arc::clone(&self.shared.permits).try_acquire_owned() {
            Ok(permit) => permit,
            Err(tokio::sync::TryAcquireError::Closed) => return Err(PoolError::Closed),
            Err(tokio::sync::TryAcquireError::NoPermits) => return Ok(None),
        };

        let conn = self.shared.slots.lock().idle.pop_front();
        Ok(conn.map(|conn| PooledConnection {
            conn: Some(conn),
            shared: Arc::clone(&self.shared),
            _permit: permit,
        }))
    }

    // == Close ==
    /// Stops lending connections and closes every idle one.
    ///
    /// Connections still lent out are closed as their guards drop. Waiting
    /// and later acquirers get [`PoolError::Closed`]. Calling twice is harmless.
    pub fn close(&self) {
        let drained: Vec<F::Connection> = {
            let mut slots = self.shared.slots.lock();
            if slots.closed {
                return;
            }
            slots.closed = true;
            let drained: Vec<_> = slots.idle.drain(..).collect();
            slots.open -= drained.len();
            drained
        };
        self.shared.permits.close();

        let count = drained.len();
        for conn in drained {
            self.shared.factory.close(conn);
        }
        info!(closed = count, "Connection pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.shared.slots.lock().closed
    }

    pub fn status(&self) -> PoolStatus {
        let slots = self.shared.slots.lock();
        PoolStatus {
            max_connections: self.shared.max_connections,
            idle: slots.idle.len(),
            in_use: slots.open - slots.idle.len(),
            closed: slots.closed,
        }
    }
}

// == Pooled Connection ==
/// A connection on loan from a [`ConnectionPool`]; returned on drop.
pub struct PooledConnection<F: ConnectionFactory> {
    conn: Option<F::Connection>,
    shared: Arc<Shared<F>>,
    // Released after `drop` has pushed the connection back.
    _permit: OwnedSemaphorePermit,
}

impl<F: ConnectionFactory> Deref for PooledConnection<F> {
    type Target = F::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection is present until drop")
    }
}

impl<F: ConnectionFactory> DerefMut for PooledConnection<F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection is present until drop")
    }
}

impl<F: ConnectionFactory> std::fmt::Debug for PooledConnection<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("max_connections", &self.shared.max_connections)
            .field("held", &self.conn.is_some())
            .finish()
    }
}

impl<F: ConnectionFactory> Drop for PooledConnection<F> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.shared.release(conn);
        }
    }
}
