//! Pool Module
//!
//! Bounded async connection pool and the factories that feed it.

mod connection_pool;
mod connector;

pub use connection_pool::{ConnectionPool, PoolStatus, PooledConnection};
pub use connector::{ConnectError, ConnectionFactory, SqliteConnector};

/// Pool of SQLite connections.
pub type SqlitePool = ConnectionPool<SqliteConnector>;
