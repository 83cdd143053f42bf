//! Error types for the cache and connection pool
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Config Error ==
/// Invalid configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// == Pool Error ==
/// Failures of the connection pool itself.
#[derive(Error, Debug)]
pub enum PoolError {
    /// The pool was closed; no more connections are handed out
    #[error("Connection pool is closed")]
    Closed,

    /// No connection was released within the acquire timeout
    #[error("Timed out after {0:?} waiting for a pooled connection")]
    Timeout(std::time::Duration),

    /// Opening a backing-store connection failed
    #[error("Failed to open connection: {0}")]
    Connect(#[source] Box<dyn std::error::Error + Send + Sync>),
}

// == Executor Error ==
/// Failures surfaced by the query executor.
#[derive(Error, Debug)]
pub enum ExecutorError {
    /// Could not obtain a connection
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// The backing store rejected the statement
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// The blocking worker running the statement panicked or was cancelled
    #[error("Query worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

// == Result Type Aliases ==
/// Result type for pool operations.
pub type PoolResult<T> = std::result::Result<T, PoolError>;

/// Result type for executor operations.
pub type Result<T> = std::result::Result<T, ExecutorError>;
