//! cachepool - result caching and pooled SQLite access
//!
//! Provides a TTL/LRU result cache with memoization wrappers, and an async
//! bounded connection pool with a query executor on top.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod executor;
pub mod memo;
pub mod pool;
pub mod tasks;

pub use cache::{CacheStore, SharedCache};
pub use config::Config;
pub use executor::QueryExecutor;
pub use memo::{memoize_blocking, memoize_suspendable, CallArgs, MemoizeOptions};
pub use pool::{ConnectionPool, SqlitePool};
pub use tasks::spawn_cleanup_task;
