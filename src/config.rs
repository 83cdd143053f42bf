//! Configuration Module
//!
//! Handles loading cache and connection pool configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Cache configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Maximum number of entries the cache can hold
    pub max_size: usize,
    /// Default TTL in seconds for entries without explicit TTL
    pub default_ttl: u64,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            default_ttl: 300,
            cleanup_interval: 60,
        }
    }
}

/// Connection pool configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    /// Number of connections opened by the pool
    pub max_connections: usize,
    /// Path of the backing SQLite database
    pub backing_path: PathBuf,
    /// Upper bound on how long `acquire` waits; `None` waits indefinitely
    pub acquire_timeout: Option<Duration>,
    /// How long a connection waits on a locked database file
    pub busy_timeout: Duration,
}

impl PoolConfig {
    /// Creates a pool configuration without an acquire timeout.
    pub fn new(backing_path: impl Into<PathBuf>, max_connections: usize) -> Self {
        Self {
            max_connections,
            backing_path: backing_path.into(),
            acquire_timeout: None,
            busy_timeout: Duration::from_millis(10_000),
        }
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new("cachepool.db", 5)
    }
}

/// Full configuration for the cache and the pool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub cache: CacheConfig,
    pub pool: PoolConfig,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_SIZE` - Maximum cache entries (default: 1000)
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `CACHE_CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 60)
    /// - `POOL_MAX_CONNECTIONS` - Pooled connections (default: 5)
    /// - `POOL_BACKING_PATH` - SQLite database path (default: cachepool.db)
    /// - `POOL_ACQUIRE_TIMEOUT_MS` - Acquire timeout in milliseconds (default: unset)
    /// - `POOL_BUSY_TIMEOUT_MS` - SQLite busy timeout in milliseconds (default: 10000)
    ///
    /// Unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache: CacheConfig {
                max_size: env_or("CACHE_MAX_SIZE", defaults.cache.max_size),
                default_ttl: env_or("CACHE_DEFAULT_TTL", defaults.cache.default_ttl),
                cleanup_interval: env_or(
                    "CACHE_CLEANUP_INTERVAL",
                    defaults.cache.cleanup_interval,
                ),
            },
            pool: PoolConfig {
                max_connections: env_or("POOL_MAX_CONNECTIONS", defaults.pool.max_connections),
                backing_path: env::var("POOL_BACKING_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.pool.backing_path),
                acquire_timeout: env::var("POOL_ACQUIRE_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .map(Duration::from_millis),
                busy_timeout: Duration::from_millis(env_or(
                    "POOL_BUSY_TIMEOUT_MS",
                    defaults.pool.busy_timeout.as_millis() as u64,
                )),
            },
        }
    }

    /// Rejects configurations the cache or pool cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.max_size == 0 {
            return Err(ConfigError::Invalid("cache max_size must be > 0".into()));
        }
        if self.cache.default_ttl == 0 {
            return Err(ConfigError::Invalid("cache default_ttl must be > 0".into()));
        }
        if self.cache.cleanup_interval == 0 {
            return Err(ConfigError::Invalid("cache cleanup_interval must be > 0".into()));
        }
        if self.pool.max_connections == 0 {
            return Err(ConfigError::Invalid("pool max_connections must be > 0".into()));
        }
        if self.pool.backing_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("pool backing_path must not be empty".into()));
        }
        Ok(())
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
