//! Memoized Operations
//!
//! Wraps blocking or async operations so their successful results are
//! served from a shared [`CacheStore`](crate::cache::CacheStore).
//!
//! Concurrent calls that miss on the same key are not coalesced: each one
//! runs the operation and the last to finish wins the slot.

use std::future::Future;

use serde::Serialize;
use tracing::{debug, warn};

use super::key::{CacheKey, KeyStrategy};
use crate::cache::SharedCache;

// == Memoize Options ==
/// TTL and key derivation for a memoized operation.
#[derive(Debug, Clone)]
pub struct MemoizeOptions<A: ?Sized> {
    /// TTL in seconds; `None` uses the store's default
    pub ttl: Option<u64>,
    pub key: KeyStrategy<A>,
}

impl<A: ?Sized> Default for MemoizeOptions<A> {
    fn default() -> Self {
        Self {
            ttl: None,
            key: KeyStrategy::Arguments,
        }
    }
}

impl<A: ?Sized> MemoizeOptions<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl_seconds: u64) -> Self {
        self.ttl = Some(ttl_seconds);
        self
    }

    /// Builds keys from a caller-supplied string instead of the full arguments.
    pub fn with_key_fn(mut self, f: impl Fn(&A) -> String + Send + Sync + 'static) -> Self {
        self.key = KeyStrategy::custom(f);
        self
    }
}

/// Key derivation and storage shared by both memoized flavours.
struct Memo<A, V> {
    cache: SharedCache<V>,
    identity: String,
    options: MemoizeOptions<A>,
}

impl<A: Serialize, V: Clone> Memo<A, V> {
    fn key(&self, args: &A) -> Option<CacheKey> {
        match self.options.key.derive(&self.identity, args) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(
                    identity = %self.identity,
                    error = %e,
                    "Arguments cannot be keyed, bypassing cache"
                );
                None
            }
        }
    }

    fn lookup(&self, key: &CacheKey) -> Option<V> {
        let hit = self.cache.lock().get(key.as_str());
        if hit.is_some() {
            debug!(identity = %self.identity, %key, "Memo hit");
        }
        hit
    }

    fn store(&self, key: CacheKey, value: &V) {
        self.cache
            .lock()
            .set(key.into_string(), value.clone(), self.options.ttl);
    }
}

// == Blocking ==
/// A blocking operation with memoized results. See [`memoize_blocking`].
pub struct Memoized<A, V, F> {
    memo: Memo<A, V>,
    op: F,
}

impl<A, V, E, F> Memoized<A, V, F>
where
    A: Serialize,
    V: Clone,
    F: Fn(A) -> Result<V, E>,
{
    /// Returns the cached result for `args`, or runs the operation.
    ///
    /// Errors are returned as-is and never cached.
    pub fn call(&self, args: A) -> Result<V, E> {
        let key = self.memo.key(&args);
        if let Some(value) = key.as_ref().and_then(|key| self.memo.lookup(key)) {
            return Ok(value);
        }

        let value = (self.op)(args)?;
        if let Some(key) = key {
            self.memo.store(key, &value);
        }
        Ok(value)
    }

    pub fn identity(&self) -> &str {
        &self.memo.identity
    }
}

/// Wraps a blocking operation so repeated calls reuse `cache`.
///
/// `identity` names the operation; two operations sharing a cache must use
/// different identities.
pub fn memoize_blocking<A, V, E, F>(
    cache: SharedCache<V>,
    identity: impl Into<String>,
    options: MemoizeOptions<A>,
    op: F,
) -> Memoized<A, V, F>
where
    A: Serialize,
    V: Clone,
    F: Fn(A) -> Result<V, E>,
{
    Memoized {
        memo: Memo {
            cache,
            identity: identity.into(),
            options,
        },
        op,
    }
}

// == Suspendable ==
/// An async operation with memoized results. See [`memoize_suspendable`].
pub struct MemoizedAsync<A, V, F> {
    memo: Memo<A, V>,
    op: F,
}

impl<A, V, E, F, Fut> MemoizedAsync<A, V, F>
where
    A: Serialize,
    V: Clone,
    F: Fn(A) -> Fut,
    Fut: Future<Output = Result<V, E>>,
{
    /// Returns the cached result for `args`, or awaits the operation.
    ///
    /// A hit completes on the first poll; only a miss waits on the operation.
    pub async fn call(&self, args: A) -> Result<V, E> {
        let key = self.memo.key(&args);
        if let Some(value) = key.as_ref().and_then(|key| self.memo.lookup(key)) {
            return Ok(value);
        }

        let value = (self.op)(args).await?;
        if let Some(key) = key {
            self.memo.store(key, &value);
        }
        Ok(value)
    }

    pub fn identity(&self) -> &str {
        &self.memo.identity
    }
}

/// Wraps an async operation so repeated calls reuse `cache`.
pub fn memoize_suspendable<A, V, E, F, Fut>(
    cache: SharedCache<V>,
    identity: impl Into<String>,
    options: MemoizeOptions<A>,
    op: F,
) -> MemoizedAsync<A, V, F>
where
    A: Serialize,
    V: Clone,
    F: Fn(A) -> Fut,
    Fut: Future<Output = Result<V, E>>,
{
    MemoizedAsync {
        memo: Memo {
            cache,
            identity: identity.into(),
            options,
        },
        op,
    }
}
