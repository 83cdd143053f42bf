//! Memoization Module
//!
//! Caches the results of blocking and async operations, keyed by the
//! operation's identity and arguments.

mod key;
mod wrapper;

pub use key::{CacheKey, CallArgs, KeyStrategy};
pub use wrapper::{
    memoize_blocking, memoize_suspendable, MemoizeOptions, Memoized, MemoizedAsync,
};
