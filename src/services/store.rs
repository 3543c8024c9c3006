//! Key-value store abstraction backing visit dedup and pending counters

use async_trait::async_trait;

use crate::error::AppResult;

/// The cache operations the visit tracker relies on.
///
/// Every method must be atomic with respect to concurrent callers on the same key;
/// the tracker takes no locks of its own.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VisitStore: Send + Sync {
    /// Read a key, `None` when absent or expired
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Unconditionally write a key that expires after `ttl_secs`
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> AppResult<()>;

    /// Write a key with a TTL only if it does not exist yet.
    /// Returns `true` when this call created the key.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> AppResult<bool>;

    /// Increment an integer key by one, starting from 0, and return the new value
    async fn incr(&self, key: &str) -> AppResult<i64>;

    /// Round trip to the backing service
    async fn ping(&self) -> AppResult<()>;
}
