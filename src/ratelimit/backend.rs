//! Hit store trait for abstracting over counting backends.

use async_trait::async_trait;

use super::record::IncrementResult;
use crate::error::Result;

/// Trait for hit store implementations.
///
/// The rate limit layer only talks to this trait, so an external backend can
/// stand in for the in-memory [`WindowStore`](super::WindowStore). Backends
/// must return `Err` on failure rather than reporting a key as under its
/// limit.
#[async_trait]
pub trait HitStore: Send + Sync {
    /// Count one request for `key` and decide whether it is over the limit.
    async fn increment(&self, key: &str) -> Result<IncrementResult>;

    /// Forget `key`, so its next request opens a fresh window.
    async fn reset_key(&self, key: &str) -> Result<()>;

    /// Hit ceiling per window.
    fn max_connections(&self) -> u64;

    /// Window length in seconds.
    fn window_seconds(&self) -> u64;
}
