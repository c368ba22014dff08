//! Key-value persistence port

use std::time::Duration;

use async_trait::async_trait;
use calsync_domain::Result;

/// Byte-oriented key-value substrate behind [`super::Store`]
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Value for `key`, or `None` on miss (including expired keys)
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Store a value that disappears after `ttl`
    async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    /// Remove a key. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Atomically replace the value if it still equals `expected`
    /// (`None` meaning the key must be absent). Returns `false` on conflict.
    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<Vec<u8>>,
        value: Vec<u8>,
    ) -> Result<bool>;
}
