//! In-memory [`KvStore`] with write accounting

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use calsync_core::store::KvStore;
use calsync_domain::{CalsyncError, Result};
use parking_lot::Mutex;

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    ttl: Option<Duration>,
}

#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, Entry>>,
    writes: Mutex<Vec<String>>,
    /// Number of upcoming CAS calls that report a conflict
    cas_conflicts: Mutex<usize>,
    failing: Mutex<bool>,
    /// Yield to the scheduler before every read and CAS
    yielding: Mutex<bool>,
}

impl MemoryKv {
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.entries.lock().get(key).and_then(|e| e.ttl)
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<_> =
            self.entries.lock().keys().filter(|k| k.starts_with(prefix)).cloned().collect();
        keys.sort();
        keys
    }

    /// Writes (set, set with TTL, successful CAS) to `key` since the last reset
    pub fn writes_to(&self, key: &str) -> usize {
        self.writes.lock().iter().filter(|k| k.as_str() == key).count()
    }

    pub fn reset_writes(&self) {
        self.writes.lock().clear();
    }

    pub fn inject_cas_conflicts(&self, count: usize) {
        *self.cas_conflicts.lock() = count;
    }

    pub fn fail_all(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    /// Let other tasks run between a writer's read and its compare-and-set
    pub fn yield_on_access(&self, yielding: bool) {
        *self.yielding.lock() = yielding;
    }

    async fn maybe_yield(&self) {
        let yielding = *self.yielding.lock();
        if yielding {
            tokio::task::yield_now().await;
        }
    }

    fn check(&self) -> Result<()> {
        if *self.failing.lock() {
            return Err(CalsyncError::Storage("kv unavailable".to_string()));
        }
        Ok(())
    }

    fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) {
        self.entries.lock().insert(key.to_string(), Entry { value, ttl });
        self.writes.lock().push(key.to_string());
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.maybe_yield().await;
        self.check()?;
        Ok(self.entries.lock().get(key).map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.check()?;
        self.put(key, value, None);
        Ok(())
    }

    async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        self.check()?;
        self.put(key, value, Some(ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check()?;
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<Vec<u8>>,
        value: Vec<u8>,
    ) -> Result<bool> {
        self.maybe_yield().await;
        self.check()?;
        {
            let mut conflicts = self.cas_conflicts.lock();
            if *conflicts > 0 {
                *conflicts -= 1;
                return Ok(false);
            }
        }

        let mut entries = self.entries.lock();
        let current = entries.get(key).map(|e| e.value.clone());
        if current != expected {
            return Ok(false);
        }
        entries.insert(key.to_string(), Entry { value, ttl: None });
        drop(entries);
        self.writes.lock().push(key.to_string());
        Ok(true)
    }
}
