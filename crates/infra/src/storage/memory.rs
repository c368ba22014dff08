//! In-memory key-value backend

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use calsync_common::{Clock, SystemClock};
use calsync_core::KvStore;
use calsync_domain::{CalsyncError, Result};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

#[derive(Debug, Clone)]
struct Record {
    value: Vec<u8>,
    expires_at: Option<DateTime<Utc>>,
}

impl Record {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        !matches!(self.expires_at, Some(at) if at <= now)
    }
}

/// Process-local store. Expired keys are dropped lazily on access.
pub struct MemoryKv {
    entries: DashMap<String, Record>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { entries: DashMap::new(), clock }
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries.iter().filter(|entry| entry.value().is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| CalsyncError::Validation(format!("ttl out of range: {ttl:?}")))
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = self.clock.now();
        if let Some(record) = self.entries.get(key) {
            if record.is_live(now) {
                return Ok(Some(record.value.clone()));
            }
        }
        self.entries.remove_if(key, |_, record| !record.is_live(now));
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.entries.insert(key.to_string(), Record { value, expires_at: None });
        Ok(())
    }

    async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let expires_at = expiry(self.clock.now(), ttl)?;
        self.entries.insert(key.to_string(), Record { value, expires_at: Some(expires_at) });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<Vec<u8>>,
        value: Vec<u8>,
    ) -> Result<bool> {
        let now = self.clock.now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let current = occupied.get().is_live(now).then(|| &occupied.get().value);
                if current != expected.as_ref() {
                    return Ok(false);
                }
                occupied.insert(Record { value, expires_at: None });
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                if expected.is_some() {
                    return Ok(false);
                }
                vacant.insert(Record { value, expires_at: None });
                Ok(true)
            }
        }
    }
}
