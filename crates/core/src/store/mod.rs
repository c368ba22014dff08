//! Typed views over the key-value substrate
//!
//! [`Store`] owns two [`KvStore`] handles: one for general records and one
//! for user and OAuth state, which deployments may wrap with encryption.
//! Every method maps a KV miss to `CalsyncError::NotFound`.

pub mod event_store;
pub mod flow_store;
pub mod keys;
pub mod oauth_state_store;
pub mod ports;
pub mod subscription_store;
pub mod user_store;

use std::sync::Arc;
use std::time::Duration;

use calsync_domain::{CalsyncError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use ports::KvStore;

#[derive(Clone)]
pub struct Store {
    kv: Arc<dyn KvStore>,
    secure_kv: Arc<dyn KvStore>,
}

impl Store {
    /// Store with a single backend for every record
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { secure_kv: Arc::clone(&kv), kv }
    }

    /// Store whose user records and OAuth state live in `secure_kv`
    pub fn with_secure_kv(kv: Arc<dyn KvStore>, secure_kv: Arc<dyn KvStore>) -> Self {
        Self { kv, secure_kv }
    }

    pub(crate) fn kv(&self) -> &dyn KvStore {
        self.kv.as_ref()
    }

    pub(crate) fn secure_kv(&self) -> &dyn KvStore {
        self.secure_kv.as_ref()
    }
}

pub(crate) async fn load_json<T: DeserializeOwned>(
    kv: &dyn KvStore,
    key: &str,
    what: &str,
) -> Result<T> {
    let bytes = kv.get(key).await?.ok_or_else(|| CalsyncError::NotFound(what.to_string()))?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub(crate) async fn store_json<T: Serialize>(kv: &dyn KvStore, key: &str, value: &T) -> Result<()> {
    kv.set(key, serde_json::to_vec(value)?).await
}

pub(crate) async fn store_json_with_ttl<T: Serialize>(
    kv: &dyn KvStore,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<()> {
    kv.set_with_ttl(key, serde_json::to_vec(value)?, ttl).await
}
