//! Key-value backends behind the core store
//!
//! - [`MemoryKv`]: process-local map, used for development and tests
//! - [`SqliteKv`]: single-table SQLite store through an r2d2 pool
//! - [`EncryptedKv`]: AES-256-GCM wrapper over any other backend

pub mod encrypted;
pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use calsync_common::{Clock, EncryptionService};
use calsync_core::KvStore;
use calsync_domain::{Result, StorageBackend, StorageConfig};

pub use encrypted::EncryptedKv;
pub use memory::MemoryKv;
pub use sqlite::SqliteKv;

/// Plain and secure views over the configured backend
pub struct KvBackends {
    pub kv: Arc<dyn KvStore>,
    /// Same substrate, encrypted when a key is configured
    pub secure_kv: Arc<dyn KvStore>,
}

/// Build the backends described by `config`
///
/// # Errors
/// Returns `CalsyncError::Config` for an unusable encryption key and
/// `CalsyncError::Storage` when the SQLite file cannot be opened.
pub fn open(config: &StorageConfig, clock: Arc<dyn Clock>) -> Result<KvBackends> {
    let kv: Arc<dyn KvStore> = match config.backend {
        StorageBackend::Memory => Arc::new(MemoryKv::with_clock(clock)),
        StorageBackend::Sqlite => {
            let path = config.path.as_deref().unwrap_or("calsync.db");
            Arc::new(SqliteKv::open(path, clock)?)
        }
    };

    let secure_kv: Arc<dyn KvStore> = match config.encryption_key.as_deref() {
        Some(key) => {
            let service = EncryptionService::from_config_key(key)
                .map_err(|e| crate::errors::InfraError::from(e).0)?;
            Arc::new(EncryptedKv::new(Arc::clone(&kv), service))
        }
        None => {
            tracing::warn!("No storage encryption key configured; user records are stored in clear");
            Arc::clone(&kv)
        }
    };

    Ok(KvBackends { kv, secure_kv })
}
