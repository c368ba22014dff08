//! Encrypting wrapper over another backend
//!
//! Values are sealed with AES-256-GCM and stored as the base64 envelope
//! produced by [`EncryptionService::encrypt_to_string`]. Nonces are random,
//! so compare-and-set decrypts the stored value before comparing and then
//! swaps against the exact ciphertext it read.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use calsync_common::EncryptionService;
use calsync_core::KvStore;
use calsync_domain::{CalsyncError, Result};

use crate::errors::InfraError;

pub struct EncryptedKv {
    inner: Arc<dyn KvStore>,
    service: EncryptionService,
}

impl EncryptedKv {
    pub fn new(inner: Arc<dyn KvStore>, service: EncryptionService) -> Self {
        Self { inner, service }
    }

    fn seal(&self, value: &[u8]) -> Result<Vec<u8>> {
        self.service
            .encrypt_to_string(value)
            .map(String::into_bytes)
            .map_err(|e| InfraError::from(e).0)
    }

    fn open(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        let text = std::str::from_utf8(sealed)
            .map_err(|_| CalsyncError::Security("stored value is not an encrypted envelope".into()))?;
        self.service.decrypt_from_string(text).map_err(|e| InfraError::from(e).0)
    }
}

#[async_trait]
impl KvStore for EncryptedKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.inner.get(key).await? {
            Some(sealed) => self.open(&sealed).map(Some),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let sealed = self.seal(&value)?;
        self.inner.set(key, sealed).await
    }

    async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let sealed = self.seal(&value)?;
        self.inner.set_with_ttl(key, sealed, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<Vec<u8>>,
        value: Vec<u8>,
    ) -> Result<bool> {
        let stored = self.inner.get(key).await?;
        let current = stored.as_deref().map(|sealed| self.open(sealed)).transpose()?;
        if current != expected {
            return Ok(false);
        }

        let sealed = self.seal(&value)?;
        self.inner.compare_and_set(key, stored, sealed).await
    }
}
