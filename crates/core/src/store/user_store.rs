//! User records, the reverse remote-id key, and the user index

use std::time::Duration;

use calsync_domain::constants::{
    MODIFY_INDEX_BACKOFF, MODIFY_INDEX_MAX_ATTEMPTS, MODIFY_INDEX_MAX_BACKOFF,
};
use calsync_domain::{CalsyncError, Result, User, UserIndex, UserShort};
use rand::Rng;
use tracing::warn;

use super::keys::{platform_user_id_key, user_key, USER_INDEX_KEY};
use super::{load_json, store_json, Store};

/// Half of the capped exponential delay plus a random share of the other half
fn index_backoff(attempt: usize) -> Duration {
    let ceiling = MODIFY_INDEX_BACKOFF
        .saturating_mul(1u32 << attempt.min(16))
        .min(MODIFY_INDEX_MAX_BACKOFF);
    let half = ceiling / 2;
    let jitter = rand::thread_rng().gen_range(0..=half.as_millis() as u64);
    half + Duration::from_millis(jitter)
}

impl Store {
    pub async fn load_user(&self, platform_user_id: &str) -> Result<User> {
        load_json(self.secure_kv(), &user_key(platform_user_id), "user").await
    }

    /// Platform user id linked to a remote account
    pub async fn load_platform_user_id(&self, remote_user_id: &str) -> Result<String> {
        let bytes = self
            .secure_kv()
            .get(&platform_user_id_key(remote_user_id))
            .await?
            .ok_or_else(|| CalsyncError::NotFound("platform user id".to_string()))?;
        String::from_utf8(bytes).map_err(|e| CalsyncError::Storage(e.to_string()))
    }

    /// Write the user record and its reverse key. The user record is rolled
    /// back when the reverse key cannot be written.
    pub async fn store_user(&self, user: &User) -> Result<()> {
        let kv = self.secure_kv();
        let key = user_key(&user.platform_user_id);
        let previous = kv.get(&key).await?;

        store_json(kv, &key, user).await?;

        if user.remote.id.is_empty() {
            return Ok(());
        }

        let reverse = kv
            .set(&platform_user_id_key(&user.remote.id), user.platform_user_id.as_bytes().to_vec())
            .await;
        if let Err(err) = reverse {
            let rollback = match previous {
                Some(bytes) => kv.set(&key, bytes).await,
                None => kv.delete(&key).await,
            };
            if let Err(rollback_err) = rollback {
                warn!(
                    user_id = %user.platform_user_id,
                    error = %rollback_err,
                    "Failed to roll back user record"
                );
            }
            return Err(err);
        }
        Ok(())
    }

    /// Remove the user record, reverse key and index entry
    pub async fn delete_user(&self, user: &User) -> Result<()> {
        let kv = self.secure_kv();
        kv.delete(&user_key(&user.platform_user_id)).await?;
        if !user.remote.id.is_empty() {
            kv.delete(&platform_user_id_key(&user.remote.id)).await?;
        }
        self.delete_user_from_index(&user.platform_user_id).await
    }

    pub async fn load_user_index(&self) -> Result<UserIndex> {
        load_json(self.secure_kv(), USER_INDEX_KEY, "user index").await
    }

    pub async fn load_user_from_index(&self, platform_user_id: &str) -> Result<UserShort> {
        self.load_user_index()
            .await?
            .by_platform_id(platform_user_id)
            .cloned()
            .ok_or_else(|| CalsyncError::NotFound("user index entry".to_string()))
    }

    /// Read-modify-write of the user index with optimistic concurrency.
    ///
    /// `modify` returns `false` when it made no change, in which case nothing
    /// is written. Conflicting writers are retried with a jittered
    /// exponential backoff so that they do not collide again in lockstep.
    pub async fn modify_user_index<F>(&self, modify: F) -> Result<()>
    where
        F: Fn(&mut UserIndex) -> bool + Send + Sync,
    {
        let kv = self.secure_kv();
        for attempt in 0..MODIFY_INDEX_MAX_ATTEMPTS {
            let current = kv.get(USER_INDEX_KEY).await?;
            let mut index: UserIndex = match &current {
                Some(bytes) => serde_json::from_slice(bytes)?,
                None => UserIndex::default(),
            };

            if !modify(&mut index) {
                return Ok(());
            }

            let updated = serde_json::to_vec(&index)?;
            if kv.compare_and_set(USER_INDEX_KEY, current, updated).await? {
                return Ok(());
            }

            if attempt + 1 < MODIFY_INDEX_MAX_ATTEMPTS {
                tokio::time::sleep(index_backoff(attempt)).await;
            }
        }
        Err(CalsyncError::Storage(format!(
            "failed to modify user index after {MODIFY_INDEX_MAX_ATTEMPTS} attempts"
        )))
    }

    pub async fn store_user_in_index(&self, user: &User) -> Result<()> {
        let entry = user.short();
        self.modify_user_index(|index| {
            if index.by_platform_id(&entry.platform_user_id) == Some(&entry) {
                return false;
            }
            index.upsert(entry.clone());
            true
        })
        .await
    }

    pub async fn delete_user_from_index(&self, platform_user_id: &str) -> Result<()> {
        self.modify_user_index(|index| index.remove(platform_user_id)).await
    }

    pub async fn search_in_user_index(&self, term: &str, limit: usize) -> Result<UserIndex> {
        Ok(self.load_user_index().await?.search(term, limit))
    }

    /// Persist the active-event fingerprints on a freshly loaded record
    pub async fn store_user_active_events(
        &self,
        platform_user_id: &str,
        fingerprints: Vec<String>,
    ) -> Result<()> {
        let mut user = self.load_user(platform_user_id).await?;
        user.active_events = fingerprints;
        self.store_user(&user).await
    }

    pub async fn store_user_custom_status_updates(
        &self,
        platform_user_id: &str,
        is_set: bool,
    ) -> Result<()> {
        let mut user = self.load_user(platform_user_id).await?;
        user.is_custom_status_set = is_set;
        self.store_user(&user).await
    }

    /// Record that `event_id` was linked to `channel_id` by this user
    pub async fn store_user_linked_event(
        &self,
        platform_user_id: &str,
        event_id: &str,
        channel_id: &str,
    ) -> Result<()> {
        let mut user = self.load_user(platform_user_id).await?;
        user.channel_events.insert(event_id.to_string(), channel_id.to_string());
        self.store_user(&user).await
    }
}
