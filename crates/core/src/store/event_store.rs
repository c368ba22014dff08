//! Per-user event snapshots and per-event channel metadata

use calsync_domain::constants::{DEFAULT_EVENT_TTL, TTL_AFTER_EVENT_END};
use calsync_domain::{EventMetadata, EventSnapshot, Result};
use chrono::{DateTime, Utc};
use tracing::debug;

use super::keys::{event_key, event_metadata_key};
use super::{load_json, store_json, store_json_with_ttl, Store};

impl Store {
    pub async fn load_user_event(
        &self,
        platform_user_id: &str,
        ical_uid: &str,
    ) -> Result<EventSnapshot> {
        load_json(self.kv(), &event_key(platform_user_id, ical_uid), "event").await
    }

    /// Store an event snapshot that expires 30 days after the event ends.
    /// Snapshots whose expiry is already in the past are not written.
    pub async fn store_user_event(
        &self,
        platform_user_id: &str,
        snapshot: &EventSnapshot,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let expires_at = match snapshot.remote.end_utc() {
            Some(end) => end + TTL_AFTER_EVENT_END,
            None => now + DEFAULT_EVENT_TTL,
        };
        let Ok(ttl) = (expires_at - now).to_std() else {
            debug!(user_id = %platform_user_id, "Skipping expired event snapshot");
            return Ok(());
        };
        if ttl.is_zero() {
            return Ok(());
        }

        let key = event_key(platform_user_id, &snapshot.remote.ical_uid);
        store_json_with_ttl(self.kv(), &key, snapshot, ttl).await
    }

    pub async fn delete_user_event(&self, platform_user_id: &str, ical_uid: &str) -> Result<()> {
        self.kv().delete(&event_key(platform_user_id, ical_uid)).await
    }

    pub async fn load_event_metadata(&self, event_id: &str) -> Result<EventMetadata> {
        load_json(self.kv(), &event_metadata_key(event_id), "event metadata").await
    }

    pub async fn store_event_metadata(&self, event_id: &str, metadata: &EventMetadata) -> Result<()> {
        store_json(self.kv(), &event_metadata_key(event_id), metadata).await
    }

    pub async fn delete_event_metadata(&self, event_id: &str) -> Result<()> {
        self.kv().delete(&event_metadata_key(event_id)).await
    }

    /// Link a channel to an event so reminders are also posted there
    pub async fn link_channel_to_event(&self, event_id: &str, channel_id: &str) -> Result<()> {
        let mut metadata = match self.load_event_metadata(event_id).await {
            Ok(metadata) => metadata,
            Err(err) if err.is_not_found() => EventMetadata::default(),
            Err(err) => return Err(err),
        };
        metadata.linked_channel_ids.insert(channel_id.to_string());
        self.store_event_metadata(event_id, &metadata).await
    }

    /// Drop a channel link. The metadata record is removed with its last link.
    pub async fn unlink_channel_from_event(&self, event_id: &str, channel_id: &str) -> Result<()> {
        let mut metadata = self.load_event_metadata(event_id).await?;
        metadata.linked_channel_ids.remove(channel_id);
        if metadata.linked_channel_ids.is_empty() {
            return self.delete_event_metadata(event_id).await;
        }
        self.store_event_metadata(event_id, &metadata).await
    }
}
