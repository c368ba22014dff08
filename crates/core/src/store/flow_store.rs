//! Post ids for the welcome flow and the settings panel

use calsync_domain::{CalsyncError, Result};

use super::keys::{settings_panel_key, welcome_key};
use super::{KvStore, Store};

async fn load_post_id(kv: &dyn KvStore, key: &str) -> Result<String> {
    let bytes = kv.get(key).await?.ok_or_else(|| CalsyncError::NotFound("post id".to_string()))?;
    String::from_utf8(bytes).map_err(|e| CalsyncError::Storage(e.to_string()))
}

impl Store {
    pub async fn load_welcome_post_id(&self, platform_user_id: &str) -> Result<String> {
        load_post_id(self.kv(), &welcome_key(platform_user_id)).await
    }

    pub async fn store_welcome_post_id(&self, platform_user_id: &str, post_id: &str) -> Result<()> {
        self.kv().set(&welcome_key(platform_user_id), post_id.as_bytes().to_vec()).await
    }

    pub async fn delete_welcome_post_id(&self, platform_user_id: &str) -> Result<()> {
        self.kv().delete(&welcome_key(platform_user_id)).await
    }

    pub async fn load_settings_panel_post_id(&self, platform_user_id: &str) -> Result<String> {
        load_post_id(self.kv(), &settings_panel_key(platform_user_id)).await
    }

    pub async fn store_settings_panel_post_id(
        &self,
        platform_user_id: &str,
        post_id: &str,
    ) -> Result<()> {
        self.kv().set(&settings_panel_key(platform_user_id), post_id.as_bytes().to_vec()).await
    }

    pub async fn delete_settings_panel_post_id(&self, platform_user_id: &str) -> Result<()> {
        self.kv().delete(&settings_panel_key(platform_user_id)).await
    }
}
