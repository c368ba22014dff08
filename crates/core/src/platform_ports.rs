//! Chat platform port interfaces

use async_trait::async_trait;
use calsync_domain::{
    Attachment, CustomStatus, PlatformStatus, PlatformUser, Post, PresenceStatus, Result,
};

/// Chat platform operations used by the engine and the notification processor
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<PlatformUser>;

    /// Current presence for each requested user
    async fn get_user_statuses(&self, user_ids: &[String]) -> Result<Vec<PlatformStatus>>;

    async fn update_user_status(&self, user_id: &str, status: PresenceStatus) -> Result<()>;

    /// Currently set custom status, if any
    async fn get_custom_status(&self, user_id: &str) -> Result<Option<CustomStatus>>;

    async fn update_custom_status(&self, user_id: &str, status: &CustomStatus) -> Result<()>;

    async fn remove_custom_status(&self, user_id: &str) -> Result<()>;

    /// Direct message from the bot. Returns the post id.
    async fn dm(&self, user_id: &str, message: &str) -> Result<String>;

    /// Direct message carrying attachments under an optional message.
    /// Returns the post id.
    async fn dm_with_attachments(
        &self,
        user_id: &str,
        message: &str,
        attachments: Vec<Attachment>,
    ) -> Result<String>;

    /// Post into a channel. Returns the post id.
    async fn create_post(&self, post: Post) -> Result<String>;
}
