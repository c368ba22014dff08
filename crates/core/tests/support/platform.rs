//! Chat platform fake that records every outgoing call

use std::collections::HashMap;

use async_trait::async_trait;
use calsync_core::platform_ports::ChatPlatform;
use calsync_domain::{
    Attachment, CalsyncError, CustomStatus, PlatformStatus, PlatformUser, Post, PresenceStatus,
    Result,
};
use parking_lot::Mutex;

#[derive(Debug, Clone)]
pub struct SentDm {
    pub user_id: String,
    pub message: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Default)]
struct State {
    users: HashMap<String, PlatformUser>,
    statuses: HashMap<String, PlatformStatus>,
    custom: HashMap<String, CustomStatus>,
    status_updates: Vec<(String, PresenceStatus)>,
    custom_updates: Vec<(String, CustomStatus)>,
    custom_removals: Vec<String>,
    dms: Vec<SentDm>,
    posts: Vec<Post>,
    next_post: usize,
    custom_status_down: bool,
}

#[derive(Default)]
pub struct RecordingPlatform {
    state: Mutex<State>,
}

impl RecordingPlatform {
    pub fn add_user(&self, user: PlatformUser) {
        self.state.lock().users.insert(user.id.clone(), user);
    }

    pub fn set_status(&self, status: PlatformStatus) {
        self.state.lock().statuses.insert(status.user_id.clone(), status);
    }

    pub fn status_of(&self, user_id: &str) -> Option<PresenceStatus> {
        self.state.lock().statuses.get(user_id).map(|s| s.status)
    }

    pub fn set_custom_status(&self, user_id: &str, status: CustomStatus) {
        self.state.lock().custom.insert(user_id.to_string(), status);
    }

    /// Make every custom status write fail
    pub fn fail_custom_status(&self, failing: bool) {
        self.state.lock().custom_status_down = failing;
    }

    pub fn custom_status_of(&self, user_id: &str) -> Option<CustomStatus> {
        self.state.lock().custom.get(user_id).cloned()
    }

    pub fn status_updates(&self) -> Vec<(String, PresenceStatus)> {
        self.state.lock().status_updates.clone()
    }

    pub fn custom_updates(&self) -> Vec<(String, CustomStatus)> {
        self.state.lock().custom_updates.clone()
    }

    pub fn custom_removals(&self) -> Vec<String> {
        self.state.lock().custom_removals.clone()
    }

    pub fn dms(&self) -> Vec<SentDm> {
        self.state.lock().dms.clone()
    }

    pub fn dms_to(&self, user_id: &str) -> Vec<SentDm> {
        self.dms().into_iter().filter(|dm| dm.user_id == user_id).collect()
    }

    pub fn posts(&self) -> Vec<Post> {
        self.state.lock().posts.clone()
    }

    fn next_post_id(state: &mut State) -> String {
        state.next_post += 1;
        format!("post-{}", state.next_post)
    }
}

#[async_trait]
impl ChatPlatform for RecordingPlatform {
    async fn get_user(&self, user_id: &str) -> Result<PlatformUser> {
        self.state
            .lock()
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| CalsyncError::NotFound(format!("platform user {user_id}")))
    }

    async fn get_user_statuses(&self, user_ids: &[String]) -> Result<Vec<PlatformStatus>> {
        let state = self.state.lock();
        Ok(user_ids.iter().filter_map(|id| state.statuses.get(id).cloned()).collect())
    }

    async fn update_user_status(&self, user_id: &str, status: PresenceStatus) -> Result<()> {
        let mut state = self.state.lock();
        state.status_updates.push((user_id.to_string(), status));
        state.statuses.insert(user_id.to_string(), PlatformStatus::new(user_id, status, true));
        Ok(())
    }

    async fn get_custom_status(&self, user_id: &str) -> Result<Option<CustomStatus>> {
        Ok(self.state.lock().custom.get(user_id).cloned())
    }

    async fn update_custom_status(&self, user_id: &str, status: &CustomStatus) -> Result<()> {
        let mut state = self.state.lock();
        if state.custom_status_down {
            return Err(CalsyncError::Network("custom status unavailable".to_string()));
        }
        state.custom_updates.push((user_id.to_string(), status.clone()));
        state.custom.insert(user_id.to_string(), status.clone());
        Ok(())
    }

    async fn remove_custom_status(&self, user_id: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.custom_removals.push(user_id.to_string());
        state.custom.remove(user_id);
        Ok(())
    }

    async fn dm(&self, user_id: &str, message: &str) -> Result<String> {
        self.dm_with_attachments(user_id, message, Vec::new()).await
    }

    async fn dm_with_attachments(
        &self,
        user_id: &str,
        message: &str,
        attachments: Vec<Attachment>,
    ) -> Result<String> {
        let mut state = self.state.lock();
        state.dms.push(SentDm {
            user_id: user_id.to_string(),
            message: message.to_string(),
            attachments,
        });
        Ok(Self::next_post_id(&mut state))
    }

    async fn create_post(&self, post: Post) -> Result<String> {
        let mut state = self.state.lock();
        state.posts.push(post);
        Ok(Self::next_post_id(&mut state))
    }
}
