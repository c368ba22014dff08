//! Connecting and disconnecting accounts
//!
//! The OAuth2 state is `"{random}_{platform_user_id}"`, stored once with a
//! short TTL; completing the flow consumes it and checks that the user who
//! returns is the one who started.

use calsync_domain::constants::DEFAULT_DAILY_SUMMARY_POST_TIME;
use calsync_domain::{
    CalsyncError, DailySummarySettings, PlatformUser, Result, Settings, User, WelcomeFlowStatus,
};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{info, warn};

use super::Engine;

const STATE_RANDOM_LEN: usize = 15;

/// Display name of the remote calendar in user-facing text
pub const PROVIDER_DISPLAY_NAME: &str = "Microsoft Calendar";
/// Slash command used in user-facing hints
pub const COMMAND_TRIGGER: &str = "calsync";

fn random_state_prefix() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(STATE_RANDOM_LEN).map(char::from).collect()
}

/// Platform user id carried after the random prefix. The prefix is
/// alphanumeric, so the first `_` separates the two parts.
fn state_owner(state: &str) -> Option<&str> {
    match state.split_once('_') {
        Some((prefix, owner)) if !prefix.is_empty() && !owner.is_empty() => Some(owner),
        _ => None,
    }
}

fn welcome_message(remote_mail: &str) -> String {
    format!(
        "### Welcome to the {PROVIDER_DISPLAY_NAME} integration!\n\
         You have successfully connected `{remote_mail}`.\n\
         Use `/{COMMAND_TRIGGER} settings` to choose how your status and reminders are handled."
    )
}

fn already_connected_message(remote_mail: &str, platform_username: &str) -> String {
    format!(
        "{PROVIDER_DISPLAY_NAME} account `{remote_mail}` is already mapped to account \
         `{platform_username}`. Please run `/{COMMAND_TRIGGER} disconnect` while logged in as \
         that account to connect this one instead."
    )
}

fn deactivated_owner_message(remote_mail: &str) -> String {
    format!(
        "{PROVIDER_DISPLAY_NAME} account `{remote_mail}` is already mapped to a deactivated \
         account. Please contact your system administrator to release it."
    )
}

fn missing_owner_message(remote_mail: &str) -> String {
    format!(
        "{PROVIDER_DISPLAY_NAME} account `{remote_mail}` is already mapped to an account that \
         could not be found. Please contact your system administrator."
    )
}

impl Engine {
    /// Start the authorization code flow. Returns the URL to send the user to.
    pub async fn init_oauth2(&self, platform_user_id: &str) -> Result<String> {
        match self.store().load_user(platform_user_id).await {
            Ok(user) => {
                return Err(CalsyncError::Validation(format!(
                    "user is already connected to {}",
                    user.remote.mail
                )))
            }
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }

        let state = format!("{}_{platform_user_id}", random_state_prefix());
        self.store().store_oauth2_state(&state).await?;
        Ok(self.env().tokens.authorize_url(&state))
    }

    /// Finish the flow started by [`Engine::init_oauth2`]
    pub async fn complete_oauth2(
        &self,
        authed_user_id: &str,
        code: &str,
        state: &str,
    ) -> Result<User> {
        if authed_user_id.is_empty() || code.is_empty() || state.is_empty() {
            return Err(CalsyncError::Validation("missing user, code or state".to_string()));
        }

        self.store()
            .verify_oauth2_state(state)
            .await
            .map_err(|err| CalsyncError::Security(format!("missing stored state: {err}")))?;

        if state_owner(state) != Some(authed_user_id) {
            return Err(CalsyncError::Security("not authorized, user ID mismatch".to_string()));
        }

        let token = self.env().tokens.exchange_code(code).await?;
        let client = self.env().remote.user_client(&token);
        let me = client.get_me().await?;

        self.reject_if_remote_already_linked(authed_user_id, &me.id, &me.mail).await?;

        let platform_user = self.env().platform.get_user(authed_user_id).await?;
        let time_zone = client.get_mailbox_settings(&me.id).await?.time_zone;

        let user = User {
            settings: Settings {
                daily_summary: Some(DailySummarySettings {
                    post_time: DEFAULT_DAILY_SUMMARY_POST_TIME.to_string(),
                    timezone: time_zone,
                    last_post_time: String::new(),
                    enable: false,
                }),
                ..Settings::default()
            },
            remote: me,
            oauth2_token: Some(token),
            plugin_version: self.env().settings.plugin_version.clone(),
            platform_user_id: authed_user_id.to_string(),
            platform_username: platform_user.username.clone(),
            platform_display_name: platform_user.display_name(),
            welcome_flow_status: WelcomeFlowStatus::default(),
            ..User::default()
        };

        self.store().store_user(&user).await?;
        self.store().store_user_in_index(&user).await?;
        info!(user_id = %authed_user_id, "Connected remote account");

        let welcome = welcome_message(&user.remote.mail);
        match self.env().platform.dm(authed_user_id, &welcome).await {
            Ok(post_id) => {
                if let Err(err) = self.store().store_welcome_post_id(authed_user_id, &post_id).await {
                    warn!(user_id = %authed_user_id, error = %err, "Failed to store welcome post");
                }
            }
            Err(err) => warn!(user_id = %authed_user_id, error = %err, "Failed to send welcome"),
        }

        let mut ctx = self.context().with_user(user).build().await?;
        if let Err(err) = self.create_subscription_for(&mut ctx).await {
            warn!(user_id = %authed_user_id, error = %err, "Failed to create event subscription");
        }
        Ok(ctx.user)
    }

    async fn reject_if_remote_already_linked(
        &self,
        authed_user_id: &str,
        remote_id: &str,
        remote_mail: &str,
    ) -> Result<()> {
        let owner_id = match self.store().load_platform_user_id(remote_id).await {
            Ok(owner_id) => owner_id,
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err),
        };
        if owner_id == authed_user_id {
            return Ok(());
        }

        let message = match self.env().platform.get_user(&owner_id).await {
            Ok(PlatformUser { delete_at, .. }) if delete_at != 0 => {
                deactivated_owner_message(remote_mail)
            }
            Ok(owner) => already_connected_message(remote_mail, &owner.username),
            Err(_) => missing_owner_message(remote_mail),
        };
        if let Err(err) = self.env().platform.dm(authed_user_id, &message).await {
            warn!(user_id = %authed_user_id, error = %err, "Failed to explain rejected connection");
        }
        Err(CalsyncError::Validation(format!(
            "remote account is already connected to another user: {message}"
        )))
    }

    /// Remove every trace of the user: remote subscription, channel links,
    /// user record, reverse key and index entry.
    pub async fn disconnect_user(&self, platform_user_id: &str) -> Result<()> {
        let mut user = self.store().load_user(platform_user_id).await?;

        let subscription_id = user.settings.event_subscription_id.clone();
        if !subscription_id.is_empty() {
            self.drop_subscription_on_disconnect(&user, &subscription_id).await;
            user.settings.event_subscription_id.clear();
        }

        for (event_id, channel_id) in &user.channel_events {
            if let Err(err) = self.store().unlink_channel_from_event(event_id, channel_id).await {
                warn!(event = %event_id, channel_id = %channel_id, error = %err, "Failed to unlink");
            }
        }

        self.store().delete_user(&user).await?;
        for cleared in [
            self.store().delete_welcome_post_id(platform_user_id).await,
            self.store().delete_settings_panel_post_id(platform_user_id).await,
        ] {
            if let Err(err) = cleared {
                warn!(user_id = %platform_user_id, error = %err, "Failed to clear flow state");
            }
        }
        info!(user_id = %platform_user_id, "Disconnected user");
        Ok(())
    }

    async fn drop_subscription_on_disconnect(&self, user: &User, subscription_id: &str) {
        let user_id = &user.platform_user_id;
        match self.store().load_subscription(subscription_id).await {
            Ok(stored) if user.is_connected() => {
                let deleted = self.delete_orphaned_subscription(user_id, &stored.remote).await;
                if let Err(err) = deleted {
                    warn!(user_id = %user_id, error = %err, "Failed to delete remote subscription");
                }
            }
            Ok(_) => {}
            Err(err) if err.is_not_found() => {}
            Err(err) => warn!(user_id = %user_id, error = %err, "Failed to load subscription"),
        }
        if let Err(err) = self.store().delete_subscription(subscription_id).await {
            warn!(user_id = %user_id, error = %err, "Failed to delete subscription record");
        }
    }
}
