//! User settings and the settings panel post

use calsync_domain::{Result, Settings, SettingsPatch, StatusOption};
use tracing::{debug, warn};

use super::Engine;

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

fn status_option_label(option: StatusOption) -> &'static str {
    match option {
        StatusOption::Away => "Set to Away",
        StatusOption::DoNotDisturb => "Set to Do Not Disturb",
        StatusOption::NotSet => "Don't update",
    }
}

/// Markdown summary of the current settings
pub fn render_settings(settings: &Settings) -> String {
    let dsum = settings.daily_summary_or_default();
    let daily = if dsum.enable {
        format!("{} ({})", dsum.post_time, dsum.timezone)
    } else {
        "off".to_string()
    };
    format!(
        "#### Calendar settings\n\
         | Setting | Value |\n\
         | :-- | :-- |\n\
         | Status during meetings | {} |\n\
         | Ask before changing status | {} |\n\
         | Custom status during meetings | {} |\n\
         | Event reminders | {} |\n\
         | Daily summary | {daily} |",
        status_option_label(settings.effective_status_option()),
        on_off(settings.get_confirmation),
        on_off(settings.set_custom_status),
        on_off(settings.receive_reminders),
    )
}

impl Engine {
    pub async fn get_settings(&self, platform_user_id: &str) -> Result<Settings> {
        Ok(self.store().load_user(platform_user_id).await?.settings)
    }

    pub async fn update_settings(
        &self,
        platform_user_id: &str,
        patch: &SettingsPatch,
    ) -> Result<Settings> {
        let mut user = self.store().load_user(platform_user_id).await?;
        patch.apply(&mut user.settings);
        self.store().store_user(&user).await?;
        debug!(user_id = %platform_user_id, "Updated settings");
        Ok(user.settings)
    }

    /// DM the settings summary and remember the post so it can be replaced
    pub async fn print_settings(&self, platform_user_id: &str) -> Result<String> {
        let settings = self.get_settings(platform_user_id).await?;
        let post_id = self.env().platform.dm(platform_user_id, &render_settings(&settings)).await?;
        self.store().store_settings_panel_post_id(platform_user_id, &post_id).await?;
        Ok(post_id)
    }

    /// Forget the last settings panel post
    pub async fn clear_settings_posts(&self, platform_user_id: &str) {
        if let Err(err) = self.store().delete_settings_panel_post_id(platform_user_id).await {
            warn!(user_id = %platform_user_id, error = %err, "Error clearing settings posts");
        }
    }
}
