//! Per-user settings

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_DAILY_SUMMARY_POST_TIME, DEFAULT_DAILY_SUMMARY_TIMEZONE};
use crate::types::status::PresenceStatus;
use crate::utils::timezone::TimeZoneName;

/// Which presence the engine drives a user to while they are in a meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusOption {
    #[serde(rename = "Away")]
    Away,
    #[serde(rename = "Do Not Disturb")]
    DoNotDisturb,
    #[serde(rename = "Don't set status for me")]
    NotSet,
}

impl StatusOption {
    pub const fn busy_status(&self) -> Option<PresenceStatus> {
        match self {
            Self::Away => Some(PresenceStatus::Away),
            Self::DoNotDisturb => Some(PresenceStatus::Dnd),
            Self::NotSet => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySummarySettings {
    /// Kitchen format, e.g. `8:30AM`.
    pub post_time: String,
    /// Mailbox timezone captured when the post time was last set.
    #[serde(rename = "tz")]
    pub timezone: TimeZoneName,
    /// RFC 3339 timestamp of the last delivered summary, empty if never sent.
    #[serde(default)]
    pub last_post_time: String,
    #[serde(default)]
    pub enable: bool,
}

impl Default for DailySummarySettings {
    fn default() -> Self {
        Self {
            post_time: DEFAULT_DAILY_SUMMARY_POST_TIME.to_string(),
            timezone: TimeZoneName::new(DEFAULT_DAILY_SUMMARY_TIMEZONE),
            last_post_time: String::new(),
            enable: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_summary: Option<DailySummarySettings>,
    #[serde(default)]
    pub event_subscription_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_status_from_options: Option<StatusOption>,
    #[serde(default)]
    pub get_confirmation: bool,
    #[serde(default)]
    pub receive_reminders: bool,
    #[serde(default)]
    pub set_custom_status: bool,

    // Legacy switches kept for users connected before status options existed.
    #[serde(default)]
    pub update_status: bool,
    #[serde(default)]
    pub receive_notifications_during_meeting: bool,
}

impl Settings {
    /// Effective status option, folding in the legacy switches.
    pub fn effective_status_option(&self) -> StatusOption {
        match self.update_status_from_options {
            Some(option) => option,
            None if self.update_status && self.receive_notifications_during_meeting => {
                StatusOption::Away
            }
            None if self.update_status => StatusOption::DoNotDisturb,
            None => StatusOption::NotSet,
        }
    }

    /// Presence to use while busy, or `None` when the user does not want
    /// presence updates.
    pub fn busy_status(&self) -> Option<PresenceStatus> {
        self.effective_status_option().busy_status()
    }

    pub fn is_configured_for_status_updates(&self) -> bool {
        self.busy_status().is_some()
    }

    pub fn is_configured_for_custom_status_updates(&self) -> bool {
        self.set_custom_status
    }

    /// Users with none of the sync-driven features enabled are skipped.
    pub fn wants_sync(&self) -> bool {
        self.is_configured_for_status_updates()
            || self.is_configured_for_custom_status_updates()
            || self.receive_reminders
    }

    pub fn daily_summary_or_default(&self) -> DailySummarySettings {
        self.daily_summary.clone().unwrap_or_default()
    }
}

/// Partial update applied by `UpdateSettings`. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsPatch {
    pub update_status_from_options: Option<StatusOption>,
    pub get_confirmation: Option<bool>,
    pub set_custom_status: Option<bool>,
    pub receive_reminders: Option<bool>,
    pub daily_summary_enable: Option<bool>,
}

impl SettingsPatch {
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(option) = self.update_status_from_options {
            settings.update_status_from_options = Some(option);
        }
        if let Some(value) = self.get_confirmation {
            settings.get_confirmation = value;
        }
        if let Some(value) = self.set_custom_status {
            settings.set_custom_status = value;
        }
        if let Some(value) = self.receive_reminders {
            settings.receive_reminders = value;
        }
        if let Some(value) = self.daily_summary_enable {
            settings.daily_summary.get_or_insert_with(DailySummarySettings::default).enable = value;
        }
    }
}
