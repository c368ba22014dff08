//! Persisted key layout

use calsync_common::hash_key;

pub const USER_KEY_PREFIX: &str = "user_";
pub const PLATFORM_USER_ID_KEY_PREFIX: &str = "mmuid_";
pub const USER_INDEX_KEY: &str = "userindex_";
pub const SUBSCRIPTION_KEY_PREFIX: &str = "sub_";
pub const EVENT_KEY_PREFIX: &str = "ev_";
pub const EVENT_METADATA_KEY_PREFIX: &str = "ev_metadata_";
pub const OAUTH2_KEY_PREFIX: &str = "oauth2_";
pub const WELCOME_KEY_PREFIX: &str = "welcome_";
pub const SETTINGS_PANEL_KEY_PREFIX: &str = "settings_panel_";

pub fn user_key(platform_user_id: &str) -> String {
    format!("{USER_KEY_PREFIX}{}", hash_key(platform_user_id))
}

pub fn platform_user_id_key(remote_user_id: &str) -> String {
    format!("{PLATFORM_USER_ID_KEY_PREFIX}{}", hash_key(remote_user_id))
}

pub fn subscription_key(subscription_id: &str) -> String {
    format!("{SUBSCRIPTION_KEY_PREFIX}{}", hash_key(subscription_id))
}

pub fn event_key(platform_user_id: &str, ical_uid: &str) -> String {
    format!("{EVENT_KEY_PREFIX}{}", hash_key(&format!("{platform_user_id}_{ical_uid}")))
}

pub fn event_metadata_key(event_id: &str) -> String {
    format!("{EVENT_METADATA_KEY_PREFIX}{}", hash_key(event_id))
}

pub fn oauth2_state_key(state: &str) -> String {
    format!("{OAUTH2_KEY_PREFIX}{}", hash_key(state))
}

pub fn welcome_key(platform_user_id: &str) -> String {
    format!("{WELCOME_KEY_PREFIX}{}", hash_key(platform_user_id))
}

pub fn settings_panel_key(platform_user_id: &str) -> String {
    format!("{SETTINGS_PANEL_KEY_PREFIX}{}", hash_key(platform_user_id))
}
