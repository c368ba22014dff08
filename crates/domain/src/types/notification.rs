//! Webhook notifications

use serde::{Deserialize, Serialize};

use crate::types::event::Event;
use crate::types::subscription::RemoteSubscription;
use crate::types::user::RemoteUser;

/// A single change notification, after decoding the webhook payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Remote subscription id the notification is for.
    pub subscription_id: String,
    /// Secret presented by the webhook, validated against the stored one.
    pub client_state: String,
    pub change_type: String,
    /// Remote resource path of the changed event.
    pub resource: String,
    /// Set by the processor once the subscription is loaded.
    #[serde(default)]
    pub subscription: Option<RemoteSubscription>,
    #[serde(default)]
    pub subscription_creator: Option<RemoteUser>,
    /// Inlined event, or the one fetched for bare notifications.
    #[serde(default)]
    pub event: Option<Event>,
    /// The subscription is close to expiry and should be renewed.
    pub recommend_renew: bool,
    /// Only identifiers were delivered; the event must be fetched.
    pub is_bare: bool,
}
