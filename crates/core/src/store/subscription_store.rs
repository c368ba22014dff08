//! Subscription records and their link to the creating user

use calsync_domain::{CalsyncError, Result, Subscription, User};

use super::keys::subscription_key;
use super::{load_json, store_json, Store};

impl Store {
    pub async fn load_subscription(&self, subscription_id: &str) -> Result<Subscription> {
        load_json(self.kv(), &subscription_key(subscription_id), "subscription").await
    }

    pub async fn store_subscription(&self, subscription: &Subscription) -> Result<()> {
        store_json(self.kv(), &subscription_key(&subscription.remote.id), subscription).await
    }

    pub async fn delete_subscription(&self, subscription_id: &str) -> Result<()> {
        self.kv().delete(&subscription_key(subscription_id)).await
    }

    /// Store a subscription and point the creator's settings at it
    pub async fn store_user_subscription(
        &self,
        user: &mut User,
        subscription: &Subscription,
    ) -> Result<()> {
        if user.remote.id != subscription.remote.creator_id {
            return Err(CalsyncError::Validation(format!(
                "user {} does not match the subscription creator {}",
                user.remote.id, subscription.remote.creator_id
            )));
        }
        self.store_subscription(subscription).await?;
        user.settings.event_subscription_id = subscription.remote.id.clone();
        self.store_user(user).await
    }

    /// Remove a subscription and clear the user's reference to it
    pub async fn delete_user_subscription(
        &self,
        user: &mut User,
        subscription_id: &str,
    ) -> Result<()> {
        self.delete_subscription(subscription_id).await?;
        user.settings.event_subscription_id.clear();
        self.store_user(user).await
    }
}
