//! Subscription manager
//!
//! Keeps each connected user's remote push subscription alive. The stored
//! record and `Settings::event_subscription_id` are always written together
//! through [`Store::store_user_subscription`](crate::store::Store).

use calsync_common::LimitedLog;
use calsync_domain::constants::DITHER_RENEW;
use calsync_domain::{CalsyncError, RemoteSubscription, Result, Subscription};
use tracing::{info, warn};

use super::{Engine, OperationContext};

impl Engine {
    pub async fn create_my_event_subscription(
        &self,
        platform_user_id: &str,
    ) -> Result<Subscription> {
        let mut ctx = self.context().acting_user(platform_user_id).build().await?;
        self.create_subscription_for(&mut ctx).await
    }

    pub(crate) async fn create_subscription_for(
        &self,
        ctx: &mut OperationContext,
    ) -> Result<Subscription> {
        let remote = ctx
            .client
            .create_subscription(&self.env().settings.notification_url, &ctx.user.remote.id)
            .await?;
        let subscription = Subscription {
            remote,
            platform_creator_id: ctx.user.platform_user_id.clone(),
            plugin_version: self.env().settings.plugin_version.clone(),
        };
        self.store().store_user_subscription(&mut ctx.user, &subscription).await?;
        info!(
            user_id = %ctx.user.platform_user_id,
            subscription_id = %subscription.remote.id,
            "Created event subscription"
        );
        Ok(subscription)
    }

    pub async fn load_my_event_subscription(
        &self,
        platform_user_id: &str,
    ) -> Result<Subscription> {
        let user = self.store().load_user(platform_user_id).await?;
        self.store().load_subscription(&user.settings.event_subscription_id).await
    }

    /// Extend the user's subscription. When the remote no longer knows it,
    /// the local record is dropped and a new subscription is created.
    /// Returns `None` for users without a subscription.
    pub async fn renew_my_event_subscription(
        &self,
        platform_user_id: &str,
    ) -> Result<Option<Subscription>> {
        let mut ctx = self.context().acting_user(platform_user_id).build().await?;
        let subscription_id = ctx.user.settings.event_subscription_id.clone();
        if subscription_id.is_empty() {
            return Ok(None);
        }

        let stored = self.store().load_subscription(&subscription_id).await?;
        let renewed = ctx
            .client
            .renew_subscription(
                &self.env().settings.notification_url,
                &ctx.user.remote.id,
                &stored.remote,
            )
            .await;

        let renewed = match renewed {
            Ok(renewed) => renewed,
            Err(err) if err.is_remote_object_not_found() => {
                self.store().delete_user_subscription(&mut ctx.user, &subscription_id).await?;
                info!(
                    user_id = %platform_user_id,
                    subscription_id = %subscription_id,
                    "Subscription expired on the remote; creating a new one"
                );
                return self.create_subscription_for(&mut ctx).await.map(Some);
            }
            Err(err) => return Err(err),
        };

        // Reload: a webhook may have renewed the record meanwhile. Last write wins.
        let mut subscription = self.store().load_subscription(&subscription_id).await?;
        subscription.remote = renewed;
        self.store().store_user_subscription(&mut ctx.user, &subscription).await?;
        Ok(Some(subscription))
    }

    /// Delete the subscription on the remote, then locally. Remote failures
    /// are logged; the next renewal cleans up after them.
    pub async fn delete_my_event_subscription(&self, platform_user_id: &str) -> Result<()> {
        let mut user = self.store().load_user(platform_user_id).await?;
        let subscription_id = user.settings.event_subscription_id.clone();
        if subscription_id.is_empty() {
            return Ok(());
        }

        match self.store().load_subscription(&subscription_id).await {
            Ok(stored) => {
                let deleted = self.delete_orphaned_subscription(platform_user_id, &stored.remote).await;
                if let Err(err) = deleted {
                    warn!(user_id = %platform_user_id, error = %err, "Remote subscription delete failed");
                }
            }
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }

        self.store().delete_user_subscription(&mut user, &subscription_id).await
    }

    /// Delete a remote subscription with the given user's client
    pub async fn delete_orphaned_subscription(
        &self,
        platform_user_id: &str,
        subscription: &RemoteSubscription,
    ) -> Result<()> {
        let ctx = self.context().acting_user(platform_user_id).build().await?;
        ctx.client.delete_subscription(subscription).await.map_err(|err| {
            CalsyncError::Internal(format!("failed to delete subscription {}: {err}", subscription.id))
        })
    }

    pub async fn list_remote_subscriptions(
        &self,
        platform_user_id: &str,
    ) -> Result<Vec<RemoteSubscription>> {
        let ctx = self.context().acting_user(platform_user_id).build().await?;
        ctx.client.list_subscriptions().await
    }

    /// Renew every user's subscription, one user at a time. Returns the
    /// number of subscriptions renewed or recreated.
    pub async fn renew_all(&self) -> Result<usize> {
        let index = match self.store().load_user_index().await {
            Ok(index) => index,
            Err(err) if err.is_not_found() => return Ok(0),
            Err(err) => return Err(err),
        };

        let log = LimitedLog::new("subscription renewal");
        let mut renewed = 0;
        for entry in &index {
            match self.renew_my_event_subscription(&entry.platform_user_id).await {
                Ok(Some(_)) => renewed += 1,
                Ok(None) => {}
                Err(err) => log.warn(format_args!(
                    "Failed to renew subscription for {}: {err}",
                    entry.platform_user_id
                )),
            }
            tokio::time::sleep(DITHER_RENEW).await;
        }

        info!(users = index.len(), renewed, "Subscription renewal complete");
        Ok(renewed)
    }
}
