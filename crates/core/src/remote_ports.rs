//! Remote calendar port interfaces
//!
//! The engine only talks to a calendar backend through these traits. A
//! [`RemoteProvider`] hands out clients; a [`RemoteCalendar`] performs the
//! actual calls on behalf of one user or, for a superuser client, on behalf
//! of every user in the tenant.

use std::sync::Arc;

use async_trait::async_trait;
use calsync_domain::{
    CalendarViewRequest, CalendarViewResponse, Event, MailboxSettings, Notification, OAuth2Token,
    RemoteSubscription, RemoteUser, Result,
};
use chrono::{DateTime, Utc};

/// How multi-user calendar reads are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    /// One app-wide client issues batched requests for every user.
    SuperuserBatch,
    /// Each user is read with their own client through a bounded worker pool.
    PerUserFanout,
}

/// Calendar operations available to the engine
#[async_trait]
pub trait RemoteCalendar: Send + Sync {
    /// Identity of the token owner
    async fn get_me(&self) -> Result<RemoteUser>;

    async fn get_mailbox_settings(&self, remote_user_id: &str) -> Result<MailboxSettings>;

    /// Events overlapping `[start, end)` for one user
    async fn calendar_view(
        &self,
        remote_user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Event>>;

    /// Calendar views for many users. Per-user failures are reported inside
    /// the matching response rather than failing the whole call.
    async fn batch_calendar_view(
        &self,
        requests: &[CalendarViewRequest],
    ) -> Result<Vec<CalendarViewResponse>>;

    async fn create_subscription(
        &self,
        notification_url: &str,
        remote_user_id: &str,
    ) -> Result<RemoteSubscription>;

    /// Extend a subscription. Fails with a "object was not found" error once
    /// the remote has already dropped it.
    async fn renew_subscription(
        &self,
        notification_url: &str,
        remote_user_id: &str,
        subscription: &RemoteSubscription,
    ) -> Result<RemoteSubscription>;

    async fn delete_subscription(&self, subscription: &RemoteSubscription) -> Result<()>;

    async fn list_subscriptions(&self) -> Result<Vec<RemoteSubscription>>;

    /// Fill in the event body of a bare webhook notification
    async fn get_notification_data(&self, notification: Notification) -> Result<Notification>;

    async fn accept_event(&self, remote_user_id: &str, event_id: &str) -> Result<()>;

    async fn decline_event(&self, remote_user_id: &str, event_id: &str) -> Result<()>;

    async fn tentatively_accept_event(&self, remote_user_id: &str, event_id: &str) -> Result<()>;
}

/// Factory for remote clients
#[async_trait]
pub trait RemoteProvider: Send + Sync {
    /// Strategy to use for multi-user reads
    fn fetch_strategy(&self) -> FetchStrategy;

    /// App-wide client. Returns `CalsyncError::SuperuserNotSupported` when the
    /// backend cannot provide one.
    async fn superuser_client(&self) -> Result<Arc<dyn RemoteCalendar>>;

    /// Client bound to a user token
    fn user_client(&self, token: &OAuth2Token) -> Arc<dyn RemoteCalendar>;
}
