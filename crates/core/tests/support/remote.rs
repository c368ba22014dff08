//! Scripted remote calendar
//!
//! One shared [`ScriptedRemote`] serves both the superuser client and every
//! user client, so tests script calendars per remote user id regardless of
//! the fetch strategy.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use calsync_core::remote_ports::{FetchStrategy, RemoteCalendar, RemoteProvider};
use calsync_domain::{
    CalendarViewRequest, CalendarViewResponse, CalsyncError, Event, MailboxSettings, Notification,
    OAuth2Token, RemoteApiError, RemoteSubscription, RemoteUser, Result, TimeZoneName,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

#[derive(Default)]
struct State {
    events: HashMap<String, Vec<Event>>,
    batch_errors: HashMap<String, RemoteApiError>,
    view_errors: HashMap<String, CalsyncError>,
    hanging: Vec<String>,
    zones: HashMap<String, TimeZoneName>,
    me: HashMap<String, RemoteUser>,
    notification_events: HashMap<String, Event>,
    renew_error: Option<CalsyncError>,
    next_subscription: usize,
    created: Vec<String>,
    renewed: Vec<String>,
    deleted: Vec<String>,
    responses: Vec<(String, String)>,
    calendar_view_calls: usize,
    batch_calls: usize,
}

#[derive(Default)]
pub struct ScriptedRemote {
    state: Mutex<State>,
}

impl ScriptedRemote {
    pub fn set_events(&self, remote_user_id: &str, events: Vec<Event>) {
        self.state.lock().events.insert(remote_user_id.to_string(), events);
    }

    pub fn fail_batch_for(&self, remote_user_id: &str, code: &str, message: &str) {
        self.state.lock().batch_errors.insert(
            remote_user_id.to_string(),
            RemoteApiError { code: code.to_string(), message: message.to_string() },
        );
    }

    /// Fail single-user calendar views for `remote_user_id`
    pub fn fail_view_for(&self, remote_user_id: &str, error: CalsyncError) {
        self.state.lock().view_errors.insert(remote_user_id.to_string(), error);
    }

    /// Never answer single-user calendar views for `remote_user_id`
    pub fn hang_view_for(&self, remote_user_id: &str) {
        self.state.lock().hanging.push(remote_user_id.to_string());
    }

    pub fn set_zone(&self, remote_user_id: &str, zone: &str) {
        self.state.lock().zones.insert(remote_user_id.to_string(), TimeZoneName::new(zone));
    }

    /// Identity returned by `get_me` for clients built from `access_token`
    pub fn set_me(&self, access_token: &str, me: RemoteUser) {
        self.state.lock().me.insert(access_token.to_string(), me);
    }

    /// Event returned for bare notifications on `resource`
    pub fn set_notification_event(&self, resource: &str, event: Event) {
        self.state.lock().notification_events.insert(resource.to_string(), event);
    }

    pub fn fail_renewal(&self, error: CalsyncError) {
        self.state.lock().renew_error = Some(error);
    }

    pub fn created(&self) -> Vec<String> {
        self.state.lock().created.clone()
    }

    pub fn renewed(&self) -> Vec<String> {
        self.state.lock().renewed.clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().deleted.clone()
    }

    pub fn responses(&self) -> Vec<(String, String)> {
        self.state.lock().responses.clone()
    }

    pub fn calendar_view_calls(&self) -> usize {
        self.state.lock().calendar_view_calls
    }

    pub fn batch_calls(&self) -> usize {
        self.state.lock().batch_calls
    }

    fn view(&self, remote_user_id: &str) -> Vec<Event> {
        self.state.lock().events.get(remote_user_id).cloned().unwrap_or_default()
    }
}

pub fn subscription_expiry() -> String {
    "2024-03-07T14:00:00Z".to_string()
}

/// Client over the shared script, optionally bound to a token
pub struct ScriptedClient {
    remote: Arc<ScriptedRemote>,
    access_token: Option<String>,
}

#[async_trait]
impl RemoteCalendar for ScriptedClient {
    async fn get_me(&self) -> Result<RemoteUser> {
        let token = self.access_token.clone().unwrap_or_default();
        self.remote
            .state
            .lock()
            .me
            .get(&token)
            .cloned()
            .ok_or_else(|| CalsyncError::remote("ResourceNotFound", "no identity for token"))
    }

    async fn get_mailbox_settings(&self, remote_user_id: &str) -> Result<MailboxSettings> {
        let zone = self.remote.state.lock().zones.get(remote_user_id).cloned().unwrap_or_default();
        Ok(MailboxSettings { time_zone: zone })
    }

    async fn calendar_view(
        &self,
        remote_user_id: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        let (hang, error) = {
            let mut state = self.remote.state.lock();
            state.calendar_view_calls += 1;
            (
                state.hanging.iter().any(|id| id == remote_user_id),
                state.view_errors.get(remote_user_id).cloned(),
            )
        };
        if hang {
            std::future::pending::<()>().await;
        }
        if let Some(error) = error {
            return Err(error);
        }
        Ok(self.remote.view(remote_user_id))
    }

    async fn batch_calendar_view(
        &self,
        requests: &[CalendarViewRequest],
    ) -> Result<Vec<CalendarViewResponse>> {
        self.remote.state.lock().batch_calls += 1;
        let errors = self.remote.state.lock().batch_errors.clone();
        Ok(requests
            .iter()
            .map(|request| match errors.get(&request.remote_user_id) {
                Some(error) => CalendarViewResponse::failed(&request.remote_user_id, error.clone()),
                None => CalendarViewResponse::ok(
                    &request.remote_user_id,
                    self.remote.view(&request.remote_user_id),
                ),
            })
            .collect())
    }

    async fn create_subscription(
        &self,
        notification_url: &str,
        remote_user_id: &str,
    ) -> Result<RemoteSubscription> {
        let mut state = self.remote.state.lock();
        state.next_subscription += 1;
        let id = format!("sub-{}", state.next_subscription);
        state.created.push(id.clone());
        Ok(RemoteSubscription {
            id,
            resource: format!("/users/{remote_user_id}/events"),
            change_type: "created,updated,deleted".to_string(),
            client_state: "secret".to_string(),
            notification_url: notification_url.to_string(),
            expiration_date_time: subscription_expiry(),
            creator_id: remote_user_id.to_string(),
        })
    }

    async fn renew_subscription(
        &self,
        _notification_url: &str,
        _remote_user_id: &str,
        subscription: &RemoteSubscription,
    ) -> Result<RemoteSubscription> {
        let mut state = self.remote.state.lock();
        if let Some(error) = state.renew_error.clone() {
            return Err(error);
        }
        state.renewed.push(subscription.id.clone());
        Ok(RemoteSubscription {
            expiration_date_time: "2024-03-08T14:00:00Z".to_string(),
            ..subscription.clone()
        })
    }

    async fn delete_subscription(&self, subscription: &RemoteSubscription) -> Result<()> {
        self.remote.state.lock().deleted.push(subscription.id.clone());
        Ok(())
    }

    async fn list_subscriptions(&self) -> Result<Vec<RemoteSubscription>> {
        Ok(Vec::new())
    }

    async fn get_notification_data(&self, mut notification: Notification) -> Result<Notification> {
        let event = self.remote.state.lock().notification_events.get(&notification.resource).cloned();
        notification.event = Some(
            event.ok_or_else(|| CalsyncError::remote("ErrorItemNotFound", "object was not found"))?,
        );
        notification.is_bare = false;
        Ok(notification)
    }

    async fn accept_event(&self, _remote_user_id: &str, event_id: &str) -> Result<()> {
        self.remote.state.lock().responses.push(("accept".to_string(), event_id.to_string()));
        Ok(())
    }

    async fn decline_event(&self, _remote_user_id: &str, event_id: &str) -> Result<()> {
        self.remote.state.lock().responses.push(("decline".to_string(), event_id.to_string()));
        Ok(())
    }

    async fn tentatively_accept_event(&self, _remote_user_id: &str, event_id: &str) -> Result<()> {
        self.remote.state.lock().responses.push(("tentative".to_string(), event_id.to_string()));
        Ok(())
    }
}

pub struct ScriptedProvider {
    remote: Arc<ScriptedRemote>,
    strategy: FetchStrategy,
}

impl ScriptedProvider {
    pub fn new(remote: Arc<ScriptedRemote>, strategy: FetchStrategy) -> Self {
        Self { remote, strategy }
    }
}

#[async_trait]
impl RemoteProvider for ScriptedProvider {
    fn fetch_strategy(&self) -> FetchStrategy {
        self.strategy
    }

    async fn superuser_client(&self) -> Result<Arc<dyn RemoteCalendar>> {
        match self.strategy {
            FetchStrategy::SuperuserBatch => {
                Ok(Arc::new(ScriptedClient { remote: self.remote.clone(), access_token: None }))
            }
            FetchStrategy::PerUserFanout => Err(CalsyncError::SuperuserNotSupported),
        }
    }

    fn user_client(&self, token: &OAuth2Token) -> Arc<dyn RemoteCalendar> {
        Arc::new(ScriptedClient {
            remote: self.remote.clone(),
            access_token: Some(token.access_token.clone()),
        })
    }
}
