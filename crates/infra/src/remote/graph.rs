//! Graph client bound to one access token
//!
//! A client built from a user token acts for that user; one built from an
//! app-only token acts for any user in the tenant. Every call addresses the
//! user explicitly (`/users/{id}/...`) so both work the same way.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use calsync_common::Clock;
use calsync_core::RemoteCalendar;
use calsync_domain::constants::{
    CLIENT_STATE_BYTES, MAX_NUM_REQUESTS_PER_BATCH, SUBSCRIBE_TTL, SUBSCRIPTION_CHANGE_TYPE,
};
use calsync_domain::{
    CalendarViewRequest, CalendarViewResponse, CalsyncError, Event, MailboxSettings,
    Notification, RemoteApiError, RemoteSubscription, RemoteUser, Result,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rand::RngCore;
use reqwest::{Method, RequestBuilder};
use serde_json::Value;
use tracing::debug;

use super::wire::{
    self, BatchItem, BatchRequest, BatchResponse, EventReply, Me, NewSubscription, Page,
    SubscriptionPatch,
};
use crate::http::HttpClient;

const PREFER_UTC: &str = r#"outlook.timezone="UTC""#;

#[derive(Clone)]
pub struct GraphClient {
    http: HttpClient,
    base_url: String,
    access_token: String,
    clock: Arc<dyn Clock>,
}

impl GraphClient {
    pub fn new(
        http: HttpClient,
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            clock,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path)).bearer_auth(&self.access_token)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let value: Value = self.http.send_json(builder, wire::map_error).await?;
        wire::decode(value)
    }

    /// Follow `@odata.nextLink` until the collection is exhausted
    async fn get_collection(&self, first: RequestBuilder) -> Result<Vec<Value>> {
        let mut page: Page = self.http.send_json(first, wire::map_error).await?;
        let mut items = std::mem::take(&mut page.value);
        while let Some(next) = page.next_link.take() {
            let builder = self
                .http
                .request(Method::GET, next)
                .bearer_auth(&self.access_token)
                .header("Prefer", PREFER_UTC);
            page = self.http.send_json(builder, wire::map_error).await?;
            items.append(&mut page.value);
        }
        Ok(items)
    }

    async fn reply(&self, remote_user_id: &str, event_id: &str, action: &str) -> Result<()> {
        let path = format!(
            "users/{}/events/{}/{action}",
            urlencoding::encode(remote_user_id),
            urlencoding::encode(event_id)
        );
        let builder = self
            .request(Method::POST, &path)
            .json(&EventReply { send_response: true });
        self.http.send_checked(builder, wire::map_error).await?;
        Ok(())
    }

    fn expiration(&self) -> String {
        (self.clock.now() + SUBSCRIBE_TTL).to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

fn calendar_view_path(remote_user_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    format!(
        "/users/{}/calendarView?startDateTime={}&endDateTime={}",
        urlencoding::encode(remote_user_id),
        urlencoding::encode(&start.to_rfc3339_opts(SecondsFormat::Secs, true)),
        urlencoding::encode(&end.to_rfc3339_opts(SecondsFormat::Secs, true)),
    )
}

fn new_client_state() -> String {
    let mut bytes = vec![0u8; CLIENT_STATE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn batch_item_response(remote_user_id: &str, status: u16, mut body: Value) -> CalendarViewResponse {
    if (200..300).contains(&status) {
        let values = match body.get_mut("value").map(Value::take) {
            Some(Value::Array(values)) => values,
            _ => Vec::new(),
        };
        return match wire::decode_all::<Event>(values) {
            Ok(events) => CalendarViewResponse::ok(remote_user_id, events),
            Err(err) => CalendarViewResponse::failed(
                remote_user_id,
                RemoteApiError { code: "InvalidResponse".into(), message: err.to_string() },
            ),
        };
    }

    let error = wire::api_error(&body).unwrap_or_else(|| RemoteApiError {
        code: status.to_string(),
        message: format!("batch request failed with status {status}"),
    });
    CalendarViewResponse::failed(remote_user_id, error)
}

#[async_trait]
impl RemoteCalendar for GraphClient {
    async fn get_me(&self) -> Result<RemoteUser> {
        let me: Me = self.get_json(self.request(Method::GET, "me")).await?;
        Ok(me.into())
    }

    async fn get_mailbox_settings(&self, remote_user_id: &str) -> Result<MailboxSettings> {
        let path = format!("users/{}/mailboxSettings", urlencoding::encode(remote_user_id));
        self.get_json(self.request(Method::GET, &path)).await
    }

    async fn calendar_view(
        &self,
        remote_user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        let builder = self
            .request(Method::GET, &calendar_view_path(remote_user_id, start, end))
            .header("Prefer", PREFER_UTC);
        wire::decode_all(self.get_collection(builder).await?)
    }

    async fn batch_calendar_view(
        &self,
        requests: &[CalendarViewRequest],
    ) -> Result<Vec<CalendarViewResponse>> {
        let mut responses = Vec::with_capacity(requests.len());

        for (chunk_index, chunk) in requests.chunks(MAX_NUM_REQUESTS_PER_BATCH).enumerate() {
            let mut headers = serde_json::Map::new();
            headers.insert("Prefer".into(), Value::String(PREFER_UTC.into()));

            let body = BatchRequest {
                requests: chunk
                    .iter()
                    .enumerate()
                    .map(|(i, request)| BatchItem {
                        id: i.to_string(),
                        method: "GET",
                        url: calendar_view_path(&request.remote_user_id, request.start, request.end),
                        headers: headers.clone(),
                    })
                    .collect(),
            };

            debug!(chunk = chunk_index, size = chunk.len(), "sending calendar view batch");
            let batch: BatchResponse = self
                .http
                .send_json(self.request(Method::POST, "$batch").json(&body), wire::map_error)
                .await?;

            let mut by_id: std::collections::HashMap<String, (u16, Value)> = batch
                .responses
                .into_iter()
                .map(|item| (item.id, (item.status, item.body)))
                .collect();

            for (i, request) in chunk.iter().enumerate() {
                let response = match by_id.remove(&i.to_string()) {
                    Some((status, body)) => batch_item_response(&request.remote_user_id, status, body),
                    None => CalendarViewResponse::failed(
                        &request.remote_user_id,
                        RemoteApiError {
                            code: "MissingResponse".into(),
                            message: "no response for request in batch".into(),
                        },
                    ),
                };
                responses.push(response);
            }
        }

        Ok(responses)
    }

    async fn create_subscription(
        &self,
        notification_url: &str,
        remote_user_id: &str,
    ) -> Result<RemoteSubscription> {
        let body = NewSubscription {
            change_type: SUBSCRIPTION_CHANGE_TYPE,
            notification_url,
            resource: format!("/users/{remote_user_id}/events"),
            expiration_date_time: self.expiration(),
            client_state: new_client_state(),
        };
        let client_state = body.client_state.clone();

        let mut created: RemoteSubscription =
            self.get_json(self.request(Method::POST, "subscriptions").json(&body)).await?;
        created.creator_id = remote_user_id.to_string();
        if created.client_state.is_empty() {
            created.client_state = client_state;
        }
        Ok(created)
    }

    async fn renew_subscription(
        &self,
        notification_url: &str,
        remote_user_id: &str,
        subscription: &RemoteSubscription,
    ) -> Result<RemoteSubscription> {
        let path = format!("subscriptions/{}", urlencoding::encode(&subscription.id));
        let body = SubscriptionPatch { expiration_date_time: self.expiration() };

        let mut renewed: RemoteSubscription =
            self.get_json(self.request(Method::PATCH, &path).json(&body)).await?;
        renewed.creator_id = remote_user_id.to_string();
        if renewed.client_state.is_empty() {
            renewed.client_state = subscription.client_state.clone();
        }
        if renewed.notification_url.is_empty() {
            renewed.notification_url = notification_url.to_string();
        }
        Ok(renewed)
    }

    async fn delete_subscription(&self, subscription: &RemoteSubscription) -> Result<()> {
        let path = format!("subscriptions/{}", urlencoding::encode(&subscription.id));
        self.http.send_checked(self.request(Method::DELETE, &path), wire::map_error).await?;
        Ok(())
    }

    async fn list_subscriptions(&self) -> Result<Vec<RemoteSubscription>> {
        wire::decode_all(self.get_collection(self.request(Method::GET, "subscriptions")).await?)
    }

    async fn get_notification_data(&self, mut notification: Notification) -> Result<Notification> {
        if notification.resource.is_empty() {
            return Err(CalsyncError::Validation("notification has no resource".into()));
        }
        let builder = self
            .request(Method::GET, &notification.resource)
            .header("Prefer", PREFER_UTC);
        let event: Event = self.get_json(builder).await?;
        notification.event = Some(event);
        notification.is_bare = false;
        Ok(notification)
    }

    async fn accept_event(&self, remote_user_id: &str, event_id: &str) -> Result<()> {
        self.reply(remote_user_id, event_id, "accept").await
    }

    async fn decline_event(&self, remote_user_id: &str, event_id: &str) -> Result<()> {
        self.reply(remote_user_id, event_id, "decline").await
    }

    async fn tentatively_accept_event(&self, remote_user_id: &str, event_id: &str) -> Result<()> {
        self.reply(remote_user_id, event_id, "tentativelyAccept").await
    }
}
