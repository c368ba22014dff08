//! Bot-token client for the chat platform's v4 REST API

use async_trait::async_trait;
use calsync_core::ChatPlatform;
use calsync_domain::{
    Attachment, CalsyncError, CustomStatus, PlatformConfig, PlatformStatus, PlatformUser, Post,
    PresenceStatus, Result,
};
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::http::HttpClient;

#[derive(Clone)]
pub struct PlatformClient {
    http: HttpClient,
    base_url: String,
    bot_token: String,
    bot_user_id: String,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

/// User record including the props bag that carries the custom status
#[derive(Debug, Deserialize)]
struct UserWithProps {
    #[serde(flatten)]
    user: PlatformUser,
    #[serde(default)]
    props: serde_json::Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct StoredCustomStatus {
    #[serde(default)]
    emoji: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    duration: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct StatusUpdate<'a> {
    user_id: &'a str,
    status: PresenceStatus,
}

#[derive(Debug, Serialize)]
struct NewPost<'a> {
    channel_id: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    props: Option<Value>,
}

fn map_error(status: StatusCode, body: &str) -> CalsyncError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| format!("HTTP {status}"));

    match status {
        StatusCode::NOT_FOUND => CalsyncError::NotFound(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            CalsyncError::Config(format!("bot token rejected: {message}"))
        }
        s if s.is_server_error() => CalsyncError::Network(message),
        _ => CalsyncError::Validation(message),
    }
}

impl PlatformClient {
    pub fn new(http: HttpClient, config: &PlatformConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            bot_user_id: config.bot_user_id.clone(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/api/v4/{path}", self.base_url))
            .bearer_auth(&self.bot_token)
    }

    async fn load_user(&self, user_id: &str) -> Result<UserWithProps> {
        let path = format!("users/{}", urlencoding::encode(user_id));
        self.http.send_json(self.request(Method::GET, &path), map_error).await
    }

    async fn direct_channel(&self, user_id: &str) -> Result<String> {
        let members = [self.bot_user_id.as_str(), user_id];
        let channel: Created = self
            .http
            .send_json(self.request(Method::POST, "channels/direct").json(&members), map_error)
            .await?;
        Ok(channel.id)
    }

    async fn post(&self, channel_id: &str, message: &str, attachments: &[Attachment]) -> Result<String> {
        let props = (!attachments.is_empty()).then(|| json!({ "attachments": attachments }));
        let body = NewPost { channel_id, message, props };
        let created: Created =
            self.http.send_json(self.request(Method::POST, "posts").json(&body), map_error).await?;
        debug!(channel_id, post_id = %created.id, "post created");
        Ok(created.id)
    }
}

#[async_trait]
impl ChatPlatform for PlatformClient {
    async fn get_user(&self, user_id: &str) -> Result<PlatformUser> {
        Ok(self.load_user(user_id).await?.user)
    }

    async fn get_user_statuses(&self, user_ids: &[String]) -> Result<Vec<PlatformStatus>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.http
            .send_json(self.request(Method::POST, "users/status/ids").json(user_ids), map_error)
            .await
    }

    async fn update_user_status(&self, user_id: &str, status: PresenceStatus) -> Result<()> {
        let path = format!("users/{}/status", urlencoding::encode(user_id));
        let body = StatusUpdate { user_id, status };
        self.http.send_checked(self.request(Method::PUT, &path).json(&body), map_error).await?;
        Ok(())
    }

    async fn get_custom_status(&self, user_id: &str) -> Result<Option<CustomStatus>> {
        let user = self.load_user(user_id).await?;
        let Some(raw) = user.props.get("customStatus").and_then(Value::as_str).filter(|raw| !raw.is_empty())
        else {
            return Ok(None);
        };
        let stored: StoredCustomStatus = serde_json::from_str(raw)?;
        if stored.emoji.is_empty() && stored.text.is_empty() {
            return Ok(None);
        }
        Ok(Some(CustomStatus {
            emoji: stored.emoji,
            text: stored.text,
            expires_at: stored.expires_at.filter(|at| at.timestamp() > 0),
            duration: stored.duration,
        }))
    }

    async fn update_custom_status(&self, user_id: &str, status: &CustomStatus) -> Result<()> {
        let path = format!("users/{}/status/custom", urlencoding::encode(user_id));
        self.http.send_checked(self.request(Method::PUT, &path).json(status), map_error).await?;
        Ok(())
    }

    async fn remove_custom_status(&self, user_id: &str) -> Result<()> {
        let path = format!("users/{}/status/custom", urlencoding::encode(user_id));
        self.http.send_checked(self.request(Method::DELETE, &path), map_error).await?;
        Ok(())
    }

    async fn dm(&self, user_id: &str, message: &str) -> Result<String> {
        let channel_id = self.direct_channel(user_id).await?;
        self.post(&channel_id, message, &[]).await
    }

    async fn dm_with_attachments(
        &self,
        user_id: &str,
        message: &str,
        attachments: Vec<Attachment>,
    ) -> Result<String> {
        let channel_id = self.direct_channel(user_id).await?;
        self.post(&channel_id, message, &attachments).await
    }

    async fn create_post(&self, post: Post) -> Result<String> {
        self.post(&post.channel_id, &post.message, &post.attachments).await
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_json, body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer) -> PlatformClient {
        let config = PlatformConfig {
            base_url: server.uri(),
            bot_token: "bot-token".into(),
            bot_user_id: "bot".into(),
        };
        PlatformClient::new(HttpClient::builder().max_attempts(1).build().expect("http"), &config)
    }

    #[tokio::test]
    async fn statuses_for_ids() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v4/users/status/ids"))
            .and(header("Authorization", "Bearer bot-token"))
            .and(body_json(json!(["u1", "u2"])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"user_id": "u1", "status": "online", "manual": false, "last_activity_at": 0},
                {"user_id": "u2", "status": "dnd", "manual": true, "last_activity_at": 0}
            ])))
            .mount(&server)
            .await;

        let statuses = client(&server)
            .get_user_statuses(&["u1".to_string(), "u2".to_string()])
            .await
            .expect("statuses");
        assert_eq!(statuses[1], PlatformStatus::new("u2", PresenceStatus::Dnd, true));
    }

    #[tokio::test]
    async fn user_ids_are_path_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/v4/users/odd%20id%2Fx/status"))
            .and(body_partial_json(json!({"status": "dnd"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .update_user_status("odd id/x", PresenceStatus::Dnd)
            .await
            .expect("status updated");
    }

    #[tokio::test]
    async fn dm_with_attachments_opens_direct_channel() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v4/channels/direct"))
            .and(body_json(json!(["bot", "u1"])))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "dm-channel"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v4/posts"))
            .and(body_partial_json(json!({
                "channel_id": "dm-channel",
                "props": {"attachments": [{"title": "Status change"}]}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "post-9"})))
            .mount(&server)
            .await;

        let attachment = Attachment { title: "Status change".into(), ..Attachment::default() };
        let post_id = client(&server)
            .dm_with_attachments("u1", "", vec![attachment])
            .await
            .expect("dm sent");
        assert_eq!(post_id, "post-9");
    }

    #[tokio::test]
    async fn custom_status_is_read_from_props() {
        let server = MockServer::start().await;
        let custom = json!({
            "emoji": "calendar",
            "text": "In a meeting",
            "duration": "date_and_time",
            "expires_at": "2024-03-05T15:00:00Z"
        })
        .to_string();
        Mock::given(method("GET"))
            .and(path("/api/v4/users/u1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "u1",
                "username": "ada",
                "props": {"customStatus": custom}
            })))
            .mount(&server)
            .await;

        let status = client(&server).get_custom_status("u1").await.expect("status").unwrap();
        assert_eq!(status.text, "In a meeting");
        assert_eq!(status.expires_at.unwrap().to_rfc3339(), "2024-03-05T15:00:00+00:00");
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/users/ghost"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "id": "app.user.missing_account.const",
                "message": "Unable to find the user.",
                "status_code": 404
            })))
            .mount(&server)
            .await;

        let err = client(&server).get_user("ghost").await.unwrap_err();
        assert_eq!(err, CalsyncError::NotFound("Unable to find the user.".into()));
    }
}
