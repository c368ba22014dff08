//! Handlers behind interactive post buttons

use calsync_domain::{Attachment, CalsyncError, PresenceStatus, Result};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::info;

use super::Engine;
use crate::views::notification::EventResponse;
use crate::views::status_change::{context_keys, STATUS_CHANGE_TITLE};
use crate::views::render_event_will_start_line;

fn context_str<'a>(context: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    context.get(key).and_then(Value::as_str)
}

impl Engine {
    /// Apply or dismiss a proposed status change. Returns the attachment
    /// that replaces the prompt.
    pub async fn confirm_status_change(
        &self,
        platform_user_id: &str,
        context: &Map<String, Value>,
    ) -> Result<Attachment> {
        let accepted = context
            .get(context_keys::VALUE)
            .and_then(Value::as_bool)
            .ok_or_else(|| {
                CalsyncError::Validation("No recognizable value for property `value`.".into())
            })?;

        let mut text = if accepted {
            let change_to = context_str(context, context_keys::CHANGE_TO).ok_or_else(|| {
                CalsyncError::Validation("No state to change to was provided.".into())
            })?;
            let to: PresenceStatus = change_to.parse().map_err(CalsyncError::Validation)?;
            let pretty = context_str(context, context_keys::PRETTY_CHANGE_TO)
                .unwrap_or_else(|| to.pretty_name())
                .to_string();

            self.apply_confirmed_status(platform_user_id, to).await?;
            info!(user_id = %platform_user_id, status = %to, "Confirmed status change");
            format!("The status has been changed to {pretty}.")
        } else {
            "The status has not been changed.".to_string()
        };

        if context.get(context_keys::HAS_EVENT).and_then(Value::as_bool).unwrap_or(false) {
            let subject = context_str(context, context_keys::SUBJECT).unwrap_or_default();
            let weblink = context_str(context, context_keys::WEBLINK).unwrap_or_default();
            let start = context_str(context, context_keys::START_TIME)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|s| s.with_timezone(&Utc));
            let line = render_event_will_start_line(subject, weblink, start, self.now());
            text = format!("{line}\n{text}");
        }

        Ok(Attachment {
            fallback: format!("{STATUS_CHANGE_TITLE}: {text}"),
            title: STATUS_CHANGE_TITLE.to_string(),
            text,
            ..Attachment::default()
        })
    }

    async fn apply_confirmed_status(&self, platform_user_id: &str, to: PresenceStatus) -> Result<()> {
        let platform = &self.env().platform;
        let current = platform
            .get_user_statuses(&[platform_user_id.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CalsyncError::NotFound(format!("status of {platform_user_id}")))?;

        let mut user = self.store().load_user(platform_user_id).await?;
        user.last_status = current.manual.then_some(current.status);
        self.store().store_user(&user).await?;
        platform.update_user_status(platform_user_id, to).await
    }

    /// Answer an invitation. Returns the line describing the new response.
    pub async fn respond_to_event(
        &self,
        platform_user_id: &str,
        event_id: &str,
        selected_option: &str,
    ) -> Result<String> {
        let response = EventResponse::from_option(selected_option).ok_or_else(|| {
            CalsyncError::Validation(format!("{selected_option} is not a valid response"))
        })?;
        if response == EventResponse::NotResponded {
            return Err(CalsyncError::Validation("not responded is not a valid response".into()));
        }

        let ctx = self.context().acting_user(platform_user_id).build().await?;
        let remote_id = &ctx.user.remote.id;
        match response {
            EventResponse::Yes => ctx.client.accept_event(remote_id, event_id).await?,
            EventResponse::No => ctx.client.decline_event(remote_id, event_id).await?,
            EventResponse::Maybe => ctx.client.tentatively_accept_event(remote_id, event_id).await?,
            EventResponse::NotResponded => {}
        }
        Ok(format!("You have {} this event", response.pretty()))
    }
}
