//! Microsoft Graph change notifications
//!
//! Handles the subscription validation handshake and queues each change in
//! a delivery for the notification processor.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use calsync_domain::constants::RENEW_SUBSCRIPTION_BEFORE_EXPIRATION;
use calsync_domain::{CalsyncError, Notification};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct ValidationQuery {
    #[serde(rename = "validationToken")]
    validation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhookBatch {
    #[serde(default)]
    value: Vec<WebhookItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookItem {
    change_type: String,
    #[serde(default)]
    client_state: String,
    #[serde(default)]
    resource: String,
    #[serde(default)]
    subscription_expiration_date_time: String,
    subscription_id: String,
}

/// Only markup-free tokens are echoed back.
fn is_safe_token(token: &str) -> bool {
    !token.contains(['<', '>', '&', '"', '\''])
}

fn to_notification(item: WebhookItem, now: DateTime<Utc>) -> Result<Notification, CalsyncError> {
    let expires = DateTime::parse_from_rfc3339(&item.subscription_expiration_date_time)
        .map_err(|e| {
            CalsyncError::Validation(format!(
                "invalid subscription expiration for {}: {e}",
                item.subscription_id
            ))
        })?
        .with_timezone(&Utc);

    Ok(Notification {
        subscription_id: item.subscription_id,
        client_state: item.client_state,
        change_type: item.change_type,
        resource: item.resource,
        recommend_renew: now > expires - RENEW_SUBSCRIPTION_BEFORE_EXPIRATION,
        is_bare: true,
        ..Notification::default()
    })
}

pub(super) async fn webhook_event(
    State(state): State<AppState>,
    Query(query): Query<ValidationQuery>,
    body: Bytes,
) -> Result<Response, ApiError> {
    if let Some(token) = query.validation_token.filter(|t| !t.is_empty()) {
        if !is_safe_token(&token) {
            return Err(CalsyncError::Validation("validation token is invalid".into()).into());
        }
        debug!("Validated event webhook endpoint");
        return Ok(([(header::CONTENT_TYPE, "text/plain")], token).into_response());
    }

    let batch: WebhookBatch = serde_json::from_slice(&body)
        .map_err(|e| CalsyncError::Validation(format!("failed to decode webhook: {e}")))?;

    let now = state.clock.now();
    let notifications = batch
        .value
        .into_iter()
        .map(|item| to_notification(item, now))
        .collect::<Result<Vec<_>, _>>()
        // A malformed expiration rejects the whole delivery.
        .map_err(|e| ApiError(CalsyncError::Internal(e.to_string())))?;

    let count = notifications.len();
    state.metrics.record_received(count);

    let mut queued = 0;
    for notification in notifications {
        if let Err(err) = state.processor.enqueue([notification]) {
            state.metrics.record_enqueued(queued);
            state.metrics.record_rejected(count - queued);
            warn!(queued, dropped = count - queued, error = %err, "Webhook delivery partly dropped");
            return Err(err.into());
        }
        queued += 1;
    }
    state.metrics.record_enqueued(queued);

    info!(count, "Queued webhook notifications");
    Ok(StatusCode::ACCEPTED.into_response())
}
