//! Interactive post actions posted back by the chat platform

use axum::extract::State;
use axum::Json;
use calsync_core::views::notification::{EVENT_ID_KEY, SELECTED_OPTION_KEY};
use calsync_domain::{Attachment, CalsyncError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{ApiError, AppState};

#[derive(Debug, Default, Deserialize)]
pub(super) struct PostActionRequest {
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    context: Map<String, Value>,
}

#[derive(Debug, Default, Serialize)]
pub(super) struct PostActionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    update: Option<PostUpdate>,
    #[serde(skip_serializing_if = "String::is_empty")]
    ephemeral_text: String,
}

/// Replacement for the post the action was attached to
#[derive(Debug, Serialize)]
struct PostUpdate {
    message: String,
    props: Value,
}

impl PostUpdate {
    fn with_attachment(attachment: Attachment) -> Self {
        Self { message: String::new(), props: json!({ "attachments": [attachment] }) }
    }
}

fn acting_user(request: &PostActionRequest) -> Result<&str, ApiError> {
    if request.user_id.is_empty() {
        return Err(CalsyncError::Security("Not authorized".into()).into());
    }
    Ok(&request.user_id)
}

pub(super) async fn confirm(
    State(state): State<AppState>,
    Json(request): Json<PostActionRequest>,
) -> Result<Json<PostActionResponse>, ApiError> {
    let user_id = acting_user(&request)?;
    let attachment = state.engine.confirm_status_change(user_id, &request.context).await?;
    Ok(Json(PostActionResponse {
        update: Some(PostUpdate::with_attachment(attachment)),
        ..PostActionResponse::default()
    }))
}

pub(super) async fn respond(
    State(state): State<AppState>,
    Json(request): Json<PostActionRequest>,
) -> Result<Json<PostActionResponse>, ApiError> {
    let user_id = acting_user(&request)?;
    let event_id = request
        .context
        .get(EVENT_ID_KEY)
        .and_then(Value::as_str)
        .ok_or_else(|| CalsyncError::Validation("no event ID in the request".into()))?;
    let option = request.context.get(SELECTED_OPTION_KEY).and_then(Value::as_str).unwrap_or_default();

    let line = state.engine.respond_to_event(user_id, event_id, option).await?;
    Ok(Json(PostActionResponse { ephemeral_text: line, ..PostActionResponse::default() }))
}
