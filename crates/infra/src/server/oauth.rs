use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use calsync_domain::CalsyncError;
use serde::Deserialize;
use tracing::info;

use super::{ApiError, AppState, PLATFORM_USER_HEADER};

#[derive(Debug, Default, Deserialize)]
pub(super) struct ConnectQuery {
    #[serde(default)]
    user_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct CompleteQuery {
    #[serde(default)]
    code: String,
    #[serde(default)]
    state: String,
}

fn header_user(headers: &HeaderMap) -> Option<String> {
    headers
        .get(PLATFORM_USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn not_authorized() -> ApiError {
    CalsyncError::Security("Not authorized".into()).into()
}

pub(super) async fn connect(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ConnectQuery>,
) -> Result<Response, ApiError> {
    let user_id = header_user(&headers)
        .or_else(|| Some(query.user_id).filter(|id| !id.is_empty()))
        .ok_or_else(not_authorized)?;

    let url = state.engine.init_oauth2(&user_id).await?;
    Ok((StatusCode::FOUND, [(header::LOCATION, url)]).into_response())
}

pub(super) async fn complete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CompleteQuery>,
) -> Result<Html<String>, ApiError> {
    let user_id = header_user(&headers).ok_or_else(not_authorized)?;
    if query.code.is_empty() {
        return Err(CalsyncError::Validation("missing authorization code".into()).into());
    }

    let user = state.engine.complete_oauth2(&user_id, &query.code, &query.state).await?;
    info!(user_id = %user_id, "User connected");

    Ok(Html(format!(
        "<!DOCTYPE html>\n<html>\n<head><script>window.close();</script></head>\n\
         <body><p>Completed connecting to {}. Please close this window.</p></body>\n</html>",
        html_escape(&user.remote.mail)
    )))
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
