//! Graph payload shapes that differ from the domain types

use calsync_domain::{CalsyncError, RemoteApiError, RemoteUser};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{"value": [...], "@odata.nextLink": "..."}`
#[derive(Debug, Deserialize)]
pub(crate) struct Page {
    #[serde(default)]
    pub value: Vec<Value>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Me {
    pub id: String,
    pub display_name: Option<String>,
    pub user_principal_name: Option<String>,
    pub mail: Option<String>,
}

impl From<Me> for RemoteUser {
    fn from(me: Me) -> Self {
        Self {
            id: me.id,
            display_name: me.display_name.unwrap_or_default(),
            mail: me.mail.or_else(|| me.user_principal_name.clone()).unwrap_or_default(),
            user_principal_name: me.user_principal_name.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewSubscription<'a> {
    pub change_type: &'a str,
    pub notification_url: &'a str,
    pub resource: String,
    pub expiration_date_time: String,
    pub client_state: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubscriptionPatch {
    pub expiration_date_time: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EventReply {
    pub send_response: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct BatchRequest {
    pub requests: Vec<BatchItem>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BatchItem {
    pub id: String,
    pub method: &'static str,
    pub url: String,
    pub headers: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BatchResponse {
    #[serde(default)]
    pub responses: Vec<BatchItemResponse>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BatchItemResponse {
    pub id: String,
    pub status: u16,
    #[serde(default)]
    pub body: Value,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// `{"error": {"code", "message"}}` out of an error body, if present
pub(crate) fn api_error(body: &Value) -> Option<RemoteApiError> {
    let envelope: ErrorEnvelope = serde_json::from_value(body.clone()).ok()?;
    envelope.error.map(|e| RemoteApiError { code: e.code, message: e.message })
}

/// Map a rejected Graph response to the domain error
pub(crate) fn map_error(status: StatusCode, body: &str) -> CalsyncError {
    let parsed = serde_json::from_str::<Value>(body).ok().and_then(|value| api_error(&value));
    match parsed {
        Some(err) => CalsyncError::remote(err.code, err.message),
        None => match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                CalsyncError::AuthExpired(format!("graph rejected token: HTTP {status}"))
            }
            StatusCode::NOT_FOUND => CalsyncError::NotFound(format!("graph: HTTP {status}")),
            s if s.is_server_error() => CalsyncError::Network(format!("graph: HTTP {status}")),
            _ => CalsyncError::remote(status.as_u16().to_string(), body.to_string()),
        },
    }
}

/// Graph emits explicit nulls for absent values; the domain types treat
/// absence as default, so nulls are dropped before decoding.
pub(crate) fn strip_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}

pub(crate) fn decode<T: DeserializeOwned>(mut value: Value) -> Result<T, CalsyncError> {
    strip_nulls(&mut value);
    serde_json::from_value(value).map_err(CalsyncError::from)
}

pub(crate) fn decode_all<T: DeserializeOwned>(values: Vec<Value>) -> Result<Vec<T>, CalsyncError> {
    values.into_iter().map(decode).collect()
}
