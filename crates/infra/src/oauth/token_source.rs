//! Authorization code, refresh and client-credentials flows
//!
//! Built on the `oauth2` crate's typestate client. Provider error responses
//! are flattened to `"{error}: {error_description}"` so callers can match
//! on the provider's own text (dead refresh tokens are recognised that way).

use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use calsync_common::Clock;
use calsync_core::TokenSource;
use calsync_domain::{CalsyncError, OAuth2Token, OAuthConfig, Result};
use chrono::{DateTime, Utc};
use oauth2::basic::{BasicClient, BasicErrorResponse, BasicTokenResponse};
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    EndpointSet, RedirectUrl, RefreshToken, RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use tracing::debug;

/// Scope requested for app-only Graph access
const GRAPH_DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

type ConfiguredClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Authorize and token endpoints of the identity provider
#[derive(Debug, Clone)]
pub struct OAuthEndpoints {
    pub authorize_url: String,
    pub token_url: String,
}

impl OAuthEndpoints {
    /// v2.0 endpoints under the configured tenant authority
    pub fn for_tenant(config: &OAuthConfig) -> Self {
        let authority = config.authority();
        Self {
            authorize_url: format!("{authority}/oauth2/v2.0/authorize"),
            token_url: format!("{authority}/oauth2/v2.0/token"),
        }
    }
}

pub struct GraphTokenSource {
    client: ConfiguredClient,
    http: reqwest::Client,
    scopes: Vec<String>,
    clock: Arc<dyn Clock>,
}

impl GraphTokenSource {
    /// # Errors
    /// Returns `CalsyncError::Config` when an endpoint or the redirect URL is
    /// not a valid URL.
    pub fn new(
        config: &OAuthConfig,
        endpoints: OAuthEndpoints,
        redirect_url: &str,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.client_secret.clone()))
            .set_auth_uri(AuthUrl::new(endpoints.authorize_url).map_err(config_error("authorize url"))?)
            .set_token_uri(TokenUrl::new(endpoints.token_url).map_err(config_error("token url"))?)
            .set_redirect_uri(
                RedirectUrl::new(redirect_url.to_string()).map_err(config_error("redirect url"))?,
            )
            .set_auth_type(AuthType::RequestBody);

        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| CalsyncError::Config(format!("oauth http client: {e}")))?;

        Ok(Self { client, http, scopes: config.scopes.clone(), clock })
    }

    /// App-only token for the tenant, used by the superuser Graph client
    pub async fn client_credentials(&self) -> Result<OAuth2Token> {
        let response = self
            .client
            .exchange_client_credentials()
            .add_scope(Scope::new(GRAPH_DEFAULT_SCOPE.to_string()))
            .request_async(&self.http)
            .await
            .map_err(map_token_error)?;
        Ok(self.token_from(&response, None))
    }

    fn token_from(
        &self,
        response: &BasicTokenResponse,
        previous_refresh: Option<&String>,
    ) -> OAuth2Token {
        let expiry: Option<DateTime<Utc>> = response
            .expires_in()
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .map(|ttl| self.clock.now() + ttl);

        OAuth2Token {
            access_token: response.access_token().secret().clone(),
            token_type: response.token_type().as_ref().to_string(),
            refresh_token: response
                .refresh_token()
                .map(|token| token.secret().clone())
                .or_else(|| previous_refresh.cloned()),
            expiry,
        }
    }
}

fn config_error<E: Display>(what: &'static str) -> impl Fn(E) -> CalsyncError {
    move |err| CalsyncError::Config(format!("invalid oauth {what}: {err}"))
}

fn map_token_error<RE: std::error::Error + 'static>(
    err: RequestTokenError<RE, BasicErrorResponse>,
) -> CalsyncError {
    match err {
        RequestTokenError::ServerResponse(response) => {
            let text = match response.error_description() {
                Some(description) => format!("{}: {description}", response.error()),
                None => response.error().to_string(),
            };
            CalsyncError::AuthExpired(text)
        }
        RequestTokenError::Request(e) => CalsyncError::Network(format!("token request failed: {e}")),
        RequestTokenError::Parse(e, _) => {
            CalsyncError::Internal(format!("token response did not parse: {e}"))
        }
        RequestTokenError::Other(message) => CalsyncError::Internal(message),
    }
}

#[async_trait]
impl TokenSource for GraphTokenSource {
    fn authorize_url(&self, state: &str) -> String {
        let state = state.to_string();
        let (url, _) = self
            .client
            .authorize_url(move || CsrfToken::new(state))
            .add_scopes(self.scopes.iter().cloned().map(Scope::new))
            .url();
        url.to_string()
    }

    async fn exchange_code(&self, code: &str) -> Result<OAuth2Token> {
        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http)
            .await
            .map_err(map_token_error)?;
        Ok(self.token_from(&response, None))
    }

    async fn refresh(&self, token: &OAuth2Token) -> Result<OAuth2Token> {
        let refresh_token = token
            .refresh_token
            .as_ref()
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                CalsyncError::AuthExpired("oauth2: token expired and refresh token is not set".into())
            })?;

        debug!("refreshing oauth2 token");
        let response = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.clone()))
            .add_scopes(self.scopes.iter().cloned().map(Scope::new))
            .request_async(&self.http)
            .await
            .map_err(map_token_error)?;
        Ok(self.token_from(&response, Some(refresh_token)))
    }
}
