//! OAuth2 port interfaces

use async_trait::async_trait;
use calsync_domain::{OAuth2Token, Result};

/// Authorization code flow and token refresh against the identity provider
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// URL the user is sent to in order to grant access
    fn authorize_url(&self, state: &str) -> String;

    /// Exchange an authorization code for a token
    async fn exchange_code(&self, code: &str) -> Result<OAuth2Token>;

    /// Force a refresh. Errors carry the provider's text so dead refresh
    /// tokens can be recognised by the caller.
    async fn refresh(&self, token: &OAuth2Token) -> Result<OAuth2Token>;
}
