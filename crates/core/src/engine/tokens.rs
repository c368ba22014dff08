//! Token manager
//!
//! Per-user clients are always built from [`Engine::fresh_token`]. A token
//! that expires within [`TOKEN_REFRESH_LEEWAY`] is refreshed and written
//! back; a refresh token the provider reports as dead disconnects the user.

use calsync_domain::constants::{TOKEN_REFRESH_LEEWAY, USER_INACTIVE_MESSAGE};
use calsync_domain::{CalsyncError, OAuth2Token, Result, User};
use tracing::{debug, error, warn};

use super::Engine;

impl Engine {
    /// Token good for at least the refresh leeway
    pub async fn fresh_token(&self, user: &User) -> Result<OAuth2Token> {
        let Some(token) = user.oauth2_token.clone() else {
            return Err(CalsyncError::NotConnected(user.platform_user_id.clone()));
        };
        if token.is_fresh(self.now(), TOKEN_REFRESH_LEEWAY) {
            return Ok(token);
        }

        let mut refreshed = match self.env().tokens.refresh(&token).await {
            Ok(refreshed) => refreshed,
            Err(err) if err.is_refresh_token_dead() => {
                warn!(user_id = %user.platform_user_id, error = %err, "Refresh token is dead");
                self.mark_user_inactive(&user.platform_user_id).await;
                return Err(CalsyncError::NotConnected(user.platform_user_id.clone()));
            }
            Err(err) => return Err(err),
        };
        // Providers may omit the refresh token when it did not rotate.
        if refreshed.refresh_token.is_none() {
            refreshed.refresh_token = token.refresh_token.clone();
        }

        if refreshed.access_token != token.access_token
            || refreshed.refresh_token != token.refresh_token
        {
            let mut stored = self.store().load_user(&user.platform_user_id).await?;
            stored.oauth2_token = Some(refreshed.clone());
            self.store().store_user(&stored).await?;
            debug!(user_id = %user.platform_user_id, "Stored refreshed token");
        }
        Ok(refreshed)
    }

    /// Clear the stored token and tell the user to reconnect
    pub(crate) async fn mark_user_inactive(&self, platform_user_id: &str) {
        match self.store().load_user(platform_user_id).await {
            Ok(mut user) => {
                user.oauth2_token = None;
                if let Err(err) = self.store().store_user(&user).await {
                    error!(user_id = %platform_user_id, error = %err, "Failed to clear token");
                }
            }
            Err(err) => {
                error!(user_id = %platform_user_id, error = %err, "Failed to load inactive user");
            }
        }

        if let Err(err) = self.env().platform.dm(platform_user_id, USER_INACTIVE_MESSAGE).await {
            warn!(user_id = %platform_user_id, error = %err, "Failed to send inactivity notice");
        }
    }
}
