//! One-time OAuth2 state tokens

use calsync_domain::constants::OAUTH2_STATE_TTL;
use calsync_domain::{CalsyncError, Result};

use super::keys::oauth2_state_key;
use super::Store;

impl Store {
    pub async fn store_oauth2_state(&self, state: &str) -> Result<()> {
        let ttl = OAUTH2_STATE_TTL
            .to_std()
            .map_err(|e| CalsyncError::Internal(format!("invalid oauth2 state ttl: {e}")))?;
        self.secure_kv()
            .set_with_ttl(&oauth2_state_key(state), state.as_bytes().to_vec(), ttl)
            .await
    }

    /// Check and consume a state token
    pub async fn verify_oauth2_state(&self, state: &str) -> Result<()> {
        let key = oauth2_state_key(state);
        let stored = self
            .secure_kv()
            .get(&key)
            .await?
            .ok_or_else(|| CalsyncError::NotFound("oauth2 state".to_string()))?;
        self.secure_kv().delete(&key).await?;

        if stored != state.as_bytes() {
            return Err(CalsyncError::Security("oauth2 state mismatch".to_string()));
        }
        Ok(())
    }
}
