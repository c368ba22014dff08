//! Scripted identity provider

use std::collections::HashMap;

use async_trait::async_trait;
use calsync_core::oauth_ports::TokenSource;
use calsync_domain::{CalsyncError, OAuth2Token, Result};
use parking_lot::Mutex;

#[derive(Default)]
pub struct ScriptedTokens {
    codes: Mutex<HashMap<String, OAuth2Token>>,
    refreshed: Mutex<Option<Result<OAuth2Token>>>,
    refresh_calls: Mutex<usize>,
}

impl ScriptedTokens {
    pub fn accept_code(&self, code: &str, token: OAuth2Token) {
        self.codes.lock().insert(code.to_string(), token);
    }

    /// Outcome of every following refresh
    pub fn on_refresh(&self, outcome: Result<OAuth2Token>) {
        *self.refreshed.lock() = Some(outcome);
    }

    pub fn refresh_calls(&self) -> usize {
        *self.refresh_calls.lock()
    }
}

#[async_trait]
impl TokenSource for ScriptedTokens {
    fn authorize_url(&self, state: &str) -> String {
        format!("https://login.example.com/authorize?state={state}")
    }

    async fn exchange_code(&self, code: &str) -> Result<OAuth2Token> {
        self.codes
            .lock()
            .get(code)
            .cloned()
            .ok_or_else(|| CalsyncError::AuthExpired(format!("unknown code {code}")))
    }

    async fn refresh(&self, _token: &OAuth2Token) -> Result<OAuth2Token> {
        *self.refresh_calls.lock() += 1;
        self.refreshed
            .lock()
            .clone()
            .unwrap_or_else(|| Err(CalsyncError::Network("no refresh scripted".to_string())))
    }
}
