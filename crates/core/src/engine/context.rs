//! Per-call operation context
//!
//! Everything an operation needs for one acting user is resolved up front by
//! [`OperationContextBuilder::build`]: the stored user record and a client
//! bound to a fresh token. Fan-out workers build their own context, so no
//! engine state is shared between users.

use std::sync::Arc;

use calsync_domain::{CalsyncError, Result, TimeZoneName, User};

use super::Engine;
use crate::remote_ports::{FetchStrategy, RemoteCalendar};

/// Acting user plus a client authorised for them
#[derive(Clone)]
pub struct OperationContext {
    pub user: User,
    pub client: Arc<dyn RemoteCalendar>,
}

impl std::fmt::Debug for OperationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationContext")
            .field("user", &self.user.platform_user_id)
            .finish_non_exhaustive()
    }
}

pub struct OperationContextBuilder<'a> {
    engine: &'a Engine,
    user_id: Option<String>,
    user: Option<User>,
}

impl<'a> OperationContextBuilder<'a> {
    /// Load the acting user from the store by platform id
    pub fn acting_user(mut self, platform_user_id: impl Into<String>) -> Self {
        self.user_id = Some(platform_user_id.into());
        self.user = None;
        self
    }

    /// Use an already loaded user record
    pub fn with_user(mut self, user: User) -> Self {
        self.user = Some(user);
        self.user_id = None;
        self
    }

    pub async fn build(self) -> Result<OperationContext> {
        let mut user = match (self.user, self.user_id) {
            (Some(user), _) => user,
            (None, Some(id)) => self.engine.store().load_user(&id).await?,
            (None, None) => {
                return Err(CalsyncError::Validation("no acting user for operation".to_string()))
            }
        };

        let token = self.engine.fresh_token(&user).await?;
        let client = self.engine.env().remote.user_client(&token);
        user.oauth2_token = Some(token);
        Ok(OperationContext { user, client })
    }
}

/// How multi-user reads run for one job invocation
#[derive(Clone)]
pub enum FetchPlan {
    /// Single app-wide client with batched requests
    Batch(Arc<dyn RemoteCalendar>),
    /// Per-user clients through the worker pool
    Fanout,
}

impl std::fmt::Debug for FetchPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Batch(_) => f.write_str("Batch"),
            Self::Fanout => f.write_str("Fanout"),
        }
    }
}

impl Engine {
    pub fn context(&self) -> OperationContextBuilder<'_> {
        OperationContextBuilder { engine: self, user_id: None, user: None }
    }

    /// Pick the retrieval strategy. A provider that advertises batching but
    /// cannot build a superuser client downgrades to fan-out.
    pub async fn fetch_plan(&self) -> Result<FetchPlan> {
        match self.env().remote.fetch_strategy() {
            FetchStrategy::PerUserFanout => Ok(FetchPlan::Fanout),
            FetchStrategy::SuperuserBatch => match self.env().remote.superuser_client().await {
                Ok(client) => Ok(FetchPlan::Batch(client)),
                Err(CalsyncError::SuperuserNotSupported) => Ok(FetchPlan::Fanout),
                Err(err) => Err(err),
            },
        }
    }

    /// Mailbox time zone of `user`, read through the plan's client
    pub async fn user_time_zone(&self, plan: &FetchPlan, user: &User) -> Result<TimeZoneName> {
        let client = match plan {
            FetchPlan::Batch(client) => Arc::clone(client),
            FetchPlan::Fanout => self.context().with_user(user.clone()).build().await?.client,
        };
        Ok(client.get_mailbox_settings(&user.remote.id).await?.time_zone)
    }
}
