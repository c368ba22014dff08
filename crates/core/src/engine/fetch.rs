//! Multi-user calendar retrieval
//!
//! Batched plans issue one call through the superuser client. Fan-out plans
//! feed users through a bounded channel to `concurrency` workers, each of
//! which builds its own [`OperationContext`](super::OperationContext). The
//! whole fan-out runs under the configured deadline; on expiry the workers
//! are aborted and whatever was collected so far is returned.

use std::collections::HashMap;
use std::sync::Arc;

use calsync_common::LimitedLog;
use calsync_domain::{CalendarViewRequest, CalsyncError, Event, Result, User};
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use super::{Engine, FetchPlan};

/// Window to read for one user
#[derive(Debug, Clone)]
pub struct ViewRequest {
    pub user: User,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ViewRequest {
    pub fn new(user: User, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { user, start, end }
    }
}

/// Events of one user in the requested window
#[derive(Debug, Clone)]
pub struct UserView {
    pub user: User,
    pub events: Vec<Event>,
}

#[derive(Debug, Default)]
pub struct FetchResult {
    pub views: Vec<UserView>,
    /// Users whose view could not be read
    pub failed: usize,
    pub deadline_exceeded: bool,
}

type WorkerOutcome = std::result::Result<UserView, (String, CalsyncError)>;

impl Engine {
    /// Calendar views for every request. Declined events are dropped from
    /// each view. Per-user failures are counted and logged through `log`;
    /// only a failed batch call is returned as an error.
    pub async fn fetch_calendar_views(
        &self,
        plan: &FetchPlan,
        requests: Vec<ViewRequest>,
        log: &LimitedLog,
    ) -> Result<FetchResult> {
        let mut result = match plan {
            FetchPlan::Batch(client) => {
                let batch: Vec<CalendarViewRequest> = requests
                    .iter()
                    .map(|r| CalendarViewRequest {
                        remote_user_id: r.user.remote.id.clone(),
                        start: r.start,
                        end: r.end,
                    })
                    .collect();
                let responses = client.batch_calendar_view(&batch).await?;

                let mut by_remote_id: HashMap<String, User> =
                    requests.into_iter().map(|r| (r.user.remote.id.clone(), r.user)).collect();
                let mut result = FetchResult::default();
                for response in responses {
                    let Some(user) = by_remote_id.remove(&response.remote_user_id) else {
                        debug!(remote_id = %response.remote_user_id, "Dropping unrequested view");
                        continue;
                    };
                    if let Some(err) = response.error {
                        result.failed += 1;
                        log.warn(format_args!(
                            "Failed to get calendar view for {}: {} {}",
                            user.platform_user_id, err.code, err.message
                        ));
                        continue;
                    }
                    result.views.push(UserView { user, events: response.events });
                }
                result
            }
            FetchPlan::Fanout => self.fan_out(requests, log).await,
        };

        for view in &mut result.views {
            view.events.retain(|e| !e.is_declined());
        }
        Ok(result)
    }

    async fn fan_out(&self, requests: Vec<ViewRequest>, log: &LimitedLog) -> FetchResult {
        let settings = &self.env().settings;
        let (in_tx, in_rx) = mpsc::channel::<ViewRequest>(1);
        let (out_tx, mut out_rx) = mpsc::channel::<WorkerOutcome>(1);
        let in_rx = Arc::new(Mutex::new(in_rx));

        let mut tasks = JoinSet::new();
        tasks.spawn(async move {
            for request in requests {
                if in_tx.send(request).await.is_err() {
                    break;
                }
            }
        });

        for _ in 0..settings.concurrency {
            let engine = self.clone();
            let in_rx = Arc::clone(&in_rx);
            let out_tx = out_tx.clone();
            tasks.spawn(async move {
                loop {
                    // Hold the receiver lock only while waiting for the next user.
                    let next = in_rx.lock().await.recv().await;
                    let Some(request) = next else { break };
                    let outcome = engine.view_for_user(request).await;
                    if out_tx.send(outcome).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(out_tx);

        let mut result = FetchResult::default();
        let drain = async {
            while let Some(outcome) = out_rx.recv().await {
                match outcome {
                    Ok(view) => result.views.push(view),
                    Err((user_id, err)) => {
                        result.failed += 1;
                        log.warn(format_args!("Failed to get calendar view for {user_id}: {err}"));
                    }
                }
            }
        };

        if tokio::time::timeout(settings.fanout_deadline, drain).await.is_err() {
            warn!(
                collected = result.views.len(),
                deadline_secs = settings.fanout_deadline.as_secs(),
                "Calendar fan-out deadline exceeded; returning partial results"
            );
            result.deadline_exceeded = true;
            tasks.abort_all();
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                if err.is_panic() {
                    error!(error = %err, "Calendar fan-out worker panicked");
                }
            }
        }
        result
    }

    async fn view_for_user(&self, request: ViewRequest) -> WorkerOutcome {
        let ViewRequest { user, start, end } = request;
        let user_id = user.platform_user_id.clone();
        let ctx = self.context().with_user(user).build().await.map_err(|e| (user_id.clone(), e))?;
        let events = ctx
            .client
            .calendar_view(&ctx.user.remote.id, start, end)
            .await
            .map_err(|e| (user_id, e))?;
        Ok(UserView { user: ctx.user, events })
    }
}
