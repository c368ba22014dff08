//! Single-worker notification processor
//!
//! Webhook handlers [`enqueue`](NotificationProcessor::enqueue) decoded
//! notifications without blocking; one background task handles them in
//! arrival order. Because only that task touches event snapshots, the
//! snapshot read-modify-write needs no further locking. Configuration
//! changes travel on their own channel and take effect between
//! notifications.
//!
//! ```no_run
//! # use calsync_core::engine::Engine;
//! # use calsync_core::notification::{NotificationProcessor, ProcessorConfig};
//! # async fn example(engine: Engine) {
//! let processor = NotificationProcessor::start(engine, 1024);
//! processor
//!     .configure(ProcessorConfig { notification_url: "https://chat/webhook".into() })
//!     .await
//!     .ok();
//! processor.quit().await;
//! # }
//! ```

use std::time::Duration;

use calsync_domain::{CalsyncError, EventSnapshot, Notification, Subscription};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::Engine;
use crate::views::{new_event_attachment, updated_event_attachment};

const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings the worker can pick up while running
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorConfig {
    pub notification_url: String,
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("webhook notification: queue full, dropped notification")]
    QueueFull,

    #[error("notification processor is not running")]
    Stopped,

    #[error("subscription is orphaned")]
    Orphaned,

    #[error("unauthorized webhook")]
    Unauthorized,

    #[error("notification carries no event")]
    MissingEvent,

    #[error(transparent)]
    Calsync(#[from] CalsyncError),
}

impl From<ProcessorError> for CalsyncError {
    fn from(err: ProcessorError) -> Self {
        match err {
            ProcessorError::QueueFull => Self::QueueFull,
            ProcessorError::Calsync(inner) => inner,
            ProcessorError::Orphaned => Self::NotFound(err.to_string()),
            ProcessorError::Unauthorized => Self::Validation(err.to_string()),
            ProcessorError::Stopped | ProcessorError::MissingEvent => Self::Internal(err.to_string()),
        }
    }
}

/// Handle to the background worker
pub struct NotificationProcessor {
    queue: mpsc::Sender<Notification>,
    config: mpsc::Sender<ProcessorConfig>,
    cancellation: CancellationToken,
    handle: JoinHandle<()>,
}

impl NotificationProcessor {
    /// Spawn the worker with a queue holding up to `queue_size` notifications
    pub fn start(engine: Engine, queue_size: usize) -> Self {
        let (queue, queue_rx) = mpsc::channel(queue_size.max(1));
        let (config, config_rx) = mpsc::channel(1);
        let cancellation = CancellationToken::new();

        let worker = Worker {
            notification_url: engine.env().settings.notification_url.clone(),
            engine,
        };
        let handle = tokio::spawn(worker.run(queue_rx, config_rx, cancellation.clone()));
        info!(queue_size, "Notification processor started");

        Self { queue, config, cancellation, handle }
    }

    /// Queue notifications for processing. Never waits: a full queue drops
    /// the remaining notifications and reports [`ProcessorError::QueueFull`].
    pub fn enqueue(
        &self,
        notifications: impl IntoIterator<Item = Notification>,
    ) -> Result<(), ProcessorError> {
        for notification in notifications {
            self.queue.try_send(notification).map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => ProcessorError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => ProcessorError::Stopped,
            })?;
        }
        Ok(())
    }

    pub async fn configure(&self, config: ProcessorConfig) -> Result<(), ProcessorError> {
        self.config.send(config).await.map_err(|_| ProcessorError::Stopped)
    }

    /// Stop the worker. Queued notifications that were not started are dropped.
    pub async fn quit(self) {
        self.cancellation.cancel();
        match tokio::time::timeout(JOIN_TIMEOUT, self.handle).await {
            Ok(Ok(())) => info!("Notification processor stopped"),
            Ok(Err(err)) => warn!(error = %err, "Notification processor task failed"),
            Err(_) => warn!("Notification processor did not stop in time"),
        }
    }
}

struct Worker {
    engine: Engine,
    notification_url: String,
}

impl Worker {
    async fn run(
        mut self,
        mut queue: mpsc::Receiver<Notification>,
        mut config: mpsc::Receiver<ProcessorConfig>,
        cancellation: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                () = cancellation.cancelled() => break,
                Some(update) = config.recv() => {
                    debug!(notification_url = %update.notification_url, "Processor reconfigured");
                    self.notification_url = update.notification_url;
                }
                next = queue.recv() => {
                    let Some(notification) = next else { break };
                    let subscription_id = notification.subscription_id.clone();
                    if let Err(err) = self.process(notification).await {
                        info!(subscription_id = %subscription_id, error = %err, "webhook notification: failed");
                    }
                }
            }
        }
    }

    async fn process(&self, mut n: Notification) -> Result<(), ProcessorError> {
        let store = self.engine.store();
        let env = self.engine.env();

        let subscription = store.load_subscription(&n.subscription_id).await?;
        let creator = store.load_user(&subscription.platform_creator_id).await?;
        if subscription.remote.id != creator.settings.event_subscription_id {
            return Err(ProcessorError::Orphaned);
        }
        if !subscription.remote.client_state.is_empty()
            && subscription.remote.client_state != n.client_state
        {
            return Err(ProcessorError::Unauthorized);
        }

        n.subscription = Some(subscription.remote.clone());
        n.subscription_creator = Some(creator.remote.clone());

        let mut ctx = self.engine.context().with_user(creator).build().await?;
        let creator_id = ctx.user.platform_user_id.clone();

        if n.recommend_renew {
            let mut renewed = ctx
                .client
                .renew_subscription(
                    &self.notification_url,
                    &subscription.remote.creator_id,
                    &subscription.remote,
                )
                .await?;
            if renewed.creator_id.is_empty() {
                renewed.creator_id.clone_from(&subscription.remote.creator_id);
            }
            let stored = Subscription {
                remote: renewed,
                platform_creator_id: creator_id.clone(),
                plugin_version: env.settings.plugin_version.clone(),
            };
            store.store_user_subscription(&mut ctx.user, &stored).await?;
            debug!(user_id = %creator_id, subscription_id = %n.subscription_id, "Renewed subscription");
        }

        if n.is_bare {
            n = ctx.client.get_notification_data(n).await?;
        }
        let event = n.event.take().ok_or(ProcessorError::MissingEvent)?;

        let prior = match store.load_user_event(&creator_id, &event.ical_uid).await {
            Ok(snapshot) => Some(snapshot.remote),
            Err(err) if err.is_not_found() => None,
            Err(err) => return Err(err.into()),
        };
        let zone = ctx.client.get_mailbox_settings(&subscription.remote.creator_id).await?.time_zone;

        let now = self.engine.now();
        let respond_url = &env.settings.respond_action_url;
        let attachment = match &prior {
            Some(prior) => updated_event_attachment(&event, prior, &zone, respond_url, now),
            None => Some(new_event_attachment(&event, &zone, respond_url, now)),
        };

        match attachment {
            Some(attachment) => {
                let title = attachment.title.clone();
                env.platform.dm_with_attachments(&creator_id, "", vec![attachment]).await?;
                debug!(user_id = %creator_id, title = %title, "Notified");
            }
            None => debug!(
                user_id = %creator_id,
                change_type = %n.change_type,
                event = %event.ical_uid,
                "webhook notification: no important changes detected in event"
            ),
        }

        let snapshot = EventSnapshot { remote: event, plugin_version: env.settings.plugin_version.clone() };
        store.store_user_event(&creator_id, &snapshot, now).await?;
        Ok(())
    }
}
