//! # Calsync Core
//!
//! Policy layer of the calendar to chat bridge. No database, HTTP or
//! platform code lives here: the key-value substrate, the remote calendar,
//! the identity provider and the chat platform are all reached through the
//! port traits below, and infra supplies the adapters.
//!
//! - [`engine`]: status sync, reminders, daily summary, subscriptions,
//!   token refresh and the connect flow
//! - [`notification`]: the single-worker webhook processor
//! - [`store`]: typed records over [`store::KvStore`]
//! - [`views`]: pure renderers for chat messages and attachments

pub mod engine;
pub mod notification;
pub mod store;
pub mod views;

// Ports
pub mod oauth_ports;
pub mod platform_ports;
pub mod remote_ports;

pub use engine::{Engine, EngineSettings, Env, FetchPlan, OperationContext};
pub use notification::{NotificationProcessor, ProcessorConfig, ProcessorError};
pub use oauth_ports::TokenSource;
pub use platform_ports::ChatPlatform;
pub use remote_ports::{FetchStrategy, RemoteCalendar, RemoteProvider};
pub use store::{KvStore, Store};
