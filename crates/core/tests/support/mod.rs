//! Shared fixtures for `calsync-core` integration tests.
//!
//! Every port is replaced by an in-memory fake that records what the engine
//! did, so scenarios can assert on calls instead of on log output.

#![allow(dead_code)]

pub mod kv;
pub mod platform;
pub mod remote;
pub mod tokens;

use std::sync::Arc;
use std::time::Duration;

use calsync_common::MockClock;
use calsync_core::engine::{Engine, EngineSettings, Env};
use calsync_core::remote_ports::FetchStrategy;
use calsync_core::store::Store;
use calsync_domain::{
    Event, EventDateTime, OAuth2Token, PlatformStatus, PresenceStatus, RemoteUser, Settings, User,
};
use chrono::{DateTime, Utc};

pub use kv::MemoryKv;
pub use platform::RecordingPlatform;
pub use remote::{ScriptedProvider, ScriptedRemote};
pub use tokens::ScriptedTokens;

pub const NOW: &str = "2024-03-05T14:00:00Z";

pub fn at(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339).expect("valid timestamp").with_timezone(&Utc)
}

/// Engine wired to fakes
pub struct Harness {
    pub engine: Engine,
    pub kv: Arc<MemoryKv>,
    pub platform: Arc<RecordingPlatform>,
    pub remote: Arc<ScriptedRemote>,
    pub tokens: Arc<ScriptedTokens>,
    pub clock: MockClock,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_strategy(FetchStrategy::SuperuserBatch)
    }

    pub fn with_strategy(strategy: FetchStrategy) -> Self {
        Self::with_settings(strategy, test_settings())
    }

    pub fn with_settings(strategy: FetchStrategy, settings: EngineSettings) -> Self {
        let kv = Arc::new(MemoryKv::default());
        let platform = Arc::new(RecordingPlatform::default());
        let remote = Arc::new(ScriptedRemote::default());
        let tokens = Arc::new(ScriptedTokens::default());
        let clock = MockClock::new(at(NOW));

        let env = Env {
            settings,
            store: Store::new(kv.clone()),
            remote: Arc::new(ScriptedProvider::new(remote.clone(), strategy)),
            tokens: tokens.clone(),
            platform: platform.clone(),
            clock: Arc::new(clock.clone()),
        };

        Self { engine: Engine::new(env), kv, platform, remote, tokens, clock }
    }

    pub fn now(&self) -> DateTime<Utc> {
        use calsync_common::Clock;
        self.clock.now()
    }

    /// Store a connected user, add them to the index and set their presence
    pub async fn connect(&self, id: &str, settings: Settings, presence: PlatformStatus) -> User {
        let user = connected_user(id, settings);
        self.engine.store().store_user(&user).await.expect("store user");
        self.engine.store().store_user_in_index(&user).await.expect("index user");
        self.platform.set_status(presence);
        self.kv.reset_writes();
        user
    }

    pub async fn user(&self, id: &str) -> User {
        self.engine.store().load_user(id).await.expect("user exists")
    }
}

pub fn test_settings() -> EngineSettings {
    EngineSettings {
        plugin_version: "test".to_string(),
        notification_url: "https://chat.example.com/plugins/calsync/api/v1/notification".to_string(),
        confirm_action_url: "https://chat.example.com/plugins/calsync/api/v1/confirm".to_string(),
        respond_action_url: "https://chat.example.com/plugins/calsync/api/v1/respond".to_string(),
        concurrency: 4,
        fanout_deadline: Duration::from_secs(300),
    }
}

pub fn connected_user(id: &str, settings: Settings) -> User {
    User {
        settings,
        remote: RemoteUser {
            id: remote_id(id),
            display_name: format!("User {id}"),
            user_principal_name: format!("{id}@example.com"),
            mail: format!("{id}@example.com"),
        },
        oauth2_token: Some(OAuth2Token {
            access_token: format!("access-{id}"),
            token_type: "Bearer".to_string(),
            refresh_token: Some(format!("refresh-{id}")),
            expiry: Some(at(NOW) + chrono::Duration::hours(1)),
        }),
        plugin_version: "test".to_string(),
        platform_user_id: id.to_string(),
        platform_username: id.to_string(),
        platform_display_name: format!("User {id}"),
        ..User::default()
    }
}

pub fn remote_id(platform_user_id: &str) -> String {
    format!("remote-{platform_user_id}")
}

/// Settings of a legacy user that gets DND while busy
pub fn dnd_settings(get_confirmation: bool) -> Settings {
    Settings { update_status: true, get_confirmation, ..Settings::default() }
}

pub fn online(id: &str) -> PlatformStatus {
    PlatformStatus::new(id, PresenceStatus::Online, true)
}

pub fn busy_event(ical_uid: &str, start: DateTime<Utc>, minutes: i64) -> Event {
    Event {
        id: format!("id-{ical_uid}"),
        ical_uid: ical_uid.to_string(),
        subject: format!("Meeting {ical_uid}"),
        show_as: "busy".to_string(),
        web_link: "https://outlook.office365.com/owa/?itemid=abc".to_string(),
        start: Some(EventDateTime::from_utc(start)),
        end: Some(EventDateTime::from_utc(start + chrono::Duration::minutes(minutes))),
        ..Event::default()
    }
}

pub fn fingerprint(event: &Event) -> String {
    event.fingerprint().expect("event has a start")
}
