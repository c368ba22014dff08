//! Persistence, token refresh, subscriptions and the connect flow

mod support;

use calsync_core::store::keys::{oauth2_state_key, user_key};
use calsync_domain::constants::{MODIFY_INDEX_MAX_ATTEMPTS, USER_INACTIVE_MESSAGE};
use calsync_domain::{
    CalsyncError, OAuth2Token, PlatformUser, PresenceStatus, RemoteUser, Settings, SettingsPatch,
    StatusOption,
};
use chrono::Duration;
use support::{at, connected_user, dnd_settings, online, remote_id, Harness, NOW};

#[tokio::test]
async fn stored_user_loads_back_unchanged() {
    let h = Harness::new();
    let mut user = connected_user("u1", dnd_settings(true));
    user.last_status = Some(PresenceStatus::Away);
    user.channel_events.insert("ev".into(), "chan".into());

    h.engine.store().store_user(&user).await.unwrap();

    assert_eq!(h.user("u1").await, user);
    let owner = h.engine.store().load_platform_user_id(&remote_id("u1")).await.unwrap();
    assert_eq!(h.user(&owner).await.remote.id, remote_id("u1"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_index_writers_each_land_once() {
    let h = Harness::new();
    h.kv.yield_on_access(true);
    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..50 {
        let store = h.engine.store().clone();
        tasks.spawn(async move {
            let user = connected_user(&format!("user-{i}"), Settings::default());
            store.store_user_in_index(&user).await
        });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.unwrap().unwrap();
    }

    let index = h.engine.store().load_user_index().await.unwrap();
    assert_eq!(index.len(), 50);
    for i in 0..50 {
        let id = format!("user-{i}");
        assert_eq!(index.iter().filter(|e| e.platform_user_id == id).count(), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn index_update_retries_on_conflict() {
    let h = Harness::new();
    h.kv.inject_cas_conflicts(3);
    h.engine.store().store_user_in_index(&connected_user("u1", Settings::default())).await.unwrap();
    assert_eq!(h.engine.store().load_user_index().await.unwrap().len(), 1);

    h.kv.inject_cas_conflicts(MODIFY_INDEX_MAX_ATTEMPTS);
    let err = h
        .engine
        .store()
        .store_user_in_index(&connected_user("u2", Settings::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, CalsyncError::Storage(_)));
}

#[tokio::test]
async fn event_snapshots_expire_after_the_event() {
    let h = Harness::new();
    let event = support::busy_event("ev", h.now() + Duration::days(1), 60);
    let snapshot = calsync_domain::EventSnapshot { remote: event.clone(), plugin_version: "t".into() };
    h.engine.store().store_user_event("u1", &snapshot, h.now()).await.unwrap();

    let key = calsync_core::store::keys::event_key("u1", "ev");
    let expected = (Duration::days(31) + Duration::minutes(60)).to_std().unwrap();
    assert_eq!(h.kv.ttl(&key), Some(expected));

    let old = support::busy_event("old", h.now() - Duration::days(40), 60);
    let snapshot = calsync_domain::EventSnapshot { remote: old, plugin_version: "t".into() };
    h.engine.store().store_user_event("u1", &snapshot, h.now()).await.unwrap();
    assert!(!h.kv.contains(&calsync_core::store::keys::event_key("u1", "old")));
}

#[tokio::test]
async fn fresh_token_is_not_refreshed() {
    let h = Harness::new();
    let user = h.connect("u1", dnd_settings(false), online("u1")).await;

    let token = h.engine.fresh_token(&user).await.unwrap();

    assert_eq!(Some(token), user.oauth2_token);
    assert_eq!(h.tokens.refresh_calls(), 0);
}

#[tokio::test]
async fn expiring_token_is_refreshed_and_stored() {
    let h = Harness::new();
    let user = h.connect("u1", dnd_settings(false), online("u1")).await;
    h.clock.advance(Duration::minutes(56));
    h.tokens.on_refresh(Ok(OAuth2Token {
        access_token: "access-new".into(),
        token_type: "Bearer".into(),
        refresh_token: None,
        expiry: Some(at(NOW) + Duration::hours(2)),
    }));

    let token = h.engine.fresh_token(&user).await.unwrap();

    assert_eq!(token.access_token, "access-new");
    assert_eq!(token.refresh_token.as_deref(), Some("refresh-u1"));
    assert_eq!(h.user("u1").await.oauth2_token, Some(token));
}

#[tokio::test]
async fn dead_refresh_token_marks_user_inactive() {
    let h = Harness::new();
    let user = h.connect("u1", dnd_settings(false), online("u1")).await;
    h.clock.advance(Duration::hours(2));
    h.tokens.on_refresh(Err(CalsyncError::AuthExpired(
        "AADSTS700082: The refresh token has expired due to inactivity".into(),
    )));

    let err = h.engine.fresh_token(&user).await.unwrap_err();

    assert!(matches!(err, CalsyncError::NotConnected(_)));
    assert_eq!(h.user("u1").await.oauth2_token, None);
    let dms = h.platform.dms_to("u1");
    assert_eq!(dms.len(), 1);
    assert_eq!(dms[0].message, USER_INACTIVE_MESSAGE);

    let again = h.engine.fresh_token(&h.user("u1").await).await.unwrap_err();
    assert!(matches!(again, CalsyncError::NotConnected(_)));
    assert_eq!(h.tokens.refresh_calls(), 1);
}

#[tokio::test]
async fn transient_refresh_failure_keeps_the_user() {
    let h = Harness::new();
    let user = h.connect("u1", dnd_settings(false), online("u1")).await;
    h.clock.advance(Duration::hours(2));
    h.tokens.on_refresh(Err(CalsyncError::Network("connection reset".into())));

    assert!(h.engine.fresh_token(&user).await.is_err());
    assert!(h.user("u1").await.oauth2_token.is_some());
    assert!(h.platform.dms_to("u1").is_empty());
}

#[tokio::test]
async fn renewal_recreates_a_subscription_the_remote_forgot() {
    let h = Harness::new();
    h.connect("u1", dnd_settings(false), online("u1")).await;
    let old = h.engine.create_my_event_subscription("u1").await.unwrap();
    h.remote.fail_renewal(CalsyncError::remote(
        "ResourceNotFound",
        "The object was not found in the store.",
    ));

    let renewed = h.engine.renew_my_event_subscription("u1").await.unwrap().unwrap();

    assert_ne!(renewed.remote.id, old.remote.id);
    assert_eq!(h.user("u1").await.settings.event_subscription_id, renewed.remote.id);
    assert!(h.engine.store().load_subscription(&old.remote.id).await.unwrap_err().is_not_found());
    assert!(h.engine.store().load_subscription(&renewed.remote.id).await.is_ok());
}

#[tokio::test]
async fn renew_all_counts_users_with_subscriptions() {
    let h = Harness::new();
    h.connect("a", dnd_settings(false), online("a")).await;
    h.connect("b", dnd_settings(false), online("b")).await;
    h.engine.create_my_event_subscription("a").await.unwrap();

    assert_eq!(h.engine.renew_all().await.unwrap(), 1);
    assert_eq!(h.remote.renewed().len(), 1);
}

#[tokio::test]
async fn delete_subscription_removes_remote_and_local() {
    let h = Harness::new();
    h.connect("u1", dnd_settings(false), online("u1")).await;
    let sub = h.engine.create_my_event_subscription("u1").await.unwrap();

    h.engine.delete_my_event_subscription("u1").await.unwrap();

    assert_eq!(h.remote.deleted(), vec![sub.remote.id.clone()]);
    assert!(h.user("u1").await.settings.event_subscription_id.is_empty());
    assert!(h.engine.load_my_event_subscription("u1").await.is_err());
}

fn platform_user(id: &str) -> PlatformUser {
    PlatformUser {
        id: id.to_string(),
        username: id.to_string(),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        email: format!("{id}@example.com"),
        delete_at: 0,
    }
}

fn identity(id: &str) -> RemoteUser {
    RemoteUser {
        id: remote_id(id),
        display_name: "Ada Lovelace".to_string(),
        user_principal_name: format!("{id}@example.com"),
        mail: format!("{id}@example.com"),
    }
}

#[tokio::test]
async fn connect_flow_creates_user_index_entry_and_subscription() {
    let h = Harness::new();
    h.platform.add_user(platform_user("u1"));
    h.tokens.accept_code("code-1", OAuth2Token {
        access_token: "access-u1".into(),
        token_type: "Bearer".into(),
        refresh_token: Some("refresh-u1".into()),
        expiry: Some(at(NOW) + Duration::hours(1)),
    });
    h.remote.set_me("access-u1", identity("u1"));
    h.remote.set_zone(&remote_id("u1"), "Pacific Standard Time");

    let url = h.engine.init_oauth2("u1").await.unwrap();
    let state = url.split("state=").nth(1).unwrap().to_string();
    assert!(h.kv.contains(&oauth2_state_key(&state)));

    let user = h.engine.complete_oauth2("u1", "code-1", &state).await.unwrap();

    assert_eq!(user.platform_display_name, "Ada Lovelace");
    assert_eq!(user.settings.daily_summary.unwrap().timezone.as_str(), "Pacific Standard Time");
    assert_eq!(h.engine.store().load_user_from_index("u1").await.unwrap().remote_id, remote_id("u1"));
    assert_eq!(h.remote.created().len(), 1);
    assert!(!h.user("u1").await.settings.event_subscription_id.is_empty());
    assert!(!h.kv.contains(&oauth2_state_key(&state)));
    assert_eq!(h.platform.dms_to("u1").len(), 1);
    assert!(h.engine.init_oauth2("u1").await.is_err());
}

#[tokio::test]
async fn connect_flow_accepts_user_ids_with_underscores() {
    let h = Harness::new();
    h.platform.add_user(platform_user("team_lead"));
    h.tokens.accept_code("code-tl", OAuth2Token {
        access_token: "access-tl".into(),
        token_type: "Bearer".into(),
        refresh_token: Some("refresh-tl".into()),
        expiry: Some(at(NOW) + Duration::hours(1)),
    });
    h.remote.set_me("access-tl", identity("team_lead"));

    // A prefix of the owner's id must not pass as the owner.
    let url = h.engine.init_oauth2("team_lead").await.unwrap();
    let state = url.split("state=").nth(1).unwrap().to_string();
    let err = h.engine.complete_oauth2("team", "code-tl", &state).await.unwrap_err();
    assert!(matches!(err, CalsyncError::Security(_)));

    let url = h.engine.init_oauth2("team_lead").await.unwrap();
    let state = url.split("state=").nth(1).unwrap().to_string();
    assert!(state.ends_with("_team_lead"));

    let user = h.engine.complete_oauth2("team_lead", "code-tl", &state).await.unwrap();
    assert_eq!(user.remote.id, remote_id("team_lead"));
}

#[tokio::test]
async fn connect_rejects_reused_or_foreign_state() {
    let h = Harness::new();
    let url = h.engine.init_oauth2("u1").await.unwrap();
    let state = url.split("state=").nth(1).unwrap().to_string();

    let err = h.engine.complete_oauth2("u2", "code", &state).await.unwrap_err();
    assert!(matches!(err, CalsyncError::Security(_)));

    let err = h.engine.complete_oauth2("u1", "code", &state).await.unwrap_err();
    assert!(matches!(err, CalsyncError::Security(_)));
}

#[tokio::test]
async fn remote_account_cannot_be_linked_twice() {
    let h = Harness::new();
    h.connect("owner", Settings::default(), online("owner")).await;
    h.platform.add_user(platform_user("owner"));
    h.platform.add_user(platform_user("u2"));
    h.tokens.accept_code("code-2", OAuth2Token { access_token: "access-2".into(), ..OAuth2Token::default() });
    h.remote.set_me("access-2", identity("owner"));

    let url = h.engine.init_oauth2("u2").await.unwrap();
    let state = url.split("state=").nth(1).unwrap().to_string();
    let err = h.engine.complete_oauth2("u2", "code-2", &state).await.unwrap_err();

    assert!(err.to_string().contains("already connected"));
    assert_eq!(h.platform.dms_to("u2").len(), 1);
    assert!(h.engine.store().load_user("u2").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn disconnect_removes_every_trace() {
    let h = Harness::new();
    h.connect("u1", dnd_settings(false), online("u1")).await;
    let sub = h.engine.create_my_event_subscription("u1").await.unwrap();
    h.engine.store().store_welcome_post_id("u1", "post-1").await.unwrap();

    h.engine.disconnect_user("u1").await.unwrap();

    assert!(!h.kv.contains(&user_key("u1")));
    assert!(h.engine.store().load_user_from_index("u1").await.is_err());
    assert!(h.engine.store().load_platform_user_id(&remote_id("u1")).await.is_err());
    assert!(h.engine.store().load_subscription(&sub.remote.id).await.is_err());
    assert_eq!(h.remote.deleted(), vec![sub.remote.id]);
    assert!(h.engine.store().load_welcome_post_id("u1").await.is_err());
}

#[tokio::test]
async fn settings_patch_and_panel() {
    let h = Harness::new();
    h.connect("u1", Settings::default(), online("u1")).await;

    let patch = SettingsPatch {
        update_status_from_options: Some(StatusOption::Away),
        receive_reminders: Some(true),
        ..SettingsPatch::default()
    };
    let settings = h.engine.update_settings("u1", &patch).await.unwrap();
    assert_eq!(settings.busy_status(), Some(PresenceStatus::Away));
    assert!(h.engine.get_settings("u1").await.unwrap().receive_reminders);

    h.engine.print_settings("u1").await.unwrap();
    let post_id = h.engine.store().load_settings_panel_post_id("u1").await.unwrap();
    assert_eq!(post_id, "post-1");
}

#[tokio::test]
async fn confirming_a_status_change_applies_it() {
    let h = Harness::new();
    h.connect("u1", dnd_settings(true), online("u1")).await;
    let context = serde_json::json!({
        "value": true,
        "change_to": "dnd",
        "pretty_change_to": "Do Not Disturb",
        "hasEvent": false,
    });

    let attachment = h
        .engine
        .confirm_status_change("u1", context.as_object().unwrap())
        .await
        .unwrap();

    assert_eq!(attachment.text, "The status has been changed to Do Not Disturb.");
    assert_eq!(h.platform.status_updates(), vec![("u1".to_string(), PresenceStatus::Dnd)]);
    assert_eq!(h.user("u1").await.last_status, Some(PresenceStatus::Online));
}

#[tokio::test]
async fn event_responses_reach_the_remote() {
    let h = Harness::new();
    h.connect("u1", Settings::default(), online("u1")).await;

    let line = h.engine.respond_to_event("u1", "ev-1", "Yes").await.unwrap();

    assert_eq!(line, "You have accepted this event");
    assert_eq!(h.remote.responses(), vec![("accept".to_string(), "ev-1".to_string())]);
    assert!(h.engine.respond_to_event("u1", "ev-1", "Not responded").await.is_err());
}
