// Test-specific lint overrides: integration tests use unwrap/expect freely.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_panics_doc,
    clippy::missing_docs_in_private_items
)]

//! Integration tests for subscriber fan-out.
//!
//! Every inbound frame reaches every registered subscriber, synchronously
//! and in registration order. One subscriber's panic is isolated and
//! reported; unsubscription happens when the guard drops, on every exit
//! path; malformed frames pass through raw instead of being dropped.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Value, json};

use careline::config::SessionConfig;
use careline::connection::{ConnectionConfig, ConnectionManager, ConnectionState};
use careline::notify::RecordingNotifier;
use careline::session::chat::ChatSession;
use careline::store::MemoryPointerStore;
use careline::transport::script::ScriptedDialer;
use careline_proto::action::Action;
use careline_proto::envelope::Inbound;

async fn wait_until(predicate: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(predicate(), "condition not met within timeout");
}

async fn connected_manager() -> (ConnectionManager<ScriptedDialer>, ScriptedDialer) {
    let dialer = ScriptedDialer::new();
    let manager = ConnectionManager::with_config(
        dialer.clone(),
        ConnectionConfig {
            base_delay: Duration::from_millis(1),
            max_attempts: 5,
        },
    );
    manager.connect();
    {
        let manager = manager.clone();
        wait_until(move || manager.state() == ConnectionState::Connected).await;
    }
    (manager, dialer)
}

#[tokio::test]
async fn frames_reach_all_subscribers_in_registration_order() {
    let (manager, dialer) = connected_manager().await;
    let seen: Arc<Mutex<Vec<(u32, Action)>>> = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    let _first = manager.subscribe(move |inbound| sink.lock().push((1, inbound.action())));
    let sink = Arc::clone(&seen);
    let _second = manager.subscribe(move |inbound| sink.lock().push((2, inbound.action())));
    let sink = Arc::clone(&seen);
    let _third = manager.subscribe(move |inbound| sink.lock().push((3, inbound.action())));

    dialer
        .latest_server()
        .unwrap()
        .push_envelope(Action::GroupCreated, json!({}));
    dialer
        .latest_server()
        .unwrap()
        .push_envelope(Action::Error, json!({"message": "x"}));

    {
        let seen = Arc::clone(&seen);
        wait_until(move || seen.lock().len() == 6).await;
    }
    let seen = seen.lock();
    assert_eq!(
        *seen,
        vec![
            (1, Action::GroupCreated),
            (2, Action::GroupCreated),
            (3, Action::GroupCreated),
            (1, Action::Error),
            (2, Action::Error),
            (3, Action::Error),
        ]
    );
}

#[tokio::test]
async fn panicking_subscriber_is_isolated_and_reported() {
    let (manager, dialer) = connected_manager().await;
    let seen: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    let _first = manager.subscribe(move |_| sink.lock().push(1));
    let _second = manager.subscribe(move |_| panic!("defective reducer"));
    let sink = Arc::clone(&seen);
    let _third = manager.subscribe(move |_| sink.lock().push(3));

    dialer
        .latest_server()
        .unwrap()
        .push_envelope(Action::GetGroups, Value::Null);

    {
        let seen = Arc::clone(&seen);
        wait_until(move || seen.lock().len() == 2).await;
    }
    assert_eq!(*seen.lock(), vec![1, 3]);

    let report = manager.last_fanout_report().unwrap();
    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.delivered_count(), 2);
    assert_eq!(report.panicked_count(), 1);
    assert!(!report.outcomes[1].delivered);

    // The faulty subscriber stays isolated on later frames too.
    dialer
        .latest_server()
        .unwrap()
        .push_envelope(Action::GetGroups, Value::Null);
    {
        let seen = Arc::clone(&seen);
        wait_until(move || seen.lock().len() == 4).await;
    }
}

#[tokio::test]
async fn dropping_the_guard_unsubscribes_on_scope_exit() {
    let (manager, dialer) = connected_manager().await;
    let seen: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));

    {
        let sink = Arc::clone(&seen);
        let _scoped = manager.subscribe(move |_| sink.lock().push(1));
        dialer
            .latest_server()
            .unwrap()
            .push_envelope(Action::GetGroups, Value::Null);
        let seen = Arc::clone(&seen);
        wait_until(move || seen.lock().len() == 1).await;
    } // guard dropped here

    dialer
        .latest_server()
        .unwrap()
        .push_envelope(Action::GetGroups, Value::Null);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(seen.lock().len(), 1);
    assert_eq!(manager.last_fanout_report().unwrap().outcomes.len(), 0);
}

#[tokio::test]
async fn dropping_a_session_releases_its_subscription() {
    let (manager, dialer) = connected_manager().await;

    {
        let (_session, _events) = ChatSession::new(
            manager.clone(),
            MemoryPointerStore::new(),
            RecordingNotifier::new(),
            SessionConfig::default(),
        );
        dialer
            .latest_server()
            .unwrap()
            .push_envelope(Action::GetGroups, Value::Null);
        let manager = manager.clone();
        wait_until(move || {
            manager
                .last_fanout_report()
                .is_some_and(|report| report.outcomes.len() == 1)
        })
        .await;
    } // session dropped here

    dialer
        .latest_server()
        .unwrap()
        .push_envelope(Action::GetGroups, Value::Null);
    {
        let manager = manager.clone();
        wait_until(move || {
            manager
                .last_fanout_report()
                .is_some_and(|report| report.outcomes.is_empty())
        })
        .await;
    }
}

#[tokio::test]
async fn raw_frames_pass_through_with_action_fallback() {
    let (manager, dialer) = connected_manager().await;
    let seen: Arc<Mutex<Vec<Inbound>>> = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    let _sub = manager.subscribe(move |inbound| sink.lock().push(inbound.clone()));

    // A legacy frame carrying just the action name, and outright garbage.
    dialer.latest_server().unwrap().push_text("\"group_deleted\"");
    dialer.latest_server().unwrap().push_text("%%% not json");

    {
        let seen = Arc::clone(&seen);
        wait_until(move || seen.lock().len() == 2).await;
    }
    let seen = seen.lock();
    assert_eq!(seen[0].action(), Action::GroupDeleted);
    assert_eq!(seen[0], Inbound::Raw("\"group_deleted\"".to_string()));
    assert!(matches!(seen[1].action(), Action::Unknown(_)));
}
