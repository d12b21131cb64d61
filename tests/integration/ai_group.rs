// Test-specific lint overrides: integration tests use unwrap/expect freely.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_panics_doc,
    clippy::missing_docs_in_private_items
)]

//! Integration tests for the AI-group lifecycle.
//!
//! Exactly zero or one group is the current AI group at any time, the
//! persisted pointer always mirrors the in-memory one, deletion self-heals
//! with a fresh non-forced creation, and the server's duplicate-group
//! error is treated as a benign idempotency signal.

use std::time::Duration;

use serde_json::json;

use careline::config::SessionConfig;
use careline::connection::{ConnectionConfig, ConnectionManager, ConnectionState};
use careline::notify::{NoticeKind, RecordingNotifier};
use careline::session::chat::ChatSession;
use careline::store::{AiGroupPointerStore, MemoryPointerStore};
use careline::transport::script::ScriptedDialer;
use careline_proto::action::Action;
use careline_proto::group::{AI_MEMBER, GroupId};

type TestSession = ChatSession<ScriptedDialer, MemoryPointerStore, RecordingNotifier>;

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

struct Fixture {
    session: TestSession,
    dialer: ScriptedDialer,
    store: MemoryPointerStore,
    notifier: RecordingNotifier,
}

async fn connected_fixture() -> Fixture {
    let dialer = ScriptedDialer::new();
    let conn = ConnectionManager::with_config(
        dialer.clone(),
        ConnectionConfig {
            base_delay: Duration::from_millis(1),
            max_attempts: 5,
        },
    );
    conn.connect();
    {
        let conn = conn.clone();
        wait_until(move || conn.state() == ConnectionState::Connected).await;
    }
    let store = MemoryPointerStore::new();
    let notifier = RecordingNotifier::new();
    let (session, _events) = ChatSession::new(
        conn,
        store.clone(),
        notifier.clone(),
        SessionConfig {
            self_heal_delay: Duration::from_millis(5),
            notice_ttl: Duration::from_millis(50),
            ..SessionConfig::default()
        },
    );
    session.set_user("user-1", Some("Alex"));
    Fixture {
        session,
        dialer,
        store,
        notifier,
    }
}

fn ai_group_json(id: &str) -> serde_json::Value {
    json!({
        "groupId": id,
        "groupName": "Alex & AI assistant",
        "members": ["user-1", AI_MEMBER]
    })
}

/// The pointer store always mirrors the in-memory pointer.
fn assert_coherent(fixture: &Fixture) {
    let in_memory = fixture
        .session
        .current_ai_group()
        .map(|id| id.as_str().to_string());
    assert_eq!(fixture.store.get().unwrap(), in_memory);
}

#[tokio::test]
async fn lifecycle_keeps_at_most_one_current_ai_group() {
    let fixture = connected_fixture().await;
    let session = &fixture.session;

    // Create, adopt.
    session.create_ai_group_if_needed("user-1", Some("Alex"), false);
    assert_coherent(&fixture);
    fixture
        .dialer
        .latest_server()
        .unwrap()
        .push_envelope(Action::GroupCreated, ai_group_json("ai-1"));
    wait_until(|| session.current_ai_group() == Some(GroupId::new("ai-1"))).await;
    assert_coherent(&fixture);

    // Force-replace, adopt the successor.
    session.create_ai_group_if_needed("user-1", Some("Alex"), true);
    assert_eq!(session.current_ai_group(), None);
    assert_coherent(&fixture);
    fixture
        .dialer
        .latest_server()
        .unwrap()
        .push_envelope(Action::GroupCreated, ai_group_json("ai-2"));
    wait_until(|| session.current_ai_group() == Some(GroupId::new("ai-2"))).await;
    assert_coherent(&fixture);

    // Delete the successor; the session self-heals into a third group.
    fixture
        .dialer
        .latest_server()
        .unwrap()
        .push_envelope(Action::GroupDeleted, json!({"groupId": "ai-2"}));
    wait_until(|| session.current_ai_group().is_none()).await;
    assert_coherent(&fixture);
    fixture
        .dialer
        .latest_server()
        .unwrap()
        .push_envelope(Action::GroupCreated, ai_group_json("ai-3"));
    wait_until(|| session.current_ai_group() == Some(GroupId::new("ai-3"))).await;
    assert_coherent(&fixture);
}

#[tokio::test]
async fn deletion_triggers_a_single_non_forced_recreation() {
    let fixture = connected_fixture().await;
    let session = &fixture.session;

    fixture
        .dialer
        .latest_server()
        .unwrap()
        .push_envelope(Action::GroupCreated, ai_group_json("ai-1"));
    wait_until(|| session.current_ai_group().is_some()).await;
    fixture.dialer.latest_server().unwrap().take_sent();

    fixture
        .dialer
        .latest_server()
        .unwrap()
        .push_envelope(Action::GroupDeleted, json!({"groupId": "ai-1"}));

    // The debounced self-heal issues exactly one create_group request.
    let server = fixture.dialer.latest_server().unwrap();
    wait_until(move || !server.sent_envelopes().is_empty()).await;
    tokio::time::sleep(Duration::from_millis(40)).await;
    let envelopes = fixture.dialer.latest_server().unwrap().sent_envelopes();
    let creates: Vec<_> = envelopes
        .iter()
        .filter(|e| e.action == Action::CreateGroup)
        .collect();
    assert_eq!(creates.len(), 1);
    assert_eq!(creates[0].data["members"], json!(["user-1", AI_MEMBER]));
    assert!(fixture.session.ai_creation_in_flight());
}

#[tokio::test]
async fn no_self_heal_while_disconnected() {
    // A long debounce leaves room to drop the connection before it fires.
    let dialer = ScriptedDialer::new();
    let conn = ConnectionManager::with_config(
        dialer.clone(),
        ConnectionConfig {
            base_delay: Duration::from_millis(1),
            max_attempts: 5,
        },
    );
    conn.connect();
    {
        let conn = conn.clone();
        wait_until(move || conn.state() == ConnectionState::Connected).await;
    }
    let (session, _events) = ChatSession::new(
        conn,
        MemoryPointerStore::new(),
        RecordingNotifier::new(),
        SessionConfig {
            self_heal_delay: Duration::from_millis(100),
            ..SessionConfig::default()
        },
    );
    session.set_user("user-1", Some("Alex"));
    let session = &session;
    let fixture_dialer = dialer;

    fixture_dialer
        .latest_server()
        .unwrap()
        .push_envelope(Action::GroupCreated, ai_group_json("ai-1"));
    wait_until(|| session.current_ai_group().is_some()).await;

    // The deletion is processed, then the connection drops before the
    // debounce expires.
    fixture_dialer
        .latest_server()
        .unwrap()
        .push_envelope(Action::GroupDeleted, json!({"groupId": "ai-1"}));
    wait_until(|| session.current_ai_group().is_none()).await;
    session.connection().disconnect();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!session.ai_creation_in_flight());
    let envelopes = fixture_dialer.latest_server().unwrap().sent_envelopes();
    assert!(envelopes.iter().all(|e| e.action != Action::CreateGroup));
}

#[tokio::test]
async fn duplicate_group_error_is_benign() {
    let fixture = connected_fixture().await;
    let session = &fixture.session;

    session.create_ai_group_if_needed("user-1", None, false);
    assert!(session.ai_creation_in_flight());

    fixture.dialer.latest_server().unwrap().push_envelope(
        Action::Error,
        json!({"message": "a GROUP with these members ALREADY exists"}),
    );

    wait_until(|| session.notice().is_some()).await;
    assert_eq!(session.notice().unwrap().kind, NoticeKind::Info);
    assert!(!session.ai_creation_in_flight());
    assert_eq!(session.last_error(), None);
    assert_eq!(fixture.notifier.entries()[0].0, NoticeKind::Info);

    // Transient: gone after the TTL.
    wait_until(|| session.notice().is_none()).await;
}

#[tokio::test]
async fn unrelated_error_is_hard_and_clears_in_flight() {
    let fixture = connected_fixture().await;
    let session = &fixture.session;

    session.create_ai_group_if_needed("user-1", None, false);
    fixture
        .dialer
        .latest_server()
        .unwrap()
        .push_envelope(Action::Error, json!({"message": "internal failure"}));

    wait_until(|| session.last_error().is_some()).await;
    assert!(!session.ai_creation_in_flight());
    assert_eq!(fixture.notifier.entries()[0].0, NoticeKind::Error);
    assert!(session.notice().is_none());
}

#[tokio::test]
async fn pointer_survives_a_session_restart() {
    let fixture = connected_fixture().await;
    let session = &fixture.session;

    fixture
        .dialer
        .latest_server()
        .unwrap()
        .push_envelope(Action::GroupCreated, ai_group_json("ai-1"));
    wait_until(|| session.current_ai_group().is_some()).await;

    // A new session over the same store sees the pointer immediately.
    let dialer = ScriptedDialer::new();
    let conn = ConnectionManager::new(dialer);
    let (restarted, _events) = ChatSession::new(
        conn,
        fixture.store.clone(),
        RecordingNotifier::new(),
        SessionConfig::default(),
    );
    assert_eq!(restarted.current_ai_group(), Some(GroupId::new("ai-1")));
}

#[tokio::test]
async fn create_is_refused_while_disconnected() {
    let fixture = connected_fixture().await;
    let session = &fixture.session;
    session.connection().disconnect();

    session.create_ai_group_if_needed("user-1", None, false);

    assert!(!session.ai_creation_in_flight());
    tokio::time::sleep(Duration::from_millis(20)).await;
    let envelopes = fixture.dialer.latest_server().unwrap().sent_envelopes();
    assert!(envelopes.iter().all(|e| e.action != Action::CreateGroup));
}
