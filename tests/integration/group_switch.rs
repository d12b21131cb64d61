// Test-specific lint overrides: integration tests use unwrap/expect freely.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_panics_doc,
    clippy::missing_docs_in_private_items
)]

//! Integration tests for conversation switching.
//!
//! Switching is a hard reset: the message list and the dedup ledger are
//! cleared, the target group is joined, and page 0 of its history is
//! fetched. After an A → B → A round trip the ledger holds only the
//! identities from the latest history page for A.

use std::time::Duration;

use serde_json::json;

use careline::config::SessionConfig;
use careline::connection::{ConnectionConfig, ConnectionManager, ConnectionState};
use careline::notify::RecordingNotifier;
use careline::session::chat::{ActiveConversation, ChatSession};
use careline::store::{AiGroupPointerStore, MemoryPointerStore};
use careline::transport::script::{ScriptedDialer, ScriptedServer};
use careline_proto::action::Action;
use careline_proto::group::{AI_MEMBER, Group, GroupId};

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

async fn connected_session() -> (TestSession, ScriptedDialer, MemoryPointerStore) {
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
    let (session, _events) = ChatSession::new(
        conn,
        store.clone(),
        RecordingNotifier::new(),
        SessionConfig::default(),
    );
    session.set_user("user-1", None);
    (session, dialer, store)
}

fn peer_group(id: &str) -> Group {
    Group {
        group_id: GroupId::new(id),
        group_name: format!("peer {id}"),
        members: vec!["user-1".to_string(), "user-2".to_string()],
        created_at: Default::default(),
        updated_at: Default::default(),
    }
}

fn ai_group(id: &str) -> Group {
    Group {
        group_id: GroupId::new(id),
        group_name: "AI assistant".to_string(),
        members: vec!["user-1".to_string(), AI_MEMBER.to_string()],
        created_at: Default::default(),
        updated_at: Default::default(),
    }
}

fn history_page(server: &ScriptedServer, group: &str, ids: &[&str]) {
    let messages: Vec<_> = ids
        .iter()
        .map(|id| {
            json!({
                "messageId": id,
                "groupId": group,
                "senderId": "user-2",
                "content": format!("body of {id}"),
                "messageType": "text"
            })
        })
        .collect();
    server.push_envelope(
        Action::Messages,
        json!({"groupId": group, "page": 0, "messages": messages}),
    );
}

fn live(server: &ScriptedServer, group: &str, id: &str) {
    server.push_envelope(
        Action::MessageReceived,
        json!({
            "messageId": id,
            "groupId": group,
            "senderId": "user-2",
            "content": format!("body of {id}"),
            "messageType": "text"
        }),
    );
}

#[tokio::test]
async fn switching_joins_and_fetches_page_zero() {
    let (session, dialer, _store) = connected_session().await;

    session.switch_to_group(&peer_group("A"));

    let server = dialer.latest_server().unwrap();
    wait_until(move || server.sent().len() == 2).await;
    let envelopes = dialer.latest_server().unwrap().sent_envelopes();
    assert_eq!(envelopes[0].action, Action::JoinGroup);
    assert_eq!(envelopes[1].action, Action::GetMessages);
    assert_eq!(
        envelopes[1].data,
        json!({"groupId": "A", "page": 0, "pageSize": 50})
    );
}

#[tokio::test]
async fn switch_a_b_a_refetches_and_rescopes_the_ledger() {
    let (session, dialer, _store) = connected_session().await;
    let server = dialer.latest_server().unwrap();

    // First visit to A.
    session.switch_to_group(&peer_group("A"));
    history_page(&server, "A", &["a-1", "a-2"]);
    wait_until(|| session.messages().len() == 2).await;

    // Over to B: the list resets immediately, then B's page lands.
    session.switch_to_group(&peer_group("B"));
    assert!(session.messages().is_empty());
    history_page(&server, "B", &["b-1"]);
    wait_until(|| session.messages().len() == 1).await;

    // Back to A with a different page.
    session.switch_to_group(&peer_group("A"));
    history_page(&server, "A", &["a-3"]);
    wait_until(
        || matches!(session.messages().first(), Some(m) if m.message_id.as_deref() == Some("a-3")),
    )
    .await;

    // Three join/fetch pairs went out, two of them for A.
    let envelopes = dialer.latest_server().unwrap().sent_envelopes();
    let fetches: Vec<_> = envelopes
        .iter()
        .filter(|e| e.action == Action::GetMessages)
        .map(|e| e.data["groupId"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(fetches, vec!["A", "B", "A"]);

    // The ledger is scoped to the latest page: a-3 is recognized, the
    // first visit's a-1 is not.
    live(&server, "A", "a-3");
    live(&server, "A", "a-1");
    wait_until(|| session.messages().len() == 2).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    let ids: Vec<_> = session
        .messages()
        .iter()
        .filter_map(|m| m.message_id.clone())
        .collect();
    assert_eq!(ids, vec!["a-1".to_string(), "a-3".to_string()]);
}

#[tokio::test]
async fn late_page_from_the_previous_group_is_discarded() {
    let (session, dialer, _store) = connected_session().await;
    let server = dialer.latest_server().unwrap();

    session.switch_to_group(&peer_group("A"));
    session.switch_to_group(&peer_group("B"));

    // A's fetch answers after the switch to B.
    history_page(&server, "A", &["a-1", "a-2"]);
    history_page(&server, "B", &["b-1"]);

    wait_until(|| session.messages().len() == 1).await;
    assert_eq!(
        session.messages()[0].message_id.as_deref(),
        Some("b-1")
    );
}

#[tokio::test]
async fn switching_updates_the_persisted_ai_pointer() {
    let (session, dialer, store) = connected_session().await;
    let server = dialer.latest_server().unwrap();

    session.switch_to_group(&ai_group("ai-1"));
    assert_eq!(store.get().unwrap(), Some("ai-1".to_string()));
    assert_eq!(
        session.active(),
        ActiveConversation::Ai(GroupId::new("ai-1"))
    );

    session.switch_to_group(&peer_group("A"));
    assert_eq!(store.get().unwrap(), None);
    assert_eq!(
        session.active(),
        ActiveConversation::Peer(GroupId::new("A"))
    );

    // Keep the pump honest: both switches produced join/fetch pairs.
    wait_until(move || server.sent().len() == 4).await;
}

#[tokio::test]
async fn switching_is_refused_while_disconnected() {
    let (session, dialer, _store) = connected_session().await;
    session.connection().disconnect();
    dialer.latest_server().unwrap().take_sent();

    session.switch_to_group(&peer_group("A"));

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(dialer.latest_server().unwrap().sent().is_empty());
    assert_eq!(session.active(), ActiveConversation::None);
}
