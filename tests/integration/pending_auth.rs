// Test-specific lint overrides: integration tests use unwrap/expect freely.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_panics_doc,
    clippy::missing_docs_in_private_items
)]

//! Integration tests for the pending-authentication intent.
//!
//! `authenticate()` before `connect()` records the identity; it is sent
//! exactly once, immediately after the first successful open, and never
//! again on later opens unless `authenticate()` is called again.

use std::time::Duration;

use careline::connection::{ConnectionConfig, ConnectionManager, ConnectionState};
use careline::transport::ABNORMAL_CLOSURE;
use careline::transport::script::ScriptedDialer;
use careline_proto::action::Action;

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

fn quick_manager(dialer: &ScriptedDialer) -> ConnectionManager<ScriptedDialer> {
    ConnectionManager::with_config(
        dialer.clone(),
        ConnectionConfig {
            base_delay: Duration::from_millis(1),
            max_attempts: 5,
        },
    )
}

fn auth_frames(dialer: &ScriptedDialer, server_index: usize) -> usize {
    dialer
        .server(server_index)
        .map(|server| {
            server
                .sent_envelopes()
                .iter()
                .filter(|e| e.action == Action::Authenticate)
                .count()
        })
        .unwrap_or(0)
}

#[tokio::test]
async fn auth_before_connect_is_sent_once_on_first_open() {
    let dialer = ScriptedDialer::new();
    let manager = quick_manager(&dialer);

    manager.authenticate("user-1");
    manager.connect();

    {
        let dialer = dialer.clone();
        wait_until(move || auth_frames(&dialer, 0) == 1).await;
    }
    let envelope = &dialer.server(0).unwrap().sent_envelopes()[0];
    assert_eq!(envelope.action, Action::Authenticate);
    assert_eq!(envelope.data["userId"], "user-1");
}

#[tokio::test]
async fn auth_is_not_resent_on_a_reopen() {
    let dialer = ScriptedDialer::new();
    let manager = quick_manager(&dialer);

    manager.authenticate("user-1");
    manager.connect();
    {
        let dialer = dialer.clone();
        wait_until(move || auth_frames(&dialer, 0) == 1).await;
    }

    // Kill the link; the manager reconnects on its own.
    dialer.latest_server().unwrap().push_close(ABNORMAL_CLOSURE);
    {
        let dialer = dialer.clone();
        wait_until(move || dialer.dial_count() == 2).await;
    }
    {
        let manager = manager.clone();
        wait_until(move || manager.state() == ConnectionState::Connected).await;
    }

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(auth_frames(&dialer, 0), 1);
    assert_eq!(auth_frames(&dialer, 1), 0);
}

#[tokio::test]
async fn auth_again_is_honored_on_the_next_open() {
    let dialer = ScriptedDialer::new();
    let manager = quick_manager(&dialer);

    manager.authenticate("user-1");
    manager.connect();
    {
        let dialer = dialer.clone();
        wait_until(move || auth_frames(&dialer, 0) == 1).await;
    }

    manager.disconnect();
    manager.authenticate("user-1");
    manager.connect();

    {
        let dialer = dialer.clone();
        wait_until(move || auth_frames(&dialer, 1) == 1).await;
    }
}

#[tokio::test]
async fn auth_while_connected_sends_without_recording() {
    let dialer = ScriptedDialer::new();
    let manager = quick_manager(&dialer);

    manager.connect();
    {
        let manager = manager.clone();
        wait_until(move || manager.state() == ConnectionState::Connected).await;
    }

    manager.authenticate("user-1");
    {
        let dialer = dialer.clone();
        wait_until(move || auth_frames(&dialer, 0) == 1).await;
    }

    // The immediate send consumed the request: a reopen stays silent.
    dialer.latest_server().unwrap().push_close(ABNORMAL_CLOSURE);
    {
        let manager = manager.clone();
        wait_until(move || manager.state() == ConnectionState::Connected).await;
    }
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(auth_frames(&dialer, 1), 0);
}

#[tokio::test]
async fn latest_identity_wins_before_open() {
    let dialer = ScriptedDialer::new();
    let manager = quick_manager(&dialer);

    manager.authenticate("user-1");
    manager.authenticate("user-2");
    manager.connect();

    {
        let dialer = dialer.clone();
        wait_until(move || auth_frames(&dialer, 0) == 1).await;
    }
    let envelope = &dialer.server(0).unwrap().sent_envelopes()[0];
    assert_eq!(envelope.data["userId"], "user-2");
}
