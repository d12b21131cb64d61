//! Chat session state machine.
//!
//! Tracks the active conversation (peer group or AI group), the in-memory
//! message list, the de-duplication ledger, and the AI-group lifecycle:
//! create-if-needed, force-replace, and auto-recreate after a deletion.
//!
//! The message list is ordered most-recent-first; callers needing
//! chronological order reverse at the presentation boundary. The
//! de-duplication ledger is scoped to the currently loaded conversation and
//! is shared between the live-delivery path and the history-reload path, so
//! a message delivered live immediately before a history fetch completes is
//! never shown twice.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use careline_proto::action::Action;
use careline_proto::envelope::Inbound;
use careline_proto::group::{AI_MEMBER, Group, GroupId};
use careline_proto::message::{MessageIdentity, WireMessage};
use careline_proto::payload::{
    CreateGroupPayload, DeleteGroupPayload, ErrorPayload, GetGroupsPayload, GetMessagesPayload,
    GroupDeleted, GroupList, GroupMembershipPayload, MessagesPage,
};

use crate::config::SessionConfig;
use crate::connection::{ConnectionManager, ConnectionState, Subscription};
use crate::notify::{NoticeKind, Notifier};
use crate::store::AiGroupPointerStore;
use crate::transport::Dialer;

use super::encode_payload;

/// Server error text marking a duplicate-group race as benign.
const BENIGN_DUPLICATE_GROUP: &str = "group with these members already exists";

/// Which conversation is currently open.
///
/// Only [`ChatSession::switch_to_group`] may set an active group; this is
/// the single source of truth for "which conversation is open".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActiveConversation {
    /// No conversation is open.
    #[default]
    None,
    /// A peer group is open.
    Peer(GroupId),
    /// The AI group is open.
    Ai(GroupId),
}

impl ActiveConversation {
    /// The open group's id, if any.
    #[must_use]
    pub const fn group_id(&self) -> Option<&GroupId> {
        match self {
            Self::None => None,
            Self::Peer(id) | Self::Ai(id) => Some(id),
        }
    }

    /// `true` when the AI conversation is open.
    #[must_use]
    pub const fn is_ai(&self) -> bool {
        matches!(self, Self::Ai(_))
    }
}

/// The authenticated user this session acts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    /// The user's identity.
    pub user_id: String,
    /// Optional display name, used when naming the AI group.
    pub display_name: Option<String>,
}

/// A transient user-facing notice (auto-cleared after the configured TTL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity of the notice.
    pub kind: NoticeKind,
    /// The notice text.
    pub text: String,
}

/// Events emitted by the chat session for UI consumption.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// A live message was accepted into the list.
    MessageReceived(WireMessage),
    /// The message list was replaced by a history page.
    HistoryReplaced {
        /// The conversation the page belongs to.
        group_id: GroupId,
        /// Number of messages in the page.
        count: usize,
    },
    /// A group was appended to the group list.
    GroupAdded(Group),
    /// A group was removed from the group list.
    GroupRemoved(GroupId),
    /// The group list was replaced wholesale.
    GroupsReplaced {
        /// Number of groups in the new list.
        count: usize,
    },
    /// The active conversation changed.
    ActiveChanged(ActiveConversation),
    /// The transient notice changed (set or cleared).
    NoticeChanged(Option<Notice>),
    /// The server reported a non-benign error.
    HardError(String),
}

#[derive(Default)]
struct ChatState {
    active: ActiveConversation,
    ai_creation_in_flight: bool,
    current_ai_group: Option<GroupId>,
    groups: Vec<Group>,
    /// Most-recent-first.
    messages: Vec<WireMessage>,
    /// Identities already surfaced for the loaded conversation.
    processed: HashSet<MessageIdentity>,
    notice: Option<Notice>,
    notice_generation: u64,
    last_error: Option<String>,
    user: Option<SessionUser>,
}

/// The chat feature session.
///
/// Owns its state exclusively; the UI reads snapshots and consumes
/// [`ChatEvent`]s. Dropping the session releases its fan-out subscription.
pub struct ChatSession<D: Dialer, S: AiGroupPointerStore, N: Notifier> {
    inner: Arc<ChatInner<D, S, N>>,
    _subscription: Subscription,
}

struct ChatInner<D: Dialer, S: AiGroupPointerStore, N: Notifier> {
    conn: ConnectionManager<D>,
    store: S,
    notifier: N,
    config: SessionConfig,
    state: Mutex<ChatState>,
    event_tx: mpsc::Sender<ChatEvent>,
}

impl<D: Dialer, S: AiGroupPointerStore, N: Notifier> ChatSession<D, S, N> {
    /// Creates a chat session on the given connection.
    ///
    /// Restores the persisted AI-group pointer and registers the session's
    /// subscriber. Returns the session and the event receiver the UI layer
    /// should consume.
    pub fn new(
        conn: ConnectionManager<D>,
        store: S,
        notifier: N,
        config: SessionConfig,
    ) -> (Self, mpsc::Receiver<ChatEvent>) {
        let (event_tx, event_rx) = mpsc::channel(config.event_buffer);

        let mut state = ChatState::default();
        match store.get() {
            Ok(Some(id)) => state.current_ai_group = Some(GroupId::new(id)),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "failed to read AI group pointer"),
        }

        let inner = Arc::new(ChatInner {
            conn,
            store,
            notifier,
            config,
            state: Mutex::new(state),
            event_tx,
        });
        let reducer = Arc::clone(&inner);
        let subscription = inner
            .conn
            .subscribe(move |inbound| ChatInner::reduce(&reducer, inbound));

        (
            Self {
                inner,
                _subscription: subscription,
            },
            event_rx,
        )
    }

    /// Records the user this session acts for.
    pub fn set_user(&self, user_id: &str, display_name: Option<&str>) {
        self.inner.state.lock().user = Some(SessionUser {
            user_id: user_id.to_string(),
            display_name: display_name.map(ToString::to_string),
        });
    }

    /// Opens a conversation: hard-resets history and the dedup ledger,
    /// updates the persisted AI pointer, joins the group, and fetches
    /// page 0 of its history. Requires an open connection.
    pub fn switch_to_group(&self, group: &Group) {
        self.inner.switch_to_group(group);
    }

    /// Ensures an AI group exists for `user_id`.
    ///
    /// No-op when one is already current or creation is in flight, unless
    /// `force` — which abandons the existing pointer (in memory and in the
    /// store) and requests a fresh group. Always requires an open
    /// connection. The created group's members are exactly the caller and
    /// the AI sentinel.
    pub fn create_ai_group_if_needed(&self, user_id: &str, display_name: Option<&str>, force: bool) {
        self.inner.create_ai_group(user_id, display_name, force);
    }

    /// Sends a chat message into the active conversation with a fresh
    /// provisional identity. Dropped (with a log) when no conversation is
    /// open.
    pub fn send_message(&self, content: &str) {
        self.inner.send_message(content);
    }

    /// Requests creation of a peer group.
    pub fn create_group(&self, group_name: &str, members: Vec<String>) {
        self.inner.create_group(group_name, members);
    }

    /// Requests deletion of a group. Refused client-side, without a network
    /// round-trip, unless both ids are non-empty.
    pub fn delete_group(&self, group_id: &str, user_id: &str) {
        self.inner.delete_group(group_id, user_id);
    }

    /// Leaves a group.
    pub fn leave_group(&self, group_id: &str) {
        self.inner.leave_group(group_id);
    }

    /// Requests the user's group list.
    pub fn request_groups(&self) {
        self.inner.request_groups();
    }

    /// Snapshot of the message list, most recent first.
    #[must_use]
    pub fn messages(&self) -> Vec<WireMessage> {
        self.inner.state.lock().messages.clone()
    }

    /// Snapshot of the group list.
    #[must_use]
    pub fn groups(&self) -> Vec<Group> {
        self.inner.state.lock().groups.clone()
    }

    /// The currently open conversation.
    #[must_use]
    pub fn active(&self) -> ActiveConversation {
        self.inner.state.lock().active.clone()
    }

    /// The current AI group id, if one exists.
    #[must_use]
    pub fn current_ai_group(&self) -> Option<GroupId> {
        self.inner.state.lock().current_ai_group.clone()
    }

    /// Whether an AI-group creation request is in flight.
    #[must_use]
    pub fn ai_creation_in_flight(&self) -> bool {
        self.inner.state.lock().ai_creation_in_flight
    }

    /// The transient notice, if one is showing.
    #[must_use]
    pub fn notice(&self) -> Option<Notice> {
        self.inner.state.lock().notice.clone()
    }

    /// The last hard error the server reported.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.inner.state.lock().last_error.clone()
    }

    /// The connection this session runs on.
    #[must_use]
    pub fn connection(&self) -> &ConnectionManager<D> {
        &self.inner.conn
    }
}

impl<D: Dialer, S: AiGroupPointerStore, N: Notifier> ChatInner<D, S, N> {
    fn reduce(inner: &Arc<Self>, inbound: &Inbound) {
        match inbound.action() {
            Action::MessageReceived => inner.on_message_received(inbound.data()),
            Action::Messages => inner.on_messages(inbound.data()),
            Action::GroupCreated => inner.on_group_created(inbound.data()),
            Action::GroupDeleted => Self::on_group_deleted(inner, inbound.data()),
            Action::Groups => inner.on_groups(inbound.data()),
            Action::Error => Self::on_error(inner, inbound.data()),
            Action::Unknown(name) => {
                tracing::debug!(action = %name, "unrecognized action ignored");
            }
            _ => {} // other features' actions
        }
    }

    fn switch_to_group(&self, group: &Group) {
        if self.conn.state() != ConnectionState::Connected {
            tracing::warn!(group = %group.group_id, "cannot switch conversations while disconnected");
            return;
        }

        let is_ai = group.is_ai_group();
        let active = if is_ai {
            ActiveConversation::Ai(group.group_id.clone())
        } else {
            ActiveConversation::Peer(group.group_id.clone())
        };

        let user_id = {
            let mut state = self.state.lock();
            // Hard reset, not a merge: history and the dedup ledger restart
            // per conversation.
            state.messages.clear();
            state.processed.clear();
            state.active = active.clone();
            if is_ai {
                state.current_ai_group = Some(group.group_id.clone());
                if let Err(e) = self.store.set(group.group_id.as_str()) {
                    tracing::warn!(error = %e, "failed to persist AI group pointer");
                }
            } else {
                state.current_ai_group = None;
                if let Err(e) = self.store.clear() {
                    tracing::warn!(error = %e, "failed to clear AI group pointer");
                }
            }
            state.user.as_ref().map(|u| u.user_id.clone())
        };

        self.conn.send(
            Action::JoinGroup,
            encode_payload(&GroupMembershipPayload {
                group_id: group.group_id.clone(),
                user_id,
            }),
        );
        self.conn.send(
            Action::GetMessages,
            encode_payload(&GetMessagesPayload {
                group_id: group.group_id.clone(),
                page: 0,
                page_size: self.config.page_size,
            }),
        );

        let _ = self.event_tx.try_send(ChatEvent::ActiveChanged(active));
        tracing::info!(group = %group.group_id, ai = is_ai, "switched conversation");
    }

    fn create_ai_group(&self, user_id: &str, display_name: Option<&str>, force: bool) {
        if self.conn.state() != ConnectionState::Connected {
            tracing::debug!("AI group creation requires an open connection");
            return;
        }

        {
            let mut state = self.state.lock();
            state.user = Some(SessionUser {
                user_id: user_id.to_string(),
                display_name: display_name.map(ToString::to_string),
            });
            if !force && (state.current_ai_group.is_some() || state.ai_creation_in_flight) {
                tracing::debug!("AI group already present or creation in flight");
                return;
            }
            if force && let Some(existing) = state.current_ai_group.take() {
                tracing::info!(group = %existing, "abandoning existing AI group");
                if let Err(e) = self.store.clear() {
                    tracing::warn!(error = %e, "failed to clear AI group pointer");
                }
            }
            state.ai_creation_in_flight = true;
        }

        let group_name = display_name.map_or_else(
            || "AI assistant".to_string(),
            |name| format!("{name} & AI assistant"),
        );
        self.conn.send(
            Action::CreateGroup,
            encode_payload(&CreateGroupPayload {
                group_name,
                members: vec![user_id.to_string(), AI_MEMBER.to_string()],
                user_id: user_id.to_string(),
            }),
        );
    }

    fn send_message(&self, content: &str) {
        let (group_id, sender) = {
            let state = self.state.lock();
            let Some(group_id) = state.active.group_id().cloned() else {
                tracing::warn!("no active conversation, message not sent");
                return;
            };
            let sender = state
                .user
                .as_ref()
                .map(|u| u.user_id.clone())
                .unwrap_or_default();
            (group_id, sender)
        };
        let message = WireMessage::outgoing(group_id, sender, content);
        self.conn
            .send(Action::SendMessage, encode_payload(&message));
    }

    fn create_group(&self, group_name: &str, members: Vec<String>) {
        let user_id = self
            .state
            .lock()
            .user
            .as_ref()
            .map(|u| u.user_id.clone())
            .unwrap_or_default();
        self.conn.send(
            Action::CreateGroup,
            encode_payload(&CreateGroupPayload {
                group_name: group_name.to_string(),
                members,
                user_id,
            }),
        );
    }

    fn delete_group(&self, group_id: &str, user_id: &str) {
        if group_id.is_empty() || user_id.is_empty() {
            tracing::warn!("delete_group requires both a group and a user id");
            return;
        }
        self.conn.send(
            Action::DeleteGroup,
            encode_payload(&DeleteGroupPayload {
                group_id: GroupId::new(group_id),
                user_id: user_id.to_string(),
            }),
        );
    }

    fn leave_group(&self, group_id: &str) {
        let user_id = self
            .state
            .lock()
            .user
            .as_ref()
            .map(|u| u.user_id.clone());
        self.conn.send(
            Action::LeaveGroup,
            encode_payload(&GroupMembershipPayload {
                group_id: GroupId::new(group_id),
                user_id,
            }),
        );
    }

    fn request_groups(&self) {
        let Some(user) = self.state.lock().user.clone() else {
            tracing::warn!("no user identity known, cannot request groups");
            return;
        };
        self.conn.send(
            Action::GetGroups,
            encode_payload(&GetGroupsPayload {
                user_id: user.user_id,
            }),
        );
    }

    fn on_message_received(&self, data: &Value) {
        let message: WireMessage = match serde_json::from_value(data.clone()) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "malformed message_received payload");
                return;
            }
        };
        let Some(identity) = message.identity() else {
            tracing::warn!("message without any identity dropped");
            return;
        };

        {
            let mut state = self.state.lock();
            if state.processed.contains(&identity) {
                // The transport may redeliver; delivery is idempotent.
                tracing::debug!(id = %identity, "duplicate delivery dropped");
                return;
            }
            if state.processed.len() >= self.config.dedup_capacity {
                state.processed.clear();
            }
            state.processed.insert(identity);

            // Second line of defense: the list itself, matched by either
            // identity field.
            if state
                .messages
                .iter()
                .any(|existing| existing.is_same_message(&message))
            {
                tracing::debug!("message already present in list, insert skipped");
                return;
            }
            state.messages.insert(0, message.clone());
        }

        let _ = self.event_tx.try_send(ChatEvent::MessageReceived(message));
    }

    fn on_messages(&self, data: &Value) {
        let page: MessagesPage = match serde_json::from_value(data.clone()) {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(error = %e, "malformed messages payload");
                return;
            }
        };
        let group_id = page.group_id.clone();
        let count = page.messages.len();

        {
            let mut state = self.state.lock();
            if state.active.group_id() != Some(&group_id) {
                // A page for a conversation we have already left.
                tracing::debug!(group = %group_id, "history page for an inactive conversation ignored");
                return;
            }
            state.processed = page
                .messages
                .iter()
                .filter_map(WireMessage::identity)
                .collect();
            state.messages = page.messages;
        }

        tracing::debug!(group = %group_id, count, "history page loaded");
        let _ = self
            .event_tx
            .try_send(ChatEvent::HistoryReplaced { group_id, count });
    }

    fn on_group_created(&self, data: &Value) {
        let group: Group = match serde_json::from_value(data.clone()) {
            Ok(group) => group,
            Err(e) => {
                tracing::warn!(error = %e, "malformed group_created payload");
                return;
            }
        };

        {
            let mut state = self.state.lock();
            if group.is_ai_group() {
                state.current_ai_group = Some(group.group_id.clone());
                state.ai_creation_in_flight = false;
                if let Err(e) = self.store.set(group.group_id.as_str()) {
                    tracing::warn!(error = %e, "failed to persist AI group pointer");
                }
                tracing::info!(group = %group.group_id, "AI group adopted");
            }
            state.groups.push(group.clone());
        }

        let _ = self.event_tx.try_send(ChatEvent::GroupAdded(group));
    }

    fn on_group_deleted(inner: &Arc<Self>, data: &Value) {
        let payload: GroupDeleted = match serde_json::from_value(data.clone()) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "malformed group_deleted payload");
                return;
            }
        };

        let (removed, was_current_ai, user) = {
            let mut state = inner.state.lock();
            let before = state.groups.len();
            state.groups.retain(|g| g.group_id != payload.group_id);
            let removed = state.groups.len() != before;

            let was_current_ai =
                state.current_ai_group.as_ref() == Some(&payload.group_id);
            if was_current_ai {
                state.current_ai_group = None;
                if let Err(e) = inner.store.clear() {
                    tracing::warn!(error = %e, "failed to clear AI group pointer");
                }
            }
            if state.active.group_id() == Some(&payload.group_id) {
                state.active = ActiveConversation::None;
                let _ = inner
                    .event_tx
                    .try_send(ChatEvent::ActiveChanged(ActiveConversation::None));
            }
            (removed, was_current_ai, state.user.clone())
        };

        if removed {
            let _ = inner
                .event_tx
                .try_send(ChatEvent::GroupRemoved(payload.group_id.clone()));
        }

        if was_current_ai {
            tracing::info!(group = %payload.group_id, "current AI group deleted");
            let Some(user) = user else {
                tracing::debug!("no user identity known, skipping AI group self-heal");
                return;
            };
            let heal = Arc::clone(inner);
            // Debounce against racing the delete acknowledgment.
            tokio::spawn(async move {
                tokio::time::sleep(heal.config.self_heal_delay).await;
                if heal.conn.state() != ConnectionState::Connected {
                    return;
                }
                heal.create_ai_group(&user.user_id, user.display_name.as_deref(), false);
            });
        }
    }

    fn on_groups(&self, data: &Value) {
        let list: GroupList = match serde_json::from_value(data.clone()) {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(error = %e, "malformed groups payload");
                return;
            }
        };
        let count = list.groups.len();
        self.state.lock().groups = list.groups;
        let _ = self
            .event_tx
            .try_send(ChatEvent::GroupsReplaced { count });
    }

    fn on_error(inner: &Arc<Self>, data: &Value) {
        let text = ErrorPayload::from_value(data).message;
        let benign = text.to_lowercase().contains(BENIGN_DUPLICATE_GROUP);

        let mut state = inner.state.lock();
        state.ai_creation_in_flight = false;

        if benign {
            // Server-side idempotency signal, not a failure.
            let notice = Notice {
                kind: NoticeKind::Info,
                text: text.clone(),
            };
            state.notice = Some(notice.clone());
            state.notice_generation += 1;
            let generation = state.notice_generation;
            drop(state);

            inner
                .notifier
                .notify(NoticeKind::Info, "Conversation already exists", &text);
            let _ = inner
                .event_tx
                .try_send(ChatEvent::NoticeChanged(Some(notice)));

            let clear = Arc::clone(inner);
            tokio::spawn(async move {
                tokio::time::sleep(clear.config.notice_ttl).await;
                let mut state = clear.state.lock();
                if state.notice_generation == generation && state.notice.take().is_some() {
                    drop(state);
                    let _ = clear.event_tx.try_send(ChatEvent::NoticeChanged(None));
                }
            });
        } else {
            state.last_error = Some(text.clone());
            drop(state);

            tracing::warn!(error = %text, "server reported error");
            inner.notifier.notify(NoticeKind::Error, "Chat error", &text);
            let _ = inner.event_tx.try_send(ChatEvent::HardError(text));
        }
    }
}
