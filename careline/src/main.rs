//! Careline — realtime messaging session client.
//!
//! Line-mode client: connects to the session server, authenticates, keeps
//! the AI conversation alive, and turns stdin lines into chat messages.
//! Configuration via CLI flags, environment variables, or config file
//! (`~/.config/careline/config.toml`).
//!
//! ```bash
//! cargo run --bin careline -- --endpoint ws://127.0.0.1:9000/session \
//!     --user-id alice --display-name Alice
//!
//! # Or via environment variables
//! CARELINE_ENDPOINT=ws://127.0.0.1:9000/session CARELINE_USER_ID=alice cargo run
//! ```

use std::io;
use std::path::Path;
use std::time::Duration;

use clap::Parser;
use tokio::io::AsyncBufReadExt;
use tracing_appender::non_blocking::WorkerGuard;

use careline::config::{CliArgs, ClientConfig};
use careline::connection::{ConnectionManager, ConnectionState};
use careline::notify::{NoticeKind, Notifier};
use careline::session::appointment::AppointmentSession;
use careline::session::chat::{ChatEvent, ChatSession};
use careline::session::room::RoomSession;
use careline::store::FilePointerStore;
use careline::transport::ws::WsDialer;

/// Notifier that prints to the terminal.
#[derive(Debug, Clone, Copy, Default)]
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, kind: NoticeKind, title: &str, detail: &str) {
        if detail.is_empty() {
            println!("[{kind}] {title}");
        } else {
            println!("[{kind}] {title}: {detail}");
        }
    }
}

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = CliArgs::parse();

    // Load and resolve configuration (CLI args > config file > defaults).
    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::default()
        }
    };

    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());
    tracing::info!("careline starting");

    let (Some(endpoint), Some(user_id)) = (config.endpoint.clone(), config.user_id.clone()) else {
        eprintln!("An endpoint and a user id are required (--endpoint, --user-id).");
        return Ok(());
    };

    let dialer = match WsDialer::with_timeout(&endpoint, config.connect_timeout) {
        Ok(dialer) => dialer,
        Err(e) => {
            eprintln!("Invalid endpoint: {e}");
            return Ok(());
        }
    };

    let conn = ConnectionManager::with_config(dialer, config.connection.clone());
    let store = FilePointerStore::default_path().map_or_else(
        || FilePointerStore::new(std::env::temp_dir().join("careline").join("ai_group")),
        FilePointerStore::new,
    );

    let (chat, mut chat_events) =
        ChatSession::new(conn.clone(), store, ConsoleNotifier, config.session.clone());
    let _appointments = AppointmentSession::new(conn.clone(), ConsoleNotifier);
    let rooms = RoomSession::new(conn.clone(), ConsoleNotifier);

    chat.set_user(&user_id, config.display_name.as_deref());
    conn.authenticate(&user_id);
    conn.connect();

    let deadline = tokio::time::Instant::now() + config.connect_timeout;
    while conn.state() != ConnectionState::Connected && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    if conn.state() == ConnectionState::Connected {
        println!("Connected to {endpoint}");
        chat.create_ai_group_if_needed(&user_id, config.display_name.as_deref(), false);
        chat.request_groups();
    } else {
        println!("Not connected yet — retrying in the background");
    }

    // Print session events as they arrive.
    tokio::spawn(async move {
        while let Some(event) = chat_events.recv().await {
            match event {
                ChatEvent::MessageReceived(message) => {
                    println!("{}: {}", message.sender_id, message.content);
                }
                ChatEvent::HistoryReplaced { count, .. } => {
                    println!("-- loaded {count} messages --");
                }
                ChatEvent::GroupAdded(group) => {
                    println!("-- group '{}' ({}) --", group.group_name, group.group_id);
                }
                ChatEvent::GroupRemoved(group_id) => {
                    println!("-- group {group_id} deleted --");
                }
                ChatEvent::GroupsReplaced { count } => {
                    println!("-- {count} groups --");
                }
                ChatEvent::ActiveChanged(active) => {
                    if let Some(group_id) = active.group_id() {
                        println!("-- now in {group_id} --");
                    }
                }
                ChatEvent::NoticeChanged(Some(notice)) => {
                    println!("[{}] {}", notice.kind, notice.text);
                }
                ChatEvent::NoticeChanged(None) => {}
                ChatEvent::HardError(text) => println!("[error] {text}"),
            }
        }
    });

    print_help();
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.split_whitespace().collect::<Vec<_>>().as_slice() {
            ["/quit"] => break,
            ["/help"] => print_help(),
            ["/groups"] => {
                chat.request_groups();
                for group in chat.groups() {
                    println!("  {} — {}", group.group_id, group.group_name);
                }
            }
            ["/join", id] => {
                match chat.groups().into_iter().find(|g| g.group_id.as_str() == *id) {
                    Some(group) => chat.switch_to_group(&group),
                    None => println!("No such group: {id} (try /groups first)"),
                }
            }
            ["/new-ai"] => {
                chat.create_ai_group_if_needed(&user_id, config.display_name.as_deref(), true);
            }
            ["/delete", id] => chat.delete_group(id, &user_id),
            ["/rooms", date] => rooms.get_rooms_by_date(date),
            _ => chat.send_message(line),
        }
    }

    conn.disconnect();
    tracing::info!("careline exiting");
    Ok(())
}

fn print_help() {
    println!("Commands: /groups, /join <id>, /new-ai, /delete <id>, /rooms <date>, /help, /quit");
    println!("Anything else is sent as a message to the active conversation.");
}

/// Initialize logging: stdout by default, a non-blocking file appender when
/// `--log-file` is given. The returned guard must be held until shutdown so
/// buffered entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    if let Some(path) = file_path {
        let log_dir = path.parent()?;
        let file_name = path.file_name()?.to_str()?;
        let file_appender = tracing_appender::rolling::never(log_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        tracing_subscriber::fmt()
            .with_writer(non_blocking)
            .with_env_filter(env_filter)
            .with_ansi(false)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
        None
    }
}
