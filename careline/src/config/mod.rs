//! Configuration system for the Careline client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/careline/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

use crate::connection::ConnectionConfig;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    network: NetworkFileConfig,
    session: SessionFileConfig,
    assistant: AssistantFileConfig,
}

/// `[network]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct NetworkFileConfig {
    endpoint: Option<String>,
    user_id: Option<String>,
    display_name: Option<String>,
    connect_timeout_secs: Option<u64>,
    reconnect_base_delay_ms: Option<u64>,
    max_reconnect_attempts: Option<u32>,
}

/// `[session]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SessionFileConfig {
    page_size: Option<u32>,
    self_heal_delay_ms: Option<u64>,
    notice_ttl_secs: Option<u64>,
    dedup_capacity: Option<usize>,
    event_buffer: Option<usize>,
}

/// `[assistant]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct AssistantFileConfig {
    base_url: Option<String>,
    request_timeout_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Chat session knobs (used by `ChatSession`).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// History page size for `get_messages` fetches.
    pub page_size: u32,
    /// Debounce before recreating a deleted AI group.
    pub self_heal_delay: Duration,
    /// How long a transient notice stays visible.
    pub notice_ttl: Duration,
    /// Capacity cap on the de-duplication ledger.
    pub dedup_capacity: usize,
    /// Buffer size for the session event channel.
    pub event_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            self_heal_delay: Duration::from_millis(150),
            notice_ttl: Duration::from_secs(5),
            dedup_capacity: 10_000,
            event_buffer: 64,
        }
    }
}

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -- Network --
    /// Session server WebSocket URL.
    pub endpoint: Option<String>,
    /// Local user identity.
    pub user_id: Option<String>,
    /// Display name used when naming the AI group.
    pub display_name: Option<String>,
    /// Timeout for each dial attempt.
    pub connect_timeout: Duration,
    /// Reconnection policy.
    pub connection: ConnectionConfig,

    // -- Session --
    /// Chat session knobs.
    pub session: SessionConfig,

    // -- Assistant --
    /// Base URL of the remote assistant service.
    pub assistant_base_url: Option<String>,
    /// Timeout for assistant HTTP requests.
    pub assistant_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            user_id: None,
            display_name: None,
            connect_timeout: Duration::from_secs(10),
            connection: ConnectionConfig::default(),
            session: SessionConfig::default(),
            assistant_base_url: None,
            assistant_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// CLI args and env vars are parsed via `clap`. If `--config` is given
    /// and the file does not exist, returns an error. If no `--config` is
    /// given, the default path (`~/.config/careline/config.toml`) is tried
    /// and silently ignored if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default. Separated from `load()` to enable
    /// unit testing without CLI parsing.
    #[must_use]
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            endpoint: cli
                .endpoint
                .clone()
                .or_else(|| file.network.endpoint.clone()),
            user_id: cli.user_id.clone().or_else(|| file.network.user_id.clone()),
            display_name: cli
                .display_name
                .clone()
                .or_else(|| file.network.display_name.clone()),
            connect_timeout: file
                .network
                .connect_timeout_secs
                .map_or(defaults.connect_timeout, Duration::from_secs),
            connection: ConnectionConfig {
                base_delay: file
                    .network
                    .reconnect_base_delay_ms
                    .map_or(defaults.connection.base_delay, Duration::from_millis),
                max_attempts: file
                    .network
                    .max_reconnect_attempts
                    .unwrap_or(defaults.connection.max_attempts),
            },
            session: SessionConfig {
                page_size: file.session.page_size.unwrap_or(defaults.session.page_size),
                self_heal_delay: file
                    .session
                    .self_heal_delay_ms
                    .map_or(defaults.session.self_heal_delay, Duration::from_millis),
                notice_ttl: file
                    .session
                    .notice_ttl_secs
                    .map_or(defaults.session.notice_ttl, Duration::from_secs),
                dedup_capacity: file
                    .session
                    .dedup_capacity
                    .unwrap_or(defaults.session.dedup_capacity),
                event_buffer: file
                    .session
                    .event_buffer
                    .unwrap_or(defaults.session.event_buffer),
            },
            assistant_base_url: cli
                .assistant_url
                .clone()
                .or_else(|| file.assistant.base_url.clone()),
            assistant_timeout: file
                .assistant
                .request_timeout_secs
                .map_or(defaults.assistant_timeout, Duration::from_secs),
        }
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Realtime messaging session client")]
pub struct CliArgs {
    /// WebSocket URL of the session server.
    #[arg(long, env = "CARELINE_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Your user identity.
    #[arg(long, env = "CARELINE_USER_ID")]
    pub user_id: Option<String>,

    /// Display name used when naming the AI conversation.
    #[arg(long, env = "CARELINE_DISPLAY_NAME")]
    pub display_name: Option<String>,

    /// Base URL of the remote assistant service.
    #[arg(long, env = "CARELINE_ASSISTANT_URL")]
    pub assistant_url: Option<String>,

    /// Path to config file (default: `~/.config/careline/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "CARELINE_LOG")]
    pub log_level: String,

    /// Path to log file (default: stdout).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            // No config dir available — use defaults.
            return Ok(ConfigFile::default());
        };
        config_dir.join("careline").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
