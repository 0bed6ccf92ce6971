// ABOUTME: Configuration parsing from TOML file with environment variable and CLI overrides
// ABOUTME: Validates values and provides defaults for the server, session, and driver sections

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub driver: DriverConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Interval between heartbeat frames on the event stream
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    /// Frames a subscriber may fall behind before it is dropped
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            heartbeat_secs: default_heartbeat_secs(),
            subscriber_buffer: default_subscriber_buffer(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Credential directory owned by the driver
    #[serde(default = "paths::session_dir")]
    pub session_dir: PathBuf,
    /// Where inbound attachments are written
    #[serde(default = "paths::media_dir")]
    pub media_dir: PathBuf,
    /// Delay before re-initializing after a disconnect; 0 disables
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    /// Render pairing codes on the terminal
    #[serde(default = "default_true")]
    pub print_qr: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_dir: paths::session_dir(),
            media_dir: paths::media_dir(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            print_qr: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Executable that hosts the chat-network client library
    #[serde(default = "default_driver_command")]
    pub command: String,
    #[serde(default = "default_driver_args")]
    pub args: Vec<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            command: default_driver_command(),
            args: default_driver_args(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8765
}

fn default_heartbeat_secs() -> u64 {
    30
}

fn default_subscriber_buffer() -> usize {
    wa_bridge_core::hub::DEFAULT_SUBSCRIBER_BUFFER
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

fn default_driver_command() -> String {
    "node".to_string()
}

fn default_driver_args() -> Vec<String> {
    vec!["./whatsapp_bridge/driver.js".to_string()]
}

fn default_request_timeout_secs() -> u64 {
    60
}

/// Command-line values that take precedence over file and environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub session_dir: Option<PathBuf>,
    pub media_dir: Option<PathBuf>,
}

impl Config {
    /// Find the config file, checking in order:
    /// 1. the explicit path, if given
    /// 2. WA_BRIDGE_CONFIG env var
    /// 3. ./wa-bridge.toml
    /// 4. ~/.config/wa-bridge/config.toml
    fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        if let Ok(env_path) = std::env::var("WA_BRIDGE_CONFIG") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
        }

        let local_config = PathBuf::from("wa-bridge.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        let xdg_config = paths::config_file();
        if xdg_config.exists() {
            return Some(xdg_config);
        }

        None
    }

    /// Load configuration: defaults, then file, then environment, then `overrides`.
    pub fn load(explicit: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let mut config = if let Some(config_path) = Self::find_config_file(explicit) {
            tracing::info!(path = %config_path.display(), "Loading configuration from file");
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            tracing::info!("No config file found, using environment variables and defaults");
            Config::default()
        };

        config.apply_env()?;
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("WA_BRIDGE_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("WA_BRIDGE_PORT") {
            self.server.port = val.parse().with_context(|| {
                format!("WA_BRIDGE_PORT must be a valid port number, got: {}", val)
            })?;
        }
        if let Ok(val) = std::env::var("WA_BRIDGE_SESSION_DIR") {
            self.session.session_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("WA_BRIDGE_MEDIA_DIR") {
            self.session.media_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("WA_BRIDGE_DRIVER") {
            self.driver.command = val;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(host) = overrides.host {
            self.server.host = host;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(dir) = overrides.session_dir {
            self.session.session_dir = dir;
        }
        if let Some(dir) = overrides.media_dir {
            self.session.media_dir = dir;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("server.port must be non-zero");
        }
        if self.server.heartbeat_secs == 0 {
            anyhow::bail!("server.heartbeat_secs must be at least 1");
        }
        if self.driver.command.trim().is_empty() {
            anyhow::bail!("driver.command is required (set in config or WA_BRIDGE_DRIVER env var)");
        }
        if self.driver.request_timeout_secs == 0 {
            anyhow::bail!("driver.request_timeout_secs must be at least 1");
        }
        if !is_loopback(&self.server.host) {
            tracing::warn!(
                host = %self.server.host,
                "Control plane bound to a non-loopback address; it has no authentication"
            );
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn is_loopback(host: &str) -> bool {
    match host.parse::<std::net::IpAddr>() {
        Ok(ip) => ip.is_loopback(),
        Err(_) => host == "localhost",
    }
}
