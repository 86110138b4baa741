//! Server configuration.
//!
//! Configuration is layered, later sources winning:
//! - Built-in defaults (`PORT` and `ORBIT_HOST` are honored here)
//! - The first `orbit.toml` found on the search path
//! - Environment variables `ORBIT_*`, with `__` separating nested keys
//!   (e.g. `ORBIT_RELAY__PATH=/ws`)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Files searched by [`Config::load`], in order.
pub const SEARCH_PATHS: [&str; 3] = [
    "orbit.toml",
    "/etc/orbit/orbit.toml",
    "~/.config/orbit/orbit.toml",
];

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Realtime relay endpoint.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Keepalive pings sent to relay sockets.
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    /// Static asset directories.
    #[serde(default)]
    pub assets: AssetsConfig,

    /// Cross-origin access.
    #[serde(default)]
    pub cors: CorsConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Relay endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Serve the relay at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// WebSocket endpoint path.
    #[serde(default = "default_relay_path")]
    pub path: String,

    /// Maximum number of concurrently connected sockets.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Messages buffered per socket before it starts skipping.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Maximum frame size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

/// Heartbeat configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Ping interval in milliseconds.
    #[serde(default = "default_heartbeat_interval")]
    pub interval_ms: u64,

    /// Close sockets silent for this long, in milliseconds.
    #[serde(default = "default_heartbeat_timeout")]
    pub timeout_ms: u64,
}

/// Static asset configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    /// Build output; also holds the single-page entry point `index.html`.
    #[serde(default = "default_dist_dir")]
    pub dist_dir: PathBuf,

    /// Extra static files, served when `dist_dir` has no match.
    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,
}

/// CORS configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins; `*` allows any.
    #[serde(default = "default_origins")]
    pub origins: Vec<String>,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_host() -> String {
    std::env::var("ORBIT_HOST").unwrap_or_else(|_| "0.0.0.0".to_string())
}

fn default_port() -> u16 {
    std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000)
}

fn default_true() -> bool {
    true
}

fn default_relay_path() -> String {
    "/socket".to_string()
}

fn default_max_connections() -> usize {
    10_000
}

fn default_capacity() -> usize {
    1024
}

fn default_max_message_size() -> usize {
    orbit_protocol::codec::MAX_FRAME_SIZE
}

fn default_heartbeat_interval() -> u64 {
    25_000
}

fn default_heartbeat_timeout() -> u64 {
    60_000
}

fn default_dist_dir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_public_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            relay: RelayConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            assets: AssetsConfig::default(),
            cors: CorsConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_relay_path(),
            max_connections: default_max_connections(),
            capacity: default_capacity(),
            max_message_size: default_max_message_size(),
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_heartbeat_interval(),
            timeout_ms: default_heartbeat_timeout(),
        }
    }
}

impl HeartbeatConfig {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            dist_dir: default_dist_dir(),
            public_dir: default_public_dir(),
        }
    }
}

impl AssetsConfig {
    /// The single-page entry point.
    #[must_use]
    pub fn index_html(&self) -> PathBuf {
        self.dist_dir.join("index.html")
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origins: default_origins(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load the first config file on [`SEARCH_PATHS`], overlaid with
    /// `ORBIT_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed, or an
    /// environment override has the wrong type.
    pub fn load() -> Result<Self> {
        let file = SEARCH_PATHS
            .iter()
            .map(|path| shellexpand::tilde(path).into_owned())
            .find(|path| Path::new(path).exists());

        let mut builder = config::Config::builder();
        if let Some(path) = &file {
            tracing::info!(path = %path, "Loading config file");
            builder = builder.add_source(config::File::new(path, config::FileFormat::Toml));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix("ORBIT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to assemble configuration")?;

        settings
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Get the socket address to bind to.
    ///
    /// # Errors
    ///
    /// Returns an error if `host:port` is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.host, self.port))
    }
}
