//! Server configuration.
//!
//! Configuration can be loaded from:
//! - A file given with `--config`
//! - The first existing default TOML file
//! - Environment variables (WORDRELAY_HOST, WORDRELAY_PORT) over defaults

use anyhow::{bail, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use wordrelay_core::words::{validate_word, DEFAULT_WORDS};
use wordrelay_core::{HubConfig, WordPool};
use wordrelay_protocol::WireFormat;
use wordrelay_transport::SessionOptions;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Transport configuration.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Game rules.
    #[serde(default)]
    pub game: GameConfig,

    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Path for WebSocket endpoint.
    #[serde(default = "default_ws_path")]
    pub websocket_path: String,

    /// Encoding for server messages.
    #[serde(default)]
    pub format: WireFormat,

    /// Maximum inbound message size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

/// Game configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Round length in seconds.
    #[serde(default = "default_round_secs")]
    pub round_secs: u32,

    /// History lines kept.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Secret word pool.
    #[serde(default = "default_words")]
    pub words: Vec<String>,

    /// Fixed seed for word selection.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Clock period in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

/// Resource limits configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Outbound queue capacity per session.
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,

    /// Hub event channel capacity.
    #[serde(default = "default_hub_event_capacity")]
    pub hub_event_capacity: usize,
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

// Default value functions
fn default_host() -> String {
    std::env::var("WORDRELAY_HOST").unwrap_or_else(|_| "127.0.0.1".to_string())
}

fn default_port() -> u16 {
    std::env::var("WORDRELAY_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(42069)
}

fn default_true() -> bool {
    true
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_max_message_size() -> usize {
    4 * 1024
}

fn default_round_secs() -> u32 {
    30
}

fn default_history_capacity() -> usize {
    100
}

fn default_words() -> Vec<String> {
    DEFAULT_WORDS.iter().map(|w| (*w).to_string()).collect()
}

fn default_tick_ms() -> u64 {
    1_000
}

fn default_outbound_queue_capacity() -> usize {
    256
}

fn default_hub_event_capacity() -> usize {
    1024
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            transport: TransportConfig::default(),
            game: GameConfig::default(),
            limits: LimitsConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            websocket_path: default_ws_path(),
            format: WireFormat::default(),
            max_message_size: default_max_message_size(),
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            round_secs: default_round_secs(),
            history_capacity: default_history_capacity(),
            words: default_words(),
            seed: None,
            tick_ms: default_tick_ms(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: default_outbound_queue_capacity(),
            hub_event_capacity: default_hub_event_capacity(),
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
    /// Load configuration from an explicit file, a default path, or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file cannot be read, parsed or validated.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let config_paths = [
            "wordrelay.toml",
            "/etc/wordrelay/wordrelay.toml",
            "~/.config/wordrelay/wordrelay.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Check values the types cannot express.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.game.round_secs > 0, "game.round_secs must be at least 1");
        ensure!(self.game.tick_ms > 0, "game.tick_ms must be at least 1");
        ensure!(
            self.game.history_capacity > 0,
            "game.history_capacity must be at least 1"
        );
        ensure!(
            self.limits.outbound_queue_capacity > 0,
            "limits.outbound_queue_capacity must be at least 1"
        );
        ensure!(
            self.limits.hub_event_capacity > 0,
            "limits.hub_event_capacity must be at least 1"
        );
        ensure!(
            self.transport.max_message_size > 0,
            "transport.max_message_size must be at least 1"
        );
        if !self.transport.websocket_path.starts_with('/') {
            bail!(
                "transport.websocket_path must start with '/': {:?}",
                self.transport.websocket_path
            );
        }
        ensure!(!self.game.words.is_empty(), "game.words must not be empty");
        for word in &self.game.words {
            validate_word(word.trim()).context("game.words")?;
        }
        Ok(())
    }

    /// Get the socket address to bind to.
    ///
    /// # Errors
    ///
    /// Returns an error if host and port do not form a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid host:port {}:{}", self.host, self.port))
    }

    /// Hub settings.
    #[must_use]
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            round_duration: self.game.round_secs,
            history_capacity: self.game.history_capacity,
            event_capacity: self.limits.hub_event_capacity,
            outbound_capacity: self.limits.outbound_queue_capacity,
        }
    }

    /// Per-session settings.
    #[must_use]
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            outbound_capacity: self.limits.outbound_queue_capacity,
            format: self.transport.format,
        }
    }

    /// The configured word pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool is invalid.
    pub fn word_pool(&self) -> Result<WordPool> {
        let pool = match self.game.seed {
            Some(seed) => WordPool::with_seed(&self.game.words, seed),
            None => WordPool::new(&self.game.words),
        };
        pool.context("Invalid word pool")
    }

    /// Round clock period.
    #[must_use]
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.game.tick_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.transport.websocket_path, "/ws");
        assert_eq!(config.transport.format, WireFormat::Json);
        assert_eq!(config.game.round_secs, 30);
        assert_eq!(config.game.history_capacity, 100);
        assert_eq!(config.limits.outbound_queue_capacity, 256);
        assert_eq!(config.tick_period(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_bind_addr() {
        let mut config = Config::default();
        config.host = "127.0.0.1".into();
        config.port = 42069;
        assert_eq!(config.bind_addr().unwrap().port(), 42069);

        config.host = "not a host".into();
        assert!(config.bind_addr().is_err());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            host = "0.0.0.0"
            port = 9000

            [transport]
            format = "msgpack"

            [game]
            round_secs = 45
            words = ["rust", "ferris"]
            seed = 42

            [limits]
            outbound_queue_capacity = 64
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.transport.format, WireFormat::Msgpack);
        assert_eq!(config.game.round_secs, 45);
        assert_eq!(config.game.seed, Some(42));
        assert_eq!(config.limits.outbound_queue_capacity, 64);
        assert_eq!(config.limits.hub_event_capacity, 1024);
        assert!(config.validate().is_ok());

        assert_eq!(config.hub_config().round_duration, 45);
        assert_eq!(config.session_options().outbound_capacity, 64);
        assert_eq!(config.word_pool().unwrap().words(), ["rust", "ferris"]);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.game.round_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.game.words = vec!["ok".into()];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.game.words.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.transport.websocket_path = "ws".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.limits.outbound_queue_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(Config::load(Some(Path::new("/nonexistent/wordrelay.toml"))).is_err());
    }
}
