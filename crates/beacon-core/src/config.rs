//! Configuration system for beacon.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $BEACON_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/beacon/config.toml
//!   3. ~/.config/beacon/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::wire::{
    DisplayName, WireError, ANNOUNCE_INTERVAL_MS, CHECK_CADENCE_MS, DEFAULT_PORT,
    DISPLAY_INTERVAL_MS, MAX_DATAGRAM, MIN_DATAGRAM, STALENESS_MS,
};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BeaconConfig {
    pub identity: IdentityConfig,
    pub network: NetworkConfig,
    pub liveness: LivenessConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Name announced to peers. Letters, digits, `_`, `-`, space and tab only.
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// UDP port announcements are sent to and received on.
    pub port: u16,
    /// Milliseconds between broadcast rounds.
    pub announce_interval_ms: u64,
    /// Receive buffer size in bytes. Longer datagrams are truncated.
    pub recv_buffer_bytes: usize,
    /// Distinct peers allowed to share one source address. 0 = local interface count.
    pub max_peers_per_address: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// A check counts as missed if nothing was heard for longer than this.
    pub staleness_ms: u64,
    /// Milliseconds between liveness checks of one peer.
    pub check_cadence_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Milliseconds between roster refreshes.
    pub interval_ms: u64,
    /// Clear the terminal before each refresh.
    pub clear_screen: bool,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            display_name: "beacon".to_string(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            announce_interval_ms: ANNOUNCE_INTERVAL_MS,
            recv_buffer_bytes: MAX_DATAGRAM,
            max_peers_per_address: 0,
        }
    }
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            staleness_ms: STALENESS_MS,
            check_cadence_ms: CHECK_CADENCE_MS,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            interval_ms: DISPLAY_INTERVAL_MS,
            clear_screen: true,
        }
    }
}

impl NetworkConfig {
    pub fn announce_interval(&self) -> Duration {
        Duration::from_millis(self.announce_interval_ms)
    }
}

impl LivenessConfig {
    pub fn staleness(&self) -> Duration {
        Duration::from_millis(self.staleness_ms)
    }

    pub fn check_cadence(&self) -> Duration {
        Duration::from_millis(self.check_cadence_ms)
    }
}

impl DisplayConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
        .join("beacon")
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid display name {0:?}: {1}")]
    InvalidDisplayName(String, WireError),
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
    #[error("network.recv_buffer_bytes is {0}, minimum is {}", MIN_DATAGRAM)]
    BufferTooSmall(usize),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl BeaconConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::file_path())?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from a specific file, falling back to defaults if it does not exist.
    /// Environment overrides are not applied.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(BeaconConfig::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("BEACON_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        Self::write_default_to(&path)?;
        Ok(path)
    }

    /// Write the default config to `path` unless a file is already there.
    pub fn write_default_to(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
        }
        let text =
            toml::to_string_pretty(&BeaconConfig::default()).map_err(ConfigError::SerializeFailed)?;
        std::fs::write(path, text).map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))
    }

    /// The configured display name, validated against the wire rules.
    pub fn display_name(&self) -> Result<DisplayName, ConfigError> {
        DisplayName::new(self.identity.display_name.clone())
            .map_err(|e| ConfigError::InvalidDisplayName(self.identity.display_name.clone(), e))
    }

    /// Reject settings the daemon cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.display_name()?;
        if self.network.announce_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval("network.announce_interval_ms"));
        }
        if self.liveness.check_cadence_ms == 0 {
            return Err(ConfigError::ZeroInterval("liveness.check_cadence_ms"));
        }
        if self.display.interval_ms == 0 {
            return Err(ConfigError::ZeroInterval("display.interval_ms"));
        }
        if self.network.recv_buffer_bytes < MIN_DATAGRAM {
            return Err(ConfigError::BufferTooSmall(self.network.recv_buffer_bytes));
        }
        Ok(())
    }

    /// Apply BEACON_* env var overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("BEACON_IDENTITY__DISPLAY_NAME") {
            self.identity.display_name = v;
        }
        if let Some(p) = var("BEACON_NETWORK__PORT").and_then(|v| v.parse().ok()) {
            self.network.port = p;
        }
        if let Some(ms) = var("BEACON_NETWORK__ANNOUNCE_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.network.announce_interval_ms = ms;
        }
        if let Some(n) = var("BEACON_NETWORK__MAX_PEERS_PER_ADDRESS").and_then(|v| v.parse().ok()) {
            self.network.max_peers_per_address = n;
        }
        if let Some(ms) = var("BEACON_LIVENESS__STALENESS_MS").and_then(|v| v.parse().ok()) {
            self.liveness.staleness_ms = ms;
        }
        if let Some(ms) = var("BEACON_LIVENESS__CHECK_CADENCE_MS").and_then(|v| v.parse().ok()) {
            self.liveness.check_cadence_ms = ms;
        }
        if let Some(v) = var("BEACON_DISPLAY__CLEAR_SCREEN") {
            self.display.clear_screen = v == "true" || v == "1";
        }
    }
}
