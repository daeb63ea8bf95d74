// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Agent configuration management.
//!
//! Configuration is stored in `config.toml` inside the state directory,
//! next to the queue files. Every field has a default, so a missing file or
//! a partial one is fine:
//!
//! ```toml
//! [remote]
//! url = "ws://127.0.0.1:7420"
//! call_timeout_ms = 10000
//!
//! [sync]
//! node_id = 1234
//! max_attempts = 5
//! interval_secs = 30
//! abandon_rejected = false
//!
//! [reachability]
//! probe_interval_ms = 5000
//! probe_timeout_ms = 1000
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::sync::{probe_target, ProbeConfig, RetryPolicy, SyncSettings};

const STATE_DIR_NAME: &str = "outbox";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Agent configuration stored in `<state>/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub reachability: ReachabilityConfig,
}

/// Where the record store lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// WebSocket URL (`ws://...` or `wss://...`).
    #[serde(default = "default_url")]
    pub url: String,
    /// Max time for a single backend call in milliseconds (default: 10000).
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

/// Drain behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Mixed into operation ids. Written by `outbox init`.
    #[serde(default)]
    pub node_id: u32,
    /// Attempts before an operation is abandoned (default: 5).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Periodic drain interval in seconds (default: 30).
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Abandon operations the backend rejects instead of retrying them.
    #[serde(default)]
    pub abandon_rejected: bool,
}

/// TCP probe used to decide whether the backend is reachable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReachabilityConfig {
    /// Delay between probes in milliseconds (default: 5000).
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,
    /// Max time to wait for a probe connection in milliseconds (default: 1000).
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// `host:port` to probe. Derived from the remote URL when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe_addr: Option<String>,
}

fn default_url() -> String {
    "ws://127.0.0.1:7420".to_string()
}

fn default_call_timeout_ms() -> u64 {
    10_000
}

fn default_max_attempts() -> u32 {
    crate::sync::DEFAULT_MAX_ATTEMPTS
}

fn default_interval_secs() -> u64 {
    30
}

fn default_probe_interval_ms() -> u64 {
    5_000
}

fn default_probe_timeout_ms() -> u64 {
    1_000
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            url: default_url(),
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            node_id: 0,
            max_attempts: default_max_attempts(),
            interval_secs: default_interval_secs(),
            abandon_rejected: false,
        }
    }
}

impl Default for ReachabilityConfig {
    fn default() -> Self {
        ReachabilityConfig {
            probe_interval_ms: default_probe_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            probe_addr: None,
        }
    }
}

impl Config {
    /// Loads configuration from the given state directory.
    pub fn load(state_dir: &Path) -> Result<Self> {
        let config_path = state_dir.join(CONFIG_FILE_NAME);
        let content = fs::read_to_string(&config_path)
            .map_err(|e| Error::Config(format!("failed to read config: {}", e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration, falling back to defaults if no file exists.
    pub fn load_or_default(state_dir: &Path) -> Result<Self> {
        if state_dir.join(CONFIG_FILE_NAME).exists() {
            Self::load(state_dir)
        } else {
            Ok(Config::default())
        }
    }

    /// Saves configuration to the given state directory.
    pub fn save(&self, state_dir: &Path) -> Result<()> {
        let config_path = state_dir.join(CONFIG_FILE_NAME);
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(&config_path, content)?;
        Ok(())
    }

    /// Checks values that would make the engine misbehave.
    pub fn validate(&self) -> Result<()> {
        validate_url(&self.remote.url)?;
        if self.sync.max_attempts == 0 {
            return Err(Error::Config("sync.max_attempts must be at least 1".into()));
        }
        if self.sync.interval_secs == 0 {
            return Err(Error::Config("sync.interval_secs must be at least 1".into()));
        }
        if self.remote.call_timeout_ms == 0 {
            return Err(Error::Config(
                "remote.call_timeout_ms must be at least 1".into(),
            ));
        }
        if self.reachability.probe_interval_ms == 0 || self.reachability.probe_timeout_ms == 0 {
            return Err(Error::Config(
                "reachability probe interval and timeout must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Engine settings derived from this config.
    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            node_id: self.sync.node_id,
            retry: RetryPolicy {
                max_attempts: self.sync.max_attempts,
                abandon_rejected: self.sync.abandon_rejected,
            },
            call_timeout: Duration::from_millis(self.remote.call_timeout_ms),
            sync_interval: Duration::from_secs(self.sync.interval_secs),
        }
    }

    /// Probe settings, or `None` if no address can be derived.
    pub fn probe_config(&self) -> Option<ProbeConfig> {
        let addr = match &self.reachability.probe_addr {
            Some(addr) => addr.clone(),
            None => probe_target(&self.remote.url)?,
        };
        Some(ProbeConfig {
            addr,
            interval: Duration::from_millis(self.reachability.probe_interval_ms),
            timeout: Duration::from_millis(self.reachability.probe_timeout_ms),
        })
    }
}

/// Checks that `url` is a WebSocket URL.
pub fn validate_url(url: &str) -> Result<()> {
    if probe_target(url).is_some() {
        Ok(())
    } else {
        Err(Error::InvalidRemoteUrl(url.to_string()))
    }
}

/// Resolves the state directory.
///
/// Order: explicit flag, `OUTBOX_STATE_DIR`, then the platform state
/// directory (`$XDG_STATE_HOME/outbox` on Linux).
pub fn resolve_state_dir(flag: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = flag {
        return Ok(dir);
    }
    if let Some(dir) = crate::env::state_dir() {
        return Ok(dir);
    }
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|base| base.join(STATE_DIR_NAME))
        .ok_or_else(|| Error::Config("cannot determine a state directory".into()))
}

/// Writes a fresh config into `state_dir`, creating it if needed.
pub fn init_state_dir(state_dir: &Path, remote: Option<String>) -> Result<Config> {
    let config_path = state_dir.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        return Err(Error::AlreadyInitialized(state_dir.display().to_string()));
    }

    let mut config = Config::default();
    if let Some(url) = remote {
        config.remote.url = url;
    }
    config.sync.node_id = generate_node_id();
    config.validate()?;

    fs::create_dir_all(state_dir)?;
    config.save(state_dir)?;
    Ok(config)
}

/// Picks a node id unlikely to collide with other devices.
fn generate_node_id() -> u32 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() ^ (d.as_secs() as u32))
        .unwrap_or(0);
    (nanos ^ std::process::id().rotate_left(16)).max(1)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
