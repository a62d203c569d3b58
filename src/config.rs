//! Server configuration loaded from a TOML file, with sensible defaults so
//! the binary also runs without any file at all.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 9036;
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_ACCEPT_TIMEOUT_MS: u64 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ListenConfig,
    #[serde(default)]
    pub pool: PoolConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    /// Address the listening socket binds to.
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Fixed number of worker threads admitting and handling connections.
    pub workers: usize,
    /// How long the leader waits on the listening socket before re-checking
    /// the stop flag.
    pub accept_timeout_ms: u64,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: format!("0.0.0.0:{DEFAULT_PORT}"),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            accept_timeout_ms: DEFAULT_ACCEPT_TIMEOUT_MS,
        }
    }
}

impl PoolConfig {
    pub fn accept_timeout(&self) -> Duration {
        Duration::from_millis(self.accept_timeout_ms)
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    ///
    /// Missing sections fall back to their defaults, so a file may override
    /// just the listen address or just the pool shape.
    pub fn from_file(path: &str) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("failed to read config {path}"))?;
        let config: ServerConfig =
            toml::from_str(&content).with_context(|| format!("failed to parse config {path}"))?;
        Ok(config)
    }
}
