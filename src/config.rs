//! Server configuration
//!
//! The core consumes a static `Config`; the binary builds one from command
//! line flags, optionally layered over a JSON file.

use crate::aof::{AofConfig, SyncPolicy};
use crate::store::{EvictionPolicy, SweepLimits};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime configuration of the server
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Interface to bind
    pub host: String,
    /// TCP port to listen on (0 picks a free port)
    pub port: u16,
    /// Number of logical databases
    pub databases: usize,
    /// Memory ceiling in bytes, 0 for unlimited
    pub maxmemory: usize,
    /// What to drop once `maxmemory` is reached
    pub maxmemory_policy: EvictionPolicy,
    /// Whether writes are logged to the append-only file
    pub appendonly: bool,
    pub appendfilename: PathBuf,
    pub appendfsync: SyncPolicy,
    /// Rewrite once the log grew by this percentage since the last rewrite
    pub auto_aof_rewrite_percentage: u64,
    /// ...and is at least this many bytes
    pub auto_aof_rewrite_min_size: u64,
    /// Housekeeping frequency (expiry sweeps per second)
    pub hz: u32,
    /// Keys sampled per database in each expiry round
    pub active_expire_samples: usize,
    /// Time budget of one expiry cycle in milliseconds
    pub active_expire_budget_ms: u64,
    /// Pending reply bytes after which a client is disconnected
    pub client_output_limit: usize,
    /// Largest accepted bulk string
    pub max_bulk_len: usize,
    /// Largest accepted multibulk (argument count)
    pub max_multibulk_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: 6379,
            databases: 16,
            maxmemory: 0,
            maxmemory_policy: EvictionPolicy::NoEviction,
            appendonly: true,
            appendfilename: PathBuf::from("ferrumkv.aof"),
            appendfsync: SyncPolicy::EverySecond,
            auto_aof_rewrite_percentage: 100,
            auto_aof_rewrite_min_size: 64 * 1024 * 1024,
            hz: 10,
            active_expire_samples: 20,
            active_expire_budget_ms: 25,
            client_output_limit: 64 * 1024 * 1024,
            max_bulk_len: crate::protocol::DEFAULT_MAX_BULK_LEN,
            max_multibulk_len: crate::protocol::DEFAULT_MAX_ARRAY_LEN,
        }
    }
}

impl Config {
    /// Read a JSON configuration file; missing fields keep their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Config = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        Ok(config)
    }

    /// Address the listener binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Period of the expiry sweep
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.hz.clamp(1, 500)))
    }

    pub fn sweep_limits(&self) -> SweepLimits {
        SweepLimits {
            samples: self.active_expire_samples.max(1),
            budget: Duration::from_millis(self.active_expire_budget_ms),
            ..SweepLimits::default()
        }
    }

    pub fn aof_config(&self) -> AofConfig {
        AofConfig {
            path: self.appendfilename.clone(),
            sync_policy: self.appendfsync,
            enabled: self.appendonly,
        }
    }
}
