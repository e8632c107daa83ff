//! Append-Only File (AOF) persistence module
//!
//! Provides durability by logging every applied write command to disk.
//! Records use a compact binary framing with checksums. The log is
//! compacted by rewriting it from a snapshot of the keyspace.

mod entry;
mod log;
mod reader;
mod replay;
mod rewrite;
mod writer;

pub use entry::{AofRecord, DecodeError, RecordTooLarge, RECORD_COMMAND, RECORD_SNAPSHOT, RECORD_SNAPSHOT_PART};
pub use log::{AofStatus, AppendOnlyLog};
pub use reader::{AofReader, LoadedLog};
pub use replay::{replay_records, ReplayStats, ReplayTarget};
pub use writer::AofWriter;

use serde::Deserialize;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// AOF errors
#[derive(Debug, Error)]
pub enum AofError {
    #[error("AOF I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("AOF is corrupted at offset {offset}: {reason}")]
    Corrupted { offset: u64, reason: String },

    #[error("Background append only file rewriting already in progress")]
    RewriteInProgress,

    #[error("no async runtime available for a background rewrite")]
    NoRuntime,
}

/// AOF sync policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum SyncPolicy {
    /// Sync after every write (safest, slowest)
    #[serde(rename = "always")]
    Always,
    /// Sync every second (balanced)
    #[default]
    #[serde(rename = "everysec")]
    EverySecond,
    /// Let the OS decide when to sync (fastest, least safe)
    #[serde(rename = "no")]
    No,
}

impl SyncPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPolicy::Always => "always",
            SyncPolicy::EverySecond => "everysec",
            SyncPolicy::No => "no",
        }
    }
}

impl fmt::Display for SyncPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "always" => Ok(SyncPolicy::Always),
            "everysec" => Ok(SyncPolicy::EverySecond),
            "no" => Ok(SyncPolicy::No),
            other => Err(format!("unknown appendfsync policy '{}'", other)),
        }
    }
}

/// AOF configuration
#[derive(Debug, Clone)]
pub struct AofConfig {
    /// Path to the AOF file
    pub path: PathBuf,
    /// Sync policy
    pub sync_policy: SyncPolicy,
    /// Whether to enable AOF
    pub enabled: bool,
}

impl Default for AofConfig {
    fn default() -> Self {
        AofConfig {
            path: PathBuf::from("ferrumkv.aof"),
            sync_policy: SyncPolicy::default(),
            enabled: true,
        }
    }
}
