//! AOF writer
//!
//! Appends encoded records to the log file and applies the fsync policy.
//! The writer is owned by the engine loop, so no locking is needed.

use super::SyncPolicy;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::warn;

/// AOF writer
pub struct AofWriter {
    file: File,
    sync_policy: SyncPolicy,
    /// Current file size in bytes
    size: u64,
    /// Bytes were written since the last fsync
    unsynced: bool,
    last_sync: Instant,
}

impl AofWriter {
    /// Open (or create) the log for appending
    pub fn open<P: AsRef<Path>>(path: P, sync_policy: SyncPolicy) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        let size = file.metadata()?.len();

        Ok(AofWriter {
            file,
            sync_policy,
            size,
            unsynced: false,
            last_sync: Instant::now(),
        })
    }

    /// Append already encoded records
    ///
    /// On failure the file is cut back to its previous size, so a partly
    /// written record never sits in front of later ones.
    pub fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        let result = self.file.write_all(bytes).and_then(|_| {
            if self.sync_policy == SyncPolicy::Always {
                self.file.sync_data()?;
                self.last_sync = Instant::now();
            }
            Ok(())
        });
        if let Err(e) = result {
            self.rollback();
            return Err(e);
        }

        self.size += bytes.len() as u64;
        self.unsynced = self.sync_policy != SyncPolicy::Always;
        Ok(())
    }

    /// Drop anything past the last complete append
    pub(crate) fn rollback(&mut self) {
        if let Err(e) = self.file.set_len(self.size) {
            warn!("Could not cut AOF back to {} bytes: {}", self.size, e);
        }
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> io::Result<()> {
        self.file.sync_data()?;
        self.unsynced = false;
        self.last_sync = Instant::now();
        Ok(())
    }

    /// Sync if the every-second policy is due. Returns true if it synced.
    pub fn sync_if_due(&mut self) -> io::Result<bool> {
        if self.sync_policy != SyncPolicy::EverySecond || !self.unsynced {
            return Ok(false);
        }
        if self.last_sync.elapsed() < Duration::from_secs(1) {
            return Ok(false);
        }
        self.sync()?;
        Ok(true)
    }

    /// Sync any pending bytes regardless of policy (shutdown)
    pub fn flush_all(&mut self) -> io::Result<()> {
        self.file.flush()?;
        if self.unsynced {
            self.sync()?;
        }
        Ok(())
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn sync_policy(&self) -> SyncPolicy {
        self.sync_policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aof::{AofReader, AofRecord};
    use bytes::Bytes;
    use std::fs;

    #[test]
    fn test_append_tracks_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("writer.aof");

        let mut writer = AofWriter::open(&path, SyncPolicy::Always).unwrap();
        let record = AofRecord::command(0, vec![Bytes::from("SET"), Bytes::from("k"), Bytes::from("v")]);
        let bytes = record.to_bytes();

        writer.append(&bytes).unwrap();
        writer.append(&bytes).unwrap();
        assert_eq!(writer.size(), 2 * bytes.len() as u64);

        let metadata = fs::metadata(&path).unwrap();
        assert_eq!(metadata.len(), writer.size());

        // Reopening picks up the existing size
        let reopened = AofWriter::open(&path, SyncPolicy::No).unwrap();
        assert_eq!(reopened.size(), writer.size());
    }

    #[test]
    fn test_rollback_cuts_partial_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.aof");
        let mut writer = AofWriter::open(&path, SyncPolicy::No).unwrap();
        let first = AofRecord::command(0, vec![Bytes::from("SET"), Bytes::from("a"), Bytes::from("1")]);
        writer.append(&first.to_bytes()).unwrap();

        // Half a record lands in the file, as when the disk fills up mid-write
        let second = AofRecord::command(0, vec![Bytes::from("SET"), Bytes::from("b"), Bytes::from("2")]);
        let half = second.to_bytes();
        OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(&half[..half.len() / 2])
            .unwrap();

        writer.rollback();
        assert_eq!(fs::metadata(&path).unwrap().len(), writer.size());

        writer.append(&second.to_bytes()).unwrap();
        let loaded = AofReader::load(&path).unwrap().parse().unwrap();
        assert_eq!(loaded.records, vec![first, second]);
        assert_eq!(loaded.torn_bytes, 0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_append_leaves_size() {
        let full = std::path::Path::new("/dev/full");
        if !full.exists() {
            return;
        }
        let mut writer = AofWriter::open(full, SyncPolicy::No).unwrap();
        assert!(writer.append(b"record").is_err());
        assert_eq!(writer.size(), 0);
    }

    #[test]
    fn test_everysec_waits_for_interval() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = AofWriter::open(dir.path().join("w.aof"), SyncPolicy::EverySecond).unwrap();
        writer.append(b"x").unwrap();
        assert!(!writer.sync_if_due().unwrap());
        writer.flush_all().unwrap();
        assert!(!writer.sync_if_due().unwrap());
    }
}
