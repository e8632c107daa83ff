//! The live append-only log
//!
//! Owns the writer and the state of an ongoing compaction. A background
//! rewrite is fed chunks of a keyspace capture taken from the moment it
//! started; every record appended meanwhile is also kept in a tail buffer
//! that is copied into the new file before it replaces the old one.

use super::rewrite::{install, temp_path, write_snapshot, write_snapshot_stream, Feed};
use super::{AofConfig, AofError, AofRecord, AofWriter, SyncPolicy};
use crate::store::SnapshotEntry;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, oneshot};
use tokio::sync::oneshot::error::TryRecvError;
use tracing::{info, warn};

struct RewriteJob {
    temp: PathBuf,
    tail: Vec<u8>,
    /// Dropped once the capture is complete
    feed: Option<mpsc::UnboundedSender<Feed>>,
    done: oneshot::Receiver<io::Result<u64>>,
    started: Instant,
}

/// Persistence figures reported by INFO
#[derive(Debug, Clone, Copy, Default)]
pub struct AofStatus {
    pub current_size: u64,
    pub base_size: u64,
    pub rewrite_in_progress: bool,
    pub last_rewrite_ok: bool,
    pub last_write_ok: bool,
    pub rewrites: u64,
    /// Unix seconds of the last successful rewrite (or of startup)
    pub last_save: u64,
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// The append-only log of a running server
pub struct AppendOnlyLog {
    path: PathBuf,
    policy: SyncPolicy,
    writer: AofWriter,
    /// Size right after the last rewrite, the reference for auto rewrites
    base_size: u64,
    rewrite: Option<RewriteJob>,
    status: AofStatus,
}

impl AppendOnlyLog {
    /// Open the log for appending
    pub fn open(config: &AofConfig) -> io::Result<Self> {
        let writer = AofWriter::open(&config.path, config.sync_policy)?;
        let base_size = writer.size();
        info!("AOF writer initialized at {:?}", config.path);
        Ok(AppendOnlyLog {
            path: config.path.clone(),
            policy: config.sync_policy,
            writer,
            base_size,
            rewrite: None,
            status: AofStatus {
                last_rewrite_ok: true,
                last_write_ok: true,
                last_save: unix_secs(),
                ..AofStatus::default()
            },
        })
    }

    /// Append records, in order
    pub fn append(&mut self, records: &[AofRecord]) -> io::Result<()> {
        let mut buf = Vec::new();
        for record in records {
            record.encode(&mut buf)?;
        }
        let result = self.writer.append(&buf);
        self.status.last_write_ok = result.is_ok();
        if result.is_ok() {
            if let Some(job) = self.rewrite.as_mut() {
                job.tail.extend_from_slice(&buf);
            }
        }
        result
    }

    /// Fsync on the every-second schedule
    pub fn sync_if_due(&mut self) -> io::Result<bool> {
        self.writer.sync_if_due()
    }

    /// Flush and fsync everything (shutdown)
    pub fn flush_all(&mut self) -> io::Result<()> {
        self.writer.flush_all()
    }

    pub fn sync_policy(&self) -> SyncPolicy {
        self.policy
    }

    pub fn size(&self) -> u64 {
        self.writer.size()
    }

    pub fn rewrite_in_progress(&self) -> bool {
        self.rewrite.is_some()
    }

    pub fn status(&self) -> AofStatus {
        AofStatus {
            current_size: self.writer.size(),
            base_size: self.base_size,
            rewrite_in_progress: self.rewrite.is_some(),
            ..self.status
        }
    }

    /// Whether the log grew enough since the last rewrite to compact it
    pub fn should_auto_rewrite(&self, percentage: u64, min_size: u64) -> bool {
        if percentage == 0 || self.rewrite.is_some() {
            return false;
        }
        let size = self.writer.size();
        if size < min_size {
            return false;
        }
        let base = self.base_size.max(1);
        size.saturating_sub(base) * 100 / base >= percentage
    }

    /// Rewrite the log from a snapshot, blocking until done (SAVE)
    pub fn rewrite_now(&mut self, snapshot: Vec<SnapshotEntry>) -> Result<u64, AofError> {
        if self.rewrite.is_some() {
            return Err(AofError::RewriteInProgress);
        }
        let temp = temp_path(&self.path);
        let result = write_snapshot(&temp, &snapshot).and_then(|_| install(&temp, &self.path, &[]));
        self.complete(temp, result, Instant::now())
    }

    /// Start a blocking worker that writes the snapshot chunks passed to
    /// `feed_rewrite` (BGREWRITEAOF). The caller starts the capture in the
    /// same step, so the tail holds exactly the writes after it.
    pub fn start_rewrite(&mut self) -> Result<(), AofError> {
        if self.rewrite.is_some() {
            return Err(AofError::RewriteInProgress);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| AofError::NoRuntime)?;

        let temp = temp_path(&self.path);
        let (tx, done) = oneshot::channel();
        let (feed, chunks) = mpsc::unbounded_channel();
        let worker_temp = temp.clone();
        runtime.spawn_blocking(move || {
            let _ = tx.send(write_snapshot_stream(&worker_temp, chunks));
        });

        info!("Background AOF rewrite started");
        self.rewrite = Some(RewriteJob {
            temp,
            tail: Vec::new(),
            feed: Some(feed),
            done,
            started: Instant::now(),
        });
        Ok(())
    }

    /// Hand the next chunk of the capture to the rewrite worker
    pub fn feed_rewrite(&mut self, chunk: Vec<SnapshotEntry>, last: bool) {
        let Some(job) = self.rewrite.as_mut() else {
            return;
        };
        let Some(feed) = job.feed.as_ref() else {
            return;
        };
        // A worker that already stopped reports its error through `done`
        if !chunk.is_empty() {
            let _ = feed.send(Feed::Chunk(chunk));
        }
        if last {
            let _ = feed.send(Feed::Done);
            job.feed = None;
        }
    }

    /// Finish a background rewrite if its worker is done. Returns the
    /// outcome once, when the rewrite completes.
    pub fn poll_rewrite(&mut self) -> Option<Result<u64, AofError>> {
        let received = match self.rewrite.as_mut()?.done.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => Err(io::Error::new(
                io::ErrorKind::Other,
                "rewrite worker exited without a result",
            )),
        };
        let job = self.rewrite.take()?;
        let result = received.and_then(|_| install(&job.temp, &self.path, &job.tail));
        Some(self.complete(job.temp, result, job.started))
    }

    /// Reopen the writer on the new file, or clean up after a failure
    fn complete(&mut self, temp: PathBuf, result: io::Result<u64>, started: Instant) -> Result<u64, AofError> {
        match result {
            Ok(size) => {
                self.writer = AofWriter::open(&self.path, self.policy)?;
                self.base_size = size;
                self.status.last_rewrite_ok = true;
                self.status.rewrites += 1;
                self.status.last_save = unix_secs();
                info!(
                    "AOF rewrite finished: {} bytes in {:?}",
                    size,
                    started.elapsed()
                );
                Ok(size)
            }
            Err(e) => {
                let _ = fs::remove_file(&temp);
                self.status.last_rewrite_ok = false;
                warn!("AOF rewrite failed: {}", e);
                Err(AofError::Io(e))
            }
        }
    }

    /// Drop an in-flight rewrite (shutdown)
    pub fn abort_rewrite(&mut self) {
        if let Some(job) = self.rewrite.take() {
            let _ = fs::remove_file(&job.temp);
            warn!("Background AOF rewrite aborted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aof::AofReader;
    use crate::store::Value;
    use bytes::Bytes;
    use std::time::Duration;

    fn config(dir: &tempfile::TempDir) -> AofConfig {
        AofConfig {
            path: dir.path().join("log.aof"),
            sync_policy: SyncPolicy::No,
            enabled: true,
        }
    }

    fn set(key: &'static str) -> AofRecord {
        AofRecord::command(0, vec![Bytes::from("SET"), Bytes::from(key), Bytes::from("v")])
    }

    fn entry(key: &'static str) -> SnapshotEntry {
        SnapshotEntry {
            db: 0,
            key: Bytes::from(key),
            value: Value::string("v"),
            expire_at: None,
        }
    }

    #[test]
    fn test_rewrite_now_replaces_log() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let mut log = AppendOnlyLog::open(&config).unwrap();
        for _ in 0..10 {
            log.append(&[set("a")]).unwrap();
        }
        let before = log.size();

        log.rewrite_now(vec![entry("a")]).unwrap();
        assert!(log.size() < before);
        log.append(&[set("b")]).unwrap();

        let loaded = AofReader::load(&config.path).unwrap().parse().unwrap();
        assert_eq!(loaded.records.len(), 2);
        assert!(matches!(loaded.records[0], AofRecord::Snapshot(_)));
    }

    #[test]
    fn test_auto_rewrite_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = AppendOnlyLog::open(&config(&dir)).unwrap();
        log.append(&[set("a")]).unwrap();
        assert!(log.should_auto_rewrite(100, 0));
        assert!(!log.should_auto_rewrite(100, 1 << 20));
        assert!(!log.should_auto_rewrite(0, 0));
    }

    #[test]
    fn test_start_rewrite_needs_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = AppendOnlyLog::open(&config(&dir)).unwrap();
        assert!(matches!(log.start_rewrite(), Err(AofError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_background_rewrite_keeps_tail() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let mut log = AppendOnlyLog::open(&config).unwrap();
        log.append(&[set("old"), set("old")]).unwrap();

        log.start_rewrite().unwrap();
        assert!(matches!(log.start_rewrite(), Err(AofError::RewriteInProgress)));
        log.feed_rewrite(vec![entry("old")], false);
        log.append(&[set("during")]).unwrap();
        assert!(log.poll_rewrite().is_none());
        log.feed_rewrite(Vec::new(), true);

        let outcome = loop {
            if let Some(outcome) = log.poll_rewrite() {
                break outcome;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };
        outcome.unwrap();
        assert!(!log.rewrite_in_progress());
        log.append(&[set("after")]).unwrap();

        let loaded = AofReader::load(&config.path).unwrap().parse().unwrap();
        assert_eq!(loaded.records.len(), 3);
        match &loaded.records[1] {
            AofRecord::Command { argv, .. } => assert_eq!(argv[1], Bytes::from("during")),
            other => panic!("unexpected record {:?}", other),
        }
        assert_eq!(log.status().rewrites, 1);
    }

    #[tokio::test]
    async fn test_abandoned_feed_fails_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let mut log = AppendOnlyLog::open(&config).unwrap();
        log.append(&[set("a")]).unwrap();

        log.start_rewrite().unwrap();
        log.feed_rewrite(vec![entry("a")], false);
        // Dropping the sender without the final chunk stops the worker
        if let Some(job) = log.rewrite.as_mut() {
            job.feed = None;
        }

        let outcome = loop {
            if let Some(outcome) = log.poll_rewrite() {
                break outcome;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };
        assert!(outcome.is_err());
        assert!(!log.status().last_rewrite_ok);
        assert!(!temp_path(&config.path).exists());

        let loaded = AofReader::load(&config.path).unwrap().parse().unwrap();
        assert_eq!(loaded.records.len(), 1);
    }
}
