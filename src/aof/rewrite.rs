//! AOF compaction
//!
//! Writes a snapshot of the keyspace as a fresh log file. Runs either on a
//! blocking worker thread fed with chunks of a running capture
//! (BGREWRITEAOF), or inline from a complete snapshot (SAVE).

use super::entry::{encode_snapshot, SNAPSHOT_PART_LEN};
use crate::store::SnapshotEntry;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

/// Snapshot entries encoded per write call
const CHUNK_ENTRIES: usize = 1024;

/// What the engine sends to a rewrite worker
#[derive(Debug)]
pub enum Feed {
    /// More captured entries
    Chunk(Vec<SnapshotEntry>),
    /// The capture is complete
    Done,
}

/// Temp file a rewrite of `path` is staged in
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".rewrite-{}.tmp", std::process::id()));
    path.with_file_name(name)
}

/// A snapshot file being written
struct SnapshotFile {
    out: BufWriter<File>,
    chunk: Vec<u8>,
    size: u64,
    entries: usize,
}

impl SnapshotFile {
    fn create(path: &Path) -> io::Result<Self> {
        Ok(SnapshotFile {
            out: BufWriter::new(File::create(path)?),
            chunk: Vec::new(),
            size: 0,
            entries: 0,
        })
    }

    fn write(&mut self, entries: &[SnapshotEntry]) -> io::Result<()> {
        for batch in entries.chunks(CHUNK_ENTRIES) {
            self.chunk.clear();
            for entry in batch {
                encode_snapshot(&mut self.chunk, entry, SNAPSHOT_PART_LEN)?;
            }
            self.out.write_all(&self.chunk)?;
            self.size += self.chunk.len() as u64;
        }
        self.entries += entries.len();
        Ok(())
    }

    /// Flush and fsync, returning the file size
    fn finish(self, path: &Path) -> io::Result<u64> {
        let file = self.out.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        debug!("Wrote {} snapshot entries ({} bytes) to {:?}", self.entries, self.size, path);
        Ok(self.size)
    }
}

/// Write `entries` as snapshot records into a new file at `path`.
/// Returns the file size. The file is fsynced before returning.
pub fn write_snapshot(path: &Path, entries: &[SnapshotEntry]) -> io::Result<u64> {
    let mut file = SnapshotFile::create(path)?;
    file.write(entries)?;
    file.finish(path)
}

/// Write snapshot records into a new file at `path` as chunks arrive on
/// `feed`, until `Feed::Done`. Blocks the calling thread.
pub fn write_snapshot_stream(path: &Path, mut feed: UnboundedReceiver<Feed>) -> io::Result<u64> {
    let mut file = SnapshotFile::create(path)?;
    loop {
        match feed.blocking_recv() {
            Some(Feed::Chunk(entries)) => file.write(&entries)?,
            Some(Feed::Done) => return file.finish(path),
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::Interrupted,
                    "rewrite feed closed before the snapshot was complete",
                ))
            }
        }
    }
}

/// Append the records buffered during a rewrite and move the new file into
/// place over `live`
pub fn install(temp: &Path, live: &Path, tail: &[u8]) -> io::Result<u64> {
    let mut file = fs::OpenOptions::new().append(true).open(temp)?;
    file.write_all(tail)?;
    file.sync_all()?;
    let size = file.metadata()?.len();
    drop(file);
    fs::rename(temp, live)?;
    Ok(size)
}
