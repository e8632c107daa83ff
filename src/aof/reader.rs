//! AOF reader
//!
//! Loads the log file and splits it into records. A damaged record at the
//! very end of the file is the signature of a torn write and is cut off;
//! damage followed by more data is reported as corruption. A log that ends
//! inside a MULTI block lost the rest of that transaction to a torn write,
//! so the intact prefix stops at the MULTI.

use super::{AofError, AofRecord, DecodeError};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use tracing::{info, warn};

/// Records recovered from a log file
#[derive(Debug)]
pub struct LoadedLog {
    pub records: Vec<AofRecord>,
    /// Length of the intact prefix of the file
    pub valid_len: u64,
    /// Bytes past `valid_len` that belonged to a torn final record
    pub torn_bytes: u64,
}

/// AOF reader
pub struct AofReader {
    data: Vec<u8>,
}

impl AofReader {
    /// Load AOF file
    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let data = fs::read(path)?;
        Ok(AofReader { data })
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        AofReader { data }
    }

    /// Parse all records
    pub fn parse(&self) -> Result<LoadedLog, AofError> {
        let mut records = Vec::new();
        let mut pos = 0;
        // Offset and record index of a MULTI still waiting for its EXEC
        let mut open_multi: Option<(usize, usize)> = None;

        while pos < self.data.len() {
            match AofRecord::decode(&self.data[pos..]) {
                Ok((record, size)) => {
                    if record.is_marker("MULTI") {
                        open_multi = Some((pos, records.len()));
                    } else if record.is_marker("EXEC") {
                        open_multi = None;
                    }
                    records.push(record);
                    pos += size;
                }
                Err(DecodeError::Incomplete) => {
                    warn!("AOF ends with an incomplete record at offset {}", pos);
                    break;
                }
                Err(DecodeError::Corrupt { frame_len, reason }) => {
                    if pos + frame_len >= self.data.len() {
                        warn!("AOF final record at offset {} is damaged ({})", pos, reason);
                        break;
                    }
                    return Err(AofError::Corrupted {
                        offset: pos as u64,
                        reason,
                    });
                }
            }
        }

        if let Some((offset, index)) = open_multi {
            warn!(
                "AOF ends inside a transaction opened at offset {}, dropping {} records",
                offset,
                records.len() - index
            );
            records.truncate(index);
            pos = offset;
        }

        info!("AOF parsed: {} records", records.len());
        Ok(LoadedLog {
            records,
            valid_len: pos as u64,
            torn_bytes: (self.data.len() - pos) as u64,
        })
    }

    /// Get the total size of the AOF data
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Cut the file back to its intact prefix
    pub fn truncate<P: AsRef<Path>>(path: P, valid_len: u64) -> io::Result<()> {
        let file = OpenOptions::new().write(true).open(path)?;
        file.set_len(valid_len)?;
        file.sync_all()
    }
}
