//! AOF replay
//!
//! Feeds recovered records back into the server, in file order. Command
//! records go through normal command execution; snapshot entries are
//! restored directly. Records written between MULTI and EXEC are applied
//! only once the EXEC is seen.

use super::AofRecord;
use crate::store::{now_ms, SnapshotEntry};
use bytes::Bytes;
use tracing::{info, warn};

/// Something a log can be replayed into
pub trait ReplayTarget {
    /// Execute one logged command against database `db`
    fn apply_command(&mut self, db: usize, argv: &[Bytes]) -> Result<(), String>;

    /// Restore one snapshot entry
    fn restore(&mut self, entry: SnapshotEntry);

    /// Add the elements of a split value to the key restored just before
    fn restore_part(&mut self, entry: SnapshotEntry);
}

/// What a replay did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub commands: usize,
    pub restored: usize,
    /// Snapshot entries already past their deadline
    pub skipped_expired: usize,
    /// Commands that failed and were skipped
    pub failed: usize,
    /// Commands of a transaction the file ends in the middle of
    pub dropped: usize,
}

fn is_word(arg: Option<&Bytes>, word: &str) -> bool {
    arg.map_or(false, |a| a.eq_ignore_ascii_case(word.as_bytes()))
}

/// Replay records into a target
pub fn replay_records<T: ReplayTarget>(target: &mut T, records: Vec<AofRecord>) -> ReplayStats {
    let mut stats = ReplayStats::default();
    let mut transaction: Option<Vec<(usize, Vec<Bytes>)>> = None;
    let now = now_ms();

    for record in records {
        match record {
            AofRecord::Snapshot(entry) => {
                if matches!(entry.expire_at, Some(deadline) if deadline <= now) {
                    stats.skipped_expired += 1;
                    continue;
                }
                target.restore(entry);
                stats.restored += 1;
            }
            AofRecord::SnapshotPart(entry) => {
                // Parts carry the deadline of their head record
                if matches!(entry.expire_at, Some(deadline) if deadline <= now) {
                    continue;
                }
                target.restore_part(entry);
            }
            AofRecord::Command { db, argv, .. } => {
                let db = db as usize;
                if is_word(argv.first(), "MULTI") && argv.len() == 1 {
                    if transaction.is_some() {
                        warn!("Nested MULTI in AOF, discarding the open transaction");
                    }
                    transaction = Some(Vec::new());
                    continue;
                }
                if is_word(argv.first(), "EXEC") && argv.len() == 1 {
                    match transaction.take() {
                        Some(queued) => {
                            for (db, argv) in queued {
                                apply(target, db, &argv, &mut stats);
                            }
                        }
                        None => warn!("EXEC without MULTI in AOF, ignoring"),
                    }
                    continue;
                }
                match transaction.as_mut() {
                    Some(queued) => queued.push((db, argv)),
                    None => apply(target, db, &argv, &mut stats),
                }
            }
        }
    }

    if let Some(queued) = transaction {
        warn!(
            "AOF ends inside a transaction, dropping {} queued commands",
            queued.len()
        );
        stats.dropped = queued.len();
    }

    info!(
        "Replayed {} commands and {} snapshot entries from AOF",
        stats.commands, stats.restored
    );
    stats
}

fn apply<T: ReplayTarget>(target: &mut T, db: usize, argv: &[Bytes], stats: &mut ReplayStats) {
    match target.apply_command(db, argv) {
        Ok(()) => stats.commands += 1,
        Err(e) => {
            warn!("Failed to replay AOF command: {}. Skipping.", e);
            stats.failed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Value;

    #[derive(Default)]
    struct Recorder {
        applied: Vec<(usize, Vec<Bytes>)>,
        restored: Vec<Bytes>,
        parts: usize,
    }

    impl ReplayTarget for Recorder {
        fn apply_command(&mut self, db: usize, argv: &[Bytes]) -> Result<(), String> {
            if argv[0] == "FAIL" {
                return Err("boom".to_string());
            }
            self.applied.push((db, argv.to_vec()));
            Ok(())
        }

        fn restore(&mut self, entry: SnapshotEntry) {
            self.restored.push(entry.key);
        }

        fn restore_part(&mut self, entry: SnapshotEntry) {
            assert_eq!(self.restored.last(), Some(&entry.key));
            self.parts += 1;
        }
    }

    fn cmd(db: usize, argv: &[&'static str]) -> AofRecord {
        AofRecord::command(db, argv.iter().map(|a| Bytes::from_static(a.as_bytes())).collect())
    }

    fn snapshot(key: &'static str, expire_at: Option<u64>) -> AofRecord {
        AofRecord::Snapshot(SnapshotEntry {
            db: 0,
            key: Bytes::from(key),
            value: Value::string("v"),
            expire_at,
        })
    }

    #[test]
    fn test_snapshot_then_tail() {
        let mut target = Recorder::default();
        let records = vec![
            snapshot("live", None),
            snapshot("gone", Some(1)),
            cmd(2, &["SET", "k", "v"]),
            cmd(0, &["FAIL"]),
        ];
        let stats = replay_records(&mut target, records);

        assert_eq!(target.restored, vec![Bytes::from("live")]);
        assert_eq!(target.applied.len(), 1);
        assert_eq!(target.applied[0].0, 2);
        assert_eq!(
            stats,
            ReplayStats { commands: 1, restored: 1, skipped_expired: 1, failed: 1, dropped: 0 }
        );
    }

    #[test]
    fn test_transactions_apply_on_exec_only() {
        let mut target = Recorder::default();
        let records = vec![
            cmd(0, &["MULTI"]),
            cmd(0, &["INCR", "a"]),
            cmd(0, &["INCR", "b"]),
            cmd(0, &["EXEC"]),
            cmd(0, &["MULTI"]),
            cmd(0, &["INCR", "c"]),
        ];
        let stats = replay_records(&mut target, records);

        let keys: Vec<_> = target.applied.iter().map(|(_, argv)| argv[1].clone()).collect();
        assert_eq!(keys, vec![Bytes::from("a"), Bytes::from("b")]);
        assert_eq!(stats.dropped, 1);
    }

    #[test]
    fn test_parts_follow_their_head() {
        let mut target = Recorder::default();
        let part = |key: &'static str, expire_at| {
            AofRecord::SnapshotPart(SnapshotEntry {
                db: 0,
                key: Bytes::from(key),
                value: Value::string("v"),
                expire_at,
            })
        };
        let records = vec![
            snapshot("big", None),
            part("big", None),
            part("big", None),
            snapshot("old", Some(1)),
            part("old", Some(1)),
        ];
        let stats = replay_records(&mut target, records);

        assert_eq!(target.restored, vec![Bytes::from("big")]);
        assert_eq!(target.parts, 2);
        assert_eq!(stats.restored, 1);
        assert_eq!(stats.skipped_expired, 1);
    }
}
