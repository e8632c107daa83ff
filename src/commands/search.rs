//! Search commands (KEYS)

use super::{Command, CommandContext, CommandResult};
use crate::protocol::RespValue;
use bytes::Bytes;

/// KEYS command - Find all keys matching a pattern
///
/// Syntax: KEYS pattern
///
/// Supported patterns:
/// - `*` : any run of bytes
/// - `?` : any single byte
/// - `[abc]`, `[a-z]`, `[^a]` : byte classes
/// - `\x` : the byte `x` literally
///
/// Walks the whole database.
pub struct KeysCommand;

impl Command for KeysCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let mut keys = ctx.keyspace()?.keys(&args[0]);
        keys.sort();
        Ok(RespValue::bulk_array(keys))
    }

    fn name(&self) -> &'static str {
        "KEYS"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::string::MSetCommand;
    use crate::commands::test_support::{bulks, Harness};

    #[test]
    fn test_keys_patterns() {
        let mut h = Harness::new();
        h.ok(&MSetCommand, "user:1 a user:2 b user:10 c session:1 d");

        assert_eq!(
            h.ok(&KeysCommand, "user:*"),
            bulks(&["user:1", "user:10", "user:2"])
        );
        assert_eq!(h.ok(&KeysCommand, "user:?"), bulks(&["user:1", "user:2"]));
        assert_eq!(h.ok(&KeysCommand, "*:1"), bulks(&["session:1", "user:1"]));
        assert_eq!(h.ok(&KeysCommand, "[su]*:1[0]"), bulks(&["user:10"]));
        assert_eq!(h.ok(&KeysCommand, "nothing*"), bulks(&[]));
    }
}
