//! Command execution module
//!
//! Provides a unified interface for all commands through the Command trait.
//! Commands are grouped by the kind of value they operate on, one file per
//! group.

mod context;
mod registry;

// Command implementations
mod admin;
mod connection;
mod counter;
mod hash;
mod key;
mod list;
mod search;
mod set;
mod string;
mod ttl;
mod zset;

pub use context::CommandContext;
pub use registry::CommandRegistry;

pub use crate::error::{CommandError, CommandResult};

use crate::store::{parse_f64, parse_i64};
use bytes::Bytes;
use std::ops::BitOr;

/// Properties the dispatcher checks before running a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandFlags(u8);

impl CommandFlags {
    pub const NONE: CommandFlags = CommandFlags(0);
    /// May modify the keyspace; logged when it does
    pub const WRITE: CommandFlags = CommandFlags(1);
    pub const READONLY: CommandFlags = CommandFlags(1 << 1);
    /// Server administration, never touches key contents
    pub const ADMIN: CommandFlags = CommandFlags(1 << 2);
    /// Rejected (after eviction) when memory is over the limit
    pub const DENY_OOM: CommandFlags = CommandFlags(1 << 3);
    /// Only affects the calling connection
    pub const CONNECTION: CommandFlags = CommandFlags(1 << 4);
    /// Refused inside MULTI
    pub const NO_MULTI: CommandFlags = CommandFlags(1 << 5);

    pub const fn union(self, other: CommandFlags) -> CommandFlags {
        CommandFlags(self.0 | other.0)
    }

    pub const fn contains(self, other: CommandFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Flag names as listed by COMMAND
    pub fn names(self) -> Vec<&'static str> {
        let all = [
            (CommandFlags::WRITE, "write"),
            (CommandFlags::READONLY, "readonly"),
            (CommandFlags::ADMIN, "admin"),
            (CommandFlags::DENY_OOM, "denyoom"),
            (CommandFlags::CONNECTION, "connection"),
            (CommandFlags::NO_MULTI, "no-multi"),
        ];
        all.iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl BitOr for CommandFlags {
    type Output = CommandFlags;

    fn bitor(self, rhs: CommandFlags) -> CommandFlags {
        self.union(rhs)
    }
}

/// Command execution trait
///
/// All commands implement this trait with a single execute method.
/// This provides loose coupling between command implementations and the dispatcher.
pub trait Command: Send + Sync {
    /// Execute the command with the given context and arguments
    ///
    /// Arguments:
    /// - ctx: the command context (databases, calling client, server state)
    /// - args: command arguments (excluding the command name itself)
    ///
    /// Returns the reply, or an error that is sent as an error reply
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult;

    /// Get the command name (for debugging/logging)
    fn name(&self) -> &'static str;

    /// Get the minimum number of arguments required
    fn min_args(&self) -> usize {
        0
    }

    /// Get the maximum number of arguments (None = unlimited)
    fn max_args(&self) -> Option<usize> {
        None
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::READONLY
    }

    /// Arity counting the command name: positive for an exact count,
    /// negative for a minimum
    fn arity(&self) -> i64 {
        let min = self.min_args() as i64 + 1;
        match self.max_args() {
            Some(max) if max == self.min_args() => min,
            _ => -min,
        }
    }

    /// Check the argument count against `min_args` / `max_args`
    fn check_arity(&self, args: &[Bytes]) -> Result<(), CommandError> {
        let too_many = self.max_args().map_or(false, |max| args.len() > max);
        if args.len() < self.min_args() || too_many {
            return Err(wrong_arity(self.name()));
        }
        Ok(())
    }
}

pub(crate) fn wrong_arity(name: &str) -> CommandError {
    CommandError::WrongArity(name.to_ascii_lowercase())
}

/// Parse an integer argument
pub(crate) fn parse_int(arg: &[u8]) -> Result<i64, CommandError> {
    parse_i64(arg).ok_or(CommandError::InvalidInteger)
}

/// Parse a non-negative integer argument (counts, offsets)
pub(crate) fn parse_count(arg: &[u8]) -> Result<usize, CommandError> {
    let value = parse_int(arg)?;
    usize::try_from(value).map_err(|_| CommandError::InvalidInteger)
}

/// Parse a float argument
pub(crate) fn parse_float(arg: &[u8]) -> Result<f64, CommandError> {
    parse_f64(arg).ok_or(CommandError::InvalidFloat)
}

/// Case-insensitive keyword comparison
pub(crate) fn eq_ignore_case(arg: &[u8], word: &str) -> bool {
    arg.eq_ignore_ascii_case(word.as_bytes())
}

/// Split `field value field value ...` style arguments into pairs
pub(crate) fn pairs(name: &str, args: &[Bytes]) -> Result<Vec<(Bytes, Bytes)>, CommandError> {
    if args.is_empty() || args.len() % 2 != 0 {
        return Err(wrong_arity(name));
    }
    Ok(args
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let flags = CommandFlags::WRITE | CommandFlags::DENY_OOM;
        assert!(flags.contains(CommandFlags::WRITE));
        assert!(!flags.contains(CommandFlags::ADMIN));
        assert_eq!(flags.names(), vec!["write", "denyoom"]);
    }

    #[test]
    fn test_argument_parsing() {
        assert_eq!(parse_int(b"-42").unwrap(), -42);
        assert_eq!(parse_int(b"4x"), Err(CommandError::InvalidInteger));
        assert_eq!(parse_count(b"-1"), Err(CommandError::InvalidInteger));
        assert_eq!(parse_float(b"1.5").unwrap(), 1.5);
        assert_eq!(parse_float(b"abc"), Err(CommandError::InvalidFloat));
        assert!(eq_ignore_case(b"ex", "EX"));
        assert!(pairs("mset", &test_support::words(&["a", "1", "b"])).is_err());
    }
}
