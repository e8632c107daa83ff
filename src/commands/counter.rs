//! Counter commands (INCR, INCRBY, DECR, DECRBY, INCRBYFLOAT)

use super::{parse_float, parse_int, Command, CommandContext, CommandError, CommandFlags, CommandResult};
use crate::error::StoreError;
use crate::protocol::RespValue;
use bytes::Bytes;

const WRITE_DENY_OOM: CommandFlags = CommandFlags::WRITE.union(CommandFlags::DENY_OOM);

fn incr(ctx: &mut CommandContext<'_>, key: &Bytes, delta: i64) -> CommandResult {
    let value = ctx.keyspace()?.incr_by(key, delta)?;
    Ok(RespValue::integer(value))
}

/// INCR command - Increment the integer value of a key by 1
///
/// Syntax: INCR key
pub struct IncrCommand;

impl Command for IncrCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        incr(ctx, &args[0], 1)
    }

    fn name(&self) -> &'static str {
        "INCR"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }

    fn flags(&self) -> CommandFlags {
        WRITE_DENY_OOM
    }
}

/// DECR command - Decrement the integer value of a key by 1
///
/// Syntax: DECR key
pub struct DecrCommand;

impl Command for DecrCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        incr(ctx, &args[0], -1)
    }

    fn name(&self) -> &'static str {
        "DECR"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }

    fn flags(&self) -> CommandFlags {
        WRITE_DENY_OOM
    }
}

/// INCRBY command - Increment the integer value of a key by the given amount
///
/// Syntax: INCRBY key increment
pub struct IncrByCommand;

impl Command for IncrByCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let increment = parse_int(&args[1])?;
        incr(ctx, &args[0], increment)
    }

    fn name(&self) -> &'static str {
        "INCRBY"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }

    fn flags(&self) -> CommandFlags {
        WRITE_DENY_OOM
    }
}

/// DECRBY command - Decrement the integer value of a key by the given amount
///
/// Syntax: DECRBY key decrement
pub struct DecrByCommand;

impl Command for DecrByCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let decrement = parse_int(&args[1])?;
        // -i64::MIN does not exist
        let delta = decrement
            .checked_neg()
            .ok_or(CommandError::Store(StoreError::Overflow))?;
        incr(ctx, &args[0], delta)
    }

    fn name(&self) -> &'static str {
        "DECRBY"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }

    fn flags(&self) -> CommandFlags {
        WRITE_DENY_OOM
    }
}

/// INCRBYFLOAT command - Increment the numeric value of a key by a float
///
/// Syntax: INCRBYFLOAT key increment
///
/// Logged as `SET key result KEEPTTL` so replay does not depend on float
/// formatting of intermediate results.
pub struct IncrByFloatCommand;

impl Command for IncrByFloatCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let increment = parse_float(&args[1])?;
        let value = ctx.keyspace()?.incr_by_float(&args[0], increment)?;
        ctx.propagate(vec![
            Bytes::from_static(b"SET"),
            args[0].clone(),
            value.clone(),
            Bytes::from_static(b"KEEPTTL"),
        ]);
        Ok(RespValue::bulk_string(value))
    }

    fn name(&self) -> &'static str {
        "INCRBYFLOAT"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }

    fn flags(&self) -> CommandFlags {
        WRITE_DENY_OOM
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::string::{GetCommand, SetCommand};
    use crate::commands::test_support::{bulk, words, Harness};

    #[test]
    fn test_incr() {
        let mut h = Harness::new();
        assert_eq!(h.ok(&IncrCommand, "counter"), RespValue::integer(1));
        assert_eq!(h.ok(&IncrCommand, "counter"), RespValue::integer(2));
        assert_eq!(h.ok(&GetCommand, "counter"), bulk("2"));
    }

    #[test]
    fn test_incrby_decrby() {
        let mut h = Harness::new();
        assert_eq!(h.ok(&IncrByCommand, "counter 10"), RespValue::integer(10));
        assert_eq!(h.ok(&DecrByCommand, "counter 3"), RespValue::integer(7));
        assert_eq!(h.ok(&DecrCommand, "counter"), RespValue::integer(6));
        assert_eq!(h.ok(&IncrByCommand, "counter -10"), RespValue::integer(-4));
    }

    #[test]
    fn test_incr_non_integer() {
        let mut h = Harness::new();
        h.ok(&SetCommand, "k abc");
        assert_eq!(
            h.run(&IncrCommand, "k"),
            Err(CommandError::Store(StoreError::NotANumber))
        );
        assert_eq!(h.ok(&GetCommand, "k"), bulk("abc"));
        assert_eq!(h.run(&IncrByCommand, "k x"), Err(CommandError::InvalidInteger));
    }

    #[test]
    fn test_overflow() {
        let mut h = Harness::new();
        h.ok(&SetCommand, "k 9223372036854775807");
        assert_eq!(
            h.run(&IncrCommand, "k"),
            Err(CommandError::Store(StoreError::Overflow))
        );
        assert_eq!(
            h.run(&DecrByCommand, "k -9223372036854775808"),
            Err(CommandError::Store(StoreError::Overflow))
        );
        assert_eq!(h.ok(&GetCommand, "k"), bulk("9223372036854775807"));
    }

    #[test]
    fn test_incrbyfloat() {
        let mut h = Harness::new();
        h.ok(&SetCommand, "k 10.5");
        assert_eq!(h.ok(&IncrByFloatCommand, "k 0.1"), bulk("10.6"));
        assert_eq!(h.propagated, vec![words(&["SET", "k", "10.6", "KEEPTTL"])]);
        assert_eq!(h.ok(&IncrByFloatCommand, "n 5"), bulk("5"));
        assert_eq!(h.run(&IncrByFloatCommand, "k nan"), Err(CommandError::InvalidFloat));
    }
}
