//! Hash commands (HSET, HGET, HMGET, HDEL, HGETALL, HKEYS, HVALS, HLEN,
//! HEXISTS, HINCRBY, HINCRBYFLOAT)

use super::{pairs, parse_float, parse_int, Command, CommandContext, CommandFlags, CommandResult};
use crate::protocol::RespValue;
use bytes::Bytes;

const WRITE_DENY_OOM: CommandFlags = CommandFlags::WRITE.union(CommandFlags::DENY_OOM);

/// HSET command - Set one or more fields of a hash
///
/// Syntax: HSET key field value [field value ...]
///
/// Returns the number of fields that were added.
pub struct HSetCommand;

impl Command for HSetCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let fields = pairs(self.name(), &args[1..])?;
        let added = ctx.keyspace()?.hash_set(&args[0], &fields)?;
        Ok(RespValue::integer(added as i64))
    }

    fn name(&self) -> &'static str {
        "HSET"
    }

    fn min_args(&self) -> usize {
        3
    }

    fn flags(&self) -> CommandFlags {
        WRITE_DENY_OOM
    }
}

/// HGET command - Get the value of a hash field
///
/// Syntax: HGET key field
pub struct HGetCommand;

impl Command for HGetCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let value = ctx.keyspace()?.hash_get(&args[0], &args[1])?;
        Ok(RespValue::optional_bulk(value))
    }

    fn name(&self) -> &'static str {
        "HGET"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }
}

/// HMGET command - Get the values of several hash fields
///
/// Syntax: HMGET key field [field ...]
pub struct HMGetCommand;

impl Command for HMGetCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let values = ctx.keyspace()?.hash_mget(&args[0], &args[1..])?;
        Ok(RespValue::array(
            values.into_iter().map(RespValue::optional_bulk).collect(),
        ))
    }

    fn name(&self) -> &'static str {
        "HMGET"
    }

    fn min_args(&self) -> usize {
        2
    }
}

/// HDEL command - Delete one or more hash fields
///
/// Syntax: HDEL key field [field ...]
pub struct HDelCommand;

impl Command for HDelCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let removed = ctx.keyspace()?.hash_del(&args[0], &args[1..])?;
        Ok(RespValue::integer(removed as i64))
    }

    fn name(&self) -> &'static str {
        "HDEL"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }
}

/// HGETALL command - Get all fields and values of a hash
///
/// Syntax: HGETALL key
pub struct HGetAllCommand;

impl Command for HGetAllCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let pairs = ctx.keyspace()?.hash_getall(&args[0])?;
        Ok(RespValue::bulk_array(
            pairs.into_iter().flat_map(|(field, value)| [field, value]),
        ))
    }

    fn name(&self) -> &'static str {
        "HGETALL"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
}

/// HKEYS command - Get all field names of a hash
///
/// Syntax: HKEYS key
pub struct HKeysCommand;

impl Command for HKeysCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let fields = ctx.keyspace()?.hash_keys(&args[0])?;
        Ok(RespValue::bulk_array(fields))
    }

    fn name(&self) -> &'static str {
        "HKEYS"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
}

/// HVALS command - Get all values of a hash
///
/// Syntax: HVALS key
pub struct HValsCommand;

impl Command for HValsCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let values = ctx.keyspace()?.hash_vals(&args[0])?;
        Ok(RespValue::bulk_array(values))
    }

    fn name(&self) -> &'static str {
        "HVALS"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
}

/// HLEN command - Number of fields in a hash
///
/// Syntax: HLEN key
pub struct HLenCommand;

impl Command for HLenCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let len = ctx.keyspace()?.hash_len(&args[0])?;
        Ok(RespValue::integer(len as i64))
    }

    fn name(&self) -> &'static str {
        "HLEN"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
}

/// HEXISTS command - Check if a hash field exists
///
/// Syntax: HEXISTS key field
pub struct HExistsCommand;

impl Command for HExistsCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let found = ctx.keyspace()?.hash_exists(&args[0], &args[1])?;
        Ok(RespValue::integer(found as i64))
    }

    fn name(&self) -> &'static str {
        "HEXISTS"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }
}

/// HINCRBY command - Increment the integer value of a hash field
///
/// Syntax: HINCRBY key field increment
pub struct HIncrByCommand;

impl Command for HIncrByCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let increment = parse_int(&args[2])?;
        let value = ctx.keyspace()?.hash_incr_by(&args[0], &args[1], increment)?;
        Ok(RespValue::integer(value))
    }

    fn name(&self) -> &'static str {
        "HINCRBY"
    }

    fn min_args(&self) -> usize {
        3
    }

    fn max_args(&self) -> Option<usize> {
        Some(3)
    }

    fn flags(&self) -> CommandFlags {
        WRITE_DENY_OOM
    }
}

/// HINCRBYFLOAT command - Increment the numeric value of a hash field by a float
///
/// Syntax: HINCRBYFLOAT key field increment
///
/// Logged as HSET of the resulting value.
pub struct HIncrByFloatCommand;

impl Command for HIncrByFloatCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let increment = parse_float(&args[2])?;
        let value = ctx
            .keyspace()?
            .hash_incr_by_float(&args[0], &args[1], increment)?;
        ctx.propagate(vec![
            Bytes::from_static(b"HSET"),
            args[0].clone(),
            args[1].clone(),
            value.clone(),
        ]);
        Ok(RespValue::bulk_string(value))
    }

    fn name(&self) -> &'static str {
        "HINCRBYFLOAT"
    }

    fn min_args(&self) -> usize {
        3
    }

    fn max_args(&self) -> Option<usize> {
        Some(3)
    }

    fn flags(&self) -> CommandFlags {
        WRITE_DENY_OOM
    }
}
