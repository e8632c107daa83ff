//! List commands (LPUSH, RPUSH, LPUSHX, RPUSHX, LPOP, RPOP, LRANGE, LLEN,
//! LINDEX, LSET, LREM, LTRIM)

use super::{parse_count, parse_int, Command, CommandContext, CommandFlags, CommandResult};
use crate::protocol::RespValue;
use bytes::Bytes;

const WRITE_DENY_OOM: CommandFlags = CommandFlags::WRITE.union(CommandFlags::DENY_OOM);

/// LPUSH / RPUSH / LPUSHX / RPUSHX - Push values onto a list
///
/// Syntax: LPUSH key value [value ...]
///
/// The X variants only push when the list already exists.
pub struct PushCommand {
    name: &'static str,
    front: bool,
    create: bool,
}

impl PushCommand {
    pub const LPUSH: PushCommand = PushCommand { name: "LPUSH", front: true, create: true };
    pub const RPUSH: PushCommand = PushCommand { name: "RPUSH", front: false, create: true };
    pub const LPUSHX: PushCommand = PushCommand { name: "LPUSHX", front: true, create: false };
    pub const RPUSHX: PushCommand = PushCommand { name: "RPUSHX", front: false, create: false };
}

impl Command for PushCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let len = ctx
            .keyspace()?
            .list_push(&args[0], &args[1..], self.front, self.create)?;
        Ok(RespValue::integer(len as i64))
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn min_args(&self) -> usize {
        2
    }

    fn flags(&self) -> CommandFlags {
        WRITE_DENY_OOM
    }
}

/// LPOP / RPOP - Remove and return elements from one end of a list
///
/// Syntax: LPOP key [count]
pub struct PopCommand {
    name: &'static str,
    front: bool,
}

impl PopCommand {
    pub const LPOP: PopCommand = PopCommand { name: "LPOP", front: true };
    pub const RPOP: PopCommand = PopCommand { name: "RPOP", front: false };
}

impl Command for PopCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let count = args.get(1).map(|c| parse_count(c)).transpose()?;
        let popped = ctx
            .keyspace()?
            .list_pop(&args[0], self.front, count.unwrap_or(1))?;

        Ok(match (popped, count) {
            (None, None) => RespValue::null(),
            (None, Some(_)) => RespValue::NullArray,
            (Some(items), None) => RespValue::optional_bulk(items.into_iter().next()),
            (Some(items), Some(_)) => RespValue::bulk_array(items),
        })
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }
}

/// LRANGE command - Get a range of elements from a list
///
/// Syntax: LRANGE key start stop
///
/// Indices are inclusive; negative indices count from the tail.
pub struct LRangeCommand;

impl Command for LRangeCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let start = parse_int(&args[1])?;
        let stop = parse_int(&args[2])?;
        let items = ctx.keyspace()?.list_range(&args[0], start, stop)?;
        Ok(RespValue::bulk_array(items))
    }

    fn name(&self) -> &'static str {
        "LRANGE"
    }

    fn min_args(&self) -> usize {
        3
    }

    fn max_args(&self) -> Option<usize> {
        Some(3)
    }
}

/// LLEN command - Get the length of a list
///
/// Syntax: LLEN key
pub struct LLenCommand;

impl Command for LLenCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let len = ctx.keyspace()?.list_len(&args[0])?;
        Ok(RespValue::integer(len as i64))
    }

    fn name(&self) -> &'static str {
        "LLEN"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
}

/// LINDEX command - Get an element by index
///
/// Syntax: LINDEX key index
pub struct LIndexCommand;

impl Command for LIndexCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let index = parse_int(&args[1])?;
        let item = ctx.keyspace()?.list_index(&args[0], index)?;
        Ok(RespValue::optional_bulk(item))
    }

    fn name(&self) -> &'static str {
        "LINDEX"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }
}

/// LSET command - Set the element at an index
///
/// Syntax: LSET key index value
pub struct LSetCommand;

impl Command for LSetCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let index = parse_int(&args[1])?;
        ctx.keyspace()?.list_set(&args[0], index, args[2].clone())?;
        Ok(RespValue::ok())
    }

    fn name(&self) -> &'static str {
        "LSET"
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

/// LREM command - Remove elements equal to a value
///
/// Syntax: LREM key count value
pub struct LRemCommand;

impl Command for LRemCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let count = parse_int(&args[1])?;
        let removed = ctx.keyspace()?.list_remove(&args[0], count, &args[2])?;
        Ok(RespValue::integer(removed as i64))
    }

    fn name(&self) -> &'static str {
        "LREM"
    }

    fn min_args(&self) -> usize {
        3
    }

    fn max_args(&self) -> Option<usize> {
        Some(3)
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }
}

/// LTRIM command - Trim a list to a range
///
/// Syntax: LTRIM key start stop
pub struct LTrimCommand;

impl Command for LTrimCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let start = parse_int(&args[1])?;
        let stop = parse_int(&args[2])?;
        ctx.keyspace()?.list_trim(&args[0], start, stop)?;
        Ok(RespValue::ok())
    }

    fn name(&self) -> &'static str {
        "LTRIM"
    }

    fn min_args(&self) -> usize {
        3
    }

    fn max_args(&self) -> Option<usize> {
        Some(3)
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }
}
