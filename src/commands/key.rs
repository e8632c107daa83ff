//! Key commands (DEL, EXISTS, TYPE, RENAME, RANDOMKEY, FLUSHDB, FLUSHALL)

use super::{Command, CommandContext, CommandFlags, CommandResult};
use crate::protocol::RespValue;
use bytes::Bytes;

/// DEL command - Delete one or more keys
///
/// Syntax: DEL key [key ...]
pub struct DelCommand;

impl Command for DelCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let db = ctx.keyspace()?;
        let deleted = args.iter().filter(|key| db.delete(key)).count();
        Ok(RespValue::integer(deleted as i64))
    }

    fn name(&self) -> &'static str {
        "DEL"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }
}

/// EXISTS command - Check if one or more keys exist
///
/// Syntax: EXISTS key [key ...]
///
/// A key named twice is counted twice.
pub struct ExistsCommand;

impl Command for ExistsCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let db = ctx.keyspace()?;
        let count = args.iter().filter(|key| db.exists(key)).count();
        Ok(RespValue::integer(count as i64))
    }

    fn name(&self) -> &'static str {
        "EXISTS"
    }

    fn min_args(&self) -> usize {
        1
    }
}

/// TYPE command - Type of the value stored at a key
///
/// Syntax: TYPE key
pub struct TypeCommand;

impl Command for TypeCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let name = ctx.keyspace()?.value_type(&args[0]).unwrap_or("none");
        Ok(RespValue::simple_string(name))
    }

    fn name(&self) -> &'static str {
        "TYPE"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
}

/// RENAME command - Rename a key, overwriting the destination
///
/// Syntax: RENAME key newkey
pub struct RenameCommand;

impl Command for RenameCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        ctx.keyspace()?.rename(&args[0], args[1].clone())?;
        Ok(RespValue::ok())
    }

    fn name(&self) -> &'static str {
        "RENAME"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }
}

/// RANDOMKEY command - A random key of the selected database
///
/// Syntax: RANDOMKEY
pub struct RandomKeyCommand;

impl Command for RandomKeyCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, _args: &[Bytes]) -> CommandResult {
        let key = ctx.keyspace()?.random_key(&mut rand::thread_rng());
        Ok(RespValue::optional_bulk(key))
    }

    fn name(&self) -> &'static str {
        "RANDOMKEY"
    }

    fn max_args(&self) -> Option<usize> {
        Some(0)
    }
}

/// FLUSHDB command - Remove all keys from the current database
///
/// Syntax: FLUSHDB
pub struct FlushDbCommand;

impl Command for FlushDbCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, _args: &[Bytes]) -> CommandResult {
        ctx.keyspace()?.clear();
        Ok(RespValue::ok())
    }

    fn name(&self) -> &'static str {
        "FLUSHDB"
    }

    fn max_args(&self) -> Option<usize> {
        Some(0)
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }
}

/// FLUSHALL command - Remove all keys from every database
///
/// Syntax: FLUSHALL
pub struct FlushAllCommand;

impl Command for FlushAllCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, _args: &[Bytes]) -> CommandResult {
        ctx.store.flush_all();
        Ok(RespValue::ok())
    }

    fn name(&self) -> &'static str {
        "FLUSHALL"
    }

    fn max_args(&self) -> Option<usize> {
        Some(0)
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }
}
