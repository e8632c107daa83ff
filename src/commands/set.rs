//! Set commands (SADD, SREM, SMEMBERS, SISMEMBER, SCARD, SPOP, SINTER,
//! SUNION, SDIFF)

use super::{parse_count, Command, CommandContext, CommandFlags, CommandResult};
use crate::protocol::RespValue;
use crate::store::MemoryStore;
use crate::error::StoreResult;
use bytes::Bytes;

/// SADD command - Add members to a set
///
/// Syntax: SADD key member [member ...]
pub struct SAddCommand;

impl Command for SAddCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let added = ctx.keyspace()?.set_add(&args[0], &args[1..])?;
        Ok(RespValue::integer(added as i64))
    }

    fn name(&self) -> &'static str {
        "SADD"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE | CommandFlags::DENY_OOM
    }
}

/// SREM command - Remove members from a set
///
/// Syntax: SREM key member [member ...]
pub struct SRemCommand;

impl Command for SRemCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let removed = ctx.keyspace()?.set_remove(&args[0], &args[1..])?;
        Ok(RespValue::integer(removed as i64))
    }

    fn name(&self) -> &'static str {
        "SREM"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }
}

/// SMEMBERS command - Get all members of a set
///
/// Syntax: SMEMBERS key
pub struct SMembersCommand;

impl Command for SMembersCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let members = ctx.keyspace()?.set_members(&args[0])?;
        Ok(RespValue::bulk_array(members))
    }

    fn name(&self) -> &'static str {
        "SMEMBERS"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
}

/// SISMEMBER command - Check if a value is a member of a set
///
/// Syntax: SISMEMBER key member
pub struct SIsMemberCommand;

impl Command for SIsMemberCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let found = ctx.keyspace()?.set_is_member(&args[0], &args[1])?;
        Ok(RespValue::integer(found as i64))
    }

    fn name(&self) -> &'static str {
        "SISMEMBER"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }
}

/// SCARD command - Get the number of members in a set
///
/// Syntax: SCARD key
pub struct SCardCommand;

impl Command for SCardCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let card = ctx.keyspace()?.set_card(&args[0])?;
        Ok(RespValue::integer(card as i64))
    }

    fn name(&self) -> &'static str {
        "SCARD"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
}

/// SPOP command - Remove and return random members
///
/// Syntax: SPOP key [count]
///
/// The members actually removed are logged as SREM.
pub struct SPopCommand;

impl Command for SPopCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let count = args.get(1).map(|c| parse_count(c)).transpose()?;
        let popped = ctx
            .keyspace()?
            .set_pop(&args[0], count.unwrap_or(1), &mut rand::thread_rng())?;

        let popped = match popped {
            Some(popped) => popped,
            None if count.is_some() => return Ok(RespValue::array(Vec::new())),
            None => return Ok(RespValue::null()),
        };

        if !popped.is_empty() {
            let mut logged = vec![Bytes::from_static(b"SREM"), args[0].clone()];
            logged.extend(popped.iter().cloned());
            ctx.propagate(logged);
        }

        Ok(match count {
            Some(_) => RespValue::bulk_array(popped),
            None => RespValue::optional_bulk(popped.into_iter().next()),
        })
    }

    fn name(&self) -> &'static str {
        "SPOP"
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

/// SINTER / SUNION / SDIFF - Set algebra over several keys
///
/// Syntax: SINTER key [key ...]
///
/// Missing keys count as empty sets.
pub struct SetAlgebraCommand {
    name: &'static str,
    op: fn(&mut MemoryStore, &[Bytes]) -> StoreResult<Vec<Bytes>>,
}

impl SetAlgebraCommand {
    pub const SINTER: SetAlgebraCommand = SetAlgebraCommand { name: "SINTER", op: MemoryStore::set_inter };
    pub const SUNION: SetAlgebraCommand = SetAlgebraCommand { name: "SUNION", op: MemoryStore::set_union };
    pub const SDIFF: SetAlgebraCommand = SetAlgebraCommand { name: "SDIFF", op: MemoryStore::set_diff };
}

impl Command for SetAlgebraCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let members = (self.op)(ctx.keyspace()?, args)?;
        Ok(RespValue::bulk_array(members))
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn min_args(&self) -> usize {
        1
    }
}
