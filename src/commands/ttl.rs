//! TTL commands (EXPIRE, PEXPIRE, EXPIREAT, PEXPIREAT, TTL, PTTL, PERSIST)
//!
//! Relative deadlines are resolved against the wall clock when the command
//! runs and logged as PEXPIREAT, so replaying the log later arms the same
//! absolute deadline.

use super::{parse_int, Command, CommandContext, CommandError, CommandFlags, CommandResult};
use crate::protocol::RespValue;
use crate::store::now_ms;
use bytes::Bytes;

/// Turn a TTL argument into an absolute deadline in unix milliseconds.
/// Deadlines before the epoch clamp to 0, which is always in the past.
pub(crate) fn to_deadline(
    amount: i64,
    unit_ms: i64,
    relative: bool,
    command: &str,
) -> Result<u64, CommandError> {
    let invalid = || CommandError::InvalidExpireTime(command.to_ascii_lowercase());
    let ms = amount.checked_mul(unit_ms).ok_or_else(invalid)?;
    let deadline = if relative {
        ms.checked_add(now_ms() as i64).ok_or_else(invalid)?
    } else {
        ms
    };
    Ok(deadline.max(0) as u64)
}

/// EXPIRE family - Set a key's time to live
///
/// Syntax: EXPIRE key seconds | PEXPIRE key milliseconds |
/// EXPIREAT key unix-seconds | PEXPIREAT key unix-milliseconds
pub struct ExpireCommand {
    name: &'static str,
    unit_ms: i64,
    relative: bool,
}

impl ExpireCommand {
    pub const EXPIRE: ExpireCommand = ExpireCommand { name: "EXPIRE", unit_ms: 1000, relative: true };
    pub const PEXPIRE: ExpireCommand = ExpireCommand { name: "PEXPIRE", unit_ms: 1, relative: true };
    pub const EXPIREAT: ExpireCommand = ExpireCommand { name: "EXPIREAT", unit_ms: 1000, relative: false };
    pub const PEXPIREAT: ExpireCommand = ExpireCommand { name: "PEXPIREAT", unit_ms: 1, relative: false };
}

impl Command for ExpireCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let key = &args[0];
        let amount = parse_int(&args[1])?;
        let deadline = to_deadline(amount, self.unit_ms, self.relative, self.name)?;

        let expired_now = deadline <= now_ms();
        if !ctx.keyspace()?.expire_at(key, deadline) {
            return Ok(RespValue::integer(0));
        }

        if expired_now {
            ctx.propagate(vec![Bytes::from_static(b"DEL"), key.clone()]);
        } else {
            ctx.propagate(vec![
                Bytes::from_static(b"PEXPIREAT"),
                key.clone(),
                Bytes::from(deadline.to_string()),
            ]);
        }
        Ok(RespValue::integer(1))
    }

    fn name(&self) -> &'static str {
        self.name
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

/// TTL / PTTL - Remaining time to live of a key
///
/// Syntax: TTL key
pub struct TtlCommand {
    name: &'static str,
    millis: bool,
}

impl TtlCommand {
    pub const SECONDS: TtlCommand = TtlCommand { name: "TTL", millis: false };
    pub const MILLIS: TtlCommand = TtlCommand { name: "PTTL", millis: true };
}

impl Command for TtlCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let ttl = ctx.keyspace()?.ttl(&args[0]);
        let reply = if self.millis { ttl.as_millis() } else { ttl.as_secs() };
        Ok(RespValue::integer(reply))
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
}

/// PERSIST command - Remove the expiration from a key
///
/// Syntax: PERSIST key
pub struct PersistCommand;

impl Command for PersistCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let removed = ctx.keyspace()?.persist(&args[0]);
        Ok(RespValue::integer(removed as i64))
    }

    fn name(&self) -> &'static str {
        "PERSIST"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }
}
