//! String commands (GET, SET, SETNX, SETEX, PSETEX, GETDEL, MGET, MSET,
//! APPEND, STRLEN)

use super::ttl::to_deadline;
use super::{
    eq_ignore_case, pairs, parse_int, Command, CommandContext, CommandError, CommandFlags,
    CommandResult,
};
use crate::protocol::RespValue;
use crate::store::Value;
use bytes::Bytes;

const WRITE_DENY_OOM: CommandFlags = CommandFlags::WRITE.union(CommandFlags::DENY_OOM);

/// How SET treats the key's deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expiry {
    /// Clear any deadline
    Clear,
    /// Keep the current deadline
    Keep,
    /// Arm an absolute deadline (unix ms)
    At(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Condition {
    Always,
    IfMissing,
    IfExists,
}

/// Store `value` under `key` and log it with an absolute deadline
fn store_string(ctx: &mut CommandContext<'_>, key: &Bytes, value: &Bytes, expiry: Expiry) -> Result<(), CommandError> {
    let db = ctx.keyspace()?;
    let mut logged = vec![Bytes::from_static(b"SET"), key.clone(), value.clone()];
    match expiry {
        Expiry::Clear => db.set(key.clone(), Value::String(value.clone()), None),
        Expiry::Keep => {
            db.set_keep_ttl(key.clone(), Value::String(value.clone()));
            logged.push(Bytes::from_static(b"KEEPTTL"));
        }
        Expiry::At(deadline) => {
            db.set(key.clone(), Value::String(value.clone()), Some(deadline));
            logged.push(Bytes::from_static(b"PXAT"));
            logged.push(Bytes::from(deadline.to_string()));
        }
    }
    ctx.propagate(logged);
    Ok(())
}

/// SET command - Set a key to a value
///
/// Syntax: SET key value [NX | XX] [GET] [EX seconds | PX milliseconds |
/// EXAT unix-seconds | PXAT unix-milliseconds | KEEPTTL]
pub struct SetCommand;

impl Command for SetCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let key = &args[0];
        let value = &args[1];

        let mut condition = Condition::Always;
        let mut expiry = Expiry::Clear;
        let mut get = false;
        let mut expiry_set = false;

        let mut i = 2;
        while i < args.len() {
            let opt = &args[i];
            if eq_ignore_case(opt, "NX") && condition == Condition::Always {
                condition = Condition::IfMissing;
            } else if eq_ignore_case(opt, "XX") && condition == Condition::Always {
                condition = Condition::IfExists;
            } else if eq_ignore_case(opt, "GET") {
                get = true;
            } else if eq_ignore_case(opt, "KEEPTTL") && !expiry_set {
                expiry = Expiry::Keep;
                expiry_set = true;
            } else if !expiry_set && i + 1 < args.len() {
                let (unit_ms, relative) = if eq_ignore_case(opt, "EX") {
                    (1000, true)
                } else if eq_ignore_case(opt, "PX") {
                    (1, true)
                } else if eq_ignore_case(opt, "EXAT") {
                    (1000, false)
                } else if eq_ignore_case(opt, "PXAT") {
                    (1, false)
                } else {
                    return Err(CommandError::Syntax);
                };
                let amount = parse_int(&args[i + 1])?;
                if amount <= 0 {
                    return Err(CommandError::InvalidExpireTime("set".to_string()));
                }
                expiry = Expiry::At(to_deadline(amount, unit_ms, relative, "set")?);
                expiry_set = true;
                i += 1;
            } else {
                return Err(CommandError::Syntax);
            }
            i += 1;
        }

        let db = ctx.keyspace()?;
        let previous = if get { db.get_string(key)? } else { None };
        let exists = match condition {
            Condition::Always => false,
            _ => db.exists(key),
        };
        let skip = match condition {
            Condition::Always => false,
            Condition::IfMissing => exists,
            Condition::IfExists => !exists,
        };

        if !skip {
            store_string(ctx, key, value, expiry)?;
        }

        if get {
            Ok(RespValue::optional_bulk(previous))
        } else if skip {
            Ok(RespValue::null())
        } else {
            Ok(RespValue::ok())
        }
    }

    fn name(&self) -> &'static str {
        "SET"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn flags(&self) -> CommandFlags {
        WRITE_DENY_OOM
    }
}

/// SETNX command - Set a key only if it does not exist
///
/// Syntax: SETNX key value
pub struct SetNxCommand;

impl Command for SetNxCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let db = ctx.keyspace()?;
        if db.exists(&args[0]) {
            return Ok(RespValue::integer(0));
        }
        db.set(args[0].clone(), Value::String(args[1].clone()), None);
        Ok(RespValue::integer(1))
    }

    fn name(&self) -> &'static str {
        "SETNX"
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

/// SETEX / PSETEX - Set a key with a relative expiry
///
/// Syntax: SETEX key seconds value
pub struct SetExCommand {
    name: &'static str,
    unit_ms: i64,
}

impl SetExCommand {
    pub const SECONDS: SetExCommand = SetExCommand { name: "SETEX", unit_ms: 1000 };
    pub const MILLIS: SetExCommand = SetExCommand { name: "PSETEX", unit_ms: 1 };
}

impl Command for SetExCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let amount = parse_int(&args[1])?;
        if amount <= 0 {
            return Err(CommandError::InvalidExpireTime(self.name.to_ascii_lowercase()));
        }
        let deadline = to_deadline(amount, self.unit_ms, true, self.name)?;
        store_string(ctx, &args[0], &args[2], Expiry::At(deadline))?;
        Ok(RespValue::ok())
    }

    fn name(&self) -> &'static str {
        self.name
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

/// GET command - Get the value of a key
///
/// Syntax: GET key
pub struct GetCommand;

impl Command for GetCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let value = ctx.keyspace()?.get_string(&args[0])?;
        Ok(RespValue::optional_bulk(value))
    }

    fn name(&self) -> &'static str {
        "GET"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
}

/// GETDEL command - Get the value of a key and delete it
///
/// Syntax: GETDEL key
pub struct GetDelCommand;

impl Command for GetDelCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let value = ctx.keyspace()?.getdel(&args[0])?;
        if value.is_some() {
            ctx.propagate(vec![Bytes::from_static(b"DEL"), args[0].clone()]);
        }
        Ok(RespValue::optional_bulk(value))
    }

    fn name(&self) -> &'static str {
        "GETDEL"
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

/// MGET command - Get the values of several keys
///
/// Syntax: MGET key [key ...]
///
/// Keys holding other types read as nil.
pub struct MGetCommand;

impl Command for MGetCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let db = ctx.keyspace()?;
        let values = args
            .iter()
            .map(|key| match db.get(key) {
                Some(Value::String(s)) => RespValue::bulk_string(s.clone()),
                _ => RespValue::null(),
            })
            .collect();
        Ok(RespValue::array(values))
    }

    fn name(&self) -> &'static str {
        "MGET"
    }

    fn min_args(&self) -> usize {
        1
    }
}

/// MSET command - Set several keys at once
///
/// Syntax: MSET key value [key value ...]
pub struct MSetCommand;

impl Command for MSetCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let pairs = pairs(self.name(), args)?;
        let db = ctx.keyspace()?;
        for (key, value) in pairs {
            db.set(key, Value::String(value), None);
        }
        Ok(RespValue::ok())
    }

    fn name(&self) -> &'static str {
        "MSET"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn flags(&self) -> CommandFlags {
        WRITE_DENY_OOM
    }
}

/// APPEND command - Append to a string value
///
/// Syntax: APPEND key value
pub struct AppendCommand;

impl Command for AppendCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let len = ctx.keyspace()?.append(&args[0], &args[1])?;
        Ok(RespValue::integer(len as i64))
    }

    fn name(&self) -> &'static str {
        "APPEND"
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

/// STRLEN command - Length of a string value
///
/// Syntax: STRLEN key
pub struct StrLenCommand;

impl Command for StrLenCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let len = ctx.keyspace()?.strlen(&args[0])?;
        Ok(RespValue::integer(len as i64))
    }

    fn name(&self) -> &'static str {
        "STRLEN"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
}
