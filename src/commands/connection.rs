//! Connection commands (PING, ECHO, SELECT, QUIT, MULTI, EXEC, DISCARD)

use super::{parse_int, Command, CommandContext, CommandError, CommandFlags, CommandResult};
use crate::protocol::RespValue;
use bytes::Bytes;

const CONNECTION: CommandFlags = CommandFlags::CONNECTION;

/// PING command - Test the connection
///
/// Syntax: PING [message]
pub struct PingCommand;

impl Command for PingCommand {
    fn execute(&self, _ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        Ok(match args.first() {
            Some(message) => RespValue::bulk_string(message.clone()),
            None => RespValue::simple_string("PONG"),
        })
    }

    fn name(&self) -> &'static str {
        "PING"
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }

    fn flags(&self) -> CommandFlags {
        CONNECTION
    }
}

/// ECHO command - Return the message
///
/// Syntax: ECHO message
pub struct EchoCommand;

impl Command for EchoCommand {
    fn execute(&self, _ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        Ok(RespValue::bulk_string(args[0].clone()))
    }

    fn name(&self) -> &'static str {
        "ECHO"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }

    fn flags(&self) -> CommandFlags {
        CONNECTION
    }
}

/// SELECT command - Change the selected database
///
/// Syntax: SELECT index
pub struct SelectCommand;

impl Command for SelectCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let index = parse_int(&args[0])?;
        let index = usize::try_from(index).map_err(|_| CommandError::InvalidDbIndex)?;
        if index >= ctx.store.count() {
            return Err(CommandError::InvalidDbIndex);
        }
        ctx.client.db = index;
        Ok(RespValue::ok())
    }

    fn name(&self) -> &'static str {
        "SELECT"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }

    fn flags(&self) -> CommandFlags {
        CONNECTION
    }
}

/// QUIT command - Close the connection
///
/// Syntax: QUIT
///
/// The connection task closes the socket once this reply is written.
pub struct QuitCommand;

impl Command for QuitCommand {
    fn execute(&self, _ctx: &mut CommandContext<'_>, _args: &[Bytes]) -> CommandResult {
        Ok(RespValue::ok())
    }

    fn name(&self) -> &'static str {
        "QUIT"
    }

    fn flags(&self) -> CommandFlags {
        CONNECTION
    }
}

/// MULTI command - Start a transaction
///
/// Syntax: MULTI
pub struct MultiCommand;

impl Command for MultiCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, _args: &[Bytes]) -> CommandResult {
        if ctx.client.in_multi() {
            return Err(CommandError::NestedMulti);
        }
        ctx.client.begin_multi();
        Ok(RespValue::ok())
    }

    fn name(&self) -> &'static str {
        "MULTI"
    }

    fn max_args(&self) -> Option<usize> {
        Some(0)
    }

    fn flags(&self) -> CommandFlags {
        CONNECTION | CommandFlags::NO_MULTI
    }
}

/// EXEC command - Run the queued transaction
///
/// Syntax: EXEC
///
/// Inside MULTI the dispatcher runs the queue itself; reaching this
/// handler means no transaction is open.
pub struct ExecCommand;

impl Command for ExecCommand {
    fn execute(&self, _ctx: &mut CommandContext<'_>, _args: &[Bytes]) -> CommandResult {
        Err(CommandError::ExecWithoutMulti)
    }

    fn name(&self) -> &'static str {
        "EXEC"
    }

    fn max_args(&self) -> Option<usize> {
        Some(0)
    }

    fn flags(&self) -> CommandFlags {
        CONNECTION | CommandFlags::NO_MULTI
    }
}

/// DISCARD command - Drop the queued transaction
///
/// Syntax: DISCARD
pub struct DiscardCommand;

impl Command for DiscardCommand {
    fn execute(&self, _ctx: &mut CommandContext<'_>, _args: &[Bytes]) -> CommandResult {
        Err(CommandError::DiscardWithoutMulti)
    }

    fn name(&self) -> &'static str {
        "DISCARD"
    }

    fn max_args(&self) -> Option<usize> {
        Some(0)
    }

    fn flags(&self) -> CommandFlags {
        CONNECTION | CommandFlags::NO_MULTI
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::string::{GetCommand, SetCommand};
    use crate::commands::test_support::{bulk, Harness};

    #[test]
    fn test_ping_echo() {
        let mut h = Harness::new();
        assert_eq!(h.ok(&PingCommand, ""), RespValue::simple_string("PONG"));
        assert_eq!(h.ok(&PingCommand, "hello"), bulk("hello"));
        assert_eq!(h.ok(&EchoCommand, "hi"), bulk("hi"));
        assert_eq!(h.run(&EchoCommand, ""), Err(CommandError::WrongArity("echo".into())));
    }

    #[test]
    fn test_select_isolates_databases() {
        let mut h = Harness::new();
        h.ok(&SetCommand, "k zero");
        assert_eq!(h.ok(&SelectCommand, "3"), RespValue::ok());
        assert_eq!(h.ok(&GetCommand, "k"), RespValue::null());
        assert_eq!(h.run(&SelectCommand, "16"), Err(CommandError::InvalidDbIndex));
        assert_eq!(h.run(&SelectCommand, "-1"), Err(CommandError::InvalidDbIndex));
        assert_eq!(h.client.db, 3);
    }

    #[test]
    fn test_multi_outside_dispatcher() {
        let mut h = Harness::new();
        assert_eq!(h.ok(&MultiCommand, ""), RespValue::ok());
        assert!(h.client.in_multi());
        assert_eq!(h.run(&MultiCommand, ""), Err(CommandError::NestedMulti));
        assert_eq!(h.run(&ExecCommand, ""), Err(CommandError::ExecWithoutMulti));
    }
}
