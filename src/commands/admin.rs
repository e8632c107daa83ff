//! Admin commands (DBSIZE, INFO, MEMORY, SAVE, BGREWRITEAOF, LASTSAVE,
//! CLIENT, COMMAND, TIME)

use super::{eq_ignore_case, Command, CommandContext, CommandError, CommandFlags, CommandResult};
use crate::protocol::RespValue;
use bytes::Bytes;
use std::fmt::Write;
use std::time::{SystemTime, UNIX_EPOCH};

const ADMIN: CommandFlags = CommandFlags::ADMIN;

/// DBSIZE command - Number of keys in the selected database
///
/// Syntax: DBSIZE
pub struct DbSizeCommand;

impl Command for DbSizeCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, _args: &[Bytes]) -> CommandResult {
        Ok(RespValue::integer(ctx.keyspace()?.len() as i64))
    }

    fn name(&self) -> &'static str {
        "DBSIZE"
    }

    fn max_args(&self) -> Option<usize> {
        Some(0)
    }
}

/// Byte count in the `1.50M` style of `used_memory_human`
fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["K", "M", "G", "T"];
    if bytes < 1024 {
        return format!("{}B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2}{}", value, UNITS[unit])
}

/// Resident set size of this process, when the platform reports it
fn process_rss() -> Option<u64> {
    let pid = sysinfo::get_current_pid().ok()?;
    let mut sys = sysinfo::System::new_all();
    sys.refresh_all();
    sys.process(pid).map(|process| process.memory())
}

fn unix_time() -> std::time::Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

/// INFO command - Get information and statistics about the server
///
/// Syntax: INFO [section]
///
/// Sections: server, clients, memory, persistence, stats, keyspace.
/// Without an argument (or with `all`/`default`) every section is returned.
pub struct InfoCommand;

impl InfoCommand {
    const SECTIONS: [&'static str; 6] =
        ["server", "clients", "memory", "persistence", "stats", "keyspace"];

    fn render(&self, ctx: &CommandContext<'_>, section: &str, out: &mut String) {
        let server = ctx.server;
        // Writing into a String cannot fail
        let _ = match section {
            "server" => write!(
                out,
                "# Server\r\n\
                ferrumkv_version:{}\r\n\
                ferrumkv_mode:standalone\r\n\
                os:{}\r\n\
                arch:{}\r\n\
                process_id:{}\r\n\
                tcp_port:{}\r\n\
                uptime_in_seconds:{}\r\n\
                uptime_in_days:{}\r\n\
                hz:{}\r\n",
                env!("CARGO_PKG_VERSION"),
                std::env::consts::OS,
                std::env::consts::ARCH,
                std::process::id(),
                server.port,
                server.started.elapsed().as_secs(),
                server.started.elapsed().as_secs() / 86_400,
                ctx.config.hz,
            ),
            "clients" => write!(
                out,
                "# Clients\r\nconnected_clients:{}\r\n",
                server.connected_clients
            ),
            "memory" => {
                let used = ctx.store.used_memory() as u64;
                write!(
                    out,
                    "# Memory\r\n\
                    used_memory:{}\r\n\
                    used_memory_human:{}\r\n\
                    used_memory_rss:{}\r\n\
                    maxmemory:{}\r\n\
                    maxmemory_human:{}\r\n\
                    maxmemory_policy:{}\r\n",
                    used,
                    human_bytes(used),
                    process_rss().unwrap_or(0),
                    ctx.config.maxmemory,
                    human_bytes(ctx.config.maxmemory as u64),
                    ctx.config.maxmemory_policy.as_str(),
                )
            }
            "persistence" => {
                let status = ctx.aof_status().unwrap_or_default();
                let ok = |flag: bool| if flag { "ok" } else { "err" };
                write!(
                    out,
                    "# Persistence\r\n\
                    aof_enabled:{}\r\n\
                    aof_rewrite_in_progress:{}\r\n\
                    aof_rewrites:{}\r\n\
                    aof_last_bgrewrite_status:{}\r\n\
                    aof_last_write_status:{}\r\n\
                    aof_current_size:{}\r\n\
                    aof_base_size:{}\r\n\
                    aof_last_save_time:{}\r\n",
                    ctx.aof_status().is_some() as u8,
                    status.rewrite_in_progress as u8,
                    status.rewrites,
                    ok(ctx.aof_status().is_none() || status.last_rewrite_ok),
                    ok(ctx.aof_status().is_none() || status.last_write_ok),
                    status.current_size,
                    status.base_size,
                    status.last_save,
                )
            }
            "stats" => {
                let stats = ctx.store.stats();
                write!(
                    out,
                    "# Stats\r\n\
                    total_connections_received:{}\r\n\
                    total_commands_processed:{}\r\n\
                    keyspace_hits:{}\r\n\
                    keyspace_misses:{}\r\n\
                    expired_keys:{}\r\n\
                    evicted_keys:{}\r\n",
                    server.total_connections,
                    server.total_commands,
                    stats.keyspace_hits,
                    stats.keyspace_misses,
                    stats.expired_keys,
                    stats.evicted_keys,
                )
            }
            "keyspace" => {
                let _ = out.write_str("# Keyspace\r\n");
                for (index, db) in ctx.store.iter().filter(|(_, db)| db.len() > 0) {
                    let _ = write!(
                        out,
                        "db{}:keys={},expires={}\r\n",
                        index,
                        db.len(),
                        db.expires_count()
                    );
                }
                Ok(())
            }
            _ => Ok(()),
        };
    }
}

impl Command for InfoCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let requested = args
            .first()
            .map(|arg| String::from_utf8_lossy(arg).to_ascii_lowercase());

        let mut info = String::new();
        match requested.as_deref() {
            None | Some("all") | Some("default") | Some("everything") => {
                for (i, section) in Self::SECTIONS.iter().enumerate() {
                    if i > 0 {
                        info.push_str("\r\n");
                    }
                    self.render(ctx, section, &mut info);
                }
            }
            Some(section) => self.render(ctx, section, &mut info),
        }

        Ok(RespValue::bulk_string(info))
    }

    fn name(&self) -> &'static str {
        "INFO"
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }

    fn flags(&self) -> CommandFlags {
        ADMIN
    }
}

/// MEMORY command - Memory introspection
///
/// Syntax: MEMORY USAGE key
pub struct MemoryCommand;

impl Command for MemoryCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        if !eq_ignore_case(&args[0], "USAGE") {
            return Err(CommandError::Other(format!(
                "unknown subcommand '{}'. Try MEMORY HELP.",
                String::from_utf8_lossy(&args[0])
            )));
        }
        if args.len() != 2 {
            return Err(CommandError::WrongArity("memory|usage".to_string()));
        }
        let usage = ctx.keyspace()?.memory_usage_of(&args[1]);
        Ok(usage.map_or(RespValue::null(), |bytes| RespValue::integer(bytes as i64)))
    }

    fn name(&self) -> &'static str {
        "MEMORY"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn flags(&self) -> CommandFlags {
        ADMIN
    }
}

/// SAVE command - Compact the append-only file synchronously
///
/// Syntax: SAVE
pub struct SaveCommand;

impl Command for SaveCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, _args: &[Bytes]) -> CommandResult {
        let snapshot = ctx.store.snapshot();
        let log = ctx
            .aof()
            .ok_or_else(|| CommandError::Other("append only file is disabled".to_string()))?;
        log.rewrite_now(snapshot)?;
        Ok(RespValue::ok())
    }

    fn name(&self) -> &'static str {
        "SAVE"
    }

    fn max_args(&self) -> Option<usize> {
        Some(0)
    }

    fn flags(&self) -> CommandFlags {
        ADMIN | CommandFlags::NO_MULTI
    }
}

/// BGREWRITEAOF command - Compact the append-only file in the background
///
/// Syntax: BGREWRITEAOF
pub struct BgRewriteAofCommand;

impl Command for BgRewriteAofCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, _args: &[Bytes]) -> CommandResult {
        let log = ctx
            .aof()
            .ok_or_else(|| CommandError::Other("append only file is disabled".to_string()))?;
        log.start_rewrite()?;
        ctx.store.begin_capture();
        Ok(RespValue::simple_string(
            "Background append only file rewriting started",
        ))
    }

    fn name(&self) -> &'static str {
        "BGREWRITEAOF"
    }

    fn max_args(&self) -> Option<usize> {
        Some(0)
    }

    fn flags(&self) -> CommandFlags {
        ADMIN
    }
}

/// LASTSAVE command - Unix time of the last successful compaction
///
/// Syntax: LASTSAVE
pub struct LastSaveCommand;

impl Command for LastSaveCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, _args: &[Bytes]) -> CommandResult {
        let last_save = ctx
            .aof_status()
            .map_or(ctx.server.started_unix, |status| status.last_save);
        Ok(RespValue::integer(last_save as i64))
    }

    fn name(&self) -> &'static str {
        "LASTSAVE"
    }

    fn max_args(&self) -> Option<usize> {
        Some(0)
    }

    fn flags(&self) -> CommandFlags {
        ADMIN
    }
}

/// CLIENT command - Client connection commands
///
/// Syntax: CLIENT <subcommand> [args...]
/// Subcommands:
/// - ID: id of the calling connection
/// - SETNAME <name> / GETNAME
/// - SETINFO <attr> <value>: accepted and ignored
pub struct ClientCommand;

impl Command for ClientCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let subcommand = String::from_utf8_lossy(&args[0]).to_ascii_uppercase();
        let arity = |expected: usize| {
            if args.len() == expected {
                Ok(())
            } else {
                Err(CommandError::WrongArity(format!(
                    "client|{}",
                    subcommand.to_ascii_lowercase()
                )))
            }
        };

        match subcommand.as_str() {
            "ID" => {
                arity(1)?;
                Ok(RespValue::integer(ctx.client.id as i64))
            }
            "GETNAME" => {
                arity(1)?;
                Ok(RespValue::optional_bulk(ctx.client.name.clone()))
            }
            "SETNAME" => {
                arity(2)?;
                let name = &args[1];
                if name.iter().any(|b| *b == b' ' || *b == b'\n') {
                    return Err(CommandError::Other(
                        "Client names cannot contain spaces, newlines or special characters."
                            .to_string(),
                    ));
                }
                ctx.client.name = if name.is_empty() { None } else { Some(name.clone()) };
                Ok(RespValue::ok())
            }
            "SETINFO" => {
                arity(3)?;
                Ok(RespValue::ok())
            }
            _ => Err(CommandError::Other(format!(
                "unknown subcommand '{}'. Try CLIENT HELP.",
                subcommand
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "CLIENT"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn flags(&self) -> CommandFlags {
        ADMIN | CommandFlags::CONNECTION
    }
}

/// COMMAND command - Describe the available commands
///
/// Syntax: COMMAND [COUNT | INFO name [name ...] | DOCS]
pub struct CommandCommand;

impl CommandCommand {
    fn describe(command: &dyn Command) -> RespValue {
        RespValue::array(vec![
            RespValue::bulk_string(command.name().to_ascii_lowercase()),
            RespValue::integer(command.arity()),
            RespValue::array(
                command
                    .flags()
                    .names()
                    .into_iter()
                    .map(RespValue::simple_string)
                    .collect(),
            ),
        ])
    }
}

impl Command for CommandCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let registry = ctx.registry;
        let Some(subcommand) = args.first() else {
            let mut commands: Vec<_> = registry.iter().collect();
            commands.sort_by_key(|command| command.name());
            return Ok(RespValue::array(
                commands.into_iter().map(|c| Self::describe(c.as_ref())).collect(),
            ));
        };

        if eq_ignore_case(subcommand, "COUNT") {
            Ok(RespValue::integer(registry.len() as i64))
        } else if eq_ignore_case(subcommand, "INFO") {
            Ok(RespValue::array(
                args[1..]
                    .iter()
                    .map(|name| {
                        match registry.get(&String::from_utf8_lossy(name)) {
                            Some(command) => Self::describe(command.as_ref()),
                            None => RespValue::NullArray,
                        }
                    })
                    .collect(),
            ))
        } else if eq_ignore_case(subcommand, "DOCS") {
            // Client libraries query this on connect
            Ok(RespValue::array(Vec::new()))
        } else {
            Err(CommandError::Other(format!(
                "unknown subcommand '{}'. Try COMMAND HELP.",
                String::from_utf8_lossy(subcommand)
            )))
        }
    }

    fn name(&self) -> &'static str {
        "COMMAND"
    }

    fn flags(&self) -> CommandFlags {
        ADMIN
    }
}

/// TIME command - Server time as seconds and microseconds
///
/// Syntax: TIME
pub struct TimeCommand;

impl Command for TimeCommand {
    fn execute(&self, _ctx: &mut CommandContext<'_>, _args: &[Bytes]) -> CommandResult {
        let now = unix_time();
        Ok(RespValue::bulk_array([
            Bytes::from(now.as_secs().to_string()),
            Bytes::from(now.subsec_micros().to_string()),
        ]))
    }

    fn name(&self) -> &'static str {
        "TIME"
    }

    fn max_args(&self) -> Option<usize> {
        Some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::string::SetCommand;
    use crate::commands::test_support::{bulk, Harness};

    fn info_text(reply: RespValue) -> String {
        String::from_utf8(reply.as_bulk_string().unwrap().to_vec()).unwrap()
    }

    #[test]
    fn test_dbsize_counts_selected_db() {
        let mut h = Harness::new();
        h.ok(&SetCommand, "a 1");
        h.ok(&SetCommand, "b 2");
        assert_eq!(h.ok(&DbSizeCommand, ""), RespValue::integer(2));
        h.client.db = 1;
        assert_eq!(h.ok(&DbSizeCommand, ""), RespValue::integer(0));
    }

    #[test]
    fn test_info_sections() {
        let mut h = Harness::new();
        h.ok(&SetCommand, "key1 value1");
        h.ok(&SetCommand, "key2 value2 EX 100");

        let info = info_text(h.ok(&InfoCommand, ""));
        assert!(info.contains("ferrumkv_version"));
        assert!(info.contains("# Persistence"));
        assert!(info.contains("aof_enabled:0"));
        assert!(info.contains("db0:keys=2,expires=1"));

        let keyspace = info_text(h.ok(&InfoCommand, "KEYSPACE"));
        assert!(keyspace.starts_with("# Keyspace"));
        assert!(!keyspace.contains("# Server"));

        let memory = info_text(h.ok(&InfoCommand, "memory"));
        assert!(memory.contains("used_memory:"));
        assert!(memory.contains("maxmemory_policy:noeviction"));
    }

    #[test]
    fn test_memory_usage() {
        let mut h = Harness::new();
        h.ok(&SetCommand, "k value");
        assert!(h.ok(&MemoryCommand, "USAGE k").as_integer().unwrap() > 0);
        assert_eq!(h.ok(&MemoryCommand, "usage missing"), RespValue::null());
        assert!(h.run(&MemoryCommand, "STATS").is_err());
    }

    #[test]
    fn test_save_without_aof() {
        let mut h = Harness::new();
        assert!(matches!(h.run(&SaveCommand, ""), Err(CommandError::Other(_))));
        assert!(matches!(h.run(&BgRewriteAofCommand, ""), Err(CommandError::Other(_))));
        assert_eq!(
            h.ok(&LastSaveCommand, ""),
            RespValue::integer(h.server.started_unix as i64)
        );
    }

    #[test]
    fn test_client_name() {
        let mut h = Harness::new();
        assert_eq!(h.ok(&ClientCommand, "ID"), RespValue::integer(1));
        assert_eq!(h.ok(&ClientCommand, "GETNAME"), RespValue::null());
        assert_eq!(h.ok(&ClientCommand, "SETNAME worker"), RespValue::ok());
        assert_eq!(h.ok(&ClientCommand, "getname"), bulk("worker"));
        assert_eq!(h.ok(&ClientCommand, "SETINFO lib-name redis-rs"), RespValue::ok());
        assert_eq!(
            h.run(&ClientCommand, "SETNAME"),
            Err(CommandError::WrongArity("client|setname".into()))
        );
    }

    #[test]
    fn test_command_introspection() {
        let mut h = Harness::new();
        let count = h.ok(&CommandCommand, "COUNT").as_integer().unwrap();
        assert_eq!(count as usize, h.registry.len());

        let info = h.ok(&CommandCommand, "INFO get nope");
        let entries = info.as_array().unwrap();
        assert_eq!(entries[0].as_array().unwrap()[1], RespValue::integer(2));
        assert_eq!(entries[1], RespValue::NullArray);

        let all = h.ok(&CommandCommand, "");
        assert_eq!(all.as_array().unwrap().len(), h.registry.len());
    }

    #[test]
    fn test_time() {
        let mut h = Harness::new();
        let reply = h.ok(&TimeCommand, "");
        let parts = reply.as_array().unwrap();
        assert_eq!(parts.len(), 2);
        let secs: u64 = std::str::from_utf8(parts[0].as_bulk_string().unwrap())
            .unwrap()
            .parse()
            .unwrap();
        assert!(secs > 1_600_000_000);
    }

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(512), "512B");
        assert_eq!(human_bytes(1536), "1.50K");
        assert_eq!(human_bytes(3 * 1024 * 1024), "3.00M");
    }
}
