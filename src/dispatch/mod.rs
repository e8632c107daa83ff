//! Command dispatcher
//!
//! Routes incoming commands to the appropriate handler and applies the
//! server-wide rules around them: transactions, the memory ceiling and
//! append-only logging. The dispatcher owns every piece of server state
//! and is only ever driven from the engine loop, one command at a time.

mod client;

pub use client::{ClientState, Transaction};

use crate::aof::{
    replay_records, AofError, AofReader, AofRecord, AppendOnlyLog, AofStatus, ReplayTarget,
    SyncPolicy,
};
use crate::commands::{Command, CommandContext, CommandError, CommandFlags, CommandRegistry, CommandResult};
use crate::config::Config;
use crate::error::StoreError;
use crate::protocol::RespValue;
use crate::store::{Databases, SnapshotEntry};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};

/// Keys visited per capture step of a background rewrite
const REWRITE_CHUNK_KEYS: usize = 512;

/// Time a housekeeping tick may spend feeding a background rewrite
const REWRITE_STEP_BUDGET: Duration = Duration::from_millis(10);

/// Server-wide counters reported by INFO
#[derive(Debug, Clone)]
pub struct ServerStats {
    pub started: Instant,
    /// Unix seconds at startup
    pub started_unix: u64,
    pub port: u16,
    pub connected_clients: usize,
    pub total_connections: u64,
    pub total_commands: u64,
}

impl Default for ServerStats {
    fn default() -> Self {
        ServerStats {
            started: Instant::now(),
            started_unix: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            port: 0,
            connected_clients: 0,
            total_connections: 0,
            total_commands: 0,
        }
    }
}

fn del_record(db: usize, key: Bytes) -> AofRecord {
    AofRecord::command(db, vec![Bytes::from_static(b"DEL"), key])
}

/// Printable command name for logs
fn display_name(name: &[u8]) -> String {
    match std::str::from_utf8(name) {
        Ok(s) => s.to_string(),
        Err(_) => format!("base64:{}", STANDARD.encode(name)),
    }
}

/// The `'a' 'b' ` tail of an unknown command error
fn args_preview(args: &[Bytes]) -> String {
    args.iter()
        .map(|arg| {
            let text = String::from_utf8_lossy(arg);
            let text: String = text.chars().take(128).collect();
            format!("'{}' ", text)
        })
        .collect()
}

/// Command dispatcher
///
/// Receives parsed commands, validates them, and routes them to their
/// handlers
pub struct Dispatcher {
    registry: CommandRegistry,
    store: Databases,
    config: Config,
    aof: Option<AppendOnlyLog>,
    stats: ServerStats,
    clients: HashMap<u64, ClientState>,
    next_client_id: u64,
}

impl Dispatcher {
    /// Create a dispatcher with empty databases and no persistence
    pub fn new(config: Config) -> Self {
        Dispatcher {
            registry: CommandRegistry::new(),
            store: Databases::new(config.databases),
            config,
            aof: None,
            stats: ServerStats::default(),
            clients: HashMap::new(),
            next_client_id: 1,
        }
    }

    /// Create a dispatcher, replaying and then reopening the append-only
    /// file when persistence is enabled
    ///
    /// A torn final record is cut off the file; damage anywhere else is
    /// fatal.
    pub fn open(config: Config) -> Result<Self, AofError> {
        let mut dispatcher = Dispatcher::new(config);
        if !dispatcher.config.appendonly {
            return Ok(dispatcher);
        }

        let aof_config = dispatcher.config.aof_config();
        if aof_config.path.exists() {
            info!("Loading AOF from {:?}", aof_config.path);
            let loaded = AofReader::load(&aof_config.path)?.parse()?;
            if loaded.torn_bytes > 0 {
                warn!(
                    "Truncating {} bytes of incomplete writes at the end of the AOF",
                    loaded.torn_bytes
                );
                AofReader::truncate(&aof_config.path, loaded.valid_len)?;
            }
            let stats = replay_records(&mut dispatcher, loaded.records);
            debug!(?stats, "AOF replay finished");
            dispatcher.store.drain_expired();
        }

        dispatcher.aof = Some(AppendOnlyLog::open(&aof_config)?);
        Ok(dispatcher)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Databases {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Databases {
        &mut self.store
    }

    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    pub fn aof_status(&self) -> Option<AofStatus> {
        self.aof.as_ref().map(|log| log.status())
    }

    /// Port reported by INFO
    pub fn set_port(&mut self, port: u16) {
        self.stats.port = port;
    }

    /// Register a new connection and return its client id
    pub fn connect(&mut self, addr: Option<SocketAddr>) -> u64 {
        let id = self.next_client_id;
        self.next_client_id += 1;
        self.clients.insert(id, ClientState::with_addr(id, addr));
        self.stats.connected_clients = self.clients.len();
        self.stats.total_connections += 1;
        debug!(client = id, ?addr, "Client connected");
        id
    }

    pub fn disconnect(&mut self, client_id: u64) {
        if self.clients.remove(&client_id).is_some() {
            debug!(client = client_id, "Client disconnected");
        }
        self.stats.connected_clients = self.clients.len();
    }

    /// Execute a pipeline of commands from one client, in order
    pub fn execute_batch(&mut self, client_id: u64, commands: Vec<Vec<Bytes>>) -> Vec<RespValue> {
        commands
            .into_iter()
            .map(|argv| self.execute(client_id, argv))
            .collect()
    }

    /// Execute one command on behalf of a client
    pub fn execute(&mut self, client_id: u64, argv: Vec<Bytes>) -> RespValue {
        let mut client = self
            .clients
            .remove(&client_id)
            .unwrap_or_else(|| ClientState::new(client_id));
        let reply = self.dispatch(&mut client, argv);
        self.clients.insert(client_id, client);
        reply
    }

    fn dispatch(&mut self, client: &mut ClientState, argv: Vec<Bytes>) -> RespValue {
        let Some(name) = argv.first() else {
            return RespValue::error("ERR empty command");
        };
        self.stats.total_commands += 1;

        let command = match std::str::from_utf8(name).ok().and_then(|n| self.registry.get(n)) {
            Some(command) => command,
            None => {
                let shown = display_name(name);
                debug!("Unknown command: {}", shown);
                client.mark_failed();
                return CommandError::UnknownCommand(
                    String::from_utf8_lossy(name).into_owned(),
                    args_preview(&argv[1..]),
                )
                .into();
            }
        };
        debug!("Dispatching command: {}", command.name());

        if client.in_multi() {
            return self.queue(client, command.as_ref(), argv);
        }

        match self.call(client, command.as_ref(), &argv) {
            Ok(reply) => reply,
            Err(e) => e.into(),
        }
    }

    /// Handle a command while a MULTI block is open
    fn queue(&mut self, client: &mut ClientState, command: &dyn Command, argv: Vec<Bytes>) -> RespValue {
        match command.name() {
            "EXEC" => return self.exec(client),
            "DISCARD" => {
                client.discard();
                return RespValue::ok();
            }
            "MULTI" => return CommandError::NestedMulti.into(),
            _ => {}
        }

        if command.flags().contains(CommandFlags::NO_MULTI) {
            client.mark_failed();
            return CommandError::NotAllowed(command.name().to_ascii_lowercase()).into();
        }
        if let Err(e) = command.check_arity(&argv[1..]) {
            client.mark_failed();
            return e.into();
        }

        client.queue(argv);
        RespValue::simple_string("QUEUED")
    }

    /// Run a queued transaction. Its log records are wrapped in
    /// MULTI/EXEC so a replay applies all of them or none.
    fn exec(&mut self, client: &mut ClientState) -> RespValue {
        let Some(tx) = client.take_transaction() else {
            return CommandError::ExecWithoutMulti.into();
        };
        if tx.failed {
            return CommandError::ExecAbort.into();
        }

        let db = client.db;
        let mut records = vec![AofRecord::command(db, vec![Bytes::from_static(b"MULTI")])];
        let mut replies = Vec::with_capacity(tx.commands.len());
        for argv in tx.commands {
            let name = String::from_utf8_lossy(&argv[0]).into_owned();
            let reply = match self.registry.get(&name) {
                Some(command) => self.run(client, command.as_ref(), &argv, &mut records),
                None => Err(CommandError::UnknownCommand(name, String::new())),
            };
            replies.push(reply.unwrap_or_else(RespValue::from));
        }

        if records.len() > 1 {
            records.push(AofRecord::command(db, vec![Bytes::from_static(b"EXEC")]));
            if let Err(e) = self.append(&records) {
                return e.into();
            }
        }
        RespValue::array(replies)
    }

    /// Run one command outside a transaction and log it
    fn call(&mut self, client: &mut ClientState, command: &dyn Command, argv: &[Bytes]) -> CommandResult {
        let mut records = Vec::new();
        let result = self.run(client, command, argv, &mut records);
        self.append(&records)?;
        result
    }

    /// Run one command, collecting the records it must log
    ///
    /// Keys evicted before the command and keys found expired while it ran
    /// are logged as DEL ahead of the command itself. A write is logged only
    /// when it changed the keyspace.
    fn run(
        &mut self,
        client: &mut ClientState,
        command: &dyn Command,
        argv: &[Bytes],
        records: &mut Vec<AofRecord>,
    ) -> CommandResult {
        let args = &argv[1..];
        command.check_arity(args)?;
        let flags = command.flags();

        if flags.contains(CommandFlags::DENY_OOM) && self.config.maxmemory > 0 {
            let (evicted, fits) = self.store.evict_to_fit(
                self.config.maxmemory,
                self.config.maxmemory_policy,
                &mut rand::thread_rng(),
            );
            if !evicted.is_empty() {
                debug!("Evicted {} keys to fit maxmemory", evicted.len());
            }
            records.extend(evicted.into_iter().map(|(db, key)| del_record(db, key)));
            if !fits {
                return Err(CommandError::from(StoreError::OutOfMemory));
            }
        }

        let dirty_before = self.store.dirty();
        let mut ctx = CommandContext::new(
            &mut self.store,
            client,
            &self.config,
            &self.stats,
            &self.registry,
            self.aof.as_mut(),
        );
        let result = command.execute(&mut ctx, args);
        let propagated = ctx.take_propagated();

        let changed = self.store.dirty() != dirty_before;
        records.extend(
            self.store
                .drain_expired()
                .into_iter()
                .map(|(db, key)| del_record(db, key)),
        );
        let reply = result?;

        if flags.contains(CommandFlags::WRITE) && changed {
            let db = client.db;
            match propagated {
                Some(rewritten) => records.extend(
                    rewritten
                        .into_iter()
                        .map(|argv| AofRecord::command(db, argv)),
                ),
                None => records.push(AofRecord::command(db, argv.to_vec())),
            }
        }
        Ok(reply)
    }

    /// Append records to the log. Failures only reach the client under
    /// the `always` policy.
    fn append(&mut self, records: &[AofRecord]) -> Result<(), CommandError> {
        let Some(log) = self.aof.as_mut() else {
            return Ok(());
        };
        if records.is_empty() {
            return Ok(());
        }
        if let Err(e) = log.append(records) {
            error!("Failed to append to AOF: {}", e);
            if log.sync_policy() == SyncPolicy::Always {
                return Err(CommandError::PersistenceFailure(e.to_string()));
            }
        }
        Ok(())
    }

    /// Periodic work: active expiry, background rewrite completion and
    /// automatic rewrites
    pub fn housekeeping(&mut self) {
        let removed = self
            .store
            .active_expire_cycle(&mut rand::thread_rng(), self.config.sweep_limits());
        if removed > 0 {
            debug!("Active expiry removed {} keys", removed);
        }
        let expired: Vec<AofRecord> = self
            .store
            .drain_expired()
            .into_iter()
            .map(|(db, key)| del_record(db, key))
            .collect();
        if let Err(e) = self.append(&expired) {
            warn!("Could not log expired keys: {}", e);
        }

        self.advance_rewrite();
        let Some(log) = self.aof.as_mut() else {
            return;
        };
        if let Some(Err(e)) = log.poll_rewrite() {
            error!("Background AOF rewrite failed: {}", e);
            self.store.abort_capture();
        }
        if log.should_auto_rewrite(
            self.config.auto_aof_rewrite_percentage,
            self.config.auto_aof_rewrite_min_size,
        ) {
            info!("Starting automatic AOF rewrite of {} bytes", log.size());
            match log.start_rewrite() {
                Ok(()) => self.store.begin_capture(),
                Err(e) => warn!("Could not start AOF rewrite: {}", e),
            }
        }
    }

    /// Pass the next chunks of a running capture to the rewrite worker,
    /// within a time budget per tick
    fn advance_rewrite(&mut self) {
        if !self.store.is_capturing() {
            return;
        }
        let Some(log) = self.aof.as_mut() else {
            self.store.abort_capture();
            return;
        };
        let started = Instant::now();
        loop {
            let (chunk, done) = self.store.capture_step(REWRITE_CHUNK_KEYS);
            log.feed_rewrite(chunk, done);
            if done || started.elapsed() >= REWRITE_STEP_BUDGET {
                break;
            }
        }
    }

    /// Fsync the log on the every-second schedule
    pub fn sync_tick(&mut self) {
        if let Some(log) = self.aof.as_mut() {
            if let Err(e) = log.sync_if_due() {
                error!("AOF fsync failed: {}", e);
            }
        }
    }

    /// Flush the log before exit
    pub fn shutdown(&mut self) {
        self.store.abort_capture();
        if let Some(log) = self.aof.as_mut() {
            log.abort_rewrite();
            if let Err(e) = log.flush_all() {
                error!("Failed to flush AOF on shutdown: {}", e);
            }
        }
    }
}

impl ReplayTarget for Dispatcher {
    fn apply_command(&mut self, db: usize, argv: &[Bytes]) -> Result<(), String> {
        let name = argv.first().ok_or_else(|| "empty command".to_string())?;
        let command = std::str::from_utf8(name)
            .ok()
            .and_then(|n| self.registry.get(n))
            .ok_or_else(|| format!("unknown command '{}'", display_name(name)))?;
        command.check_arity(&argv[1..]).map_err(|e| e.to_string())?;

        let mut client = ClientState::new(0);
        client.db = db;
        let mut ctx = CommandContext::new(
            &mut self.store,
            &mut client,
            &self.config,
            &self.stats,
            &self.registry,
            None,
        );
        let result = command.execute(&mut ctx, &argv[1..]);
        self.store.drain_expired();
        match result {
            Ok(RespValue::Error(e)) => Err(e),
            Ok(_) => Ok(()),
            Err(e) => Err(e.to_string()),
        }
    }

    fn restore(&mut self, entry: SnapshotEntry) {
        match self.store.db_mut(entry.db) {
            Some(db) => db.set(entry.key, entry.value, entry.expire_at),
            None => warn!("Snapshot entry for missing database {}, skipping", entry.db),
        }
    }

    fn restore_part(&mut self, entry: SnapshotEntry) {
        let absorbed = match self.store.db_mut(entry.db) {
            Some(db) => db.absorb(entry.key.clone(), entry.value),
            None => false,
        };
        if !absorbed {
            warn!("Snapshot part for {:?} has no matching entry, skipping", entry.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{EvictionPolicy, Value};

    fn cmd(line: &str) -> Vec<Bytes> {
        line.split_whitespace()
            .map(|part| Bytes::copy_from_slice(part.as_bytes()))
            .collect()
    }

    fn memory_only() -> Config {
        Config {
            appendonly: false,
            ..Config::default()
        }
    }

    fn with_log(dir: &tempfile::TempDir) -> Config {
        Config {
            appendonly: true,
            appendfilename: dir.path().join("test.aof"),
            appendfsync: SyncPolicy::Always,
            ..Config::default()
        }
    }

    #[test]
    fn test_dispatch_and_errors() {
        let mut d = Dispatcher::new(memory_only());
        let c = d.connect(None);
        assert_eq!(d.execute(c, cmd("SET k v")), RespValue::ok());
        assert_eq!(d.execute(c, cmd("get k")), RespValue::bulk_string("v"));
        assert_eq!(
            d.execute(c, cmd("FOO a b")),
            RespValue::error("ERR unknown command 'FOO', with args beginning with: 'a' 'b' ")
        );
        assert_eq!(
            d.execute(c, cmd("GET")),
            RespValue::error("ERR wrong number of arguments for 'get' command")
        );
        assert_eq!(d.stats().total_commands, 4);
    }

    #[test]
    fn test_wrong_type_leaves_store_unmodified() {
        let mut d = Dispatcher::new(memory_only());
        let c = d.connect(None);
        d.execute(c, cmd("SET s v"));
        let reply = d.execute(c, cmd("LPUSH s x"));
        assert!(reply.is_error());
        assert_eq!(d.execute(c, cmd("GET s")), RespValue::bulk_string("v"));
    }

    #[test]
    fn test_select_is_per_client() {
        let mut d = Dispatcher::new(memory_only());
        let a = d.connect(None);
        let b = d.connect(None);
        d.execute(a, cmd("SELECT 2"));
        d.execute(a, cmd("SET k in-two"));
        assert_eq!(d.execute(b, cmd("GET k")), RespValue::null());
        assert_eq!(d.execute(a, cmd("GET k")), RespValue::bulk_string("in-two"));
        assert_eq!(d.stats().connected_clients, 2);
        d.disconnect(a);
        assert_eq!(d.stats().connected_clients, 1);
    }

    #[test]
    fn test_multi_exec() {
        let mut d = Dispatcher::new(memory_only());
        let c = d.connect(None);
        assert_eq!(d.execute(c, cmd("MULTI")), RespValue::ok());
        assert_eq!(d.execute(c, cmd("INCR n")), RespValue::simple_string("QUEUED"));
        assert_eq!(d.execute(c, cmd("INCR n")), RespValue::simple_string("QUEUED"));
        assert_eq!(d.execute(c, cmd("MULTI")), RespValue::from(CommandError::NestedMulti));
        assert_eq!(
            d.execute(c, cmd("EXEC")),
            RespValue::array(vec![RespValue::integer(1), RespValue::integer(2)])
        );
        assert_eq!(d.execute(c, cmd("EXEC")), RespValue::from(CommandError::ExecWithoutMulti));
    }

    #[test]
    fn test_exec_keeps_going_after_runtime_errors() {
        let mut d = Dispatcher::new(memory_only());
        let c = d.connect(None);
        d.execute(c, cmd("SET s text"));
        d.execute(c, cmd("MULTI"));
        d.execute(c, cmd("INCR s"));
        d.execute(c, cmd("SET other 1"));
        let reply = d.execute(c, cmd("EXEC"));
        let replies = reply.as_array().unwrap();
        assert!(replies[0].is_error());
        assert_eq!(replies[1], RespValue::ok());
    }

    #[test]
    fn test_queue_errors_abort_exec() {
        let mut d = Dispatcher::new(memory_only());
        let c = d.connect(None);
        d.execute(c, cmd("MULTI"));
        d.execute(c, cmd("SET a 1"));
        assert!(d.execute(c, cmd("GET")).is_error());
        assert_eq!(d.execute(c, cmd("EXEC")), RespValue::from(CommandError::ExecAbort));
        assert_eq!(d.execute(c, cmd("GET a")), RespValue::null());

        d.execute(c, cmd("MULTI"));
        d.execute(c, cmd("NOPE"));
        assert_eq!(d.execute(c, cmd("EXEC")), RespValue::from(CommandError::ExecAbort));

        d.execute(c, cmd("MULTI"));
        d.execute(c, cmd("SET a 1"));
        assert_eq!(d.execute(c, cmd("DISCARD")), RespValue::ok());
        assert_eq!(d.execute(c, cmd("GET a")), RespValue::null());
    }

    #[test]
    fn test_oom_without_eviction() {
        let mut d = Dispatcher::new(Config {
            maxmemory: 1,
            ..memory_only()
        });
        let c = d.connect(None);
        d.store_mut()
            .db_mut(0)
            .unwrap()
            .set(Bytes::from("big"), Value::string("x".repeat(1024)), None);
        assert_eq!(d.execute(c, cmd("SET k v")), RespValue::from(StoreError::OutOfMemory));
        // Commands that free memory still run
        assert_eq!(d.execute(c, cmd("DEL big")), RespValue::integer(1));
        assert_eq!(d.execute(c, cmd("GET k")), RespValue::null());
    }

    #[test]
    fn test_eviction_makes_room() {
        let mut d = Dispatcher::new(Config {
            maxmemory: 4096,
            maxmemory_policy: EvictionPolicy::AllKeysRandom,
            ..memory_only()
        });
        let c = d.connect(None);
        for i in 0..64 {
            d.execute(c, cmd(&format!("SET k{} {}", i, "x".repeat(256))));
        }
        assert!(d.store().used_memory() <= 4096 + 1024);
        assert!(d.store().stats().evicted_keys > 0);
    }

    #[test]
    fn test_log_and_replay() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut d = Dispatcher::open(with_log(&dir)).unwrap();
            let c = d.connect(None);
            d.execute(c, cmd("SET a 1"));
            d.execute(c, cmd("INCRBY a 41"));
            d.execute(c, cmd("RPUSH l x y z"));
            d.execute(c, cmd("SELECT 3"));
            d.execute(c, cmd("HSET h f v"));
            d.execute(c, cmd("SET gone v"));
            d.execute(c, cmd("DEL gone"));
            d.execute(c, cmd("GET a"));
            d.execute(c, cmd("MULTI"));
            d.execute(c, cmd("SADD s m1 m2"));
            d.execute(c, cmd("EXEC"));
            d.shutdown();
        }

        let mut d = Dispatcher::open(with_log(&dir)).unwrap();
        let c = d.connect(None);
        assert_eq!(d.execute(c, cmd("GET a")), RespValue::bulk_string("42"));
        assert_eq!(d.execute(c, cmd("LLEN l")), RespValue::integer(3));
        d.execute(c, cmd("SELECT 3"));
        assert_eq!(d.execute(c, cmd("HGET h f")), RespValue::bulk_string("v"));
        assert_eq!(d.execute(c, cmd("EXISTS gone")), RespValue::integer(0));
        assert_eq!(d.execute(c, cmd("SCARD s")), RespValue::integer(2));
    }

    #[test]
    fn test_read_only_commands_are_not_logged() {
        let dir = tempfile::tempdir().unwrap();
        let mut d = Dispatcher::open(with_log(&dir)).unwrap();
        let c = d.connect(None);
        d.execute(c, cmd("GET missing"));
        d.execute(c, cmd("DEL missing"));
        assert_eq!(d.aof_status().unwrap().current_size, 0);
        d.execute(c, cmd("SET k v"));
        assert!(d.aof_status().unwrap().current_size > 0);
    }

    #[test]
    fn test_save_compacts_log() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut d = Dispatcher::open(with_log(&dir)).unwrap();
            let c = d.connect(None);
            for _ in 0..50 {
                d.execute(c, cmd("INCR counter"));
            }
            let before = d.aof_status().unwrap().current_size;
            assert_eq!(d.execute(c, cmd("SAVE")), RespValue::ok());
            assert!(d.aof_status().unwrap().current_size < before);
            d.execute(c, cmd("INCR counter"));
            d.shutdown();
        }

        let mut d = Dispatcher::open(with_log(&dir)).unwrap();
        let c = d.connect(None);
        assert_eq!(d.execute(c, cmd("GET counter")), RespValue::bulk_string("51"));
    }

    #[test]
    fn test_expired_key_is_logged_as_delete() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut d = Dispatcher::open(with_log(&dir)).unwrap();
            let c = d.connect(None);
            d.execute(c, cmd("SET t v PX 1"));
            std::thread::sleep(std::time::Duration::from_millis(5));
            assert_eq!(d.execute(c, cmd("GET t")), RespValue::null());
            d.shutdown();
        }
        let loaded = AofReader::load(dir.path().join("test.aof"))
            .unwrap()
            .parse()
            .unwrap();
        let last = loaded.records.last().unwrap();
        match last {
            AofRecord::Command { argv, .. } => {
                assert_eq!(argv[0], Bytes::from("DEL"));
                assert_eq!(argv[1], Bytes::from("t"));
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_housekeeping_removes_expired_keys() {
        let mut d = Dispatcher::new(memory_only());
        let deadline = crate::store::now_ms() + 1;
        let db = d.store_mut().db_mut(0).unwrap();
        for i in 0..10 {
            db.set(Bytes::from(format!("k{}", i)), Value::string("v"), Some(deadline));
        }
        std::thread::sleep(std::time::Duration::from_millis(5));
        d.housekeeping();
        assert_eq!(d.store().total_keys(), 0);
    }
}
