//! Command execution context

use super::{CommandError, CommandRegistry};
use crate::aof::{AofStatus, AppendOnlyLog};
use crate::config::Config;
use crate::dispatch::{ClientState, ServerStats};
use crate::store::{Databases, MemoryStore};
use bytes::Bytes;

/// Context provided to commands during execution
///
/// Borrows everything a command may need from the engine for the duration
/// of one call: the databases, the calling client's session, the static
/// configuration and the server-wide state that admin commands report on.
pub struct CommandContext<'a> {
    /// All logical databases
    pub store: &'a mut Databases,

    /// Session of the calling client
    pub client: &'a mut ClientState,

    pub config: &'a Config,

    pub server: &'a ServerStats,

    pub registry: &'a CommandRegistry,

    /// The append-only log, when persistence is enabled
    aof: Option<&'a mut AppendOnlyLog>,

    /// Argument vectors to log instead of the command as received
    propagate: Option<Vec<Vec<Bytes>>>,
}

impl<'a> CommandContext<'a> {
    pub fn new(
        store: &'a mut Databases,
        client: &'a mut ClientState,
        config: &'a Config,
        server: &'a ServerStats,
        registry: &'a CommandRegistry,
        aof: Option<&'a mut AppendOnlyLog>,
    ) -> Self {
        CommandContext {
            store,
            client,
            config,
            server,
            registry,
            aof,
            propagate: None,
        }
    }

    /// The database selected by the calling client
    pub fn keyspace(&mut self) -> Result<&mut MemoryStore, CommandError> {
        self.store
            .db_mut(self.client.db)
            .ok_or(CommandError::InvalidDbIndex)
    }

    /// Log `argv` in place of the command as received. May be called more
    /// than once; the vectors are logged in order.
    pub fn propagate(&mut self, argv: Vec<Bytes>) {
        self.propagate.get_or_insert_with(Vec::new).push(argv);
    }

    pub(crate) fn take_propagated(&mut self) -> Option<Vec<Vec<Bytes>>> {
        self.propagate.take()
    }

    pub fn aof(&mut self) -> Option<&mut AppendOnlyLog> {
        self.aof.as_deref_mut()
    }

    pub fn aof_status(&self) -> Option<AofStatus> {
        self.aof.as_ref().map(|log| log.status())
    }
}
