//! Per-connection session state

use bytes::Bytes;
use std::net::SocketAddr;
use std::time::Instant;

/// A MULTI block being collected
#[derive(Debug, Default)]
pub struct Transaction {
    /// Full argument vectors, command name included
    pub commands: Vec<Vec<Bytes>>,
    /// Set when a command failed to queue; EXEC then aborts
    pub failed: bool,
}

/// Session of one client connection, owned by the engine
#[derive(Debug)]
pub struct ClientState {
    pub id: u64,
    /// Selected database
    pub db: usize,
    pub name: Option<Bytes>,
    pub addr: Option<SocketAddr>,
    pub created: Instant,
    transaction: Option<Transaction>,
}

impl ClientState {
    pub fn new(id: u64) -> Self {
        ClientState {
            id,
            db: 0,
            name: None,
            addr: None,
            created: Instant::now(),
            transaction: None,
        }
    }

    pub fn with_addr(id: u64, addr: Option<SocketAddr>) -> Self {
        ClientState {
            addr,
            ..ClientState::new(id)
        }
    }

    pub fn in_multi(&self) -> bool {
        self.transaction.is_some()
    }

    pub fn begin_multi(&mut self) {
        self.transaction = Some(Transaction::default());
    }

    /// Queue a command of the open transaction
    pub fn queue(&mut self, argv: Vec<Bytes>) {
        if let Some(tx) = self.transaction.as_mut() {
            tx.commands.push(argv);
        }
    }

    pub fn mark_failed(&mut self) {
        if let Some(tx) = self.transaction.as_mut() {
            tx.failed = true;
        }
    }

    /// Close the transaction, handing back what was queued
    pub fn take_transaction(&mut self) -> Option<Transaction> {
        self.transaction.take()
    }

    /// Drop the open transaction. Returns false when there was none.
    pub fn discard(&mut self) -> bool {
        self.transaction.take().is_some()
    }
}
