//! FerrumKV - A single-node in-memory key-value server speaking RESP2
//!
//! FerrumKV is designed with strong cohesion and loose coupling principles:
//! - Each module has a single, well-defined responsibility
//! - Modules communicate through clear, minimal interfaces
//! - No circular dependencies between modules
//!
//! All keyspace state is owned by one engine task; connections reach it
//! through a channel, so commands never run concurrently.

pub mod aof;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod server;
pub mod store;

/// Re-export commonly used types
pub use commands::{Command, CommandContext, CommandRegistry};
pub use config::Config;
pub use dispatch::Dispatcher;
pub use error::{CommandError, StoreError};
pub use protocol::{RespError, RespValue};
pub use server::Server;
pub use store::{Databases, MemoryStore, Value};
