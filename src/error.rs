//! Error types shared by the store, the command layer and the dispatcher
//!
//! Every error that reaches a client is rendered through `Display`, so the
//! messages carry the usual Redis prefixes (`ERR`, `WRONGTYPE`, `OOM`, ...).

use crate::aof::AofError;
use crate::protocol::RespValue;
use thiserror::Error;

/// Failures raised by the value store itself
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The key holds a value of another type
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    /// The stored value is not a valid integer
    #[error("ERR value is not an integer or out of range")]
    NotANumber,

    /// The stored value is not a valid float
    #[error("ERR value is not a valid float")]
    NotAFloat,

    /// Integer arithmetic would overflow
    #[error("ERR increment or decrement would overflow")]
    Overflow,

    /// Float arithmetic would produce NaN or infinity
    #[error("ERR increment would produce NaN or Infinity")]
    NanOrInfinity,

    /// Write rejected under the configured memory ceiling
    #[error("OOM command not allowed when used memory > 'maxmemory'")]
    OutOfMemory,

    #[error("ERR index out of range")]
    IndexOutOfRange,

    #[error("ERR no such key")]
    NoSuchKey,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Failures of a single command invocation
///
/// All of these are per-request: they become an error reply and the
/// connection stays open.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("ERR unknown command '{0}', with args beginning with: {1}")]
    UnknownCommand(String, String),

    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(String),

    #[error("ERR syntax error")]
    Syntax,

    /// An argument that should be an integer is not one
    #[error("ERR value is not an integer or out of range")]
    InvalidInteger,

    /// An argument that should be a float is not one
    #[error("ERR value is not a valid float")]
    InvalidFloat,

    #[error("ERR min or max is not a float")]
    InvalidScoreRange,

    #[error("ERR invalid expire time in '{0}' command")]
    InvalidExpireTime(String),

    #[error("ERR DB index is out of range")]
    InvalidDbIndex,

    #[error("ERR {0}")]
    Protocol(String),

    #[error("MISCONF Errors writing to the AOF file: {0}")]
    PersistenceFailure(String),

    #[error("ERR MULTI calls can not be nested")]
    NestedMulti,

    #[error("ERR EXEC without MULTI")]
    ExecWithoutMulti,

    #[error("ERR DISCARD without MULTI")]
    DiscardWithoutMulti,

    #[error("EXECABORT Transaction discarded because of previous errors.")]
    ExecAbort,

    #[error("ERR {0} is not allowed in this context")]
    NotAllowed(String),

    #[error("ERR {0}")]
    Other(String),
}

pub type CommandResult = Result<RespValue, CommandError>;

/// Coarse classification of command failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    WrongType,
    NotANumber,
    Overflow,
    UnknownCommand,
    ProtocolError,
    OutOfMemory,
    PersistenceFailure,
    Other,
}

impl CommandError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommandError::Store(e) => match e {
                StoreError::WrongType => ErrorKind::WrongType,
                StoreError::NotANumber | StoreError::NotAFloat => ErrorKind::NotANumber,
                StoreError::Overflow | StoreError::NanOrInfinity => ErrorKind::Overflow,
                StoreError::OutOfMemory => ErrorKind::OutOfMemory,
                StoreError::IndexOutOfRange | StoreError::NoSuchKey => ErrorKind::Other,
            },
            CommandError::UnknownCommand(..) => ErrorKind::UnknownCommand,
            CommandError::WrongArity(_)
            | CommandError::Syntax
            | CommandError::InvalidInteger
            | CommandError::InvalidFloat
            | CommandError::InvalidScoreRange
            | CommandError::InvalidExpireTime(_)
            | CommandError::Protocol(_) => ErrorKind::ProtocolError,
            CommandError::PersistenceFailure(_) => ErrorKind::PersistenceFailure,
            _ => ErrorKind::Other,
        }
    }
}

impl From<AofError> for CommandError {
    fn from(err: AofError) -> Self {
        CommandError::Other(err.to_string())
    }
}

impl From<CommandError> for RespValue {
    fn from(err: CommandError) -> Self {
        RespValue::Error(err.to_string())
    }
}

impl From<StoreError> for RespValue {
    fn from(err: StoreError) -> Self {
        RespValue::Error(err.to_string())
    }
}
