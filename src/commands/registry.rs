//! Command registry
//!
//! Centralized registry for all available commands.
//! This allows loose coupling between command implementations and the dispatcher.

use super::{admin, connection, counter, hash, key, list, search, set, string, ttl, zset, Command};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of all available commands
pub struct CommandRegistry {
    commands: HashMap<String, Arc<dyn Command>>,
}

impl CommandRegistry {
    /// Create a new command registry and register all commands
    pub fn new() -> Self {
        let mut registry = CommandRegistry {
            commands: HashMap::new(),
        };

        // Connection commands
        registry.register(Arc::new(connection::PingCommand));
        registry.register(Arc::new(connection::EchoCommand));
        registry.register(Arc::new(connection::SelectCommand));
        registry.register(Arc::new(connection::QuitCommand));
        registry.register(Arc::new(connection::MultiCommand));
        registry.register(Arc::new(connection::ExecCommand));
        registry.register(Arc::new(connection::DiscardCommand));

        // String commands
        registry.register(Arc::new(string::GetCommand));
        registry.register(Arc::new(string::SetCommand));
        registry.register(Arc::new(string::SetNxCommand));
        registry.register(Arc::new(string::SetExCommand::SECONDS));
        registry.register(Arc::new(string::SetExCommand::MILLIS));
        registry.register(Arc::new(string::GetDelCommand));
        registry.register(Arc::new(string::MGetCommand));
        registry.register(Arc::new(string::MSetCommand));
        registry.register(Arc::new(string::AppendCommand));
        registry.register(Arc::new(string::StrLenCommand));

        // Counter commands
        registry.register(Arc::new(counter::IncrCommand));
        registry.register(Arc::new(counter::DecrCommand));
        registry.register(Arc::new(counter::IncrByCommand));
        registry.register(Arc::new(counter::DecrByCommand));
        registry.register(Arc::new(counter::IncrByFloatCommand));

        // Key commands
        registry.register(Arc::new(key::DelCommand));
        registry.register(Arc::new(key::ExistsCommand));
        registry.register(Arc::new(key::TypeCommand));
        registry.register(Arc::new(key::RenameCommand));
        registry.register(Arc::new(key::RandomKeyCommand));
        registry.register(Arc::new(key::FlushDbCommand));
        registry.register(Arc::new(key::FlushAllCommand));

        // TTL commands
        registry.register(Arc::new(ttl::ExpireCommand::EXPIRE));
        registry.register(Arc::new(ttl::ExpireCommand::PEXPIRE));
        registry.register(Arc::new(ttl::ExpireCommand::EXPIREAT));
        registry.register(Arc::new(ttl::ExpireCommand::PEXPIREAT));
        registry.register(Arc::new(ttl::TtlCommand::SECONDS));
        registry.register(Arc::new(ttl::TtlCommand::MILLIS));
        registry.register(Arc::new(ttl::PersistCommand));

        // Search commands
        registry.register(Arc::new(search::KeysCommand));

        // List commands
        registry.register(Arc::new(list::PushCommand::LPUSH));
        registry.register(Arc::new(list::PushCommand::RPUSH));
        registry.register(Arc::new(list::PushCommand::LPUSHX));
        registry.register(Arc::new(list::PushCommand::RPUSHX));
        registry.register(Arc::new(list::PopCommand::LPOP));
        registry.register(Arc::new(list::PopCommand::RPOP));
        registry.register(Arc::new(list::LRangeCommand));
        registry.register(Arc::new(list::LLenCommand));
        registry.register(Arc::new(list::LIndexCommand));
        registry.register(Arc::new(list::LSetCommand));
        registry.register(Arc::new(list::LRemCommand));
        registry.register(Arc::new(list::LTrimCommand));

        // Hash commands
        registry.register(Arc::new(hash::HSetCommand));
        registry.register(Arc::new(hash::HGetCommand));
        registry.register(Arc::new(hash::HMGetCommand));
        registry.register(Arc::new(hash::HDelCommand));
        registry.register(Arc::new(hash::HGetAllCommand));
        registry.register(Arc::new(hash::HKeysCommand));
        registry.register(Arc::new(hash::HValsCommand));
        registry.register(Arc::new(hash::HLenCommand));
        registry.register(Arc::new(hash::HExistsCommand));
        registry.register(Arc::new(hash::HIncrByCommand));
        registry.register(Arc::new(hash::HIncrByFloatCommand));

        // Set commands
        registry.register(Arc::new(set::SAddCommand));
        registry.register(Arc::new(set::SRemCommand));
        registry.register(Arc::new(set::SMembersCommand));
        registry.register(Arc::new(set::SIsMemberCommand));
        registry.register(Arc::new(set::SCardCommand));
        registry.register(Arc::new(set::SPopCommand));
        registry.register(Arc::new(set::SetAlgebraCommand::SINTER));
        registry.register(Arc::new(set::SetAlgebraCommand::SUNION));
        registry.register(Arc::new(set::SetAlgebraCommand::SDIFF));

        // Sorted set commands
        registry.register(Arc::new(zset::ZAddCommand));
        registry.register(Arc::new(zset::ZRemCommand));
        registry.register(Arc::new(zset::ZScoreCommand));
        registry.register(Arc::new(zset::ZCardCommand));
        registry.register(Arc::new(zset::ZRankCommand::ZRANK));
        registry.register(Arc::new(zset::ZRankCommand::ZREVRANK));
        registry.register(Arc::new(zset::ZRangeCommand::ZRANGE));
        registry.register(Arc::new(zset::ZRangeCommand::ZREVRANGE));
        registry.register(Arc::new(zset::ZRangeByScoreCommand));
        registry.register(Arc::new(zset::ZCountCommand));
        registry.register(Arc::new(zset::ZIncrByCommand));

        // Admin commands
        registry.register(Arc::new(admin::DbSizeCommand));
        registry.register(Arc::new(admin::InfoCommand));
        registry.register(Arc::new(admin::MemoryCommand));
        registry.register(Arc::new(admin::SaveCommand));
        registry.register(Arc::new(admin::BgRewriteAofCommand));
        registry.register(Arc::new(admin::LastSaveCommand));
        registry.register(Arc::new(admin::ClientCommand));
        registry.register(Arc::new(admin::CommandCommand));
        registry.register(Arc::new(admin::TimeCommand));

        registry
    }

    /// Register a command
    fn register(&mut self, command: Arc<dyn Command>) {
        let name = command.name().to_uppercase();
        self.commands.insert(name, command);
    }

    /// Get a command by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(&name.to_uppercase()).cloned()
    }

    /// Check if a command exists
    pub fn has_command(&self, name: &str) -> bool {
        self.commands.contains_key(&name.to_uppercase())
    }

    /// Number of registered commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// All registered commands, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Command>> {
        self.commands.values()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = CommandRegistry::new();
        assert!(registry.has_command("get"));
        assert!(registry.has_command("ZrangeByScore"));
        assert!(registry.get("nope").is_none());
        assert_eq!(registry.get("setex").unwrap().name(), "SETEX");
    }

    #[test]
    fn test_arities_follow_redis_convention() {
        let registry = CommandRegistry::new();
        let arity = |name: &str| registry.get(name).unwrap().arity();
        assert_eq!(arity("GET"), 2);
        assert_eq!(arity("SET"), -3);
        assert_eq!(arity("DEL"), -2);
        assert_eq!(arity("PING"), -1);
        assert_eq!(arity("SETEX"), 4);
    }
}
