//! Eviction policies applied when `maxmemory` is exceeded

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Number of keys sampled when looking for an eviction victim
pub const EVICTION_SAMPLE_SIZE: usize = 16;

/// What to drop when a write would push memory over the limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum EvictionPolicy {
    /// Refuse the write with an OOM error
    #[default]
    #[serde(rename = "noeviction")]
    NoEviction,
    /// Drop the least recently used key (approximated by sampling)
    #[serde(rename = "allkeys-lru")]
    AllKeysLru,
    /// Drop a random key
    #[serde(rename = "allkeys-random")]
    AllKeysRandom,
    /// Drop the key with a deadline closest to now
    #[serde(rename = "volatile-ttl")]
    VolatileTtl,
}

impl EvictionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionPolicy::NoEviction => "noeviction",
            EvictionPolicy::AllKeysLru => "allkeys-lru",
            EvictionPolicy::AllKeysRandom => "allkeys-random",
            EvictionPolicy::VolatileTtl => "volatile-ttl",
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvictionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "noeviction" | "no-eviction" => Ok(EvictionPolicy::NoEviction),
            "allkeys-lru" => Ok(EvictionPolicy::AllKeysLru),
            "allkeys-random" => Ok(EvictionPolicy::AllKeysRandom),
            "volatile-ttl" => Ok(EvictionPolicy::VolatileTtl),
            other => Err(format!("unknown eviction policy '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_policy_names() {
        assert_eq!("allkeys-lru".parse(), Ok(EvictionPolicy::AllKeysLru));
        assert_eq!("NOEVICTION".parse(), Ok(EvictionPolicy::NoEviction));
        assert_eq!("volatile-ttl".parse(), Ok(EvictionPolicy::VolatileTtl));
        assert!("lfu".parse::<EvictionPolicy>().is_err());
    }

    #[test]
    fn test_deserialize_policy_names() {
        let policy: EvictionPolicy = serde_json::from_str("\"allkeys-random\"").unwrap();
        assert_eq!(policy, EvictionPolicy::AllKeysRandom);
        assert_eq!(policy.to_string(), "allkeys-random");
        let policy: EvictionPolicy = serde_json::from_str("\"noeviction\"").unwrap();
        assert_eq!(policy, EvictionPolicy::NoEviction);
    }
}
