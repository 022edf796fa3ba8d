use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What `is_paused` answers before any snapshot has loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseReadPolicy {
    /// Report "not paused". Money keeps moving while storage is unreachable.
    #[default]
    FailOpen,
    /// Report "paused" for every scope until the first successful load.
    FailClosed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long a pause snapshot is served before it is reloaded.
    #[serde(with = "secs")]
    pub pause_cache_ttl: Duration,
    pub pause_read_policy: PauseReadPolicy,
    /// Decimals assumed when neither caller nor token supply them.
    pub default_decimals: u8,
    /// Upper bound on waiting for a routed transaction to become final.
    #[serde(with = "secs")]
    pub finality_timeout: Duration,
    /// Route at most one payment per token address at a time within this process.
    pub serialize_routing_per_token: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pause_cache_ttl: Duration::from_secs(30),
            pause_read_policy: PauseReadPolicy::FailOpen,
            default_decimals: 18,
            finality_timeout: Duration::from_secs(60),
            serialize_routing_per_token: true,
        }
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.pause_cache_ttl, Duration::from_secs(30));
        assert_eq!(config.default_decimals, 18);
        assert_eq!(config.pause_read_policy, PauseReadPolicy::FailOpen);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"pause_cache_ttl": 5, "pause_read_policy": "fail_closed"}"#)
                .unwrap();
        assert_eq!(config.pause_cache_ttl, Duration::from_secs(5));
        assert_eq!(config.pause_read_policy, PauseReadPolicy::FailClosed);
        assert_eq!(config.finality_timeout, Duration::from_secs(60));
    }
}
