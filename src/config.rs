//! Runtime configuration loaded from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8787";
const DEFAULT_DICTIONARY_BASE_URL: &str = "https://api.dictionaryapi.dev/api/v2/entries/en";

/// Liveness thresholds and room defaults
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub bind_addr: SocketAddr,
    /// No heartbeat for this long marks a player stale
    pub stale_after: Duration,
    /// No heartbeat for this long removes the player
    pub kick_after: Duration,
    /// Out-of-band TTL for unauthenticated players
    pub evict_ttl: Duration,
    /// A finished room whose players are all idle this long is deleted outright
    pub ended_room_ttl: Duration,
    /// A closed room whose players are all idle this long can be reset by a new joiner
    pub idle_reset_after: Duration,
    pub sweep_interval: Duration,
    pub evict_interval: Duration,
    /// Sent to clients as the recommended heartbeat cadence
    pub heartbeat_interval: Duration,
    pub starting_money: u32,
    pub token_secret: String,
    pub wordlist_dir: Option<PathBuf>,
    pub dictionary_base_url: String,
    pub dictionary_timeout: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 8787))),
            stale_after: Duration::from_secs(30),
            kick_after: Duration::from_secs(180),
            evict_ttl: Duration::from_secs(30 * 60),
            ended_room_ttl: Duration::from_secs(6 * 60 * 60),
            idle_reset_after: Duration::from_secs(10 * 60),
            sweep_interval: Duration::from_secs(5),
            evict_interval: Duration::from_secs(60),
            heartbeat_interval: Duration::from_secs(30),
            starting_money: 2,
            token_secret: hex::encode(rand::random::<[u8; 32]>()),
            wordlist_dir: None,
            dictionary_base_url: DEFAULT_DICTIONARY_BASE_URL.to_string(),
            dictionary_timeout: Duration::from_secs(5),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn env_millis(key: &str, default: Duration) -> Duration {
    env_string(key)
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

impl GameConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_addr = match env_string("BIND_ADDR") {
            Some(addr) => addr.parse().unwrap_or_else(|e| {
                tracing::warn!("Invalid BIND_ADDR '{}': {}, using default", addr, e);
                defaults.bind_addr
            }),
            None => defaults.bind_addr,
        };

        let token_secret = env_string("TOKEN_SECRET").unwrap_or_else(|| {
            tracing::warn!("TOKEN_SECRET not set - guess tokens will not survive a restart");
            defaults.token_secret.clone()
        });

        let config = Self {
            bind_addr,
            stale_after: env_millis("STALE_MS", defaults.stale_after),
            kick_after: env_millis("KICK_MS", defaults.kick_after),
            evict_ttl: env_millis("EVICT_TTL_MS", defaults.evict_ttl),
            ended_room_ttl: env_millis("ENDED_ROOM_TTL_MS", defaults.ended_room_ttl),
            idle_reset_after: env_millis("IDLE_RESET_MS", defaults.idle_reset_after),
            sweep_interval: env_millis("SWEEP_INTERVAL_MS", defaults.sweep_interval),
            evict_interval: env_millis("EVICT_INTERVAL_MS", defaults.evict_interval),
            heartbeat_interval: env_millis("HEARTBEAT_INTERVAL_MS", defaults.heartbeat_interval),
            starting_money: env_string("STARTING_MONEY")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.starting_money),
            token_secret,
            wordlist_dir: env_string("WORDLIST_DIR").map(PathBuf::from),
            dictionary_base_url: env_string("DICTIONARY_BASE_URL")
                .unwrap_or(defaults.dictionary_base_url),
            dictionary_timeout: env_string("DICTIONARY_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.dictionary_timeout),
        };

        tracing::info!(
            stale_ms = config.stale_after.as_millis() as u64,
            kick_ms = config.kick_after.as_millis() as u64,
            evict_ttl_ms = config.evict_ttl.as_millis() as u64,
            starting_money = config.starting_money,
            "Game config loaded"
        );

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &["STALE_MS", "KICK_MS", "EVICT_TTL_MS", "STARTING_MONEY", "BIND_ADDR"];

    fn clear_env() {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_default_config() {
        let config = GameConfig::default();
        assert_eq!(config.stale_after, Duration::from_secs(30));
        assert_eq!(config.kick_after, Duration::from_secs(180));
        assert_eq!(config.starting_money, 2);
        assert!(config.stale_after < config.kick_after);
    }

    #[test]
    fn test_default_secret_is_random() {
        let a = GameConfig::default().token_secret;
        let b = GameConfig::default().token_secret;
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        std::env::set_var("STALE_MS", "1000");
        std::env::set_var("KICK_MS", "5000");
        std::env::set_var("STARTING_MONEY", "7");

        let config = GameConfig::from_env();
        assert_eq!(config.stale_after, Duration::from_millis(1000));
        assert_eq!(config.kick_after, Duration::from_millis(5000));
        assert_eq!(config.starting_money, 7);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_ignores_garbage() {
        clear_env();
        std::env::set_var("EVICT_TTL_MS", "soon");
        std::env::set_var("BIND_ADDR", "not an address");

        let config = GameConfig::from_env();
        assert_eq!(config.evict_ttl, GameConfig::default().evict_ttl);
        assert_eq!(config.bind_addr, GameConfig::default().bind_addr);
        clear_env();
    }
}
