//! Configuration types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::types::STARTING_CASH;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Ledger / execution engine configuration
    #[serde(default)]
    pub engine: EngineConfig,
    /// Standings broadcast configuration
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            broadcast: BroadcastConfig::default(),
            settings: AppSettings::default(),
        }
    }
}

/// Execution engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Cash balance for newly opened accounts
    #[serde(default = "default_starting_cash")]
    pub starting_cash: Decimal,
    /// Bounded wait for an account's execution slot before failing Busy,
    /// in milliseconds
    #[serde(default = "default_lock_wait_ms")]
    pub lock_wait_ms: u64,
    /// Default number of entries returned by a standings pull
    #[serde(default = "default_standings_limit")]
    pub standings_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            starting_cash: default_starting_cash(),
            lock_wait_ms: default_lock_wait_ms(),
            standings_limit: default_standings_limit(),
        }
    }
}

fn default_starting_cash() -> Decimal {
    STARTING_CASH
}

fn default_lock_wait_ms() -> u64 {
    250
}

fn default_standings_limit() -> usize {
    50
}

/// Standings broadcast configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Outbound buffer size per subscriber
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
    /// Window for coalescing bursts of account changes into one
    /// re-ranking cycle, in milliseconds
    #[serde(default = "default_coalesce_ms")]
    pub coalesce_ms: u64,
    /// Keep-alive ping interval in seconds
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_seconds: u64,
    /// How long a missing pong is tolerated before the connection is
    /// considered dead, in seconds
    #[serde(default = "default_pong_timeout")]
    pub pong_timeout_seconds: u64,
    /// WebSocket URL viewer sessions connect to
    #[serde(default = "default_stream_url")]
    pub stream_url: String,
    /// Reconnection behaviour for viewer sessions
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: default_subscriber_buffer(),
            coalesce_ms: default_coalesce_ms(),
            heartbeat_interval_seconds: default_heartbeat_interval(),
            pong_timeout_seconds: default_pong_timeout(),
            stream_url: default_stream_url(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

fn default_subscriber_buffer() -> usize {
    16
}

fn default_coalesce_ms() -> u64 {
    100
}

fn default_heartbeat_interval() -> u64 {
    10
}

fn default_pong_timeout() -> u64 {
    30
}

fn default_stream_url() -> String {
    "ws://127.0.0.1:9000/ws/leaderboard".to_string()
}

/// Reconnection / backoff configuration for viewer sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// First retry delay in milliseconds; doubles on each attempt
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on the retry delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Retry budget before falling back to polling
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Poll interval once streaming has been given up on, in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
            poll_interval_seconds: default_poll_interval(),
        }
    }
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_poll_interval() -> u64 {
    30
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.engine.starting_cash, dec!(100000.00));
        assert_eq!(config.engine.lock_wait_ms, 250);
        assert_eq!(config.broadcast.reconnect.base_delay_ms, 1000);
        assert_eq!(config.broadcast.reconnect.max_delay_ms, 30_000);
        assert_eq!(config.settings.log_level, "info");
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"engine": {"lock_wait_ms": 50}}"#).unwrap();
        assert_eq!(config.engine.lock_wait_ms, 50);
        assert_eq!(config.engine.starting_cash, dec!(100000.00));
        assert_eq!(config.broadcast.subscriber_buffer, 16);
    }
}
