//! Runtime settings
//!
//! Behaviour knobs for one firmware build. The persisted per-device record
//! (credentials, server, identity) lives in [`crate::store`].

use iot_core::{FrameCodec, FramingStrategy, DEFAULT_MAX_FRAME_LEN};
use iot_transport::{MaxRetries, RetryPolicy, TcpConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Device type this build drives, used for first-boot defaults
    pub device_type: String,
    /// Wire framing
    pub framing: FramingStrategy,
    /// Largest frame body (command + payload)
    pub max_frame_len: usize,
    /// `"unlimited"` or a retry count
    pub max_retries: MaxRetries,
    /// Pause between connect attempts (milliseconds)
    pub retry_backoff_ms: u64,
    /// How long one tick waits for incoming bytes (milliseconds)
    pub read_window_ms: u64,
    /// Pause at the end of every tick (milliseconds)
    pub tick_interval_ms: u64,
    /// TCP keepalive (seconds, 0 = disabled)
    pub keepalive_secs: u64,
    /// TCP_NODELAY
    pub nodelay: bool,
    /// Bound on one connect attempt (milliseconds); unset waits for the OS
    pub connect_timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            device_type: "lock".to_string(),
            framing: FramingStrategy::Delimited,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            max_retries: MaxRetries::Unlimited,
            retry_backoff_ms: 1000,
            read_window_ms: 5,
            tick_interval_ms: 10,
            keepalive_secs: 30,
            nodelay: true,
            connect_timeout_ms: None,
        }
    }
}

impl ClientConfig {
    /// Parse from TOML text; missing keys take their defaults
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        if config.max_frame_len == 0 {
            return Err(ConfigError::Invalid("max_frame_len must be positive".into()));
        }
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn codec(&self) -> FrameCodec {
        FrameCodec::new(self.framing, self.max_frame_len)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            backoff: Duration::from_millis(self.retry_backoff_ms),
            max_retries: self.max_retries,
        }
    }

    pub fn tcp_config(&self) -> TcpConfig {
        TcpConfig {
            keepalive_secs: self.keepalive_secs,
            nodelay: self.nodelay,
            connect_timeout: self.connect_timeout_ms.map(Duration::from_millis),
        }
    }

    pub fn read_window(&self) -> Duration {
        Duration::from_millis(self.read_window_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
