//! Connect-with-retry
//!
//! Attempts block the caller. Between failed attempts the caller sleeps for a
//! fixed backoff. Whether it ever gives up is a configuration choice.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{Result, TransportError};
use crate::traits::Connector;

/// Default pause between connect attempts
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// How many retries follow a failed first attempt
///
/// Serialized as the string `"unlimited"` or a plain integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MaxRetriesRepr", into = "MaxRetriesRepr")]
pub enum MaxRetries {
    /// Block until connected
    #[default]
    Unlimited,
    /// Give up after this many retries
    Limited(u32),
}

impl MaxRetries {
    /// Whether another attempt may follow `retries_done` retries
    pub fn allows(&self, retries_done: u32) -> bool {
        match self {
            MaxRetries::Unlimited => true,
            MaxRetries::Limited(max) => retries_done < *max,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum MaxRetriesRepr {
    Count(u32),
    Word(String),
}

impl TryFrom<MaxRetriesRepr> for MaxRetries {
    type Error = String;

    fn try_from(repr: MaxRetriesRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            MaxRetriesRepr::Count(n) => Ok(MaxRetries::Limited(n)),
            MaxRetriesRepr::Word(word) if word.eq_ignore_ascii_case("unlimited") => {
                Ok(MaxRetries::Unlimited)
            }
            MaxRetriesRepr::Word(word) => Err(format!(
                "invalid max_retries {word:?}: expected \"unlimited\" or a number"
            )),
        }
    }
}

impl From<MaxRetries> for MaxRetriesRepr {
    fn from(value: MaxRetries) -> Self {
        match value {
            MaxRetries::Unlimited => MaxRetriesRepr::Word("unlimited".to_string()),
            MaxRetries::Limited(n) => MaxRetriesRepr::Count(n),
        }
    }
}

/// Retry behaviour of the connection manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub backoff: Duration,
    pub max_retries: MaxRetries,
}

impl RetryPolicy {
    pub fn unlimited(backoff: Duration) -> Self {
        Self {
            backoff,
            max_retries: MaxRetries::Unlimited,
        }
    }

    pub fn limited(backoff: Duration, retries: u32) -> Self {
        Self {
            backoff,
            max_retries: MaxRetries::Limited(retries),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unlimited(DEFAULT_BACKOFF)
    }
}

/// Connect, retrying per `policy`. Returns the stream and the number of
/// attempts it took.
pub async fn connect_with_retry<C: Connector>(
    connector: &mut C,
    host: &str,
    port: u16,
    policy: &RetryPolicy,
) -> Result<(C::Stream, u32)> {
    info!("Attempting to connect to server {}:{}", host, port);

    let mut attempts: u32 = 0;
    loop {
        attempts = attempts.saturating_add(1);
        match connector.connect(host, port).await {
            Ok(stream) => {
                info!("Connected to server after {} attempt(s)", attempts);
                return Ok((stream, attempts));
            }
            Err(e) => {
                if !policy.max_retries.allows(attempts - 1) {
                    warn!("Giving up on {}:{} after {} attempts: {}", host, port, attempts, e);
                    return Err(TransportError::RetriesExhausted { attempts });
                }
                warn!("Connecting to {}:{} failed (attempt {}): {}", host, port, attempts, e);
                tokio::time::sleep(policy.backoff).await;
            }
        }
    }
}
