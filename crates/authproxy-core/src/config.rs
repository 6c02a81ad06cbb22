//! Broker configuration types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{BrokerError, BrokerResult};

/// What a poll for an id with no session does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownSessionPolicy {
    /// Reply `NotFound` immediately.
    #[default]
    Strict,
    /// Create an empty session under the polled id and queue the request.
    Lenient,
}

impl std::fmt::Display for UnknownSessionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnknownSessionPolicy::Strict => write!(f, "strict"),
            UnknownSessionPolicy::Lenient => write!(f, "lenient"),
        }
    }
}

impl std::str::FromStr for UnknownSessionPolicy {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => Err(BrokerError::Config(format!(
                "unknown session policy '{other}' (expected 'strict' or 'lenient')"
            ))),
        }
    }
}

/// Upper bound for every duration setting (one day).
pub const MAX_DURATION_SECS: u64 = 24 * 60 * 60;

/// Session broker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// How long a single poll waits in a session queue, in seconds.
    #[serde(default = "default_long_poll_timeout")]
    pub long_poll_timeout_secs: u64,

    /// Lifetime of a session after start (or after finish), in seconds.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,

    /// Period of the timeout/expiry sweep, in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    #[serde(default)]
    pub unknown_session_policy: UnknownSessionPolicy,

    /// Capacity of the command channel feeding the broker task.
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
}

fn default_long_poll_timeout() -> u64 {
    60
}

fn default_session_ttl() -> u64 {
    600
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_command_buffer() -> usize {
    1024
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            long_poll_timeout_secs: default_long_poll_timeout(),
            session_ttl_secs: default_session_ttl(),
            sweep_interval_secs: default_sweep_interval(),
            unknown_session_policy: UnknownSessionPolicy::default(),
            command_buffer: default_command_buffer(),
        }
    }
}

impl BrokerConfig {
    pub fn long_poll_timeout(&self) -> Duration {
        Duration::from_secs(self.long_poll_timeout_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Rejects durations outside `1..=MAX_DURATION_SECS` and an empty
    /// command buffer. Deadlines are computed as `Instant + duration`, which
    /// panics on overflow.
    pub fn validate(&self) -> BrokerResult<()> {
        check_duration("long_poll_timeout_secs", self.long_poll_timeout_secs)?;
        check_duration("session_ttl_secs", self.session_ttl_secs)?;
        check_duration("sweep_interval_secs", self.sweep_interval_secs)?;
        if self.command_buffer == 0 {
            return Err(BrokerError::Config("command_buffer must be > 0".into()));
        }
        if self.long_poll_timeout_secs > self.session_ttl_secs {
            tracing::warn!(
                long_poll_timeout_secs = self.long_poll_timeout_secs,
                session_ttl_secs = self.session_ttl_secs,
                "Long-poll timeout exceeds session TTL; waiters may be answered by expiry"
            );
        }
        Ok(())
    }
}

fn check_duration(name: &str, secs: u64) -> BrokerResult<()> {
    if secs == 0 {
        return Err(BrokerError::Config(format!("{name} must be > 0")));
    }
    if secs > MAX_DURATION_SECS {
        return Err(BrokerError::Config(format!(
            "{name} must be at most {MAX_DURATION_SECS}, got {secs}"
        )));
    }
    Ok(())
}
