//! Error types for the session broker.
//!
//! The broker itself has no fallible transitions: an unknown or timed-out
//! session is a normal `PollOutcome::NotFound`. Errors only arise at the
//! edges, when parsing a token from the wire or when the broker task is gone.

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BrokerError {
    /// The broker task has stopped (shutdown in progress).
    #[error("Session broker unavailable")]
    Unavailable,

    /// A correlation token failed validation.
    #[error("Invalid session id: {reason}")]
    InvalidSessionId { reason: &'static str },

    /// Broker configuration rejected at startup.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Serialize for BrokerError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type BrokerResult<T> = Result<T, BrokerError>;
