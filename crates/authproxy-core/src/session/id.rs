use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::BrokerError;

const TOKEN_BYTES: usize = 32;
/// Encoded length of a token: 32 bytes as unpadded base64url.
pub const TOKEN_LEN: usize = 43;

/// Correlation token identifying one login attempt.
///
/// Generated from 32 bytes of the thread-local CSPRNG, so holding a valid id
/// is the only proof a poller needs. Parsing accepts exactly the canonical
/// encoding produced by [`SessionId::generate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading characters only, for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_owned())
    }
}

impl TryFrom<String> for SessionId {
    type Error = BrokerError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s.is_empty() {
            return Err(BrokerError::InvalidSessionId { reason: "empty" });
        }
        if s.len() != TOKEN_LEN {
            return Err(BrokerError::InvalidSessionId { reason: "wrong length" });
        }
        match URL_SAFE_NO_PAD.decode(s.as_bytes()) {
            Ok(bytes) if bytes.len() == TOKEN_BYTES => Ok(Self(s)),
            _ => Err(BrokerError::InvalidSessionId { reason: "not base64url" }),
        }
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}
