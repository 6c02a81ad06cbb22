//! # authproxy core
//!
//! In-memory session broker that pairs browser-redirect login completions
//! with clients long-polling for the result.
//!
//! - **`session`** - correlation tokens, provider content, session records
//! - **`store`** - the session map and its per-event transitions
//! - **`broker`** - the task that owns the store, and the handle used to reach it
//! - **`config`** - timeouts and the unknown-session policy
//!
//! ## Architecture Role
//!
//! ```text
//!   authproxy-server (HTTP facade)
//!            │  BrokerHandle
//!            ▼
//!   Broker task ── SessionStore
//! ```
//!
//! The facade never touches session state directly; every read and write is a
//! command processed by the single broker task.

pub mod broker;
pub mod config;
pub mod error;
pub mod session;
pub mod store;

pub use broker::{Broker, BrokerHandle};
pub use config::{BrokerConfig, UnknownSessionPolicy, MAX_DURATION_SECS};
pub use error::{BrokerError, BrokerResult};
pub use session::{PollOutcome, SessionContent, SessionId};
pub use store::{BrokerStats, CompletionOutcome, SweepReport};
