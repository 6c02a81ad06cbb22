//! Session store and its event transitions.
//!
//! Every method here is one atomic broker step. The store is owned by the
//! broker task and never shared, so none of this needs locking. Time is an
//! explicit argument to keep transitions deterministic under test.

use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::config::{BrokerConfig, UnknownSessionPolicy};
use crate::session::{
    PendingPoll, PollOutcome, Session, SessionContent, SessionId, SessionState,
};

/// What a completion event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Session finished; `waiters` queued polls received the content.
    Delivered { waiters: usize },
    /// Session was already finished; the first content stands.
    AlreadyFinished,
    /// No session with this id.
    UnknownSession,
}

/// Counts from one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub timed_out: usize,
    pub abandoned: usize,
    pub expired: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.timed_out == 0 && self.abandoned == 0 && self.expired == 0
    }
}

/// Point-in-time view of the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BrokerStats {
    pub sessions: usize,
    pub finished: usize,
    pub waiting_polls: usize,
}

pub struct SessionStore {
    sessions: HashMap<SessionId, Session>,
    long_poll_timeout: Duration,
    session_ttl: Duration,
    unknown_policy: UnknownSessionPolicy,
}

impl SessionStore {
    pub fn new(config: &BrokerConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            long_poll_timeout: config.long_poll_timeout(),
            session_ttl: config.session_ttl(),
            unknown_policy: config.unknown_session_policy,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    /// Allocates a fresh pending session.
    pub fn create(&mut self, now: Instant) -> SessionId {
        // Never overwrite a live entry.
        let mut id = SessionId::generate();
        while self.sessions.contains_key(&id) {
            id = SessionId::generate();
        }
        self.sessions.insert(id.clone(), Session::new(id.clone(), now));
        tracing::debug!(session = %id.short(), "Session created");
        id
    }

    /// Answers a poll now, or parks it in the session queue.
    pub fn poll(&mut self, id: SessionId, reply: oneshot::Sender<PollOutcome>, now: Instant) {
        let session = match self.sessions.entry(id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => match self.unknown_policy {
                UnknownSessionPolicy::Strict => {
                    tracing::debug!(session = %entry.key().short(), "Poll for unknown session");
                    let _ = reply.send(PollOutcome::NotFound);
                    return;
                }
                UnknownSessionPolicy::Lenient => {
                    tracing::debug!(session = %entry.key().short(), "Poll created session");
                    let id = entry.key().clone();
                    entry.insert(Session::new(id, now))
                }
            },
        };

        match &mut session.state {
            SessionState::Finished { content, .. } => {
                let _ = reply.send(PollOutcome::Found(content.clone()));
            }
            SessionState::Pending { waiters } => {
                waiters.push_back(PendingPoll { reply, received_at: now });
            }
        }
    }

    /// Finishes a session and flushes its queue in arrival order.
    pub fn complete(
        &mut self,
        id: &SessionId,
        content: SessionContent,
        now: Instant,
    ) -> CompletionOutcome {
        let Some(session) = self.sessions.get_mut(id) else {
            return CompletionOutcome::UnknownSession;
        };
        if session.is_finished() {
            return CompletionOutcome::AlreadyFinished;
        }

        let previous = std::mem::replace(
            &mut session.state,
            SessionState::Finished { finished_at: now, content: content.clone() },
        );
        let waiters = match previous {
            SessionState::Pending { waiters } => waiters,
            SessionState::Finished { .. } => VecDeque::new(),
        };

        let count = waiters.len();
        for waiter in waiters {
            waiter.respond(PollOutcome::Found(content.clone()));
        }
        CompletionOutcome::Delivered { waiters: count }
    }

    /// Times out stale polls and evicts expired sessions.
    pub fn sweep(&mut self, now: Instant) -> SweepReport {
        let mut report = SweepReport::default();
        let timeout = self.long_poll_timeout;
        let ttl = self.session_ttl;

        self.sessions.retain(|_, session| {
            report.timed_out += session.send_timeouts(now, timeout);
            report.abandoned += session.prune_abandoned();

            if session.expires_at(ttl) < now {
                if let SessionState::Pending { waiters } = &mut session.state {
                    for waiter in waiters.drain(..) {
                        waiter.respond(PollOutcome::NotFound);
                        report.timed_out += 1;
                    }
                }
                report.expired += 1;
                false
            } else {
                true
            }
        });

        report
    }

    pub fn stats(&self) -> BrokerStats {
        self.sessions.values().fold(BrokerStats::default(), |mut stats, session| {
            stats.sessions += 1;
            if session.is_finished() {
                stats.finished += 1;
            }
            stats.waiting_polls += session.waiting();
            stats
        })
    }
}
