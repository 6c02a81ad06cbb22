//! Session data model.
//!
//! A [`Session`] is either pending, holding the polls waiting on it in
//! arrival order, or finished, holding the provider's content. The pending
//! queue cannot exist once a session is finished, and content cannot exist
//! before.

mod content;
mod id;

pub use content::SessionContent;
pub use id::{SessionId, TOKEN_LEN};

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Reply written to a waiting poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Found(SessionContent),
    NotFound,
}

impl PollOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, PollOutcome::Found(_))
    }
}

/// One long-poll parked in a session queue.
#[derive(Debug)]
pub struct PendingPoll {
    pub reply: oneshot::Sender<PollOutcome>,
    pub received_at: Instant,
}

impl PendingPoll {
    /// Writes the reply. A receiver that has gone away is not an error.
    pub fn respond(self, outcome: PollOutcome) -> bool {
        self.reply.send(outcome).is_ok()
    }

    fn timed_out(&self, now: Instant, timeout: Duration) -> bool {
        self.received_at + timeout < now
    }
}

#[derive(Debug)]
pub enum SessionState {
    Pending { waiters: VecDeque<PendingPoll> },
    Finished { finished_at: Instant, content: SessionContent },
}

#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub started_at: Instant,
    pub state: SessionState,
}

impl Session {
    pub fn new(id: SessionId, now: Instant) -> Self {
        Self { id, started_at: now, state: SessionState::Pending { waiters: VecDeque::new() } }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, SessionState::Finished { .. })
    }

    pub fn content(&self) -> Option<&SessionContent> {
        match &self.state {
            SessionState::Finished { content, .. } => Some(content),
            SessionState::Pending { .. } => None,
        }
    }

    pub fn waiting(&self) -> usize {
        match &self.state {
            SessionState::Pending { waiters } => waiters.len(),
            SessionState::Finished { .. } => 0,
        }
    }

    /// `finished_at + ttl` once finished, otherwise `started_at + ttl`.
    pub fn expires_at(&self, ttl: Duration) -> Instant {
        match &self.state {
            SessionState::Finished { finished_at, .. } => *finished_at + ttl,
            SessionState::Pending { .. } => self.started_at + ttl,
        }
    }

    /// Pops timed-out polls from the head of the queue, replying `NotFound`.
    ///
    /// The queue is in arrival order, so the first poll still inside its
    /// window ends the scan.
    pub fn send_timeouts(&mut self, now: Instant, timeout: Duration) -> usize {
        let SessionState::Pending { waiters } = &mut self.state else {
            return 0;
        };
        let mut count = 0;
        while waiters.front().is_some_and(|w| w.timed_out(now, timeout)) {
            if let Some(waiter) = waiters.pop_front() {
                waiter.respond(PollOutcome::NotFound);
                count += 1;
            }
        }
        count
    }

    /// Drops polls whose client has disconnected.
    pub fn prune_abandoned(&mut self) -> usize {
        let SessionState::Pending { waiters } = &mut self.state else {
            return 0;
        };
        let before = waiters.len();
        waiters.retain(|w| !w.reply.is_closed());
        before - waiters.len()
    }
}
