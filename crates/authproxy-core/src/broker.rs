//! Session broker task.
//!
//! One tokio task owns the [`SessionStore`] and processes commands from a
//! bounded mpsc channel, interleaved with a periodic sweep tick. Every event
//! runs to completion before the next is taken, so a queued poll leaves its
//! queue exactly once, by whichever of a completion or a sweep reaches it
//! first.
//!
//! ```text
//! ┌──────────────┐  Command   ┌────────────────────────────┐
//! │ BrokerHandle │ ─────────▶ │ Broker::run                │
//! │   (clone)    │            │  ├── SessionStore (owned)  │
//! └──────▲───────┘            │  └── sweep interval        │
//!        │  oneshot reply     └─────────────┬──────────────┘
//!        └──────────────────────────────────┘
//! ```
//!
//! Replies travel over oneshot channels, whose send never waits on the
//! receiver.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::BrokerConfig;
use crate::error::{BrokerError, BrokerResult};
use crate::session::{PollOutcome, SessionContent, SessionId};
use crate::store::{BrokerStats, CompletionOutcome, SessionStore};

enum Command {
    Create { reply: oneshot::Sender<SessionId> },
    Poll { id: SessionId, reply: oneshot::Sender<PollOutcome> },
    Complete { id: SessionId, content: SessionContent, reply: oneshot::Sender<CompletionOutcome> },
    Stats { reply: oneshot::Sender<BrokerStats> },
}

/// Cloneable client side of the broker.
#[derive(Clone)]
pub struct BrokerHandle {
    tx: mpsc::Sender<Command>,
}

impl BrokerHandle {
    /// Starts a new login session and returns its correlation token.
    pub async fn create_session(&self) -> BrokerResult<SessionId> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Create { reply }).await?;
        rx.await.map_err(|_| BrokerError::Unavailable)
    }

    /// Waits for the session's result.
    ///
    /// Resolves immediately for a finished or unknown session, otherwise when
    /// the session completes or the long-poll timeout passes. Dropping the
    /// future abandons the poll; the next sweep discards it.
    pub async fn poll(&self, id: SessionId) -> BrokerResult<PollOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Poll { id, reply }).await?;
        rx.await.map_err(|_| BrokerError::Unavailable)
    }

    /// Delivers the provider's result for a session.
    pub async fn complete(
        &self,
        id: SessionId,
        content: SessionContent,
    ) -> BrokerResult<CompletionOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Complete { id, content, reply }).await?;
        rx.await.map_err(|_| BrokerError::Unavailable)
    }

    pub async fn stats(&self) -> BrokerResult<BrokerStats> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stats { reply }).await?;
        rx.await.map_err(|_| BrokerError::Unavailable)
    }

    /// True once the broker task has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn send(&self, command: Command) -> BrokerResult<()> {
        self.tx.send(command).await.map_err(|_| BrokerError::Unavailable)
    }
}

pub struct Broker {
    store: SessionStore,
    rx: mpsc::Receiver<Command>,
    config: BrokerConfig,
}

impl Broker {
    /// Builds a broker and its handle without starting it.
    pub fn new(config: BrokerConfig) -> BrokerResult<(Self, BrokerHandle)> {
        config.validate()?;
        let (tx, rx) = mpsc::channel(config.command_buffer);
        let broker = Self { store: SessionStore::new(&config), rx, config };
        Ok((broker, BrokerHandle { tx }))
    }

    /// Builds a broker and runs it on the current tokio runtime.
    pub fn spawn(config: BrokerConfig) -> BrokerResult<(BrokerHandle, JoinHandle<()>)> {
        let (broker, handle) = Self::new(config)?;
        let task = tokio::spawn(broker.run());
        Ok((handle, task))
    }

    /// Event loop. Returns when every handle has been dropped.
    pub async fn run(mut self) {
        let period = self.config.sweep_interval();
        let mut sweep = interval_at(Instant::now() + period, period);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            long_poll_timeout_secs = self.config.long_poll_timeout_secs,
            session_ttl_secs = self.config.session_ttl_secs,
            sweep_interval_secs = self.config.sweep_interval_secs,
            unknown_session_policy = %self.config.unknown_session_policy,
            "Session broker started"
        );

        loop {
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                _ = sweep.tick() => self.sweep(),
            }
        }

        tracing::info!(sessions = self.store.len(), "Session broker stopped");
    }

    fn handle(&mut self, command: Command) {
        let now = Instant::now();
        match command {
            Command::Create { reply } => {
                let id = self.store.create(now);
                if reply.send(id).is_err() {
                    tracing::debug!("Session creator went away before reply");
                }
            }
            Command::Poll { id, reply } => self.store.poll(id, reply, now),
            Command::Complete { id, content, reply } => {
                let outcome = self.store.complete(&id, content, now);
                let short = id.short();
                match outcome {
                    CompletionOutcome::Delivered { waiters } => {
                        tracing::info!(session = short, waiters, "Session completed");
                    }
                    CompletionOutcome::AlreadyFinished => {
                        tracing::warn!(session = short, "Duplicate completion ignored");
                    }
                    CompletionOutcome::UnknownSession => {
                        tracing::warn!(session = short, "Completion for unknown session dropped");
                    }
                }
                let _ = reply.send(outcome);
            }
            Command::Stats { reply } => {
                let _ = reply.send(self.store.stats());
            }
        }
    }

    fn sweep(&mut self) {
        let report = self.store.sweep(Instant::now());
        if !report.is_empty() {
            tracing::debug!(
                timed_out = report.timed_out,
                abandoned = report.abandoned,
                expired = report.expired,
                remaining = self.store.len(),
                "[Broker] Sweep finished"
            );
        }
    }
}
