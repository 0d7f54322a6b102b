//! The hub: a single task that owns all game state.
//!
//! Sessions and the round clock never touch state directly. They send
//! [`HubEvent`]s through a [`HubHandle`], and the hub applies them one at a
//! time to a [`HubState`]. Handling an event never awaits, so a slow client
//! cannot stall the loop.

use crate::registry::Registry;
use crate::round::{GameRound, TickOutcome, DEFAULT_HISTORY_CAPACITY, DEFAULT_ROUND_SECS};
use crate::session::{Outbound, SessionHandle, SessionId, DEFAULT_OUTBOUND_CAPACITY};
use crate::words::WordSource;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};
use wordrelay_protocol::{ClientIntent, ServerMessage};

/// Default hub event channel capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Hub errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HubError {
    /// The hub task has stopped.
    #[error("Hub is closed")]
    Closed,

    /// The hub dropped a stats request without answering.
    #[error("Hub stats unavailable")]
    StatsUnavailable,
}

/// Hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Round length in seconds.
    pub round_duration: u32,
    /// History lines kept.
    pub history_capacity: usize,
    /// Capacity of the hub's event channel.
    pub event_capacity: usize,
    /// Outbound queue capacity per session.
    pub outbound_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            round_duration: DEFAULT_ROUND_SECS,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
        }
    }
}

/// An event for the hub.
#[derive(Debug)]
pub enum HubEvent {
    /// A new connection.
    Register(SessionHandle),
    /// A connection went away.
    Unregister(SessionId),
    /// A client message.
    Message {
        /// Sender.
        session: SessionId,
        /// What the client sent.
        intent: ClientIntent,
    },
    /// One second passed.
    Tick,
    /// Report statistics.
    Stats(oneshot::Sender<HubStats>),
}

/// What the hub did with a client message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuessOutcome {
    /// The text became the session's display name.
    Named,
    /// The guess was right.
    Correct {
        /// Score after the guess.
        score: u32,
    },
    /// Not the word; fanned out as chat.
    Chat,
    /// Unknown session or empty text.
    Ignored,
}

/// Hub statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HubStats {
    /// Registered sessions.
    pub sessions: usize,
    /// Sessions that picked a name.
    pub joined: usize,
    /// Seconds left in the round.
    pub time_left: u32,
    /// Round counter.
    pub round: u64,
    /// History lines held.
    pub history_len: usize,
}

/// The hub's state machine, without the task around it.
#[derive(Debug)]
pub struct HubState {
    registry: Registry,
    game: GameRound,
}

impl HubState {
    /// Create state and draw the first word.
    #[must_use]
    pub fn new(words: Box<dyn WordSource>, config: &HubConfig) -> Self {
        Self {
            registry: Registry::new(),
            game: GameRound::new(words, config.round_duration, config.history_capacity),
        }
    }

    /// Live sessions.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The round.
    #[must_use]
    pub fn game(&self) -> &GameRound {
        &self.game
    }

    /// Apply one event.
    pub fn handle(&mut self, event: HubEvent) {
        match event {
            HubEvent::Register(session) => self.register(session),
            HubEvent::Unregister(id) => {
                self.unregister(id);
            }
            HubEvent::Message { session, intent } => {
                self.submit(session, intent);
            }
            HubEvent::Tick => {
                self.tick();
            }
            HubEvent::Stats(reply) => {
                let _ = reply.send(self.stats());
            }
        }
    }

    fn snapshot(&self) -> Outbound {
        Arc::new(self.game.snapshot().into())
    }

    /// Add a session and send it the current state.
    ///
    /// The snapshot is best-effort: a fresh queue is never full, and a
    /// closed one is caught by the next broadcast.
    pub fn register(&mut self, session: SessionHandle) {
        let id = session.id();
        let _ = session.try_deliver(self.snapshot());
        if self.registry.insert(session).is_some() {
            debug!(session = %id, "Replaced session with duplicate id");
        }
        debug!(session = %id, sessions = self.registry.len(), "Session registered");
    }

    /// Remove a session. Returns `false` if it was already gone.
    pub fn unregister(&mut self, id: SessionId) -> bool {
        let removed = self.registry.remove(id).is_some();
        if removed {
            debug!(session = %id, sessions = self.registry.len(), "Session unregistered");
        }
        removed
    }

    /// Handle a client message.
    ///
    /// An unnamed session's text is its name; otherwise it is a guess.
    /// Only an empty name leaves the session unjoined.
    pub fn submit(&mut self, id: SessionId, intent: ClientIntent) -> GuessOutcome {
        let Some(session) = self.registry.get_mut(id) else {
            trace!(session = %id, "Message from unknown session");
            return GuessOutcome::Ignored;
        };

        let Some(name) = session.name().map(str::to_string) else {
            let name = intent.into_text();
            if name.is_empty() {
                return GuessOutcome::Ignored;
            }
            session.set_name(name.clone());
            let first_time = self.game.join(&name);
            debug!(session = %id, player = %name, first_time, "Player joined");
            let snapshot = self.snapshot();
            self.registry.send_to(id, snapshot);
            return GuessOutcome::Named;
        };

        if matches!(intent, ClientIntent::Join(_)) {
            debug!(session = %id, "Join from named session treated as guess");
        }
        let text = intent.into_text();
        if self.game.is_correct(&text) {
            session.record_correct();
            let score = self.game.award(&name);
            return GuessOutcome::Correct { score };
        }

        let line = self.game.chat(&name, &text);
        self.registry.broadcast(Arc::new(ServerMessage::chat(line)));
        GuessOutcome::Chat
    }

    /// Advance the clock and push state to everyone.
    pub fn tick(&mut self) -> TickOutcome {
        let outcome = self.game.tick();
        let snapshot = self.snapshot();
        self.registry.broadcast(snapshot);
        outcome
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> HubStats {
        HubStats {
            sessions: self.registry.len(),
            joined: self.registry.joined_count(),
            time_left: self.game.time_left(),
            round: self.game.round(),
            history_len: self.game.history().len(),
        }
    }

}

/// The hub task.
pub struct Hub {
    state: HubState,
    events: mpsc::Receiver<HubEvent>,
}

impl Hub {
    /// Create a hub and a handle to it.
    #[must_use]
    pub fn new(words: Box<dyn WordSource>, config: &HubConfig) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::channel(config.event_capacity.max(1));
        let hub = Self {
            state: HubState::new(words, config),
            events: rx,
        };
        (hub, HubHandle { events: tx })
    }

    /// Create a hub and run it on a new task.
    #[must_use]
    pub fn spawn(words: Box<dyn WordSource>, config: &HubConfig) -> (HubHandle, JoinHandle<()>) {
        let (hub, handle) = Self::new(words, config);
        (handle, tokio::spawn(hub.run()))
    }

    /// Process events until every handle is dropped.
    pub async fn run(mut self) {
        info!(
            round_secs = self.state.game().duration(),
            "Hub started"
        );
        while let Some(event) = self.events.recv().await {
            self.state.handle(event);
        }
        info!("Hub stopped");
    }
}

/// Cloneable sender side of the hub.
#[derive(Debug, Clone)]
pub struct HubHandle {
    events: mpsc::Sender<HubEvent>,
}

impl HubHandle {
    async fn send(&self, event: HubEvent) -> Result<(), HubError> {
        self.events.send(event).await.map_err(|_| HubError::Closed)
    }

    /// Register a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the hub has stopped.
    pub async fn register(&self, session: SessionHandle) -> Result<(), HubError> {
        self.send(HubEvent::Register(session)).await
    }

    /// Unregister a session. Safe to call more than once.
    ///
    /// # Errors
    ///
    /// Returns an error if the hub has stopped.
    pub async fn unregister(&self, id: SessionId) -> Result<(), HubError> {
        self.send(HubEvent::Unregister(id)).await
    }

    /// Forward a client message.
    ///
    /// # Errors
    ///
    /// Returns an error if the hub has stopped.
    pub async fn submit(&self, session: SessionId, intent: ClientIntent) -> Result<(), HubError> {
        self.send(HubEvent::Message { session, intent }).await
    }

    /// Advance the round clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the hub has stopped.
    pub async fn tick(&self) -> Result<(), HubError> {
        self.send(HubEvent::Tick).await
    }

    /// Fetch statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the hub has stopped.
    pub async fn stats(&self) -> Result<HubStats, HubError> {
        let (tx, rx) = oneshot::channel();
        self.send(HubEvent::Stats(tx)).await?;
        rx.await.map_err(|_| HubError::StatsUnavailable)
    }

    /// Check if the hub has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}
