//! Session registry and broadcast routing.
//!
//! Every delivery is a `try_send`. A session whose queue is full or closed
//! is removed on the spot; removing it drops the only sender, which closes
//! the queue exactly once.

use crate::session::{DeliveryFailure, Outbound, SessionHandle, SessionId};
use metrics::counter;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{trace, warn};

/// Counter of evicted sessions.
pub const EVICTIONS_TOTAL: &str = "wordrelay_evictions_total";

/// Result of a single-session delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued.
    Delivered,
    /// The session could not keep up and was removed.
    Evicted(DeliveryFailure),
    /// No such session.
    Missing,
}

/// Result of a broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Sessions that got the message.
    pub delivered: usize,
    /// Sessions removed because their queue was full or closed.
    pub evicted: Vec<SessionId>,
}

/// All live sessions, keyed by identity.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: HashMap<SessionId, SessionHandle>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session. A previous session with the same ID is returned.
    pub fn insert(&mut self, session: SessionHandle) -> Option<SessionHandle> {
        self.sessions.insert(session.id(), session)
    }

    /// Remove a session, closing its queue.
    pub fn remove(&mut self, id: SessionId) -> Option<SessionHandle> {
        self.sessions.remove(&id)
    }

    /// Look up a session.
    #[must_use]
    pub fn get(&self, id: SessionId) -> Option<&SessionHandle> {
        self.sessions.get(&id)
    }

    /// Look up a session mutably.
    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut SessionHandle> {
        self.sessions.get_mut(&id)
    }

    /// Check if a session is registered.
    #[must_use]
    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Number of sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if there are no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Number of sessions that have picked a name.
    #[must_use]
    pub fn joined_count(&self) -> usize {
        self.sessions.values().filter(|s| s.is_joined()).count()
    }

    /// Deliver to one session, evicting it if it cannot take the message.
    pub fn send_to(&mut self, id: SessionId, message: Outbound) -> Delivery {
        let Some(session) = self.sessions.get(&id) else {
            return Delivery::Missing;
        };
        match session.try_deliver(message) {
            Ok(()) => Delivery::Delivered,
            Err(failure) => {
                self.evict(id, failure);
                Delivery::Evicted(failure)
            }
        }
    }

    /// Deliver to every session without waiting on any of them.
    pub fn broadcast(&mut self, message: Outbound) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        self.sessions.retain(|id, session| {
            match session.try_deliver(Arc::clone(&message)) {
                Ok(()) => {
                    report.delivered += 1;
                    true
                }
                Err(failure) => {
                    warn!(session = %id, ?failure, "Evicting session from broadcast");
                    counter!(EVICTIONS_TOTAL).increment(1);
                    report.evicted.push(*id);
                    false
                }
            }
        });

        trace!(
            recipients = report.delivered,
            evicted = report.evicted.len(),
            "Broadcast"
        );
        report
    }

    fn evict(&mut self, id: SessionId, failure: DeliveryFailure) {
        if self.sessions.remove(&id).is_some() {
            warn!(session = %id, ?failure, "Evicting session");
            counter!(EVICTIONS_TOTAL).increment(1);
        }
    }
}
