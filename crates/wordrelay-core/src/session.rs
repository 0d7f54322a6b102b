//! Hub-side view of a connected client.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use wordrelay_protocol::ServerMessage;

/// Default outbound queue capacity per session.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// A message queued for a session. Shared so a broadcast serializes once.
pub type Outbound = Arc<ServerMessage>;

/// Opaque session identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Allocate a fresh, process-unique ID.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap a raw ID.
    #[must_use]
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// The raw ID.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Why a non-blocking delivery failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// The queue is at capacity (slow consumer).
    Full,
    /// The receiving pump is gone.
    Closed,
}

/// A registered session.
///
/// Owns the only sender of the session's outbound queue, so dropping the
/// handle closes the queue.
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    name: Option<String>,
    correct_guesses: u32,
    sender: mpsc::Sender<Outbound>,
}

impl SessionHandle {
    /// Create a session and its outbound queue.
    ///
    /// The receiver belongs to the session's outbound pump.
    #[must_use]
    pub fn new(id: SessionId, capacity: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let handle = Self {
            id,
            name: None,
            correct_guesses: 0,
            sender,
        };
        (handle, receiver)
    }

    /// Session identity.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Display name, once joined.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Check if the session has picked a name.
    #[must_use]
    pub fn is_joined(&self) -> bool {
        self.name.is_some()
    }

    /// Words this session has guessed.
    #[must_use]
    pub fn correct_guesses(&self) -> u32 {
        self.correct_guesses
    }

    /// Check if the outbound pump has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = Some(name);
    }

    pub(crate) fn record_correct(&mut self) {
        self.correct_guesses += 1;
    }

    /// Queue a message without waiting.
    ///
    /// # Errors
    ///
    /// Returns the failure kind if the queue is full or closed.
    pub fn try_deliver(&self, message: Outbound) -> Result<(), DeliveryFailure> {
        self.sender.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryFailure::Full,
            TrySendError::Closed(_) => DeliveryFailure::Closed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_are_unique() {
        let a = SessionId::next();
        let b = SessionId::next();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("session-"));
    }

    #[test]
    fn test_delivery_full_then_closed() {
        let (handle, mut rx) = SessionHandle::new(SessionId::from_raw(1), 2);
        let msg: Outbound = Arc::new(ServerMessage::chat("a: b"));

        assert!(handle.try_deliver(Arc::clone(&msg)).is_ok());
        assert!(handle.try_deliver(Arc::clone(&msg)).is_ok());
        assert_eq!(handle.try_deliver(Arc::clone(&msg)), Err(DeliveryFailure::Full));

        assert!(rx.try_recv().is_ok());
        assert!(handle.try_deliver(Arc::clone(&msg)).is_ok());

        drop(rx);
        assert!(handle.is_closed());
        assert_eq!(handle.try_deliver(msg), Err(DeliveryFailure::Closed));
    }

    #[test]
    fn test_dropping_handle_closes_queue() {
        let (handle, mut rx) = SessionHandle::new(SessionId::from_raw(2), 4);
        handle
            .try_deliver(Arc::new(ServerMessage::chat("x: y")))
            .unwrap();
        drop(handle);

        // Buffered messages drain before the close is observed.
        assert!(rx.try_recv().is_ok());
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_name_assignment() {
        let (mut handle, _rx) = SessionHandle::new(SessionId::next(), 1);
        assert!(!handle.is_joined());
        handle.set_name("alice".into());
        assert_eq!(handle.name(), Some("alice"));
    }
}
