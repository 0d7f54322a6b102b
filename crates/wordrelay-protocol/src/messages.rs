//! Message types for the wordrelay protocol.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a client meant by a text message.
///
/// The transport has no framing beyond "one text message", so the intent is
/// positional: the first message a connection sends is its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientIntent {
    /// Claim a display name.
    Join(String),
    /// Attempt the current word (or just chat).
    Guess(String),
}

impl ClientIntent {
    /// Classify raw text given whether the sender has already sent a message.
    #[must_use]
    pub fn from_text(text: impl Into<String>, first_message: bool) -> Self {
        if first_message {
            ClientIntent::Join(text.into())
        } else {
            ClientIntent::Guess(text.into())
        }
    }

    /// The raw text carried by the intent.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            ClientIntent::Join(text) | ClientIntent::Guess(text) => text,
        }
    }

    /// Consume the intent, returning its text.
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            ClientIntent::Join(text) | ClientIntent::Guess(text) => text,
        }
    }
}

/// Full game state as seen by a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Length of the secret word, in characters.
    pub word_length: usize,
    /// Score per display name.
    pub scores: BTreeMap<String, u32>,
    /// Recent event lines, oldest first.
    pub history: Vec<String>,
    /// Seconds left in the current round.
    pub time_left: u32,
}

/// A message sent from the server to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Full state sync.
    #[serde(rename = "state")]
    State(Snapshot),

    /// A chat line (`name: text`).
    #[serde(rename = "chat")]
    Chat {
        /// The formatted line.
        line: String,
    },
}

impl ServerMessage {
    /// Create a chat message.
    #[must_use]
    pub fn chat(line: impl Into<String>) -> Self {
        ServerMessage::Chat { line: line.into() }
    }

    /// Get the snapshot if this is a state message.
    #[must_use]
    pub fn as_snapshot(&self) -> Option<&Snapshot> {
        match self {
            ServerMessage::State(snapshot) => Some(snapshot),
            ServerMessage::Chat { .. } => None,
        }
    }
}

impl From<Snapshot> for ServerMessage {
    fn from(snapshot: Snapshot) -> Self {
        ServerMessage::State(snapshot)
    }
}
