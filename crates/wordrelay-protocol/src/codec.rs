//! Encoding of server messages onto the wire.
//!
//! JSON goes out as text frames, MessagePack as binary frames. Inbound client
//! messages are plain UTF-8 text regardless of the configured format.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::messages::ServerMessage;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MessagePack encoding error.
    #[error("Encoding error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// MessagePack decoding error.
    #[error("Decoding error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// Inbound bytes were not valid UTF-8.
    #[error("Invalid UTF-8 in client message")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// Serialization used for server messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// JSON in text frames.
    #[default]
    Json,
    /// MessagePack (named fields) in binary frames.
    #[serde(alias = "messagepack")]
    Msgpack,
}

/// An encoded message, ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// A text frame.
    Text(String),
    /// A binary frame.
    Binary(Bytes),
}

impl Payload {
    /// Encoded size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Payload::Text(text) => text.len(),
            Payload::Binary(data) => data.len(),
        }
    }

    /// Check if the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Encode a server message in the given format.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode(message: &ServerMessage, format: WireFormat) -> Result<Payload, ProtocolError> {
    match format {
        WireFormat::Json => Ok(Payload::Text(serde_json::to_string(message)?)),
        WireFormat::Msgpack => Ok(Payload::Binary(Bytes::from(rmp_serde::to_vec_named(
            message,
        )?))),
    }
}

/// Decode a server message. The frame kind selects the format.
///
/// # Errors
///
/// Returns an error if the payload is not a valid server message.
pub fn decode(payload: &Payload) -> Result<ServerMessage, ProtocolError> {
    match payload {
        Payload::Text(text) => Ok(serde_json::from_str(text)?),
        Payload::Binary(data) => Ok(rmp_serde::from_slice(data)?),
    }
}

/// Decode the text of a binary client frame.
///
/// # Errors
///
/// Returns an error if the bytes are not valid UTF-8.
pub fn decode_inbound(data: &[u8]) -> Result<String, ProtocolError> {
    Ok(std::str::from_utf8(data)?.to_string())
}
