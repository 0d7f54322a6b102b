//! Transport abstraction traits.
//!
//! A connection is used as two independent halves so the inbound and
//! outbound pumps can run on separate tasks without sharing a lock.

use async_trait::async_trait;
use thiserror::Error;
use wordrelay_protocol::{Payload, ProtocolError};

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive data.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Inbound message over the size limit.
    #[error("Message of {size} bytes exceeds limit of {max}")]
    MessageTooLarge {
        /// Received size.
        size: usize,
        /// Configured limit.
        max: usize,
    },

    /// Protocol error.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// The receiving half of a connection.
#[async_trait]
pub trait MessageSource: Send {
    /// Receive the next client message.
    ///
    /// Returns `None` if the connection closed cleanly.
    async fn recv(&mut self) -> Result<Option<String>, TransportError>;
}

/// The sending half of a connection.
#[async_trait]
pub trait MessageSink: Send {
    /// Send an encoded message.
    async fn send(&mut self, payload: Payload) -> Result<(), TransportError>;

    /// Close the connection gracefully.
    async fn close(&mut self) -> Result<(), TransportError>;
}
