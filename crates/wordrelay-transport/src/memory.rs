//! In-process transport.
//!
//! [`pair`] returns the server halves plus a [`MemoryClient`] that plays the
//! remote peer. Both directions are bounded, so a client that stops reading
//! eventually blocks the outbound pump just like a stalled socket.

use async_trait::async_trait;
use tokio::sync::mpsc;
use wordrelay_protocol::{codec, Payload, ServerMessage};

use crate::traits::{MessageSink, MessageSource, TransportError};

/// Create a connected in-memory transport.
#[must_use]
pub fn pair(capacity: usize) -> (MemorySource, MemorySink, MemoryClient) {
    let (to_server, from_client) = mpsc::channel(capacity.max(1));
    let (to_client, from_server) = mpsc::channel(capacity.max(1));
    (
        MemorySource { rx: from_client },
        MemorySink { tx: Some(to_client) },
        MemoryClient {
            tx: Some(to_server),
            rx: Some(from_server),
        },
    )
}

/// Server-side receiving half.
#[derive(Debug)]
pub struct MemorySource {
    rx: mpsc::Receiver<Result<String, TransportError>>,
}

#[async_trait]
impl MessageSource for MemorySource {
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        match self.rx.recv().await {
            Some(Ok(text)) => Ok(Some(text)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

/// Server-side sending half.
#[derive(Debug)]
pub struct MemorySink {
    tx: Option<mpsc::Sender<Payload>>,
}

#[async_trait]
impl MessageSink for MemorySink {
    async fn send(&mut self, payload: Payload) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::ConnectionClosed)?;
        tx.send(payload)
            .await
            .map_err(|_| TransportError::SendFailed("peer stopped reading".into()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.tx = None;
        Ok(())
    }
}

/// The remote end of an in-memory connection.
#[derive(Debug)]
pub struct MemoryClient {
    tx: Option<mpsc::Sender<Result<String, TransportError>>>,
    rx: Option<mpsc::Receiver<Payload>>,
}

impl MemoryClient {
    /// Send a text message to the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the client hung up or the server side is gone.
    pub async fn send(&self, text: impl Into<String>) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::ConnectionClosed)?;
        tx.send(Ok(text.into()))
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Make the server's next receive fail.
    ///
    /// # Errors
    ///
    /// Returns an error if the client hung up or the server side is gone.
    pub async fn fail(&self, reason: impl Into<String>) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::ConnectionClosed)?;
        tx.send(Err(TransportError::ReceiveFailed(reason.into())))
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Receive the next payload. `None` once the server closed its side.
    pub async fn recv(&mut self) -> Option<Payload> {
        self.rx.as_mut()?.recv().await
    }

    /// Receive and decode the next server message.
    pub async fn recv_message(&mut self) -> Option<ServerMessage> {
        let payload = self.recv().await?;
        codec::decode(&payload).ok()
    }

    /// Close the client-to-server direction.
    pub fn hang_up(&mut self) {
        self.tx = None;
    }

    /// Drop the server-to-client direction, so server writes fail.
    pub fn stop_reading(&mut self) {
        self.rx = None;
    }
}
