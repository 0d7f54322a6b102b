//! Client session pumps.
//!
//! Each connection gets two pumps:
//!
//! - **inbound** reads client messages and forwards them to the hub. It is
//!   the only path that unregisters the session from the read side.
//! - **outbound** drains the session's queue into the transport. It stops on
//!   the first write error and never talks to the hub; removal is the hub's
//!   job (eviction or unregister), and a closed queue closes the transport.

use metrics::counter;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use wordrelay_core::{HubError, HubHandle, Outbound, SessionHandle, SessionId};
use wordrelay_protocol::{codec, ClientIntent, WireFormat};

use crate::traits::{MessageSink, MessageSource};

/// Counter of messages by direction.
pub const MESSAGES_TOTAL: &str = "wordrelay_messages_total";

/// Counter of message bytes by direction.
pub const MESSAGES_BYTES: &str = "wordrelay_messages_bytes";

/// How long the outbound pump may keep writing after the read side ended.
const WRITER_GRACE: Duration = Duration::from_secs(5);

/// Per-session settings.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Outbound queue capacity.
    pub outbound_capacity: usize,
    /// Encoding for server messages.
    pub format: WireFormat,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            outbound_capacity: wordrelay_core::session::DEFAULT_OUTBOUND_CAPACITY,
            format: WireFormat::default(),
        }
    }
}

/// One client connection bound to the hub.
pub struct ClientSession<S, K> {
    id: SessionId,
    source: S,
    sink: K,
    options: SessionOptions,
}

impl<S, K> ClientSession<S, K>
where
    S: MessageSource,
    K: MessageSink + 'static,
{
    /// Wrap the two halves of a connection.
    #[must_use]
    pub fn new(source: S, sink: K, options: SessionOptions) -> Self {
        Self {
            id: SessionId::next(),
            source,
            sink,
            options,
        }
    }

    /// The session's identity.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Register with the hub and pump until the connection ends.
    ///
    /// # Errors
    ///
    /// Returns an error if the hub has stopped before registration.
    pub async fn run(self, hub: HubHandle) -> Result<SessionId, HubError> {
        let Self {
            id,
            mut source,
            mut sink,
            options,
        } = self;

        let (handle, outbound) = SessionHandle::new(id, options.outbound_capacity);
        if let Err(e) = hub.register(handle).await {
            let _ = sink.close().await;
            return Err(e);
        }
        debug!(session = %id, "Session started");

        let mut writer = tokio::spawn(outbound_pump(id, sink, outbound, options.format));

        inbound_pump(id, &mut source, &hub).await;

        // Unregistering drops the queue's sender, which lets the writer
        // drain and close the transport.
        if hub.unregister(id).await.is_err() {
            debug!(session = %id, "Hub closed before unregister");
        }

        match tokio::time::timeout(WRITER_GRACE, &mut writer).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(session = %id, error = %e, "Outbound pump failed"),
            Err(_) => {
                debug!(session = %id, "Outbound pump still busy, aborting");
                writer.abort();
            }
        }

        debug!(session = %id, "Session ended");
        Ok(id)
    }
}

async fn inbound_pump<S: MessageSource>(id: SessionId, source: &mut S, hub: &HubHandle) {
    let mut first_message = true;
    loop {
        match source.recv().await {
            Ok(Some(text)) => {
                counter!(MESSAGES_TOTAL, "direction" => "inbound").increment(1);
                counter!(MESSAGES_BYTES, "direction" => "inbound").increment(text.len() as u64);

                let intent = ClientIntent::from_text(text, first_message);
                first_message = false;
                if hub.submit(id, intent).await.is_err() {
                    debug!(session = %id, "Hub closed");
                    break;
                }
            }
            Ok(None) => {
                debug!(session = %id, "Connection closed by peer");
                break;
            }
            Err(e) => {
                warn!(session = %id, error = %e, "Receive failed");
                break;
            }
        }
    }
}

async fn outbound_pump<K: MessageSink>(
    id: SessionId,
    mut sink: K,
    mut outbound: mpsc::Receiver<Outbound>,
    format: WireFormat,
) {
    while let Some(message) = outbound.recv().await {
        let payload = match codec::encode(&message, format) {
            Ok(payload) => payload,
            Err(e) => {
                error!(session = %id, error = %e, "Failed to encode message");
                continue;
            }
        };
        let size = payload.len() as u64;

        if let Err(e) = sink.send(payload).await {
            debug!(session = %id, error = %e, "Write failed, stopping outbound pump");
            return;
        }
        counter!(MESSAGES_TOTAL, "direction" => "outbound").increment(1);
        counter!(MESSAGES_BYTES, "direction" => "outbound").increment(size);
    }

    debug!(session = %id, "Outbound queue closed");
    if let Err(e) = sink.close().await {
        debug!(session = %id, error = %e, "Close failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{self, MemoryClient};
    use tokio::task::JoinHandle;
    use wordrelay_core::{Hub, HubConfig, ScriptedWords};
    use wordrelay_protocol::ServerMessage;

    fn spawn_hub() -> HubHandle {
        let (hub, _task) = Hub::spawn(
            Box::new(ScriptedWords::new(["cat", "dog"]).unwrap()),
            &HubConfig::default(),
        );
        hub
    }

    fn connect(
        hub: &HubHandle,
        transport_capacity: usize,
        options: SessionOptions,
    ) -> (MemoryClient, JoinHandle<Result<SessionId, HubError>>) {
        let (source, sink, client) = memory::pair(transport_capacity);
        let session = ClientSession::new(source, sink, options);
        (client, tokio::spawn(session.run(hub.clone())))
    }

    async fn wait_for_sessions(hub: &HubHandle, expected: usize) {
        for _ in 0..1000 {
            if hub.stats().await.unwrap().sessions == expected {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("hub never reached {expected} sessions");
    }

    async fn wait_for_round(hub: &HubHandle, expected: u64) {
        for _ in 0..1000 {
            if hub.stats().await.unwrap().round == expected {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("hub never reached round {expected}");
    }

    #[tokio::test]
    async fn test_join_chat_and_guess() {
        let hub = spawn_hub();
        let (mut alice, _a) = connect(&hub, 64, SessionOptions::default());
        let (mut bob, _b) = connect(&hub, 64, SessionOptions::default());

        // Register snapshot.
        assert!(alice.recv_message().await.unwrap().as_snapshot().is_some());
        assert!(bob.recv_message().await.unwrap().as_snapshot().is_some());

        alice.send("alice").await.unwrap();
        bob.send("bob").await.unwrap();
        let joined = alice.recv_message().await.unwrap();
        assert!(joined.as_snapshot().unwrap().scores.contains_key("alice"));
        bob.recv_message().await.unwrap();

        alice.send("CAT").await.unwrap();
        wait_for_round(&hub, 2).await;
        bob.send("cat").await.unwrap();

        // Alice won the first word; bob's stale answer is chat for everyone.
        assert_eq!(
            bob.recv_message().await.unwrap(),
            ServerMessage::chat("bob: cat")
        );
        assert_eq!(
            alice.recv_message().await.unwrap(),
            ServerMessage::chat("bob: cat")
        );

        hub.tick().await.unwrap();
        let state = alice.recv_message().await.unwrap();
        let snapshot = state.as_snapshot().unwrap();
        assert_eq!(snapshot.scores.get("alice"), Some(&1));
        assert_eq!(snapshot.scores.get("bob"), Some(&0));
        assert_eq!(
            snapshot.history,
            vec!["alice guessed the word!".to_string(), "bob: cat".to_string()]
        );
    }

    #[tokio::test]
    async fn test_hang_up_unregisters_and_closes() {
        let hub = spawn_hub();
        let (mut client, task) = connect(&hub, 64, SessionOptions::default());
        client.recv_message().await.unwrap();
        wait_for_sessions(&hub, 1).await;

        client.hang_up();
        let id = task.await.unwrap().unwrap();
        assert!(id.as_u64() > 0);
        assert_eq!(hub.stats().await.unwrap().sessions, 0);

        // The outbound pump closed the transport.
        assert!(client.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_receive_error_unregisters() {
        let hub = spawn_hub();
        let (client, task) = connect(&hub, 64, SessionOptions::default());
        wait_for_sessions(&hub, 1).await;

        client.fail("connection reset").await.unwrap();
        task.await.unwrap().unwrap();
        assert_eq!(hub.stats().await.unwrap().sessions, 0);
    }

    #[tokio::test]
    async fn test_write_failure_leads_to_eviction() {
        let hub = spawn_hub();
        let (mut client, task) = connect(&hub, 64, SessionOptions::default());
        wait_for_sessions(&hub, 1).await;

        client.stop_reading();
        // The pump's first write fails and it exits; a later broadcast
        // finds the queue closed and evicts.
        for _ in 0..1000 {
            hub.tick().await.unwrap();
            if hub.stats().await.unwrap().sessions == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(hub.stats().await.unwrap().sessions, 0);

        client.hang_up();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_stalled_client_is_evicted_without_blocking_others() {
        let hub = spawn_hub();
        let options = SessionOptions {
            outbound_capacity: 8,
            ..Default::default()
        };
        // Transport holds one payload, then the writer blocks.
        let (mut stalled, stalled_task) = connect(&hub, 1, options);
        let (mut healthy, _h) = connect(&hub, 64, options);
        wait_for_sessions(&hub, 2).await;

        let mut evicted = false;
        for _ in 0..64 {
            hub.tick().await.unwrap();
            while let Ok(Some(_)) =
                tokio::time::timeout(Duration::from_millis(1), healthy.recv()).await
            {}
            if hub.stats().await.unwrap().sessions == 1 {
                evicted = true;
                break;
            }
        }
        assert!(evicted);

        // The healthy client keeps getting heartbeats.
        hub.tick().await.unwrap();
        assert!(healthy.recv_message().await.unwrap().as_snapshot().is_some());

        // The stalled client gets its backlog, then the connection closes.
        let mut received = 0;
        while stalled.recv().await.is_some() {
            received += 1;
        }
        assert!(received >= 8);

        stalled.hang_up();
        stalled_task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_register_fails_when_hub_closed() {
        let (hub, task) = Hub::spawn(
            Box::new(ScriptedWords::new(["cat"]).unwrap()),
            &HubConfig::default(),
        );
        task.abort();
        let _ = task.await;

        let (source, sink, mut client) = memory::pair(4);
        let result = ClientSession::new(source, sink, SessionOptions::default())
            .run(hub)
            .await;
        assert_eq!(result, Err(HubError::Closed));
        assert!(client.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_msgpack_format() {
        let hub = spawn_hub();
        let options = SessionOptions {
            format: WireFormat::Msgpack,
            ..Default::default()
        };
        let (mut client, _task) = connect(&hub, 64, options);
        let payload = client.recv().await.unwrap();
        assert!(matches!(payload, wordrelay_protocol::Payload::Binary(_)));
        assert!(codec::decode(&payload).unwrap().as_snapshot().is_some());
    }
}
