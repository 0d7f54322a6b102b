//! Connection handlers for the wordrelay server.
//!
//! This module wires the hub, the round clock and the HTTP endpoints
//! together. Upgrades are accepted from any origin.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::Result;
use axum::{
    extract::{ws::WebSocket, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};
use wordrelay_core::{Hub, HubHandle, RoundClock};
use wordrelay_transport::{websocket, ClientSession};

/// Shared server state.
pub struct AppState {
    /// Handle to the game hub.
    pub hub: HubHandle,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(hub: HubHandle, config: Config) -> Self {
        Self { hub, config }
    }
}

/// Build the HTTP router.
pub fn router(state: Arc<AppState>) -> Router {
    let ws_path = state.config.transport.websocket_path.clone();
    Router::new()
        .route(&ws_path, get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the word pool is invalid or the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let words = config.word_pool()?;
    let (hub, _hub_task) = Hub::spawn(Box::new(words), &config.hub_config());
    let clock = RoundClock::new(config.tick_period());
    info!(period_ms = clock.period().as_millis() as u64, "Starting round clock");
    let _clock_task = clock.spawn(hub.clone());

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let addr = config.bind_addr()?;
    let state = Arc::new(AppState::new(hub, config));
    let app = router(Arc::clone(&state));

    let listener = TcpListener::bind(addr).await?;

    info!("wordrelay listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}",
        addr, state.config.transport.websocket_path
    );

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.hub.stats().await {
        Ok(stats) => Json(serde_json::json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "sessions": stats.sessions,
            "joined": stats.joined,
            "time_left": stats.time_left,
            "round": stats.round,
            "history_len": stats.history_len,
        }))
        .into_response(),
        Err(e) => {
            metrics::record_error("hub");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "unavailable",
                    "error": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.max_message_size(state.config.transport.max_message_size)
        .on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Handle a WebSocket connection until it ends.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>) {
    let _metrics_guard = ConnectionMetricsGuard::new();

    let (source, sink) = websocket::split(socket, state.config.transport.max_message_size);
    let session = ClientSession::new(source, sink, state.config.session_options());
    let id = session.id();
    debug!(session = %id, "WebSocket connected");

    match session.run(state.hub.clone()).await {
        Ok(_) => debug!(session = %id, "WebSocket disconnected"),
        Err(e) => {
            error!(session = %id, error = %e, "Session could not start");
            metrics::record_error("hub");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use std::net::SocketAddr;
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    use tokio_tungstenite::tungstenite::http::HeaderValue;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
    use wordrelay_core::ScriptedWords;
    use wordrelay_protocol::{codec, Payload, ServerMessage};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn start() -> (SocketAddr, Arc<AppState>) {
        let config = Config::default();
        let (hub, _task) = Hub::spawn(
            Box::new(ScriptedWords::new(["cat", "dog"]).unwrap()),
            &config.hub_config(),
        );
        let state = Arc::new(AppState::new(hub, config));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(Arc::clone(&state));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, state)
    }

    async fn connect(addr: SocketAddr) -> Client {
        let (ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
        ws
    }

    async fn next_message(ws: &mut Client) -> ServerMessage {
        loop {
            match ws.next().await.unwrap().unwrap() {
                Message::Text(text) => return codec::decode(&Payload::Text(text)).unwrap(),
                Message::Binary(data) => {
                    return codec::decode(&Payload::Binary(data.into())).unwrap()
                }
                _ => continue,
            }
        }
    }

    async fn wait_until(state: &AppState, check: impl Fn(&wordrelay_core::HubStats) -> bool) {
        for _ in 0..500 {
            if check(&state.hub.stats().await.unwrap()) {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("hub never reached the expected state");
    }

    #[tokio::test]
    async fn test_end_to_end_game() {
        let (addr, state) = start().await;
        let mut alice = connect(addr).await;
        let mut bob = connect(addr).await;

        assert!(next_message(&mut alice).await.as_snapshot().is_some());
        assert!(next_message(&mut bob).await.as_snapshot().is_some());

        alice.send(Message::Text("alice".into())).await.unwrap();
        bob.send(Message::Text("bob".into())).await.unwrap();
        next_message(&mut alice).await;
        next_message(&mut bob).await;

        alice.send(Message::Text("cat".into())).await.unwrap();
        wait_until(&state, |s| s.round == 2).await;
        bob.send(Message::Text("cat".into())).await.unwrap();

        assert_eq!(next_message(&mut alice).await, ServerMessage::chat("bob: cat"));
        assert_eq!(next_message(&mut bob).await, ServerMessage::chat("bob: cat"));

        state.hub.tick().await.unwrap();
        let msg = next_message(&mut bob).await;
        let snapshot = msg.as_snapshot().unwrap();
        assert_eq!(snapshot.scores.get("alice"), Some(&1));
        assert_eq!(snapshot.scores.get("bob"), Some(&0));
        assert_eq!(snapshot.word_length, 3);
        assert_eq!(snapshot.time_left, 29);

        alice.close(None).await.unwrap();
        wait_until(&state, |s| s.sessions == 1).await;
    }

    #[tokio::test]
    async fn test_binary_frames_are_decoded_as_text() {
        let (addr, _state) = start().await;
        let mut ws = connect(addr).await;
        assert!(next_message(&mut ws).await.as_snapshot().is_some());

        ws.send(Message::Binary(b"alice".to_vec())).await.unwrap();
        let joined = next_message(&mut ws).await;
        assert_eq!(joined.as_snapshot().unwrap().scores.get("alice"), Some(&0));

        // Invalid UTF-8 is dropped and the session keeps going.
        ws.send(Message::Binary(vec![0xff])).await.unwrap();
        ws.send(Message::Text("hello".into())).await.unwrap();
        assert_eq!(next_message(&mut ws).await, ServerMessage::chat("alice: hello"));
    }

    #[tokio::test]
    async fn test_oversized_frame_ends_session() {
        let (addr, state) = start().await;
        let mut ws = connect(addr).await;
        assert!(next_message(&mut ws).await.as_snapshot().is_some());
        wait_until(&state, |s| s.sessions == 1).await;

        let too_big = "x".repeat(state.config.transport.max_message_size + 904);
        // The server may drop the connection before the write completes.
        let _ = ws.send(Message::Text(too_big)).await;
        wait_until(&state, |s| s.sessions == 0).await;
    }

    #[tokio::test]
    async fn test_cross_origin_upgrade_is_accepted() {
        let (addr, _state) = start().await;
        let mut request = format!("ws://{addr}/ws").into_client_request().unwrap();
        request.headers_mut().insert(
            "Origin",
            HeaderValue::from_static("http://somewhere-else.example"),
        );
        let (mut ws, _) = connect_async(request).await.unwrap();
        assert!(next_message(&mut ws).await.as_snapshot().is_some());
    }

    #[tokio::test]
    async fn test_health_reports_hub_stats() {
        let (addr, state) = start().await;
        let _ws = connect(addr).await;
        wait_until(&state, |s| s.sessions == 1).await;

        let response = health_handler(State(Arc::clone(&state))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["sessions"], 1);
        assert_eq!(json["round"], 1);
        assert_eq!(json["history_len"], 0);
    }
}
