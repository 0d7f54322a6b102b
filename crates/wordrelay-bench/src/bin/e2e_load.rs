//! End-to-end load generator for wordrelay.
//!
//! Connects many WebSocket clients, joins each under its own name, and
//! has every client guess at a fixed rate while counting what comes back.

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::Barrier;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use wordrelay_protocol::{codec, Payload, ServerMessage};

const GUESSES: [&str; 6] = ["apple", "banana", "gopher", "dog", "cat", "nope"];

#[derive(Parser, Debug)]
#[command(name = "e2e_load", about = "Drive a running wordrelay server")]
struct Args {
    /// Server WebSocket URL
    #[arg(long, default_value = "ws://127.0.0.1:42069/ws")]
    url: String,

    /// Number of concurrent clients
    #[arg(short, long, default_value_t = 64)]
    clients: usize,

    /// Guesses per second per client
    #[arg(short, long, default_value_t = 5)]
    rate: u64,

    /// Measurement length in seconds
    #[arg(short, long, default_value_t = 10)]
    duration: u64,
}

#[derive(Default)]
struct Counters {
    snapshots: AtomicU64,
    chats: AtomicU64,
    sent: AtomicU64,
    closed: AtomicU64,
    failed: AtomicU64,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    println!("wordrelay end-to-end load");
    println!("  url:      {}", args.url);
    println!("  clients:  {}", args.clients);
    println!("  rate:     {} guesses/s per client", args.rate);
    println!("  duration: {}s", args.duration);
    println!();

    let counters = Arc::new(Counters::default());
    let barrier = Arc::new(Barrier::new(args.clients + 1));
    let mut handles = Vec::with_capacity(args.clients);

    for client_id in 0..args.clients {
        let counters = Arc::clone(&counters);
        let barrier = Arc::clone(&barrier);
        let url = args.url.clone();
        let rate = args.rate.max(1);

        handles.push(tokio::spawn(async move {
            let joined = join(client_id, &url).await;
            if let Err(e) = &joined {
                eprintln!("client {client_id} failed to join: {e}");
                counters.failed.fetch_add(1, Ordering::Relaxed);
            }
            // Every client reaches the barrier, joined or not.
            barrier.wait().await;
            if let Ok(ws) = joined {
                if let Err(e) = run_client(client_id, ws, rate, &counters).await {
                    eprintln!("client {client_id} error: {e}");
                }
            }
        }));
    }

    barrier.wait().await;
    println!(
        "{} of {} clients joined",
        args.clients as u64 - counters.failed.load(Ordering::Relaxed),
        args.clients
    );

    let start = Instant::now();
    tokio::time::sleep(Duration::from_secs(args.duration)).await;
    let elapsed = start.elapsed().as_secs_f64();

    for handle in handles {
        handle.abort();
    }

    let sent = counters.sent.load(Ordering::Relaxed);
    let snapshots = counters.snapshots.load(Ordering::Relaxed);
    let chats = counters.chats.load(Ordering::Relaxed);
    let closed = counters.closed.load(Ordering::Relaxed);

    println!();
    println!("results over {elapsed:.2}s");
    println!("  guesses sent:      {sent:>10} ({:.0}/s)", sent as f64 / elapsed);
    println!("  snapshots received:{snapshots:>10} ({:.0}/s)", snapshots as f64 / elapsed);
    println!("  chat received:     {chats:>10} ({:.0}/s)", chats as f64 / elapsed);
    println!("  connections lost:  {closed:>10}");
    println!("  failed to join:    {:>10}", counters.failed.load(Ordering::Relaxed));
}

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn join(client_id: usize, url: &str) -> Result<Client, Box<dyn Error + Send + Sync>> {
    let (mut ws, _) = connect_async(url).await?;
    ws.send(Message::Text(format!("player{client_id}"))).await?;
    Ok(ws)
}

/// Guess at a fixed rate while counting everything the server sends.
///
/// Both directions run in this task, so aborting it stops the client.
async fn run_client(
    client_id: usize,
    ws: Client,
    rate: u64,
    counters: &Counters,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let (mut sender, mut receiver) = ws.split();
    let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / rate as f64));
    let mut i = client_id;

    loop {
        tokio::select! {
            msg = receiver.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    counters.closed.fetch_add(1, Ordering::Relaxed);
                    return Ok(());
                }
                Some(Ok(msg)) => count(msg, counters),
            },
            _ = interval.tick() => {
                let guess = GUESSES[i % GUESSES.len()];
                i += 1;
                sender.send(Message::Text(guess.to_string())).await?;
                counters.sent.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

fn count(msg: Message, counters: &Counters) {
    let payload = match msg {
        Message::Text(text) => Payload::Text(text),
        Message::Binary(data) => Payload::Binary(data.into()),
        _ => return,
    };
    match codec::decode(&payload) {
        Ok(ServerMessage::State(_)) => {
            counters.snapshots.fetch_add(1, Ordering::Relaxed);
        }
        Ok(ServerMessage::Chat { .. }) => {
            counters.chats.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => eprintln!("undecodable message: {e}"),
    }
}
