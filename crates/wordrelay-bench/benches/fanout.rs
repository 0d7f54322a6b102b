//! Fan-out benchmarks for the hub state machine.
//!
//! Every tick and chat line is broadcast to all sessions, so the cost of
//! one hub event grows with the number of connected clients.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tokio::sync::mpsc;
use wordrelay_core::{HubConfig, HubState, Outbound, ScriptedWords, SessionHandle, SessionId};
use wordrelay_protocol::ClientIntent;

const SESSION_COUNTS: [usize; 4] = [1, 16, 256, 1024];

fn hub_with_sessions(n: usize) -> (HubState, Vec<mpsc::Receiver<Outbound>>) {
    let words = ScriptedWords::new(["gopher", "banana", "apple"]).expect("valid words");
    let mut state = HubState::new(Box::new(words), &HubConfig::default());
    let mut receivers = Vec::with_capacity(n);

    for i in 0..n {
        let id = SessionId::from_raw(i as u64 + 1);
        let (handle, rx) = SessionHandle::new(id, 256);
        state.register(handle);
        state.submit(id, ClientIntent::Join(format!("player{i}")));
        receivers.push(rx);
    }
    drain(&mut receivers);
    (state, receivers)
}

fn drain(receivers: &mut [mpsc::Receiver<Outbound>]) {
    for rx in receivers {
        while rx.try_recv().is_ok() {}
    }
}

/// Benchmark one clock tick broadcast.
fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");

    for n in SESSION_COUNTS {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let (mut state, mut receivers) = hub_with_sessions(n);
            b.iter(|| {
                black_box(state.tick());
                drain(&mut receivers);
            });
        });
    }

    group.finish();
}

/// Benchmark a chat line broadcast.
fn bench_chat(c: &mut Criterion) {
    let mut group = c.benchmark_group("chat");

    for n in SESSION_COUNTS {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let (mut state, mut receivers) = hub_with_sessions(n);
            let id = SessionId::from_raw(1);
            b.iter(|| {
                black_box(state.submit(id, ClientIntent::Guess("not it".into())));
                drain(&mut receivers);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_tick, bench_chat);
criterion_main!(benches);
