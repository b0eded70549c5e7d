//! Round-trip benchmark suite.
//!
//! Benchmarks send/receive cycles through a loopback echo peer:
//! - Payload sizes: 64 B, 4 KiB, 64 KiB, 1 MiB
//! - Arena acquire/release overhead
//!
//! Run with: cargo bench --bench round_trip
//! Results saved to: target/criterion/

use std::hint::black_box;
use std::time::{Duration, Instant};

use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use pooled_websocket::{
    BufferArena, Cancellation, ChannelBuilder, CloseStatus, MessageKind, Result,
    WebSocketTransport,
};
use tokio::io::DuplexStream;
use tokio::runtime::Runtime;

// ============================================================================
// Benchmark Parameters
// ============================================================================

const PAYLOAD_SIZES: &[usize] = &[64, 4 * 1024, 64 * 1024, 1024 * 1024];

// ============================================================================
// Benchmark: Round Trip
// ============================================================================

fn bench_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("round_trip");
    group.measurement_time(Duration::from_secs(10));

    for &size in PAYLOAD_SIZES {
        group.throughput(Throughput::Bytes(size as u64 * 2));
        group.bench_with_input(BenchmarkId::new("binary", size), &size, |b, &size| {
            b.iter_custom(|iters| rt.block_on(round_trips(size, iters)));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Arena
// ============================================================================

fn bench_arena(c: &mut Criterion) {
    let arena = BufferArena::new();

    c.bench_function("arena_acquire_release", |b| {
        b.iter(|| {
            let mut buf = arena.acquire();
            buf.extend_from_slice(black_box(b"payload"));
            arena.release(buf);
        });
    });
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Echoes binary messages until the peer closes.
async fn echo(server: WebSocketTransport<DuplexStream>, arena: BufferArena) -> Result<()> {
    let mut channel = ChannelBuilder::new().arena(arena).wrap(server)?;
    let cancel = Cancellation::never();

    loop {
        let message = channel.receive(&cancel).await?;
        if message.kind() == MessageKind::Close {
            return channel.close(CloseStatus::normal(), &cancel).await;
        }
        channel.send_binary(message.data(), &cancel).await?;
    }
}

/// Runs `iters` send/receive cycles and returns the time spent in them.
async fn round_trips(size: usize, iters: u64) -> Duration {
    let arena = BufferArena::new();
    let (client, server) = WebSocketTransport::pair().await.unwrap();

    let echo = tokio::spawn(echo(server, arena.clone()));

    let mut channel = ChannelBuilder::new().arena(arena).wrap(client).unwrap();
    let cancel = Cancellation::never();
    let payload = Bytes::from(vec![0xAB; size]);

    let start = Instant::now();
    for _ in 0..iters {
        channel.send_bytes(payload.clone(), &cancel).await.unwrap();
        let reply = channel.receive(&cancel).await.unwrap();
        black_box(reply.len());
    }
    let elapsed = start.elapsed();

    channel
        .close(CloseStatus::normal(), &cancel)
        .await
        .unwrap();
    let _ = echo.await;

    elapsed
}

criterion_group!(benches, bench_round_trip, bench_arena);
criterion_main!(benches);
