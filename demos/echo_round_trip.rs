//! Echo round trip over a local WebSocket server.
//!
//! Demonstrates:
//! - Connecting a MessageChannel to a `ws://` address
//! - Text and large binary round trips
//! - Arena reuse across messages
//! - Cancelling a receive with a deadline
//!
//! Usage:
//!   cargo run --example echo_round_trip
//!   cargo run --example echo_round_trip -- --debug

// ============================================================================
// Imports
// ============================================================================

use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use bytes::Bytes;
use pooled_websocket::{
    BufferArena, Cancellation, CloseStatus, MessageChannel, MessageKind, WebSocketTransport,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const LARGE_PAYLOAD: usize = 4 * 1024 * 1024;
const ROUNDS: usize = 100;

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let debug = std::env::args().any(|a| a == "--debug");
    init_logging(debug);

    if let Err(e) = run().await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    println!("=== Echo Round Trip ===\n");

    let arena = BufferArena::new();

    // ========================================================================
    // Start Server
    // ========================================================================

    println!("[Setup] Starting echo server...");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = format!("ws://{}/", listener.local_addr()?);
    let server = tokio::spawn(serve_one(listener, arena.clone()));
    println!("        ✓ Listening on {address}\n");

    // ========================================================================
    // Connect
    // ========================================================================

    let cancel = Cancellation::never();
    let mut channel = MessageChannel::builder()
        .arena(arena.clone())
        .connect(&address, &cancel)
        .await
        .context("connect")?;
    println!("[Connect] ✓ Channel {} open\n", channel.id());

    // ========================================================================
    // Text
    // ========================================================================

    println!("[Text] Sending \"ping\"...");
    channel.send_text("ping", &cancel).await?;
    let reply = channel.receive(&cancel).await?;
    println!("       ✓ Received {:?} ({} bytes)", reply.as_text()?, reply.len());
    reply.dispose();

    // ========================================================================
    // Large Binary
    // ========================================================================

    println!("\n[Binary] Sending {LARGE_PAYLOAD} bytes...");
    let payload: Bytes = (0..LARGE_PAYLOAD).map(|i| (i % 251) as u8).collect();
    channel.send_bytes(payload.clone(), &cancel).await?;
    let reply = channel.receive(&cancel).await?;
    if reply.kind() != MessageKind::Binary || reply.data() != &payload[..] {
        bail!("binary echo mismatch ({} bytes back)", reply.len());
    }
    println!("         ✓ Echo matches ({} bytes)", reply.len());
    drop(reply);

    // ========================================================================
    // Arena Reuse
    // ========================================================================

    println!("\n[Arena] Running {ROUNDS} small round trips...");
    let before = arena.stats();
    let start = Instant::now();
    for round in 0..ROUNDS {
        channel.send_text(&format!("round {round}"), &cancel).await?;
        channel.receive(&cancel).await?.dispose();
    }
    let after = arena.stats();
    println!("        ✓ {ROUNDS} rounds in {:?}", start.elapsed());
    println!(
        "        ✓ Buffers created: {} before, {} after ({} idle)",
        before.created, after.created, after.idle
    );

    // ========================================================================
    // Cancellation
    // ========================================================================

    println!("\n[Cancel] Receiving with a 50ms deadline...");
    match channel
        .receive(&Cancellation::after(Duration::from_millis(50)))
        .await
    {
        Err(e) if e.is_cancelled() => println!("         ✓ {e}"),
        Err(e) => return Err(e.into()),
        Ok(message) => bail!("unexpected {} message", message.kind()),
    }

    // ========================================================================
    // Close
    // ========================================================================

    println!("\n[Close] Closing channel...");
    channel.close(CloseStatus::normal(), &cancel).await?;
    server.await??;
    println!("        ✓ Closed, {} buffers leased", arena.stats().leased);

    println!("\n=== Done ===");
    Ok(())
}

// ============================================================================
// Server
// ============================================================================

/// Accepts one client and echoes every message back until it closes.
async fn serve_one(listener: TcpListener, arena: BufferArena) -> anyhow::Result<()> {
    let (stream, peer) = listener.accept().await?;
    tracing::debug!(%peer, "Accepted client");

    let ws = tokio_tungstenite::accept_async(stream).await?;
    let mut channel = MessageChannel::builder()
        .arena(arena)
        .wrap(WebSocketTransport::new(ws))?;
    let cancel = Cancellation::never();

    loop {
        let message = channel.receive(&cancel).await?;
        match message.kind() {
            MessageKind::Text => channel.send_text(message.as_text()?, &cancel).await?,
            MessageKind::Binary => channel.send_binary(message.data(), &cancel).await?,
            MessageKind::Close => {
                message.dispose();
                channel.close(CloseStatus::normal(), &cancel).await?;
                return Ok(());
            }
        }
    }
}

// ============================================================================
// Logging
// ============================================================================

fn init_logging(debug: bool) {
    let filter = if debug {
        "pooled_websocket=debug"
    } else {
        "pooled_websocket=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}
