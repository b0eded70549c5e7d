//! Pooled WebSocket - allocation-minimizing pull-based message I/O.
//!
//! This library wraps a WebSocket connection with send/receive primitives
//! built for high-throughput request/response traffic such as load tests.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  acquire / release  ┌──────────────────┐
//! │ BufferArena  │◄───────────────────►│  MessageChannel  │
//! │ (shared pool)│                     │  send / receive  │
//! └──────────────┘                     └────────┬─────────┘
//!                                               │ fragments
//!                                      ┌────────▼─────────┐
//!                                      │    Transport     │
//!                                      │ (tokio-tungstenite)
//!                                      └──────────────────┘
//! ```
//!
//! Key design principles:
//!
//! - One logical message is assembled into one pooled buffer, regardless of
//!   how many fragments carried it
//! - [`ReceivedMessage`] owns its buffer; dropping or disposing it is the
//!   only way the buffer returns to the arena
//! - Pull-based: `send` then `receive` composes linearly, no callbacks
//! - Cooperative cancellation on every operation, with guaranteed release
//!
//! # Quick Start
//!
//! ```no_run
//! use pooled_websocket::{Cancellation, CloseStatus, MessageChannel, MessageKind, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let cancel = Cancellation::never();
//!     let mut channel = MessageChannel::connect("ws://127.0.0.1:9001", &cancel).await?;
//!
//!     channel.send_text("ping", &cancel).await?;
//!
//!     let reply = channel.receive(&cancel).await?;
//!     assert_eq!(reply.kind(), MessageKind::Text);
//!     println!("reply: {}", reply.as_text()?);
//!     reply.dispose();
//!
//!     channel.close(CloseStatus::normal(), &cancel).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`arena`] | Pooled buffer arena |
//! | [`cancel`] | Cooperative cancellation tokens |
//! | [`channel`] | [`MessageChannel`], [`ReceivedMessage`], options |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`transport`] | Fragment-level transport seam and WebSocket implementation |

// ============================================================================
// Modules
// ============================================================================

/// Pooled buffer arena.
///
/// [`BufferArena`] hands out [`PooledBuffer`]s and takes them back.
pub mod arena;

/// Cooperative cancellation.
pub mod cancel;

/// Message channel and received message handle.
///
/// Use [`MessageChannel::connect`] or [`MessageChannel::builder()`].
pub mod channel;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Fragment-level transport.
///
/// Implement [`Transport`] to drive a channel over something other than
/// tokio-tungstenite.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Arena types
pub use arena::{ArenaConfig, ArenaStats, BufferArena, PooledBuffer};

// Cancellation types
pub use cancel::{CancelHandle, Cancellation};

// Channel types
pub use channel::{
    ChannelBuilder, ChannelId, ChannelOptions, ChannelState, MessageChannel, ReceivedMessage,
};

// Error types
pub use error::{Error, Result};

// Transport types
pub use transport::{CloseStatus, FrameInfo, MessageKind, Transport, WebSocketTransport};
