//! Message channel.
//!
//! Wraps one open transport connection and exposes connect, send, receive
//! and close, with receive assembling fragments into pooled buffers.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `assembler` | Fragment reassembly state machine |
//! | `builder` | [`ChannelBuilder`] fluent configuration |
//! | `core` | [`MessageChannel`] send/receive/close |
//! | `message` | [`ReceivedMessage`] response handle |
//! | `options` | [`ChannelOptions`] |

// ============================================================================
// Submodules
// ============================================================================

mod assembler;

/// Builder pattern for channel configuration.
pub mod builder;

/// Message channel implementation.
pub mod core;

/// Received message handle.
pub mod message;

/// Channel options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ChannelBuilder;
pub use self::core::{ChannelId, ChannelState, MessageChannel};
pub use message::ReceivedMessage;
pub use options::{ChannelOptions, DEFAULT_CHUNK_SIZE};
