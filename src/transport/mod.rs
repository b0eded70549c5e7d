//! Frame-level transport seam.
//!
//! A [`MessageChannel`](crate::channel::MessageChannel) never talks to a
//! socket directly. It drives a [`Transport`], which moves individual
//! fragments of WebSocket messages over an already-negotiated connection.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   send_frame / receive_frame   ┌──────────────────┐
//! │  MessageChannel  │ ─────────────────────────────► │    Transport     │
//! │  (reassembly,    │                                │  (WebSocket I/O) │
//! │   arena buffers) │ ◄───── FrameInfo + bytes ───── │                  │
//! └──────────────────┘                                └──────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `websocket` | tokio-tungstenite backed [`Transport`] |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// tokio-tungstenite transport implementation.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use websocket::{ClientStream, WebSocketTransport};

// ============================================================================
// MessageKind
// ============================================================================

/// Kind of a WebSocket message or fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// UTF-8 text payload.
    Text,
    /// Opaque binary payload.
    Binary,
    /// Close signal from the peer.
    Close,
}

impl MessageKind {
    /// Returns `true` for [`MessageKind::Close`].
    #[inline]
    #[must_use]
    pub const fn is_close(self) -> bool {
        matches!(self, Self::Close)
    }

    /// Returns the lowercase name used in logs.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Binary => "binary",
            Self::Close => "close",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// CloseStatus
// ============================================================================

/// Close code and reason carried by a WebSocket close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseStatus {
    /// RFC 6455 close code.
    pub code: u16,
    /// Human-readable reason (may be empty).
    pub reason: String,
}

impl CloseStatus {
    /// Normal closure (1000).
    pub const NORMAL: u16 = 1000;
    /// Endpoint going away (1001).
    pub const GOING_AWAY: u16 = 1001;
    /// Protocol error (1002).
    pub const PROTOCOL_ERROR: u16 = 1002;

    /// Creates a close status.
    #[inline]
    #[must_use]
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Normal closure with an empty reason.
    #[inline]
    #[must_use]
    pub fn normal() -> Self {
        Self::new(Self::NORMAL, "")
    }

    /// Going-away closure with an empty reason.
    #[inline]
    #[must_use]
    pub fn going_away() -> Self {
        Self::new(Self::GOING_AWAY, "")
    }
}

impl Default for CloseStatus {
    fn default() -> Self {
        Self::normal()
    }
}

impl fmt::Display for CloseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} ({})", self.code, self.reason)
        }
    }
}

// ============================================================================
// FrameInfo
// ============================================================================

/// Metadata for one fragment pulled by [`Transport::receive_frame`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    /// Bytes appended to the destination buffer.
    pub len: usize,
    /// Kind of the message this fragment belongs to.
    pub kind: MessageKind,
    /// Whether this fragment completes the message.
    pub is_final: bool,
    /// Peer close status, for close fragments that carried one.
    pub close_status: Option<CloseStatus>,
}

impl FrameInfo {
    /// Describes a data fragment.
    #[inline]
    #[must_use]
    pub const fn data(len: usize, kind: MessageKind, is_final: bool) -> Self {
        Self {
            len,
            kind,
            is_final,
            close_status: None,
        }
    }

    /// Describes a close fragment.
    #[inline]
    #[must_use]
    pub const fn close(status: Option<CloseStatus>) -> Self {
        Self {
            len: 0,
            kind: MessageKind::Close,
            is_final: true,
            close_status: status,
        }
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Fragment-level I/O over one established WebSocket connection.
///
/// Implementations follow the single-writer/single-reader discipline of the
/// underlying socket; callers never issue two sends or two receives at once.
#[async_trait]
pub trait Transport: Send {
    /// Transmits one fragment.
    ///
    /// The payload is handed over by ownership so implementations can pass
    /// it to the socket layer without copying.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) if the connection is not open
    /// - Transport errors if the transmit fails
    async fn send_frame(&mut self, payload: Bytes, kind: MessageKind, is_final: bool)
    -> Result<()>;

    /// Appends at most `limit` bytes of the next fragment to `dst`.
    ///
    /// Bytes already in `dst` are left untouched. A close signal is
    /// reported as a fragment of kind [`MessageKind::Close`].
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) if the connection drops
    /// - Transport errors on read failure
    async fn receive_frame(&mut self, dst: &mut Vec<u8>, limit: usize) -> Result<FrameInfo>;

    /// Performs the close handshake with the given status.
    async fn close(&mut self, status: CloseStatus) -> Result<()>;

    /// Returns `true` while the connection can carry frames.
    fn is_open(&self) -> bool;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_kind_display() {
        assert_eq!(MessageKind::Text.to_string(), "text");
        assert_eq!(MessageKind::Binary.to_string(), "binary");
        assert!(MessageKind::Close.is_close());
        assert!(!MessageKind::Text.is_close());
    }

    #[test]
    fn test_close_status_display() {
        assert_eq!(CloseStatus::normal().to_string(), "1000");
        assert_eq!(
            CloseStatus::new(CloseStatus::GOING_AWAY, "shutdown").to_string(),
            "1001 (shutdown)"
        );
    }

    #[test]
    fn test_frame_info_close_is_final() {
        let info = FrameInfo::close(Some(CloseStatus::normal()));
        assert_eq!(info.len, 0);
        assert!(info.is_final);
        assert!(info.kind.is_close());
    }
}
