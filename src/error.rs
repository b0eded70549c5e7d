//! Error types for pooled WebSocket channels.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use pooled_websocket::{Cancellation, MessageChannel, Result};
//!
//! async fn example(channel: &mut MessageChannel) -> Result<()> {
//!     let cancel = Cancellation::never();
//!     channel.send_text("ping", &cancel).await?;
//!     let reply = channel.receive(&cancel).await?;
//!     assert_eq!(reply.data(), b"ping");
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Transport | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::Transport`], [`Error::WebSocket`], [`Error::Io`] |
//! | Cancellation | [`Error::Cancelled`] |
//! | Protocol | [`Error::Protocol`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when channel or arena configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// WebSocket connection failed.
    ///
    /// Returned when the handshake cannot be completed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection is not open.
    ///
    /// Returned when the channel was closed, observed a close signal, or
    /// the peer dropped the connection before a message completed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Transport failure during an operation.
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },

    // ========================================================================
    // Cancellation
    // ========================================================================
    /// Operation cancelled by the caller's cancellation token.
    #[error("Operation cancelled: {operation}")]
    Cancelled {
        /// The operation that was unwound.
        operation: &'static str,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Inconsistent fragment sequence or oversized message.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a transport error.
    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a cancellation error for the named operation.
    #[inline]
    pub fn cancelled(operation: &'static str) -> Self {
        Self::Cancelled { operation }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error came from the transport layer.
    ///
    /// Protocol violations count as transport errors since the layer
    /// cannot recover from either.
    #[inline]
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionClosed
                | Self::Transport { .. }
                | Self::Protocol { .. }
                | Self::WebSocket(_)
                | Self::Io(_)
        )
    }

    /// Returns `true` if this is a cancellation error.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Returns `true` if this is a protocol violation.
    #[inline]
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }

    /// Returns `true` if the connection is known to be unusable.
    #[inline]
    #[must_use]
    pub fn is_connection_closed(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed
                | Self::WebSocket(WsError::ConnectionClosed | WsError::AlreadyClosed)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::connection("handshake refused");
        assert_eq!(err.to_string(), "Connection failed: handshake refused");
    }

    #[test]
    fn test_cancelled_display() {
        let err = Error::cancelled("receive");
        assert_eq!(err.to_string(), "Operation cancelled: receive");
    }

    #[test]
    fn test_is_transport_error() {
        assert!(Error::connection("x").is_transport_error());
        assert!(Error::ConnectionClosed.is_transport_error());
        assert!(Error::transport("x").is_transport_error());
        assert!(Error::protocol("x").is_transport_error());
        assert!(!Error::cancelled("send").is_transport_error());
        assert!(!Error::config("x").is_transport_error());
    }

    #[test]
    fn test_is_cancelled() {
        assert!(Error::cancelled("connect").is_cancelled());
        assert!(!Error::ConnectionClosed.is_cancelled());
    }

    #[test]
    fn test_is_connection_closed() {
        assert!(Error::ConnectionClosed.is_connection_closed());
        assert!(Error::WebSocket(WsError::AlreadyClosed).is_connection_closed());
        assert!(!Error::transport("reset").is_connection_closed());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::BrokenPipe, "pipe closed");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.is_transport_error());
    }
}
