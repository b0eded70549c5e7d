//! Received message handle.
//!
//! A [`ReceivedMessage`] owns the pooled buffer its bytes were assembled in.
//! The bytes are readable only while the handle is alive: disposing it
//! returns the buffer to the arena, and the borrow checker rejects any
//! slice that outlives the handle.
//!
//! ```ignore
//! let reply = channel.receive(&cancel).await?;
//! assert_eq!(reply.kind(), MessageKind::Text);
//! println!("{}", reply.as_text()?);
//! reply.dispose();
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str;

use crate::arena::PooledBuffer;
use crate::error::{Error, Result};
use crate::transport::{CloseStatus, MessageKind};

// ============================================================================
// ReceivedMessage
// ============================================================================

/// One complete message (or close signal) on loan from the arena.
///
/// Dropping the handle releases the buffer exactly like
/// [`dispose`](Self::dispose), so every exit path (return, `?`, cancellation
/// of the enclosing task) gives the buffer back.
pub struct ReceivedMessage {
    buffer: PooledBuffer,
    kind: MessageKind,
    close_status: Option<CloseStatus>,
}

impl ReceivedMessage {
    pub(crate) fn new(
        buffer: PooledBuffer,
        kind: MessageKind,
        close_status: Option<CloseStatus>,
    ) -> Self {
        Self {
            buffer,
            kind,
            close_status,
        }
    }

    /// Returns the message bytes (exact message length).
    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    /// Returns the message length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns `true` for a zero-length message.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns the message kind.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Returns `true` if this handle carries the peer's close signal.
    #[inline]
    #[must_use]
    pub fn is_close(&self) -> bool {
        self.kind.is_close()
    }

    /// Returns the peer's close status, if it sent one.
    #[inline]
    #[must_use]
    pub fn close_status(&self) -> Option<&CloseStatus> {
        self.close_status.as_ref()
    }

    /// Returns the bytes as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the bytes are not valid UTF-8.
    pub fn as_text(&self) -> Result<&str> {
        str::from_utf8(self.data())
            .map_err(|e| Error::protocol(format!("message is not valid UTF-8: {e}")))
    }

    /// Releases the backing buffer to its arena.
    #[inline]
    pub fn dispose(self) {
        drop(self);
    }
}

impl AsRef<[u8]> for ReceivedMessage {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.data()
    }
}

impl fmt::Debug for ReceivedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceivedMessage")
            .field("kind", &self.kind)
            .field("len", &self.len())
            .field("close_status", &self.close_status)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
