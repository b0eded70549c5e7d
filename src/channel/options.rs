//! Message channel options.
//!
//! # Example
//!
//! ```ignore
//! use pooled_websocket::ChannelOptions;
//!
//! let options = ChannelOptions::new()
//!     .with_chunk_size(64 * 1024)
//!     .with_max_message_size(32 * 1024 * 1024);
//! ```

// ============================================================================
// Imports
// ============================================================================

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default bytes pulled from the transport per receive iteration (16 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

// ============================================================================
// ChannelOptions
// ============================================================================

/// Per-channel receive configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelOptions {
    /// Bytes requested from the transport per loop iteration.
    ///
    /// Affects iteration granularity only, never message content.
    pub chunk_size: usize,

    /// Largest message `receive` accepts. `None` means unbounded.
    pub max_message_size: Option<usize>,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelOptions {
    /// Creates options with a 16 KiB chunk size and no message limit.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_message_size: None,
        }
    }

    /// Sets the per-iteration chunk size.
    #[inline]
    #[must_use]
    pub const fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets the maximum accepted message size.
    #[inline]
    #[must_use]
    pub const fn with_max_message_size(mut self, max: usize) -> Self {
        self.max_message_size = Some(max);
        self
    }

    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `chunk_size` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::config("chunk_size must be greater than zero"));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
