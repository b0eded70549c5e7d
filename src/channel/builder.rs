//! Builder pattern for channel configuration.
//!
//! Provides a fluent API for configuring and creating [`MessageChannel`]
//! instances.
//!
//! # Example
//!
//! ```no_run
//! use pooled_websocket::{BufferArena, Cancellation, MessageChannel};
//!
//! # async fn example() -> pooled_websocket::Result<()> {
//! let arena = BufferArena::new();
//! let channel = MessageChannel::builder()
//!     .chunk_size(32 * 1024)
//!     .arena(arena.clone())
//!     .connect("ws://127.0.0.1:9001", &Cancellation::never())
//!     .await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use tracing::info;
use url::Url;

use crate::arena::BufferArena;
use crate::cancel::Cancellation;
use crate::error::{Error, Result};
use crate::transport::{Transport, WebSocketTransport};

use super::core::MessageChannel;
use super::options::ChannelOptions;

// ============================================================================
// ChannelBuilder
// ============================================================================

/// Builder for configuring a [`MessageChannel`].
///
/// Use [`MessageChannel::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct ChannelBuilder {
    /// Receive options.
    options: ChannelOptions,
    /// Arena override. Defaults to [`BufferArena::shared`].
    arena: Option<BufferArena>,
}

// ============================================================================
// ChannelBuilder Implementation
// ============================================================================

impl ChannelBuilder {
    /// Creates a builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bytes pulled from the transport per receive iteration.
    #[inline]
    #[must_use]
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.options.chunk_size = chunk_size;
        self
    }

    /// Sets the largest message `receive` accepts.
    #[inline]
    #[must_use]
    pub fn max_message_size(mut self, max: usize) -> Self {
        self.options.max_message_size = Some(max);
        self
    }

    /// Replaces all options at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ChannelOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the arena buffers are borrowed from.
    #[inline]
    #[must_use]
    pub fn arena(mut self, arena: BufferArena) -> Self {
        self.arena = Some(arena);
        self
    }

    /// Wraps an already-established transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the options are invalid.
    pub fn wrap<T: Transport>(self, transport: T) -> Result<MessageChannel<T>> {
        self.options.validate()?;
        let arena = self.arena.unwrap_or_else(BufferArena::shared);

        Ok(MessageChannel::from_parts(transport, arena, self.options))
    }

    /// Connects to `address` and builds the channel.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the options or the address are invalid
    /// - [`Error::Connection`] if the handshake fails
    /// - [`Error::Cancelled`] if `cancel` fires first
    pub async fn connect(self, address: &str, cancel: &Cancellation) -> Result<MessageChannel> {
        self.options.validate()?;
        let url = validate_address(address)?;

        let transport = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::cancelled("connect")),
            result = WebSocketTransport::connect(url.as_str()) => result,
        }?;

        info!(%url, "WebSocket channel connected");

        self.wrap(transport)
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Parses `address` and requires a WebSocket scheme.
fn validate_address(address: &str) -> Result<Url> {
    let url = Url::parse(address)
        .map_err(|e| Error::config(format!("Invalid address '{address}': {e}")))?;

    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(Error::config(format!(
            "Unsupported scheme '{other}' in '{address}', expected ws or wss"
        ))),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = ChannelBuilder::new();
        assert_eq!(builder.options, ChannelOptions::default());
        assert!(builder.arena.is_none());
    }

    #[test]
    fn test_builder_setters() {
        let builder = ChannelBuilder::new()
            .chunk_size(1024)
            .max_message_size(1 << 20);
        assert_eq!(builder.options.chunk_size, 1024);
        assert_eq!(builder.options.max_message_size, Some(1 << 20));
    }

    #[test]
    fn test_validate_address() {
        assert!(validate_address("ws://127.0.0.1:9001/echo").is_ok());
        assert!(validate_address("wss://example.com").is_ok());

        let err = validate_address("http://example.com").expect_err("http rejected");
        assert!(matches!(err, Error::Config { .. }));

        let err = validate_address("not a url").expect_err("garbage rejected");
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_connect_rejects_zero_chunk() {
        let err = ChannelBuilder::new()
            .chunk_size(0)
            .connect("ws://127.0.0.1:1", &Cancellation::never())
            .await
            .expect_err("zero chunk");
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_connect_refused_is_connection_error() {
        // Bind then drop to get a port with no listener
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let err = ChannelBuilder::new()
            .connect(&format!("ws://127.0.0.1:{port}"), &Cancellation::never())
            .await
            .expect_err("nothing listening");
        assert!(err.is_transport_error());
    }

    #[tokio::test]
    async fn test_connect_cancelled_before_start() {
        let (handle, cancel) = Cancellation::new();
        handle.cancel();

        let err = ChannelBuilder::new()
            .connect("ws://127.0.0.1:1", &cancel)
            .await
            .expect_err("cancelled");
        assert!(err.is_cancelled());
    }
}
