//! Message channel: pull-based send/receive over one connection.
//!
//! # Receive Loop
//!
//! ```text
//! acquire buffer ─► receive_frame(tail, chunk) ─► assembler ─┬─ Reading ──────► loop
//!                          ▲                                 ├─ FinalReceived ─► handle(kind)
//!                          │                                 ├─ CloseReceived ─► handle(close)
//!                   cancel / error ─► release buffer ─► Err  └─ violation ─────► release, Err
//! ```
//!
//! Every receive borrows exactly one arena buffer. On success the buffer
//! moves into the returned [`ReceivedMessage`]; on any failure it is
//! released before the error propagates.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::arena::{BufferArena, PooledBuffer};
use crate::cancel::Cancellation;
use crate::error::{Error, Result};
use crate::transport::{ClientStream, CloseStatus, MessageKind, Transport, WebSocketTransport};

use super::assembler::{Assembler, Progress};
use super::builder::ChannelBuilder;
use super::message::ReceivedMessage;
use super::options::ChannelOptions;

// ============================================================================
// ChannelId
// ============================================================================

/// Source of process-unique channel IDs.
static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique channel identifier, used in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

impl ChannelId {
    /// Allocates the next ID.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// ChannelState
// ============================================================================

/// Lifecycle of a [`MessageChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Send and receive are allowed.
    Open,
    /// The peer's close signal was delivered to the caller.
    CloseReceived,
    /// [`MessageChannel::close`] ran.
    Closed,
    /// A transport or protocol failure poisoned the connection.
    Failed,
}

// ============================================================================
// MessageChannel
// ============================================================================

/// Pull-based message I/O over one WebSocket connection.
///
/// Each [`receive`](Self::receive) suspends until one complete message has
/// been assembled into a pooled buffer, so request/response steps compose
/// linearly without callbacks.
///
/// # Thread Safety
///
/// All I/O methods take `&mut self`: calls on one channel are serialized at
/// compile time. Distinct channels are independent and may run concurrently,
/// sharing one [`BufferArena`].
pub struct MessageChannel<T = WebSocketTransport<ClientStream>> {
    id: ChannelId,
    transport: T,
    arena: BufferArena,
    options: ChannelOptions,
    state: ChannelState,
    /// A cancelled receive left fragments of its message unread.
    resync: bool,
}

// ============================================================================
// MessageChannel - Constructors
// ============================================================================

impl MessageChannel {
    /// Creates a builder for configuring a channel.
    #[inline]
    #[must_use]
    pub fn builder() -> ChannelBuilder {
        ChannelBuilder::new()
    }

    /// Connects to `address` with default options and the shared arena.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the address is not a `ws`/`wss` URL
    /// - [`Error::Connection`] if the handshake fails
    /// - [`Error::Cancelled`] if `cancel` fires first
    pub async fn connect(address: &str, cancel: &Cancellation) -> Result<Self> {
        ChannelBuilder::new().connect(address, cancel).await
    }
}

impl<T: Transport> MessageChannel<T> {
    /// Wraps an established transport, borrowing from the shared arena.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the options are invalid.
    pub fn with_transport(transport: T, options: ChannelOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self::from_parts(transport, BufferArena::shared(), options))
    }

    pub(crate) fn from_parts(transport: T, arena: BufferArena, options: ChannelOptions) -> Self {
        let id = ChannelId::next();
        debug!(channel = %id, chunk_size = options.chunk_size, "Channel opened");

        Self {
            id,
            transport,
            arena,
            options,
            state: ChannelState::Open,
            resync: false,
        }
    }
}

// ============================================================================
// MessageChannel - Accessors
// ============================================================================

impl<T: Transport> MessageChannel<T> {
    /// Returns the channel ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Returns the lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Returns `true` if send and receive are allowed.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == ChannelState::Open && self.transport.is_open()
    }

    /// Returns the channel options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ChannelOptions {
        &self.options
    }

    /// Returns the arena this channel borrows buffers from.
    #[inline]
    #[must_use]
    pub fn arena(&self) -> &BufferArena {
        &self.arena
    }

    /// Returns the underlying transport.
    #[inline]
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

// ============================================================================
// MessageChannel - Send
// ============================================================================

impl<T: Transport> MessageChannel<T> {
    /// Sends `text` as one complete text message.
    ///
    /// The text is staged in an arena buffer that travels to the transport
    /// as owned [`Bytes`] and returns to the arena once the frame has been
    /// written.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the channel is not open
    /// - Transport errors if the transmit fails
    /// - [`Error::Cancelled`] if `cancel` fires mid-send
    pub async fn send_text(&mut self, text: &str, cancel: &Cancellation) -> Result<()> {
        let staged = self.stage(text.as_bytes());
        self.send_message(staged, MessageKind::Text, cancel).await
    }

    /// Sends `payload` as one complete binary message.
    ///
    /// The socket layer needs owned bytes, so the payload is staged in an
    /// arena buffer. Use [`send_bytes`](Self::send_bytes) to hand over
    /// owned bytes without any copy.
    ///
    /// # Errors
    ///
    /// Same as [`send_text`](Self::send_text).
    pub async fn send_binary(&mut self, payload: &[u8], cancel: &Cancellation) -> Result<()> {
        let staged = self.stage(payload);
        self.send_message(staged, MessageKind::Binary, cancel).await
    }

    /// Sends owned `payload` as one complete binary message, without copying
    /// it.
    ///
    /// # Errors
    ///
    /// Same as [`send_text`](Self::send_text).
    pub async fn send_bytes(&mut self, payload: Bytes, cancel: &Cancellation) -> Result<()> {
        self.send_message(payload, MessageKind::Binary, cancel).await
    }

    /// Copies `bytes` into an arena buffer owned by the returned [`Bytes`].
    fn stage(&self, bytes: &[u8]) -> Bytes {
        let mut buffer = self.arena.acquire();
        buffer.extend_from_slice(bytes);
        Bytes::from_owner(buffer)
    }

    /// Transmits one final frame.
    ///
    /// A cancellation observed before the transport is touched leaves the
    /// channel open. Once the transport has started writing, the frame may
    /// still reach the peer, so cancelling from then on fails the channel.
    async fn send_message(
        &mut self,
        payload: Bytes,
        kind: MessageKind,
        cancel: &Cancellation,
    ) -> Result<()> {
        if !self.is_open() {
            return Err(Error::ConnectionClosed);
        }

        if cancel.is_cancelled() {
            debug!(channel = %self.id, "Send cancelled before transmit");
            return Err(Error::cancelled("send"));
        }

        let len = payload.len();
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::cancelled("send")),
            result = self.transport.send_frame(payload, kind, true) => result,
        };

        match &result {
            Ok(()) => trace!(channel = %self.id, len, %kind, "Message sent"),
            Err(e) if e.is_cancelled() => {
                warn!(channel = %self.id, len, "Send cancelled mid-transmit, channel failed");
                self.state = ChannelState::Failed;
            }
            Err(e) => {
                warn!(channel = %self.id, error = %e, "Send failed");
                self.state = ChannelState::Failed;
            }
        }

        result
    }
}

// ============================================================================
// MessageChannel - Receive
// ============================================================================

impl<T: Transport> MessageChannel<T> {
    /// Receives the next complete message.
    ///
    /// Fragments are appended to one arena buffer until the final fragment
    /// arrives. A close signal ends the loop immediately and is returned as
    /// a [`MessageKind::Close`] handle holding whatever bytes were already
    /// accumulated; after that the channel only accepts [`close`](Self::close).
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the channel already saw a close
    ///   signal, was closed, or the connection drops mid-message
    /// - [`Error::Protocol`] on an inconsistent fragment sequence or a
    ///   message over the size limit
    /// - [`Error::Cancelled`] if `cancel` fires before completion
    ///
    /// No buffer is leaked on any of these paths.
    pub async fn receive(&mut self, cancel: &Cancellation) -> Result<ReceivedMessage> {
        if self.state != ChannelState::Open {
            return Err(Error::ConnectionClosed);
        }

        let mut buffer = self.arena.acquire();
        let mut assembler = Assembler::new(self.options.max_message_size);
        let mut discarding = self.resync;

        loop {
            let pulled = tokio::select! {
                biased;
                () = cancel.cancelled() => Err(Error::cancelled("receive")),
                frame = self.transport.receive_frame(buffer.as_mut_vec(), self.options.chunk_size) => frame,
            };

            let info = match pulled {
                Ok(info) => info,
                Err(e) => return Err(self.abort_receive(&mut assembler, buffer, e)),
            };

            trace!(
                channel = %self.id,
                len = info.len,
                kind = %info.kind,
                is_final = info.is_final,
                "Fragment received"
            );

            if discarding && !info.kind.is_close() {
                buffer.clear();
                if info.is_final {
                    debug!(channel = %self.id, "Discarded remainder of interrupted message");
                    discarding = false;
                    self.resync = false;
                }
                continue;
            }

            match assembler.on_fragment(info) {
                Ok(Progress::Reading) => {}

                Ok(Progress::Complete(kind)) => {
                    trace!(
                        channel = %self.id,
                        len = buffer.len(),
                        fragments = assembler.fragments(),
                        %kind,
                        "Message assembled"
                    );
                    return Ok(ReceivedMessage::new(buffer, kind, None));
                }

                Ok(Progress::Closed(status)) => {
                    debug!(
                        channel = %self.id,
                        status = ?status,
                        partial = buffer.len(),
                        "Close signal received"
                    );
                    self.state = ChannelState::CloseReceived;
                    self.resync = false;
                    return Ok(ReceivedMessage::new(buffer, MessageKind::Close, status));
                }

                Err(e) => return Err(self.abort_receive(&mut assembler, buffer, e)),
            }
        }
    }

    /// Releases the partial buffer and records what the failure means for
    /// the channel.
    fn abort_receive(
        &mut self,
        assembler: &mut Assembler,
        buffer: PooledBuffer,
        err: Error,
    ) -> Error {
        let partial = buffer.len();
        assembler.fail();
        self.arena.release(buffer);

        if err.is_cancelled() {
            if assembler.has_progress() {
                self.resync = true;
            }
            debug!(channel = %self.id, partial, "Receive cancelled");
        } else {
            warn!(channel = %self.id, partial, error = %err, "Receive failed");
            self.state = ChannelState::Failed;
        }

        err
    }
}

// ============================================================================
// MessageChannel - Close
// ============================================================================

impl<T: Transport> MessageChannel<T> {
    /// Performs the close handshake with `status`.
    ///
    /// The channel is unusable for send/receive once this returns, whether
    /// or not the handshake succeeded. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// - Transport errors if the close handshake fails
    /// - [`Error::Cancelled`] if `cancel` fires first
    pub async fn close(&mut self, status: CloseStatus, cancel: &Cancellation) -> Result<()> {
        if self.state == ChannelState::Closed {
            return Ok(());
        }

        debug!(channel = %self.id, %status, "Closing channel");

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::cancelled("close")),
            result = self.transport.close(status) => result,
        };

        self.state = ChannelState::Closed;
        self.resync = false;

        if let Err(e) = &result {
            warn!(channel = %self.id, error = %e, "Close handshake failed");
        }

        result
    }
}

impl<T> Drop for MessageChannel<T> {
    fn drop(&mut self) {
        if self.state == ChannelState::Open {
            debug!(channel = %self.id, "Channel dropped without close");
        }
    }
}

impl<T> fmt::Debug for MessageChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageChannel")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
