//! tokio-tungstenite backed transport.
//!
//! tungstenite reassembles fragments before surfacing a message, so this
//! adapter re-exposes a received message as a sequence of `limit`-sized
//! fragments, with the final flag on the last one. Outbound non-final
//! fragments are held until the final fragment arrives and then written as
//! one message. A single final fragment is handed to tungstenite as is.
//!
//! Ping and pong control frames are answered by tungstenite and never
//! surface as fragments.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use crate::error::{Error, Result};

use super::{CloseStatus, FrameInfo, MessageKind, Transport};

// ============================================================================
// Types
// ============================================================================

/// Stream type produced by [`WebSocketTransport::connect`].
pub type ClientStream = MaybeTlsStream<TcpStream>;

/// Buffer size of the in-memory pipe used by [`WebSocketTransport::pair`].
const PAIR_PIPE_CAPACITY: usize = 64 * 1024;

/// Connection state as seen by this end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
    Open,
    /// Peer sent a close frame; tungstenite queues the reply.
    PeerClosed,
    Closed,
}

/// A received message being handed out in fragments.
struct Inbound {
    payload: Bytes,
    offset: usize,
    kind: MessageKind,
}

/// Outcome of pulling the next message off the stream.
enum Pulled {
    /// A data message is staged in `inbound`.
    Data,
    /// The peer sent a close frame.
    Close(Option<CloseStatus>),
}

/// Outbound fragments waiting for their final fragment.
struct Outbound {
    payload: Vec<u8>,
    kind: MessageKind,
}

// ============================================================================
// WebSocketTransport
// ============================================================================

/// [`Transport`] over a tokio-tungstenite [`WebSocketStream`].
///
/// Works with any stream (TCP, TLS, in-memory pipes).
pub struct WebSocketTransport<S> {
    ws: WebSocketStream<S>,
    state: LinkState,
    inbound: Option<Inbound>,
    outbound: Option<Outbound>,
}

impl WebSocketTransport<ClientStream> {
    /// Connects to a `ws://` or `wss://` address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the TCP connect or the WebSocket
    /// handshake fails.
    pub async fn connect(address: &str) -> Result<Self> {
        let (ws, response) = tokio_tungstenite::connect_async(address)
            .await
            .map_err(|e| Error::connection(format!("WebSocket handshake failed: {e}")))?;

        debug!(%address, status = %response.status(), "WebSocket handshake completed");

        Ok(Self::new(ws))
    }
}

impl WebSocketTransport<DuplexStream> {
    /// Creates a connected client/server pair over an in-memory pipe.
    ///
    /// Both ends run the real WebSocket handshake and framing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if either handshake fails.
    pub async fn pair() -> Result<(Self, Self)> {
        let (client_stream, server_stream) = tokio::io::duplex(PAIR_PIPE_CAPACITY);

        let (client, server) = tokio::try_join!(
            async {
                tokio_tungstenite::client_async("ws://localhost/", client_stream)
                    .await
                    .map(|(ws, _)| ws)
                    .map_err(|e| Error::connection(format!("client handshake failed: {e}")))
            },
            async {
                tokio_tungstenite::accept_async(server_stream)
                    .await
                    .map_err(|e| Error::connection(format!("server handshake failed: {e}")))
            }
        )?;

        Ok((Self::new(client), Self::new(server)))
    }
}

impl<S> WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps an established WebSocket stream.
    #[must_use]
    pub fn new(ws: WebSocketStream<S>) -> Self {
        Self {
            ws,
            state: LinkState::Open,
            inbound: None,
            outbound: None,
        }
    }

    /// Returns the underlying stream.
    #[must_use]
    pub fn into_inner(self) -> WebSocketStream<S> {
        self.ws
    }

    /// Marks the link dead and converts a tungstenite error.
    fn fail(&mut self, err: WsError) -> Error {
        self.state = LinkState::Closed;
        self.inbound = None;
        self.outbound = None;

        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => Error::ConnectionClosed,
            other => Error::WebSocket(other),
        }
    }

    /// Pulls messages until a data or close message arrives.
    async fn next_message(&mut self) -> Result<Pulled> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    self.inbound = Some(Inbound {
                        payload: Bytes::from(text),
                        offset: 0,
                        kind: MessageKind::Text,
                    });
                    return Ok(Pulled::Data);
                }

                Some(Ok(Message::Binary(payload))) => {
                    self.inbound = Some(Inbound {
                        payload,
                        offset: 0,
                        kind: MessageKind::Binary,
                    });
                    return Ok(Pulled::Data);
                }

                Some(Ok(Message::Close(frame))) => {
                    self.state = LinkState::PeerClosed;
                    let status = frame.map(|frame| {
                        CloseStatus::new(u16::from(frame.code), frame.reason.as_str())
                    });
                    debug!(?status, "Close frame received");
                    return Ok(Pulled::Close(status));
                }

                // Ping/Pong are handled by tungstenite; raw frames are never read
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}

                Some(Err(e)) => return Err(self.fail(e)),

                None => {
                    debug!("WebSocket stream ended");
                    self.state = LinkState::Closed;
                    return Err(Error::ConnectionClosed);
                }
            }
        }
    }
}

// ============================================================================
// Message Encoding
// ============================================================================

/// Wraps owned bytes in a tungstenite message without copying them.
fn encode_message(payload: Bytes, kind: MessageKind) -> Result<Message> {
    match kind {
        MessageKind::Text => Utf8Bytes::try_from(payload)
            .map(Message::Text)
            .map_err(|_| Error::protocol("text payload is not valid UTF-8")),
        MessageKind::Binary => Ok(Message::Binary(payload)),
        MessageKind::Close => Err(Error::protocol(
            "close must be sent with Transport::close, not as a data fragment",
        )),
    }
}

// ============================================================================
// Transport Implementation
// ============================================================================

#[async_trait]
impl<S> Transport for WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send_frame(
        &mut self,
        payload: Bytes,
        kind: MessageKind,
        is_final: bool,
    ) -> Result<()> {
        if self.state != LinkState::Open {
            return Err(Error::ConnectionClosed);
        }

        if let Some(pending) = &self.outbound
            && pending.kind != kind
        {
            return Err(Error::protocol(format!(
                "fragment kind {kind} does not continue pending {} message",
                pending.kind
            )));
        }

        if !is_final {
            self.outbound
                .get_or_insert_with(|| Outbound {
                    payload: Vec::new(),
                    kind,
                })
                .payload
                .extend_from_slice(&payload);
            return Ok(());
        }

        let owned = match self.outbound.take() {
            Some(mut pending) => {
                pending.payload.extend_from_slice(&payload);
                Bytes::from(pending.payload)
            }
            None => payload,
        };

        let len = owned.len();
        let message = encode_message(owned, kind)?;

        if let Err(e) = self.ws.send(message).await {
            return Err(self.fail(e));
        }

        trace!(len, %kind, "Message sent");
        Ok(())
    }

    async fn receive_frame(&mut self, dst: &mut Vec<u8>, limit: usize) -> Result<FrameInfo> {
        if self.inbound.is_none() {
            if self.state != LinkState::Open {
                return Err(Error::ConnectionClosed);
            }

            if let Pulled::Close(status) = self.next_message().await? {
                return Ok(FrameInfo::close(status));
            }
        }

        let Some(inbound) = self.inbound.as_mut() else {
            return Err(Error::transport("no inbound message after read"));
        };

        let remaining = &inbound.payload[inbound.offset..];
        let take = remaining.len().min(limit);
        dst.extend_from_slice(&remaining[..take]);
        inbound.offset += take;

        let kind = inbound.kind;
        let is_final = inbound.offset == inbound.payload.len();
        if is_final {
            self.inbound = None;
        }

        Ok(FrameInfo::data(take, kind, is_final))
    }

    async fn close(&mut self, status: CloseStatus) -> Result<()> {
        if self.state == LinkState::Closed {
            return Ok(());
        }

        let frame = CloseFrame {
            code: CloseCode::from(status.code),
            reason: status.reason.clone().into(),
        };

        match self.ws.close(Some(frame)).await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => {}
            Err(e) => return Err(self.fail(e)),
        }

        // Wait for the peer's acknowledgement unless it initiated the close
        if self.state == LinkState::Open {
            loop {
                match self.ws.next().await {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => break,
                    Some(Err(e)) => return Err(self.fail(e)),
                }
            }
        }

        self.state = LinkState::Closed;
        self.inbound = None;
        self.outbound = None;

        debug!(%status, "WebSocket closed");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state == LinkState::Open
    }
}

// ============================================================================
// Tests
// ============================================================================
