//! Shared test utilities.
//!
//! - [`ScriptedTransport`]: replays an exact fragment sequence
//! - [`spawn_echo`]: echo peer over a real WebSocket transport
//! - [`init_logging`]: tracing subscriber for `RUST_LOG` debugging

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::future::pending;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use pooled_websocket::{
    BufferArena, Cancellation, ChannelBuilder, CloseStatus, Error, FrameInfo, MessageKind, Result,
    Transport,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use pooled_websocket::WebSocketTransport;

// ============================================================================
// Logging
// ============================================================================

/// Installs a test subscriber once; honours `RUST_LOG`.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// ScriptedTransport
// ============================================================================

/// One scripted transport event.
#[derive(Debug, Clone)]
pub enum Step {
    /// A fragment; split further if larger than the receive limit.
    Fragment {
        bytes: Vec<u8>,
        kind: MessageKind,
        is_final: bool,
    },
    /// Close signal.
    Close(Option<CloseStatus>),
    /// Read failure.
    Fail,
    /// Connection dropped.
    Drop,
    /// Never completes (consumed when polled).
    Stall,
}

impl Step {
    pub fn text(bytes: &[u8], is_final: bool) -> Self {
        Self::Fragment {
            bytes: bytes.to_vec(),
            kind: MessageKind::Text,
            is_final,
        }
    }

    pub fn binary(bytes: &[u8], is_final: bool) -> Self {
        Self::Fragment {
            bytes: bytes.to_vec(),
            kind: MessageKind::Binary,
            is_final,
        }
    }
}

/// Record of a `send_frame` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    pub payload: Vec<u8>,
    pub kind: MessageKind,
    pub is_final: bool,
}

/// Shared view of what the transport saw.
#[derive(Debug, Default)]
pub struct Recorder {
    pub sent: Mutex<Vec<SentFrame>>,
    pub closed_with: Mutex<Option<CloseStatus>>,
}

/// In-memory transport that replays a script.
pub struct ScriptedTransport {
    steps: VecDeque<Step>,
    /// Oversized fragment being handed out: (bytes, offset, kind, is_final).
    partial: Option<(Vec<u8>, usize, MessageKind, bool)>,
    open: bool,
    recorder: Arc<Recorder>,
}

impl ScriptedTransport {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> (Self, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let transport = Self {
            steps: steps.into_iter().collect(),
            partial: None,
            open: true,
            recorder: Arc::clone(&recorder),
        };
        (transport, recorder)
    }

    fn hand_out(&mut self, dst: &mut Vec<u8>, limit: usize) -> FrameInfo {
        let (bytes, offset, kind, is_final) = self.partial.as_mut().expect("partial fragment");

        let take = (bytes.len() - *offset).min(limit);
        dst.extend_from_slice(&bytes[*offset..*offset + take]);
        *offset += take;

        let done = *offset == bytes.len();
        let info = FrameInfo::data(take, *kind, done && *is_final);
        if done {
            self.partial = None;
        }
        info
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send_frame(
        &mut self,
        payload: Bytes,
        kind: MessageKind,
        is_final: bool,
    ) -> Result<()> {
        if !self.open {
            return Err(Error::ConnectionClosed);
        }
        self.recorder.sent.lock().push(SentFrame {
            payload: payload.to_vec(),
            kind,
            is_final,
        });
        Ok(())
    }

    async fn receive_frame(&mut self, dst: &mut Vec<u8>, limit: usize) -> Result<FrameInfo> {
        if self.partial.is_some() {
            return Ok(self.hand_out(dst, limit));
        }

        match self.steps.pop_front() {
            Some(Step::Fragment {
                bytes,
                kind,
                is_final,
            }) => {
                self.partial = Some((bytes, 0, kind, is_final));
                Ok(self.hand_out(dst, limit))
            }
            Some(Step::Close(status)) => {
                self.open = false;
                Ok(FrameInfo::close(status))
            }
            Some(Step::Fail) => {
                self.open = false;
                Err(Error::transport("scripted read failure"))
            }
            Some(Step::Drop) | None => {
                self.open = false;
                Err(Error::ConnectionClosed)
            }
            Some(Step::Stall) => pending().await,
        }
    }

    async fn close(&mut self, status: CloseStatus) -> Result<()> {
        self.open = false;
        *self.recorder.closed_with.lock() = Some(status);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

// ============================================================================
// Echo Peer
// ============================================================================

/// Runs an echo loop on `server` until the client closes.
///
/// Text is echoed as text and binary as binary. On a close signal the peer
/// completes the close handshake and exits.
pub fn spawn_echo<S>(server: WebSocketTransport<S>, arena: BufferArena) -> JoinHandle<Result<()>>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(echo_loop(server, arena))
}

async fn echo_loop<S>(server: WebSocketTransport<S>, arena: BufferArena) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut channel = ChannelBuilder::new().arena(arena).wrap(server)?;
    let cancel = Cancellation::never();

    loop {
        let message = channel.receive(&cancel).await?;

        match message.kind() {
            MessageKind::Text => channel.send_text(message.as_text()?, &cancel).await?,
            MessageKind::Binary => channel.send_binary(message.data(), &cancel).await?,
            MessageKind::Close => {
                message.dispose();
                return channel.close(CloseStatus::normal(), &cancel).await;
            }
        }
    }
}

/// Deterministic payload of `len` bytes.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
