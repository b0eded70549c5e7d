//! Fragment reassembly state machine.
//!
//! ```text
//!            data, !final
//!           ┌──────────┐
//!           ▼          │
//!  ──► Reading ────────┘
//!        │  │  │
//!        │  │  └── close ─────────────► CloseReceived
//!        │  └───── data, final ────────► FinalReceived
//!        └──────── violation / error ──► Failed
//! ```
//!
//! The assembler only tracks metadata. Bytes live in the pooled buffer the
//! channel passes to the transport; one assembler run always targets the
//! same buffer, so a message never spans two backing buffers.

// ============================================================================
// Imports
// ============================================================================

use crate::error::{Error, Result};
use crate::transport::{CloseStatus, FrameInfo, MessageKind};

// ============================================================================
// AssemblyState
// ============================================================================

/// Where an in-progress receive stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AssemblyState {
    /// Waiting on the next fragment.
    Reading,
    /// A final data fragment completed the message.
    FinalReceived(MessageKind),
    /// The peer signalled close.
    CloseReceived,
    /// The fragment sequence was rejected.
    Failed,
}

// ============================================================================
// Progress
// ============================================================================

/// Result of applying one accepted fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Progress {
    /// More fragments are needed.
    Reading,
    /// The message is complete.
    Complete(MessageKind),
    /// The peer signalled close, with its status if one was sent.
    Closed(Option<CloseStatus>),
}

// ============================================================================
// Assembler
// ============================================================================

/// Tracks one logical message across its fragments.
#[derive(Debug)]
pub(crate) struct Assembler {
    state: AssemblyState,
    /// Kind of the first data fragment.
    kind: Option<MessageKind>,
    /// Bytes accumulated so far.
    len: usize,
    fragments: usize,
    max_len: Option<usize>,
}

impl Assembler {
    pub(crate) fn new(max_len: Option<usize>) -> Self {
        Self {
            state: AssemblyState::Reading,
            kind: None,
            len: 0,
            fragments: 0,
            max_len,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &AssemblyState {
        &self.state
    }

    /// Returns `true` once a fragment of the message has been consumed.
    #[inline]
    pub(crate) fn has_progress(&self) -> bool {
        self.fragments > 0
    }

    #[inline]
    pub(crate) fn fragments(&self) -> usize {
        self.fragments
    }

    /// Applies one fragment.
    ///
    /// Rejected fragments move the assembler to [`AssemblyState::Failed`]
    /// and surface as errors, never as progress.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the fragment switches message kind
    /// mid-message, overruns the size limit, or arrives after completion.
    pub(crate) fn on_fragment(&mut self, info: FrameInfo) -> Result<Progress> {
        if self.state != AssemblyState::Reading {
            self.state = AssemblyState::Failed;
            return Err(Error::protocol("fragment received after message completed"));
        }

        self.fragments += 1;
        self.len += info.len;

        if info.kind.is_close() {
            self.state = AssemblyState::CloseReceived;
            return Ok(Progress::Closed(info.close_status));
        }

        match self.kind {
            Some(kind) if kind != info.kind => {
                self.state = AssemblyState::Failed;
                return Err(Error::protocol(format!(
                    "{} fragment inside {kind} message",
                    info.kind
                )));
            }
            Some(_) => {}
            None => self.kind = Some(info.kind),
        }

        if let Some(max) = self.max_len
            && self.len > max
        {
            self.state = AssemblyState::Failed;
            return Err(Error::protocol(format!(
                "message exceeds {max} bytes (received {})",
                self.len
            )));
        }

        if info.is_final {
            self.state = AssemblyState::FinalReceived(info.kind);
            return Ok(Progress::Complete(info.kind));
        }

        Ok(Progress::Reading)
    }

    /// Marks the run failed after a transport error or cancellation.
    #[inline]
    pub(crate) fn fail(&mut self) {
        self.state = AssemblyState::Failed;
    }
}

// ============================================================================
// Tests
// ============================================================================
