//! Error and status types emitted by the fragmentation layer.
//!
//! Inbound anomalies never reach the caller as errors; they are reported
//! through [`DiscardReason`] so logs and metrics can say why a chunk was
//! dropped.

use derive_more::Display;
use thiserror::Error;

use super::{FragmentIndex, MessageId};

/// Failure to parse a chunk header.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// Fewer bytes than a full header were supplied.
    #[error("frame too short: have {have} bytes, need {need}")]
    TooShort { have: usize, need: usize },
}

/// Result of feeding a fragment into a [`FragmentSeries`](crate::fragment::FragmentSeries).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FragmentStatus {
    /// The logical message still expects more fragments.
    Incomplete,
    /// The fragment completed the logical message.
    Complete,
}

/// Ordering violations detected by [`FragmentSeries`](crate::fragment::FragmentSeries).
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum FragmentError {
    /// The fragment belongs to a different message.
    #[error("fragment message mismatch: expected {expected}, found {found}")]
    MessageMismatch {
        expected: MessageId,
        found: MessageId,
    },
    /// A fragment arrived out of order.
    #[error("fragment index mismatch: expected {expected}, found {found}")]
    IndexMismatch {
        expected: FragmentIndex,
        found: FragmentIndex,
    },
    /// The fragment disagrees with earlier fragments about the message length.
    #[error("fragment count mismatch: expected {expected}, found {found}")]
    CountMismatch { expected: u16, found: u16 },
    /// The header's fragment position is impossible.
    #[error("fragment index {index} out of range for count {count}")]
    InvalidPosition { index: FragmentIndex, count: u16 },
}

/// Errors produced while queueing outbound messages.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum FragmentationError {
    /// The message needs more fragments than the header can number.
    #[error("message of {len} bytes needs more than {limit} fragments of {budget} bytes")]
    TooManyFragments {
        len: usize,
        budget: usize,
        limit: usize,
    },
}

/// Why an inbound chunk or packet was dropped.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum DiscardReason {
    /// The packet was shorter than one header.
    #[display("short packet")]
    ShortPacket,
    /// The chunk carried a foreign magic number.
    #[display("magic mismatch")]
    MagicMismatch,
    /// The chunk carried the receiver's own source exclusion id.
    #[display("source excluded")]
    SourceExcluded,
    /// The chunk's declared payload ran past the end of the packet.
    #[display("truncated chunk")]
    Truncated,
    /// The fragment broke the expected sequence.
    #[display("{_0}")]
    Sequence(FragmentError),
    /// Accumulating the fragment would exceed the incoming size cap.
    #[display("message exceeds {limit} bytes (attempted {attempted})")]
    Oversized { attempted: usize, limit: usize },
}

impl DiscardReason {
    /// Stable label used for metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ShortPacket => "short_packet",
            Self::MagicMismatch => "magic_mismatch",
            Self::SourceExcluded => "source_excluded",
            Self::Truncated => "truncated",
            Self::Sequence(_) => "sequence",
            Self::Oversized { .. } => "oversized",
        }
    }
}
