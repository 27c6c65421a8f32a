//! Fragment framing, outbound packetising and inbound reassembly.
//!
//! Each sub-module focuses on a single concept: the header codec, the
//! identifier newtypes, the receive-side ordering tracker, and the two
//! stateful halves of the tunnel ([`OutgoingAssembler`] and
//! [`ReassemblyTable`]).

pub mod assembler;
pub mod error;
pub mod header;
pub mod id;
pub mod index;
pub mod reassembler;
pub mod series;

pub use assembler::{HeaderStamp, OutgoingAssembler};
pub use error::{DiscardReason, FragmentError, FragmentStatus, FragmentationError, FrameError};
pub use header::FragmentHeader;
pub use id::MessageId;
pub use index::FragmentIndex;
pub use reassembler::{CompletedMessage, ReassemblyState, ReassemblyTable};
pub use series::FragmentSeries;

#[cfg(test)]
mod tests;
