//! Top-level error type for tunnel operations.
//!
//! Malformed input from the network is never reported here: the engine
//! absorbs it as packet loss. What remains are failures the caller must act
//! on, such as allocation failure, transport I/O, or an unsendable message.

use std::{collections::TryReserveError, io};

use bincode::error::EncodeError;
use thiserror::Error;

use crate::fragment::FragmentationError;

/// Errors surfaced by the engine and the tunnel driver.
#[derive(Debug, Error)]
pub enum TunnelError {
    /// A buffer could not grow to the required size.
    #[error("failed to reserve {requested} bytes for {context}")]
    Allocation {
        /// What the buffer was for.
        context: &'static str,
        /// Bytes the buffer needed to hold.
        requested: usize,
        /// Underlying allocator failure.
        #[source]
        source: TryReserveError,
    },
    /// An outgoing message cannot be framed.
    #[error(transparent)]
    Fragmentation(#[from] FragmentationError),
    /// A typed message could not be serialised.
    #[error("failed to encode message: {0}")]
    Encode(#[from] EncodeError),
    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}

impl TunnelError {
    pub(crate) fn allocation(
        context: &'static str,
        requested: usize,
        source: TryReserveError,
    ) -> Self {
        Self::Allocation {
            context,
            requested,
            source,
        }
    }
}

/// Result type used throughout the crate.
pub type Result<T, E = TunnelError> = std::result::Result<T, E>;
