//! Inbound helper that stitches fragments back into complete messages.
//!
//! [`ReassemblyTable`] keeps at most one partial message per remote endpoint.
//! A fragment carrying a new message id supersedes whatever that endpoint had
//! in progress, so abandoned messages need no timeout. Any fragment that breaks
//! the expected sequence, or that would push the message past the configured
//! size cap, discards the endpoint's partial message entirely. Endpoints never
//! affect one another.

use std::{
    collections::{HashMap, TryReserveError, hash_map::Entry},
    fmt::Debug,
    hash::Hash,
};

use bincode::error::DecodeError;
use bytes::Bytes;
use tracing::debug;

use super::{
    DiscardReason,
    FragmentError,
    FragmentHeader,
    FragmentIndex,
    FragmentSeries,
    FragmentStatus,
    MessageId,
};
use crate::{error::TunnelError, message::Message, metrics, wire::NO_LIMIT};

/// Log and count a dropped chunk.
pub(crate) fn record_discard<E: Debug>(source: &E, reason: DiscardReason) {
    debug!(endpoint = ?source, %reason, "discarding incoming data");
    metrics::inc_discards(reason);
}

/// Partial message being rebuilt for one endpoint.
#[derive(Debug)]
pub struct ReassemblyState {
    series: FragmentSeries,
    buffer: Vec<u8>,
}

impl ReassemblyState {
    fn new(header: &FragmentHeader) -> Self {
        Self {
            series: FragmentSeries::new(header.message_id(), header.fragment_count()),
            buffer: Vec::new(),
        }
    }

    /// Identifier of the message being rebuilt.
    #[must_use]
    pub const fn expected_message_id(&self) -> MessageId { self.series.message_id() }

    /// Index the next fragment must carry.
    #[must_use]
    pub const fn next_expected_fragment_index(&self) -> FragmentIndex { self.series.next_index() }

    /// Payload bytes accumulated so far.
    #[must_use]
    pub fn accumulated_len(&self) -> usize { self.buffer.len() }
}

/// A fully rebuilt message, tagged with the endpoint it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedMessage<E> {
    source: E,
    message_id: Option<MessageId>,
    payload: Bytes,
}

impl<E> CompletedMessage<E> {
    /// Construct a message reassembled from tunnel fragments.
    #[must_use]
    pub fn new(source: E, message_id: MessageId, payload: Bytes) -> Self {
        Self {
            source,
            message_id: Some(message_id),
            payload,
        }
    }

    /// Construct a message from an unframed packet passed through verbatim.
    #[must_use]
    pub fn raw(source: E, payload: Bytes) -> Self {
        Self {
            source,
            message_id: None,
            payload,
        }
    }

    /// Endpoint the message arrived from.
    #[must_use]
    pub fn source(&self) -> &E { &self.source }

    /// Sender-assigned identifier, or `None` for raw pass-through data.
    #[must_use]
    pub fn message_id(&self) -> Option<MessageId> { self.message_id }

    /// Report whether the payload bypassed tunnel framing.
    #[must_use]
    pub fn is_raw(&self) -> bool { self.message_id.is_none() }

    /// Borrow the message payload.
    #[must_use]
    pub fn payload(&self) -> &[u8] { &self.payload }

    /// Consume the message, returning the owned payload.
    #[must_use]
    pub fn into_payload(self) -> Bytes { self.payload }

    /// Consume the message, returning its endpoint and payload.
    #[must_use]
    pub fn into_parts(self) -> (E, Bytes) { (self.source, self.payload) }

    /// Decode the payload into a typed message.
    ///
    /// # Errors
    ///
    /// Returns any [`DecodeError`] raised while deserialising the payload.
    pub fn decode<M: Message>(&self) -> Result<M, DecodeError> { M::from_bytes(&self.payload) }
}

enum Step {
    Pending,
    Complete,
    Discard(DiscardReason),
    OutOfMemory(usize, TryReserveError),
}

/// Per-endpoint reassembly slots.
#[derive(Debug)]
pub struct ReassemblyTable<E> {
    states: HashMap<E, ReassemblyState>,
    max_message_size: usize,
}

impl<E> Default for ReassemblyTable<E> {
    fn default() -> Self {
        Self {
            states: HashMap::new(),
            max_message_size: NO_LIMIT,
        }
    }
}

impl<E> ReassemblyTable<E>
where
    E: Clone + Debug + Eq + Hash,
{
    /// Create an empty table capping rebuilt messages at `max_message_size`
    /// bytes. Pass [`NO_LIMIT`] to disable the cap.
    #[must_use]
    pub fn new(max_message_size: usize) -> Self {
        Self {
            states: HashMap::new(),
            max_message_size,
        }
    }

    /// Largest message this table will rebuild.
    #[must_use]
    pub const fn max_message_size(&self) -> usize { self.max_message_size }

    /// Change the size cap; partial messages already over it are dropped on
    /// their next fragment.
    pub fn set_max_message_size(&mut self, max_message_size: usize) {
        self.max_message_size = max_message_size;
    }

    /// Number of endpoints with a partial message in progress.
    #[must_use]
    pub fn tracked_endpoints(&self) -> usize { self.states.len() }

    /// Inspect the partial message in progress for `source`.
    #[must_use]
    pub fn state(&self, source: &E) -> Option<&ReassemblyState> { self.states.get(source) }

    /// Drop any partial message in progress for `source`.
    ///
    /// Returns `true` if a partial message was dropped.
    pub fn discard(&mut self, source: &E) -> bool { self.states.remove(source).is_some() }

    /// Drop every partial message.
    pub fn clear(&mut self) { self.states.clear(); }

    /// Feed one chunk from `source` into the table.
    ///
    /// Returns `Ok(Some(_))` when the chunk completes a message and `Ok(None)`
    /// while more fragments are needed or after the chunk was discarded.
    ///
    /// # Errors
    ///
    /// Returns [`TunnelError::Allocation`] if the reassembly buffer cannot
    /// grow. The endpoint's partial message is dropped in that case.
    pub fn accept(
        &mut self,
        source: &E,
        header: &FragmentHeader,
        chunk: &[u8],
    ) -> Result<Option<CompletedMessage<E>>, TunnelError> {
        if header.fragment_count() == 1 && !self.is_continuing(source, header) {
            return self.accept_whole(source, header, chunk);
        }

        let limit = self.max_message_size;
        let state = match self.states.entry(source.clone()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().expected_message_id() != header.message_id() {
                    occupied.insert(ReassemblyState::new(header));
                }
                occupied.into_mut()
            }
            Entry::Vacant(vacant) => vacant.insert(ReassemblyState::new(header)),
        };

        let step = match state.series.accept(header) {
            Err(err) => Step::Discard(DiscardReason::Sequence(err)),
            Ok(status) => {
                let attempted = state.buffer.len().saturating_add(chunk.len());
                if attempted > limit {
                    Step::Discard(DiscardReason::Oversized { attempted, limit })
                } else if let Err(err) = state.buffer.try_reserve(chunk.len()) {
                    Step::OutOfMemory(attempted, err)
                } else {
                    state.buffer.extend_from_slice(chunk);
                    match status {
                        FragmentStatus::Incomplete => Step::Pending,
                        FragmentStatus::Complete => Step::Complete,
                    }
                }
            }
        };

        match step {
            Step::Pending => Ok(None),
            Step::Discard(reason) => {
                self.states.remove(source);
                record_discard(source, reason);
                Ok(None)
            }
            Step::OutOfMemory(attempted, err) => {
                self.states.remove(source);
                Err(TunnelError::allocation("reassembly buffer", attempted, err))
            }
            Step::Complete => Ok(self.states.remove(source).map(|state| {
                CompletedMessage::new(
                    source.clone(),
                    state.series.message_id(),
                    Bytes::from(state.buffer),
                )
            })),
        }
    }

    /// Whether `header` belongs to the message already in progress for
    /// `source`, in which case it must go through the ordering checks.
    fn is_continuing(&self, source: &E, header: &FragmentHeader) -> bool {
        self.states
            .get(source)
            .is_some_and(|state| state.expected_message_id() == header.message_id())
    }

    /// Handle a single-fragment message without creating a slot.
    fn accept_whole(
        &mut self,
        source: &E,
        header: &FragmentHeader,
        chunk: &[u8],
    ) -> Result<Option<CompletedMessage<E>>, TunnelError> {
        // A new message id supersedes any partial message from this endpoint.
        self.states.remove(source);

        if header.fragment_index().get() != 0 {
            record_discard(
                source,
                DiscardReason::Sequence(FragmentError::InvalidPosition {
                    index: header.fragment_index(),
                    count: header.fragment_count(),
                }),
            );
            return Ok(None);
        }
        if chunk.len() > self.max_message_size {
            record_discard(
                source,
                DiscardReason::Oversized {
                    attempted: chunk.len(),
                    limit: self.max_message_size,
                },
            );
            return Ok(None);
        }

        let mut payload = Vec::new();
        payload
            .try_reserve_exact(chunk.len())
            .map_err(|err| TunnelError::allocation("incoming message", chunk.len(), err))?;
        payload.extend_from_slice(chunk);
        Ok(Some(CompletedMessage::new(
            source.clone(),
            header.message_id(),
            Bytes::from(payload),
        )))
    }
}
