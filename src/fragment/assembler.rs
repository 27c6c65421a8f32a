//! Outbound packet builder that batches small messages and splits large ones.
//!
//! [`OutgoingAssembler`] keeps a queue of flat message payloads. Each call to
//! [`OutgoingAssembler::produce_into`] fills one packet: either the next
//! fragment of a message that is mid-fragmentation, or as many whole queued
//! messages as fit within the maximum transfer unit.

use std::{collections::VecDeque, mem};

use bytes::Bytes;
use tracing::{trace, warn};

use super::{FragmentHeader, FragmentIndex, FragmentationError, MessageId};
use crate::{
    error::TunnelError,
    metrics,
    wire::{HEADER_SIZE, MAX_FRAGMENT_COUNT, RETAINED_BUFFER_LIMIT, payload_budget},
};

/// Fields stamped onto every outgoing header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeaderStamp {
    /// Protocol magic number.
    pub magic: u32,
    /// Source exclusion id, `0` when untagged.
    pub source_exclusion_id: u32,
}

impl HeaderStamp {
    fn header(self, message_id: MessageId) -> FragmentHeader {
        FragmentHeader::new(self.magic, message_id)
            .with_source_exclusion_id(self.source_exclusion_id)
    }
}

/// Progress through a message that spans several packets.
#[derive(Debug)]
struct FragmentCursor {
    message_id: MessageId,
    payload: Bytes,
    budget: usize,
    count: u16,
    next: FragmentIndex,
}

impl FragmentCursor {
    /// Write the next fragment into `out`, returning `true` once the final
    /// fragment has been written.
    fn write_next(&mut self, stamp: HeaderStamp, out: &mut Vec<u8>) -> Result<bool, TunnelError> {
        let offset = usize::from(self.next.get()) * self.budget;
        let end = offset.saturating_add(self.budget).min(self.payload.len());
        let chunk = self.payload.get(offset..end).unwrap_or_default();
        let header = stamp
            .header(self.message_id)
            .with_fragment(self.next, self.count);
        write_chunk(out, header, chunk)?;
        trace!(
            message_id = %self.message_id,
            index = %self.next,
            count = self.count,
            len = chunk.len(),
            "emitted fragment"
        );

        if self.next.is_last_of(self.count) {
            return Ok(true);
        }
        if let Some(next) = self.next.checked_increment() {
            self.next = next;
        }
        Ok(false)
    }
}

/// Number of fragments `len` bytes occupy at `budget` bytes per fragment,
/// or `None` when the header cannot number them.
fn fragment_count(len: usize, budget: usize) -> Option<u16> {
    let count = len.div_ceil(budget).max(1);
    if count > MAX_FRAGMENT_COUNT {
        return None;
    }
    u16::try_from(count).ok()
}

fn write_chunk(out: &mut Vec<u8>, header: FragmentHeader, chunk: &[u8]) -> Result<(), TunnelError> {
    let total = HEADER_SIZE + chunk.len();
    out.try_reserve(total)
        .map_err(|source| TunnelError::allocation("outgoing packet", total, source))?;
    // `chunk` never exceeds the payload budget, which is bounded by `u32::MAX`.
    let len = u32::try_from(chunk.len()).unwrap_or(u32::MAX);
    out.extend_from_slice(&header.with_payload_len(len).encode());
    out.extend_from_slice(chunk);
    Ok(())
}

/// Reserve room for the next chunk while its message is still queued.
///
/// Returns `Ok(false)` when the packet already holds chunks: it is sent as
/// is and the message waits for an empty packet. An empty packet that cannot
/// grow is an error, with the message left at the head of the queue.
pub(super) fn reserve_before_pop(out: &mut Vec<u8>, additional: usize) -> Result<bool, TunnelError> {
    match out.try_reserve(additional) {
        Ok(()) => Ok(true),
        Err(_) if !out.is_empty() => Ok(false),
        Err(source) => Err(TunnelError::allocation("outgoing packet", additional, source)),
    }
}

/// Queue of outgoing messages and the packetising state machine over it.
#[derive(Debug, Default)]
pub struct OutgoingAssembler {
    pending: VecDeque<Bytes>,
    cursor: Option<FragmentCursor>,
    next_message_id: MessageId,
}

impl OutgoingAssembler {
    /// Create an empty assembler whose first message id is `0`.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Create an empty assembler numbering messages from `start_at`.
    #[must_use]
    pub fn with_starting_id(start_at: MessageId) -> Self {
        Self {
            next_message_id: start_at,
            ..Self::default()
        }
    }

    /// Queue `message` for transmission.
    ///
    /// # Errors
    ///
    /// Returns [`FragmentationError::TooManyFragments`] when the message would
    /// need more than `u16::MAX` fragments at `max_transfer_unit`.
    pub fn enqueue(
        &mut self,
        message: Bytes,
        max_transfer_unit: usize,
    ) -> Result<(), FragmentationError> {
        let budget = payload_budget(max_transfer_unit);
        if fragment_count(message.len(), budget).is_none() {
            return Err(FragmentationError::TooManyFragments {
                len: message.len(),
                budget,
                limit: MAX_FRAGMENT_COUNT,
            });
        }
        self.pending.push_back(message);
        Ok(())
    }

    /// Report whether any queued or partially sent message remains.
    #[must_use]
    pub fn has_pending_output(&self) -> bool { self.cursor.is_some() || !self.pending.is_empty() }

    /// Report whether a message is currently being sent in fragments.
    #[must_use]
    pub fn is_fragmenting(&self) -> bool { self.cursor.is_some() }

    /// Number of whole messages waiting in the queue.
    #[must_use]
    pub fn pending_messages(&self) -> usize { self.pending.len() }

    /// Identifier the next dequeued message will carry.
    #[must_use]
    pub fn next_message_id(&self) -> MessageId { self.next_message_id }

    /// Produce the next packet, returning `None` when nothing is queued.
    ///
    /// # Errors
    ///
    /// Returns [`TunnelError::Allocation`] if the packet buffer cannot grow.
    pub fn produce_next_packet(
        &mut self,
        stamp: HeaderStamp,
        max_transfer_unit: usize,
    ) -> Result<Option<Vec<u8>>, TunnelError> {
        let mut packet = Vec::new();
        if self.produce_into(stamp, max_transfer_unit, &mut packet)? {
            Ok(Some(packet))
        } else {
            Ok(None)
        }
    }

    /// Fill `out` with the next packet, returning whether one was produced.
    ///
    /// `out` is cleared first, so callers can reuse one scratch buffer for
    /// every packet.
    ///
    /// # Errors
    ///
    /// Returns [`TunnelError::Allocation`] if `out` cannot grow.
    pub fn produce_into(
        &mut self,
        stamp: HeaderStamp,
        max_transfer_unit: usize,
        out: &mut Vec<u8>,
    ) -> Result<bool, TunnelError> {
        out.clear();

        if let Some(cursor) = self.cursor.as_mut() {
            if cursor.write_next(stamp, out)? {
                self.cursor = None;
                self.release_idle_queue();
            }
            return Ok(true);
        }

        let budget = payload_budget(max_transfer_unit);
        let mtu = budget + HEADER_SIZE;
        while let Some(front) = self.pending.front() {
            if front.len() > budget {
                if !out.is_empty() {
                    break;
                }
                reserve_before_pop(out, HEADER_SIZE + budget)?;
                let Some(payload) = self.pending.pop_front() else {
                    break;
                };
                if self.start_fragmenting(stamp, payload, budget, out)? {
                    return Ok(true);
                }
                continue;
            }

            let total = HEADER_SIZE + front.len();
            if out.len() + total > mtu || !reserve_before_pop(out, total)? {
                break;
            }
            let Some(payload) = self.pending.pop_front() else {
                break;
            };
            let message_id = self.take_message_id();
            write_chunk(out, stamp.header(message_id), &payload)?;
            trace!(message_id = %message_id, len = payload.len(), "batched message");
        }

        if self.pending.is_empty() {
            self.release_idle_queue();
        }
        Ok(!out.is_empty())
    }

    /// Begin fragmenting `payload`, writing its first fragment into `out`.
    ///
    /// Returns `false` when the message was dropped because it no longer fits
    /// the header's fragment numbering at the current transfer unit.
    fn start_fragmenting(
        &mut self,
        stamp: HeaderStamp,
        payload: Bytes,
        budget: usize,
        out: &mut Vec<u8>,
    ) -> Result<bool, TunnelError> {
        let Some(count) = fragment_count(payload.len(), budget) else {
            warn!(
                len = payload.len(),
                budget, "dropping outgoing message: too many fragments at current transfer unit"
            );
            metrics::inc_outgoing_dropped();
            return Ok(false);
        };
        let mut cursor = FragmentCursor {
            message_id: self.take_message_id(),
            payload,
            budget,
            count,
            next: FragmentIndex::zero(),
        };
        if !cursor.write_next(stamp, out)? {
            self.cursor = Some(cursor);
        }
        Ok(true)
    }

    fn take_message_id(&mut self) -> MessageId {
        let id = self.next_message_id;
        self.next_message_id = id.wrapping_next();
        id
    }

    #[cfg(test)]
    pub(crate) fn queue_capacity(&self) -> usize { self.pending.capacity() }

    fn release_idle_queue(&mut self) {
        if self.pending.is_empty()
            && self.pending.capacity() * mem::size_of::<Bytes>() > RETAINED_BUFFER_LIMIT
        {
            self.pending = VecDeque::new();
        }
    }
}
