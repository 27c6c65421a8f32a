//! Ordering tracker used to re-assemble logical messages from fragments.
//!
//! `FragmentSeries` holds only the sequence metadata of one message so it can
//! sit beside the payload buffer in each per-endpoint reassembly slot.

use super::{FragmentError, FragmentHeader, FragmentIndex, FragmentStatus, MessageId};

/// Track the expected ordering of fragments for a single logical message.
#[derive(Clone, Debug)]
pub struct FragmentSeries {
    message_id: MessageId,
    next_index: FragmentIndex,
    fragment_count: u16,
}

impl FragmentSeries {
    /// Create a series for `message_id` expecting `fragment_count` fragments,
    /// starting at index zero.
    #[must_use]
    pub const fn new(message_id: MessageId, fragment_count: u16) -> Self {
        Self {
            message_id,
            next_index: FragmentIndex::zero(),
            fragment_count,
        }
    }

    /// Return the message identifier tracked by this series.
    #[must_use]
    pub const fn message_id(&self) -> MessageId { self.message_id }

    /// Return the index the next accepted fragment must carry.
    #[must_use]
    pub const fn next_index(&self) -> FragmentIndex { self.next_index }

    /// Return the number of fragments the message consists of.
    #[must_use]
    pub const fn fragment_count(&self) -> u16 { self.fragment_count }

    /// Accept a fragment and advance the expected index.
    ///
    /// # Examples
    ///
    /// ```
    /// use packet_tunnel::fragment::{
    ///     FragmentHeader,
    ///     FragmentIndex,
    ///     FragmentSeries,
    ///     FragmentStatus,
    ///     MessageId,
    /// };
    /// let id = MessageId::new(99);
    /// let mut series = FragmentSeries::new(id, 2);
    /// let first = FragmentHeader::new(0, id).with_fragment(FragmentIndex::zero(), 2);
    /// let last = FragmentHeader::new(0, id).with_fragment(FragmentIndex::new(1), 2);
    /// assert_eq!(series.accept(&first), Ok(FragmentStatus::Incomplete));
    /// assert_eq!(series.accept(&last), Ok(FragmentStatus::Complete));
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`FragmentError::MessageMismatch`] for a fragment of another
    /// message, [`FragmentError::CountMismatch`] when the fragment disagrees
    /// about the fragment count, [`FragmentError::InvalidPosition`] when the
    /// index is not below the count, and [`FragmentError::IndexMismatch`]
    /// when the fragment is not the next one expected. Repeated fragments are
    /// index mismatches too: the series never buffers or skips.
    pub fn accept(&mut self, fragment: &FragmentHeader) -> Result<FragmentStatus, FragmentError> {
        if fragment.message_id() != self.message_id {
            return Err(FragmentError::MessageMismatch {
                expected: self.message_id,
                found: fragment.message_id(),
            });
        }

        if fragment.fragment_count() != self.fragment_count {
            return Err(FragmentError::CountMismatch {
                expected: self.fragment_count,
                found: fragment.fragment_count(),
            });
        }

        if fragment.fragment_index().get() >= self.fragment_count {
            return Err(FragmentError::InvalidPosition {
                index: fragment.fragment_index(),
                count: fragment.fragment_count(),
            });
        }

        if fragment.fragment_index() != self.next_index {
            return Err(FragmentError::IndexMismatch {
                expected: self.next_index,
                found: fragment.fragment_index(),
            });
        }

        if fragment.is_last_fragment() {
            return Ok(FragmentStatus::Complete);
        }

        // Not last, so the index is below `count - 1` and cannot overflow.
        if let Some(next) = self.next_index.checked_increment() {
            self.next_index = next;
        }
        Ok(FragmentStatus::Incomplete)
    }
}
