//! Fixed-size chunk header and its byte codec.

use super::{FragmentIndex, FrameError, MessageId};
use crate::{
    byte_order::{read_wire_u16, read_wire_u32, write_wire_u16, write_wire_u32},
    wire::HEADER_SIZE,
};

/// Header preceding every chunk of tunnel payload.
///
/// The header is plain data: [`FragmentHeader::decode`] performs no semantic
/// checks, so callers decide how to treat a foreign magic or an inconsistent
/// fragment position.
///
/// # Examples
///
/// ```
/// use packet_tunnel::{
///     fragment::{FragmentHeader, FragmentIndex, MessageId},
///     wire::{DEFAULT_MAGIC, HEADER_SIZE},
/// };
/// let header = FragmentHeader::new(DEFAULT_MAGIC, MessageId::new(7))
///     .with_fragment(FragmentIndex::new(1), 3)
///     .with_payload_len(44);
/// let bytes = header.encode();
/// assert_eq!(bytes.len(), HEADER_SIZE);
/// assert_eq!(FragmentHeader::decode(&bytes), Ok(header));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FragmentHeader {
    magic: u32,
    source_exclusion_id: u32,
    message_id: MessageId,
    fragment_index: FragmentIndex,
    fragment_count: u16,
    payload_len: u32,
}

impl FragmentHeader {
    /// Create a header for a single-fragment, empty chunk of `message_id`.
    #[must_use]
    pub const fn new(magic: u32, message_id: MessageId) -> Self {
        Self {
            magic,
            source_exclusion_id: 0,
            message_id,
            fragment_index: FragmentIndex::zero(),
            fragment_count: 1,
            payload_len: 0,
        }
    }

    /// Tag the header with a source exclusion id.
    #[must_use]
    pub const fn with_source_exclusion_id(mut self, id: u32) -> Self {
        self.source_exclusion_id = id;
        self
    }

    /// Set the fragment position and the message's fragment count.
    #[must_use]
    pub const fn with_fragment(mut self, index: FragmentIndex, count: u16) -> Self {
        self.fragment_index = index;
        self.fragment_count = count;
        self
    }

    /// Set the number of payload bytes following the header.
    #[must_use]
    pub const fn with_payload_len(mut self, len: u32) -> Self {
        self.payload_len = len;
        self
    }

    /// Protocol magic number.
    #[must_use]
    pub const fn magic(&self) -> u32 { self.magic }

    /// Sender's source exclusion id, `0` when untagged.
    #[must_use]
    pub const fn source_exclusion_id(&self) -> u32 { self.source_exclusion_id }

    /// Logical message identifier.
    #[must_use]
    pub const fn message_id(&self) -> MessageId { self.message_id }

    /// Position of this fragment within its message.
    #[must_use]
    pub const fn fragment_index(&self) -> FragmentIndex { self.fragment_index }

    /// Total number of fragments in the message.
    #[must_use]
    pub const fn fragment_count(&self) -> u16 { self.fragment_count }

    /// Number of payload bytes following the header.
    #[must_use]
    pub const fn payload_len(&self) -> u32 { self.payload_len }

    /// Report whether this chunk completes its message.
    #[must_use]
    pub fn is_last_fragment(&self) -> bool { self.fragment_index.is_last_of(self.fragment_count) }

    /// Serialise the header into its fixed wire representation.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&write_wire_u32(self.magic));
        out[4..8].copy_from_slice(&write_wire_u32(self.source_exclusion_id));
        out[8..12].copy_from_slice(&write_wire_u32(self.message_id.get()));
        out[12..14].copy_from_slice(&write_wire_u16(self.fragment_index.get()));
        out[14..16].copy_from_slice(&write_wire_u16(self.fragment_count));
        out[16..20].copy_from_slice(&write_wire_u32(self.payload_len));
        out
    }

    /// Parse a header from the start of `bytes`.
    ///
    /// Trailing bytes beyond [`HEADER_SIZE`] are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::TooShort`] when fewer than [`HEADER_SIZE`] bytes
    /// are available.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let Some(raw) = bytes.first_chunk::<HEADER_SIZE>() else {
            return Err(FrameError::TooShort {
                have: bytes.len(),
                need: HEADER_SIZE,
            });
        };
        Ok(Self {
            magic: read_wire_u32([raw[0], raw[1], raw[2], raw[3]]),
            source_exclusion_id: read_wire_u32([raw[4], raw[5], raw[6], raw[7]]),
            message_id: MessageId::new(read_wire_u32([raw[8], raw[9], raw[10], raw[11]])),
            fragment_index: FragmentIndex::new(read_wire_u16([raw[12], raw[13]])),
            fragment_count: read_wire_u16([raw[14], raw[15]]),
            payload_len: read_wire_u32([raw[16], raw[17], raw[18], raw[19]]),
        })
    }

    /// Read only the magic number from the start of `bytes`, if present.
    #[must_use]
    pub fn peek_magic(bytes: &[u8]) -> Option<u32> {
        bytes.first_chunk::<4>().map(|raw| read_wire_u32(*raw))
    }
}
