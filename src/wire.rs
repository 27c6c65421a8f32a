//! Constants shared by every engine speaking the tunnel wire format.

/// Size in bytes of the header preceding every chunk on the wire.
///
/// Layout (all fields little-endian):
///
/// | offset | width | field |
/// |---|---|---|
/// | 0 | 4 | magic |
/// | 4 | 4 | source exclusion id |
/// | 8 | 4 | message id |
/// | 12 | 2 | fragment index |
/// | 14 | 2 | fragment count |
/// | 16 | 4 | payload length |
pub const HEADER_SIZE: usize = 20;

/// Default protocol magic, the ASCII bytes `Budp`.
pub const DEFAULT_MAGIC: u32 = 0x4275_6470;

/// Smallest maximum transfer unit that still carries one payload byte.
pub const MIN_TRANSFER_UNIT: usize = HEADER_SIZE + 1;

/// Largest maximum transfer unit; payload lengths must fit a `u32`.
pub const MAX_TRANSFER_UNIT: usize = u32::MAX as usize;

/// Default maximum transfer unit, sized to fit a UDP payload inside a
/// standard Ethernet frame over IPv6.
pub const DEFAULT_MAX_TRANSFER_UNIT: usize = 1388;

/// Sentinel meaning "no limit" for the incoming message size cap.
pub const NO_LIMIT: usize = usize::MAX;

/// Capacity above which idle scratch buffers are released instead of kept.
pub const RETAINED_BUFFER_LIMIT: usize = 20 * 1024;

/// Largest number of fragments a single message may be split into.
pub const MAX_FRAGMENT_COUNT: usize = u16::MAX as usize;

/// Clamp a requested maximum transfer unit into the supported range.
///
/// # Examples
///
/// ```
/// use packet_tunnel::wire::{HEADER_SIZE, clamp_transfer_unit};
///
/// assert_eq!(clamp_transfer_unit(0), HEADER_SIZE + 1);
/// assert_eq!(clamp_transfer_unit(1400), 1400);
/// ```
#[must_use]
pub const fn clamp_transfer_unit(requested: usize) -> usize {
    if requested < MIN_TRANSFER_UNIT {
        MIN_TRANSFER_UNIT
    } else if requested > MAX_TRANSFER_UNIT {
        MAX_TRANSFER_UNIT
    } else {
        requested
    }
}

/// Payload bytes available in one packet for a given maximum transfer unit.
#[must_use]
pub const fn payload_budget(max_transfer_unit: usize) -> usize {
    clamp_transfer_unit(max_transfer_unit) - HEADER_SIZE
}
